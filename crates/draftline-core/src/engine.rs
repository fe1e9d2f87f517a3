// One full recompute cycle: draft state in, ranked and annotated snapshot out.
//
// Every cycle recomputes from scratch against a single `DraftState`
// reference; nothing is carried over from the previous snapshot.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::StrategyConfig;
use crate::draft::pick::Position;
use crate::draft::state::DraftState;
use crate::valuation::market::{MarketReport, MarketState};
use crate::valuation::need;
use crate::valuation::recommend::{self, Recommendation};
use crate::valuation::replacement::ReplacementLevels;
use crate::valuation::scarcity::ScarcityEntry;
use crate::valuation::Valuation;

/// A structured alert for the caller's UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Alert {
    RunStarting {
        position: Position,
        recent_count: usize,
    },
    RunEnding {
        position: Position,
    },
    ValueFalling {
        player_id: String,
        name: String,
        position: Position,
        slippage: f64,
    },
    DataQuality {
        pick_number: u32,
        message: String,
    },
}

/// Everything one recompute produced.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    /// The exact state the values below were computed from.
    #[serde(skip)]
    pub state: DraftState,
    pub draft_id: String,
    pub pick_count: usize,
    pub current_pick: u32,
    pub on_the_clock: Option<u32>,
    pub draft_complete: bool,
    /// Team the recommendations are ranked for.
    pub focus_team: Option<u32>,
    pub replacement_levels: ReplacementLevels,
    pub market: MarketReport,
    pub scarcity: Vec<ScarcityEntry>,
    pub recommendations: Vec<Recommendation>,
    /// Focus team's need multiplier per position. Empty without a focus team.
    pub needs: BTreeMap<Position, f64>,
    pub alerts: Vec<Alert>,
    /// Human-readable data-quality warnings.
    pub warnings: Vec<String>,
    pub computed_at: DateTime<Utc>,
}

fn market_alerts(market: &MarketReport, limit: usize) -> Vec<Alert> {
    let mut alerts = Vec::new();
    for signal in market.signals.values() {
        match signal.state {
            MarketState::RunStarting => alerts.push(Alert::RunStarting {
                position: signal.position,
                recent_count: signal.recent_count,
            }),
            MarketState::RunEnding => alerts.push(Alert::RunEnding {
                position: signal.position,
            }),
            _ => {}
        }
    }
    alerts.extend(market.falling.iter().take(limit).map(|f| Alert::ValueFalling {
        player_id: f.player_id.clone(),
        name: f.name.clone(),
        position: f.position,
        slippage: f.slippage,
    }));
    alerts
}

/// Warnings for unmapped picks. Picks on the focus team also raise a
/// `DataQuality` alert since they leave its need picture incomplete.
fn data_quality(state: &DraftState, focus_team: Option<u32>) -> (Vec<String>, Vec<Alert>) {
    let mut warnings = Vec::new();
    let mut alerts = Vec::new();
    for entry in state.unmapped_picks() {
        let pick = &entry.pick;
        let who = pick
            .player_name
            .clone()
            .or_else(|| pick.player_id.clone())
            .unwrap_or_else(|| "unknown player".into());
        let message = format!(
            "pick {} ({} for team {}) has no projection; excluded from valuation",
            pick.pick_number, who, pick.team_id
        );
        if Some(pick.team_id) == focus_team {
            alerts.push(Alert::DataQuality {
                pick_number: pick.pick_number,
                message: message.clone(),
            });
        }
        warnings.push(message);
    }
    (warnings, alerts)
}

/// Rank remaining players for any team against `state`.
pub fn recommendations_for(
    state: &DraftState,
    team_id: u32,
    strategy: &StrategyConfig,
) -> Vec<Recommendation> {
    let valuation = Valuation::compute(state, strategy, Some(team_id));
    recommend::rank(state, &valuation, team_id, strategy)
}

/// Run the whole pipeline (replacement → scarcity → market → need and
/// ranking) against one state.
///
/// Missing projections never stop ranking: they only add warnings.
pub fn recompute(
    state: &DraftState,
    strategy: &StrategyConfig,
    focus_team: Option<u32>,
) -> EngineSnapshot {
    let started = Instant::now();
    let valuation = Valuation::compute(state, strategy, focus_team);
    let recommendations = match focus_team {
        Some(team) => recommend::rank(state, &valuation, team, strategy),
        None => Vec::new(),
    };
    let needs = focus_team
        .map(|team| {
            need::need_profile(state.current_roster(team), state.settings(), &strategy.need)
        })
        .unwrap_or_default();

    let mut alerts = market_alerts(&valuation.market, strategy.recommendations.top_n);
    let (warnings, quality_alerts) = data_quality(state, focus_team);
    alerts.extend(quality_alerts);
    if !warnings.is_empty() {
        warn!("{} unmapped pick(s) excluded from valuation", warnings.len());
    }

    debug!(
        "recompute at pick {} took {:?} ({} players ranked)",
        state.current_pick(),
        started.elapsed(),
        recommendations.len()
    );

    let Valuation {
        levels,
        scarcity,
        market,
    } = valuation;

    EngineSnapshot {
        state: state.clone(),
        draft_id: state.draft_id.clone(),
        pick_count: state.pick_count(),
        current_pick: state.current_pick(),
        on_the_clock: state.on_the_clock_team(),
        draft_complete: state.is_complete(),
        focus_team,
        replacement_levels: levels,
        market,
        scarcity,
        recommendations,
        needs,
        alerts,
        warnings,
        computed_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::pick::Position::*;
    use crate::test_support::{league, pick, pick_named, table};
    use std::sync::Arc;

    #[test]
    fn snapshot_matches_state() {
        let mut state = DraftState::new("d1", league(12, 15), Arc::new(table(120)));
        for n in 1..=5 {
            let p = pick(&state, n, &format!("p{n}"));
            state.apply_pick(p);
        }
        let snapshot = recompute(&state, &StrategyConfig::default(), Some(6));
        assert_eq!(snapshot.draft_id, "d1");
        assert_eq!(snapshot.pick_count, 5);
        assert_eq!(snapshot.current_pick, 6);
        assert_eq!(snapshot.on_the_clock, Some(6));
        assert!(!snapshot.draft_complete);
        assert_eq!(snapshot.recommendations.len(), 115);
        assert_eq!(snapshot.state.pick_count(), 5);
        assert!(snapshot.warnings.is_empty());
    }

    #[test]
    fn unmapped_pick_warns_but_still_ranks() {
        let mut state = DraftState::new("d", league(12, 15), Arc::new(table(60)));
        let p = pick_named(&state, 1, "ghost", "Ghost Rookie", RunningBack);
        state.apply_pick(p);
        let snapshot = recompute(&state, &StrategyConfig::default(), Some(1));

        assert_eq!(snapshot.recommendations.len(), 60);
        assert_eq!(snapshot.warnings.len(), 1);
        assert!(snapshot.warnings[0].contains("Ghost Rookie"));
        assert!(snapshot
            .alerts
            .iter()
            .any(|a| matches!(a, Alert::DataQuality { pick_number: 1, .. })));

        // Another team sees the warning but no alert.
        let other = recompute(&state, &StrategyConfig::default(), Some(2));
        assert_eq!(other.warnings.len(), 1);
        assert!(!other.alerts.iter().any(|a| matches!(a, Alert::DataQuality { .. })));
    }

    #[test]
    fn falling_player_raises_alert() {
        let mut state = DraftState::new("d", league(12, 15), Arc::new(table(240)));
        // Draft only RBs and WRs so QB p15 slides to pick 45.
        for n in 1..=44u32 {
            let pos = if n % 2 == 1 { RunningBack } else { WideReceiver };
            let id = state
                .remaining_players()
                .into_iter()
                .find(|p| p.position == pos)
                .map(|p| p.player_id.clone())
                .unwrap();
            let p = pick(&state, n, &id);
            state.apply_pick(p);
        }
        let snapshot = recompute(&state, &StrategyConfig::default(), Some(1));
        assert!(snapshot.alerts.iter().any(|a| matches!(
            a,
            Alert::ValueFalling { player_id, .. } if player_id == "p15"
        )));
    }

    #[test]
    fn focus_team_needs_follow_its_roster() {
        let mut state = DraftState::new("d", league(12, 15), Arc::new(table(60)));
        // p1 is an RB and pick 1 belongs to team 1.
        let p = pick(&state, 1, "p1");
        state.apply_pick(p);
        let snapshot = recompute(&state, &StrategyConfig::default(), Some(1));
        assert_eq!(snapshot.needs.len(), Position::ALL.len());
        assert!(snapshot.needs[&RunningBack] < snapshot.needs[&Quarterback]);
        assert!(snapshot.needs.values().all(|m| *m > 0.0));

        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json["needs"].is_object());

        // Team 2 has nothing yet: every starting position sits at the top tier.
        let other = recompute(&state, &StrategyConfig::default(), Some(2));
        assert_eq!(other.needs[&RunningBack], other.needs[&Quarterback]);
    }

    #[test]
    fn no_focus_team_skips_ranking() {
        let state = DraftState::new("d", league(12, 15), Arc::new(table(30)));
        let snapshot = recompute(&state, &StrategyConfig::default(), None);
        assert!(snapshot.recommendations.is_empty());
        assert!(snapshot.needs.is_empty());
        assert_eq!(snapshot.replacement_levels.iter().count(), Position::ALL.len());
    }

    #[test]
    fn recommendations_for_other_team_uses_same_state() {
        let mut state = DraftState::new("d", league(12, 15), Arc::new(table(60)));
        let p = pick(&state, 1, "p1");
        state.apply_pick(p);
        let snapshot = recompute(&state, &StrategyConfig::default(), Some(1));
        let for_seven = recommendations_for(&snapshot.state, 7, &StrategyConfig::default());
        assert_eq!(for_seven.len(), 59);
        assert!(for_seven.iter().all(|r| r.player_id != "p1"));
    }

    #[test]
    fn snapshot_serializes_without_state() {
        let state = DraftState::new("d", league(12, 15), Arc::new(table(12)));
        let snapshot = recompute(&state, &StrategyConfig::default(), Some(1));
        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.get("state").is_none());
        assert_eq!(json["current_pick"], 1);
        assert!(json["replacement_levels"]["levels"].is_object());
    }
}
