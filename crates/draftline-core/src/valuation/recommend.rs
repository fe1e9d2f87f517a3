// Recommendation engine: composite score, ranking and rationale.

use std::cmp::Ordering;

use serde::Serialize;

use crate::config::{BlendRow, MarketConfig, StrategyConfig};
use crate::draft::pick::Position;
use crate::draft::roster::TeamRoster;
use crate::draft::state::DraftState;
use crate::projections::PlayerProjection;
use crate::valuation::market::{MarketReport, MarketState};
use crate::valuation::need;
use crate::valuation::scarcity::scarcity_for_position;
use crate::valuation::Valuation;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Which input moved a player's composite score the most.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Factor {
    Value,
    Need,
    Market,
}

/// One ranked player for one team.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    /// 1-based rank.
    pub rank: usize,
    pub player_id: String,
    pub name: String,
    pub position: Position,
    pub team: String,
    pub projected_points: f64,
    pub adp: Option<f64>,
    /// Projection minus replacement.
    pub vorp: f64,
    /// Raw roster-need multiplier, bye penalty included.
    pub need: f64,
    /// Raw market adjustment.
    pub market_adjustment: f64,
    pub market_state: MarketState,
    pub composite: f64,
    pub dominant: Factor,
    /// Present for the top-N entries only.
    pub rationale: Option<String>,
}

/// Round-phase weights for need and market.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendWeights {
    pub need: f64,
    pub market: f64,
}

// ---------------------------------------------------------------------------
// Blend table
// ---------------------------------------------------------------------------

/// Weights for `round`, linearly interpolated between table rows and clamped
/// to the first and last rows.
pub fn blend_weights(blend: &[BlendRow], round: u32) -> BlendWeights {
    let (Some(first), Some(last)) = (blend.first(), blend.last()) else {
        return BlendWeights { need: 1.0, market: 1.0 };
    };
    if round <= first.round {
        return BlendWeights { need: first.need_weight, market: first.market_weight };
    }
    if round >= last.round {
        return BlendWeights { need: last.need_weight, market: last.market_weight };
    }
    for pair in blend.windows(2) {
        let (lo, hi) = (&pair[0], &pair[1]);
        if round >= lo.round && round <= hi.round {
            let t = (round - lo.round) as f64 / (hi.round - lo.round) as f64;
            return BlendWeights {
                need: lo.need_weight + t * (hi.need_weight - lo.need_weight),
                market: lo.market_weight + t * (hi.market_weight - lo.market_weight),
            };
        }
    }
    BlendWeights { need: last.need_weight, market: last.market_weight }
}

// ---------------------------------------------------------------------------
// Score components
// ---------------------------------------------------------------------------

/// The team's next two turns, as seen from the current pick.
#[derive(Debug, Clone, Copy, Default)]
struct Turns {
    next: Option<u32>,
    following: Option<u32>,
}

/// Market nudge for one player.
///
/// Falling players are boosted, a starting run at the position is boosted,
/// an ending run is penalized when the team is already saturated there, and
/// players expected to go between the team's next and following turns get a
/// small urgency bump.
fn market_adjustment(
    player: &PlayerProjection,
    market: &MarketReport,
    saturated: bool,
    turns: Turns,
    cfg: &MarketConfig,
) -> f64 {
    let mut adj = 1.0;
    if market.is_falling(&player.player_id) {
        adj *= cfg.falling_boost;
    }
    match market.state(player.position) {
        MarketState::RunStarting => adj *= cfg.run_starting_boost,
        MarketState::RunEnding if saturated => adj *= cfg.run_ending_penalty,
        _ => {}
    }
    if let (Some(adp), Some(next), Some(following)) = (player.adp, turns.next, turns.following) {
        if adp >= next as f64 && adp < following as f64 {
            adj *= 1.0 + cfg.turn_urgency;
        }
    }
    adj
}

/// `vorp × need' × market'` for non-negative VORP, `vorp ÷ (need' × market')`
/// otherwise, so a strong need makes a below-replacement player less bad
/// rather than worse.
pub fn composite_score(vorp: f64, need: f64, market: f64, weights: BlendWeights) -> f64 {
    let need_eff = 1.0 + weights.need * (need - 1.0);
    let market_eff = 1.0 + weights.market * (market - 1.0);
    let factor = need_eff * market_eff;
    if vorp >= 0.0 {
        vorp * factor
    } else {
        vorp / factor
    }
}

fn dominant_factor(need_eff: f64, market_eff: f64) -> Factor {
    let need_dev = need_eff.ln().abs();
    let market_dev = market_eff.ln().abs();
    if need_dev < 0.05 && market_dev < 0.05 {
        Factor::Value
    } else if need_dev >= market_dev {
        Factor::Need
    } else {
        Factor::Market
    }
}

fn rationale(rec: &Recommendation, market: &MarketReport, turns: Turns) -> String {
    let pos = rec.position;
    match rec.dominant {
        Factor::Value => format!("best value: {:+.1} pts over replacement {pos}", rec.vorp),
        Factor::Need if rec.need > 1.0 => {
            format!("fills {pos} need (x{:.2}), {:+.1} VORP", rec.need, rec.vorp)
        }
        Factor::Need => format!("{pos} depth already covered (x{:.2})", rec.need),
        Factor::Market => {
            if let Some(f) = market.falling.iter().find(|f| f.player_id == rec.player_id) {
                format!("falling: {:.0} picks past ADP {:.1}", f.slippage, f.adp)
            } else {
                match rec.market_state {
                    MarketState::RunStarting => format!("{pos} run underway, act before it dries up"),
                    MarketState::RunEnding => format!("{pos} run fading, depth not needed"),
                    _ => match turns.following {
                        Some(p) => format!("unlikely to last to pick {p}"),
                        None => format!("market favors {pos} now"),
                    },
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// Rank every remaining player for `team_id`.
///
/// Ties on composite score break by raw projection, then by positional
/// scarcity (fewer replacement-level-or-better players first), then by
/// player id.
pub fn rank(
    state: &DraftState,
    valuation: &Valuation,
    team_id: u32,
    strategy: &StrategyConfig,
) -> Vec<Recommendation> {
    let roster: Option<&TeamRoster> = state.current_roster(team_id);
    let (next, following) = state.upcoming_turns(team_id);
    let turns = Turns { next, following };
    let round = next
        .map(|p| state.settings().slot_for_pick(p).round)
        .unwrap_or_else(|| state.current_round());
    let weights = blend_weights(&strategy.blend, round);
    let settings = state.settings();

    let mut ranked: Vec<(Recommendation, usize)> = state
        .remaining_players()
        .into_iter()
        .map(|player| {
            let vorp = valuation.levels.vorp(player);
            let need = need::player_need(roster, player, settings, &strategy.need);
            let saturated = need::is_saturated(roster, player.position, settings, &strategy.need);
            let market_adj =
                market_adjustment(player, &valuation.market, saturated, turns, &strategy.market);
            let need_eff = 1.0 + weights.need * (need - 1.0);
            let market_eff = 1.0 + weights.market * (market_adj - 1.0);
            let scarce = scarcity_for_position(&valuation.scarcity, player.position)
                .map(|e| e.players_above_replacement)
                .unwrap_or(usize::MAX);
            let rec = Recommendation {
                rank: 0,
                player_id: player.player_id.clone(),
                name: player.name.clone(),
                position: player.position,
                team: player.team.clone(),
                projected_points: player.projected_points,
                adp: player.adp,
                vorp,
                need,
                market_adjustment: market_adj,
                market_state: valuation.market.state(player.position),
                composite: composite_score(vorp, need, market_adj, weights),
                dominant: dominant_factor(need_eff, market_eff),
                rationale: None,
            };
            (rec, scarce)
        })
        .collect();

    ranked.sort_by(|(a, a_scarce), (b, b_scarce)| {
        b.composite
            .partial_cmp(&a.composite)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                b.projected_points
                    .partial_cmp(&a.projected_points)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a_scarce.cmp(b_scarce))
            .then_with(|| a.player_id.cmp(&b.player_id))
    });

    let top_n = strategy.recommendations.top_n;
    ranked
        .into_iter()
        .enumerate()
        .map(|(i, (mut rec, _))| {
            rec.rank = i + 1;
            if i < top_n {
                rec.rationale = Some(rationale(&rec, &valuation.market, turns));
            }
            rec
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
