// Roster need: per-team positional urgency as a value multiplier.

use std::collections::BTreeMap;

use crate::config::NeedConfig;
use crate::draft::pick::Position;
use crate::draft::roster::TeamRoster;
use crate::draft::state::LeagueSettings;
use crate::projections::PlayerProjection;

/// Multiplier for adding one more player at `pos` to `roster`.
///
/// Tiers, strictly decreasing in the number of players already rostered:
/// 1. Below the dedicated starter count: `top_tier` at zero, interpolating
///    down toward `moderate_tier`.
/// 2. Starters filled, bench below target: `moderate_tier` interpolating down
///    toward (never reaching) 1.0.
/// 3. At or past starters + bench target: `saturated_tier`, decaying by
///    `saturation_decay` per extra player.
///
/// A team with no picks yet is passed as `None`.
pub fn need_multiplier(
    roster: Option<&TeamRoster>,
    pos: Position,
    settings: &LeagueSettings,
    cfg: &NeedConfig,
) -> f64 {
    let count = roster.map(|r| r.position_count(pos)).unwrap_or(0);
    let starters = settings.roster.starters(pos);
    let bench = cfg.bench_target_for(pos);
    tier_for_count(count, starters, bench, cfg)
}

fn tier_for_count(count: usize, starters: usize, bench: usize, cfg: &NeedConfig) -> f64 {
    if count < starters {
        let filled = count as f64 / starters as f64;
        cfg.top_tier - (cfg.top_tier - cfg.moderate_tier) * filled
    } else if count < starters + bench {
        let filled = (count - starters) as f64 / bench as f64;
        cfg.moderate_tier - (cfg.moderate_tier - 1.0) * filled
    } else {
        let excess = (count - starters - bench) as i32;
        cfg.saturated_tier * cfg.saturation_decay.powi(excess)
    }
}

/// Whether adding `player` would stack a third (or later) player at the same
/// position on the same bye week.
pub fn has_bye_conflict(roster: Option<&TeamRoster>, player: &PlayerProjection) -> bool {
    match (roster, player.bye_week) {
        (Some(roster), Some(bye)) => roster.bye_week_count(player.position, bye) >= 2,
        _ => false,
    }
}

/// Need multiplier for a specific player, bye-week penalty included.
pub fn player_need(
    roster: Option<&TeamRoster>,
    player: &PlayerProjection,
    settings: &LeagueSettings,
    cfg: &NeedConfig,
) -> f64 {
    let base = need_multiplier(roster, player.position, settings, cfg);
    if has_bye_conflict(roster, player) {
        base * cfg.bye_penalty
    } else {
        base
    }
}

/// Need multiplier at every position for one team.
pub fn need_profile(
    roster: Option<&TeamRoster>,
    settings: &LeagueSettings,
    cfg: &NeedConfig,
) -> BTreeMap<Position, f64> {
    Position::ALL
        .iter()
        .map(|&pos| (pos, need_multiplier(roster, pos, settings, cfg)))
        .collect()
}

/// Whether the team is at or past starters + bench target at `pos`.
pub fn is_saturated(
    roster: Option<&TeamRoster>,
    pos: Position,
    settings: &LeagueSettings,
    cfg: &NeedConfig,
) -> bool {
    let count = roster.map(|r| r.position_count(pos)).unwrap_or(0);
    count >= settings.roster.starters(pos) + cfg.bench_target_for(pos)
}
