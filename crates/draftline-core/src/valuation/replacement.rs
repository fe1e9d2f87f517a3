// Replacement level per position over the remaining player pool.
//
// Recomputed in full after every pick. A single pick can move the flex-adjusted
// demand at several positions at once, so there is no incremental path.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::config::ReplacementConfig;
use crate::draft::pick::Position;
use crate::draft::state::{DraftState, LeagueSettings};
use crate::projections::PlayerProjection;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Replacement level for one position, with the inputs that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplacementLevel {
    pub position: Position,
    /// League-wide rostered demand, flex share included.
    pub demand: usize,
    /// Players already drafted at the position.
    pub drafted: usize,
    /// 1-based index into the sorted remaining pool that was used.
    /// `None` when demand is already met and the best remaining player is
    /// the baseline.
    pub index: Option<usize>,
    /// Remaining players at the position.
    pub remaining: usize,
    /// Replacement projection.
    pub value: f64,
}

/// Replacement levels for every position.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplacementLevels {
    levels: BTreeMap<Position, ReplacementLevel>,
}

impl ReplacementLevels {
    /// Replacement projection at `pos`; 0.0 for positions never computed.
    pub fn value(&self, pos: Position) -> f64 {
        self.levels.get(&pos).map(|l| l.value).unwrap_or(0.0)
    }

    pub fn get(&self, pos: Position) -> Option<&ReplacementLevel> {
        self.levels.get(&pos)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReplacementLevel> {
        self.levels.values()
    }

    /// Position → replacement projection.
    pub fn as_map(&self) -> BTreeMap<Position, f64> {
        self.levels.iter().map(|(p, l)| (*p, l.value)).collect()
    }

    /// Projection minus replacement for a player.
    pub fn vorp(&self, player: &PlayerProjection) -> f64 {
        player.projected_points - self.value(player.position)
    }
}

// ---------------------------------------------------------------------------
// Computation
// ---------------------------------------------------------------------------

/// Sort descending by projection; ties by player id.
pub fn sort_by_projection(players: &mut [&PlayerProjection]) {
    players.sort_by(|a, b| {
        b.projected_points
            .partial_cmp(&a.projected_points)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.player_id.cmp(&b.player_id))
    });
}

/// Remaining players at `pos`, best first.
pub fn remaining_pool(state: &DraftState, pos: Position) -> Vec<&PlayerProjection> {
    let mut pool: Vec<&PlayerProjection> = state
        .remaining_players()
        .into_iter()
        .filter(|p| p.position == pos)
        .collect();
    sort_by_projection(&mut pool);
    pool
}

/// League-wide demand at `pos`:
/// `round(starters×teams + flex×teams×flex_share + superflex×teams×sf_share)`.
pub fn league_demand(settings: &LeagueSettings, shares: &ReplacementConfig, pos: Position) -> usize {
    let teams = settings.num_teams as f64;
    let roster = &settings.roster;
    let dedicated = roster.starters(pos) as f64 * teams;
    let flex = roster.flex_slots() as f64 * teams * shares.flex_share_for(pos);
    let super_flex = roster.super_flex_slots() as f64 * teams * shares.super_flex_share_for(pos);
    (dedicated + flex + super_flex).round() as usize
}

/// Pick the replacement value out of a sorted pool given remaining demand `n`.
///
/// - `n <= 0`: demand is met, the best remaining player is the baseline.
/// - otherwise the `n`-th best (`pool[n-1]`).
/// - fewer than `n` remaining: the lowest remaining (floor).
/// - empty pool: 0.0.
fn pick_level(pool: &[&PlayerProjection], n: i64) -> (Option<usize>, f64) {
    let Some(last) = pool.last() else {
        return (None, 0.0);
    };
    if n <= 0 {
        return (None, pool[0].projected_points);
    }
    let n = n as usize;
    match pool.get(n - 1) {
        Some(player) => (Some(n), player.projected_points),
        None => (Some(pool.len()), last.projected_points),
    }
}

/// Recompute replacement levels for every position against one state.
pub fn recompute(state: &DraftState, shares: &ReplacementConfig) -> ReplacementLevels {
    let mut levels = BTreeMap::new();
    for pos in Position::ALL {
        let demand = league_demand(state.settings(), shares, pos);
        let drafted = state.drafted_count(pos);
        let pool = remaining_pool(state, pos);
        let (index, value) = pick_level(&pool, demand as i64 - drafted as i64);
        debug!(
            "replacement {}: demand={} drafted={} index={:?} value={:.1}",
            pos, demand, drafted, index, value
        );
        levels.insert(
            pos,
            ReplacementLevel {
                position: pos,
                demand,
                drafted,
                index,
                remaining: pool.len(),
                value,
            },
        );
    }
    ReplacementLevels { levels }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
