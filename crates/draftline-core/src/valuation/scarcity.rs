// Positional scarcity index.
//
// For each position, measures how many replacement-level-or-better players
// remain and how steeply value drops after the top options.

use std::cmp::Ordering;

use serde::Serialize;

use crate::draft::pick::Position;
use crate::draft::state::DraftState;
use crate::valuation::replacement::{remaining_pool, ReplacementLevels};

// ---------------------------------------------------------------------------
// Scarcity urgency levels
// ---------------------------------------------------------------------------

/// How urgently a position needs to be addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScarcityUrgency {
    /// 0-2 players at or above replacement.
    Critical,
    /// 3-4 players at or above replacement.
    High,
    /// 5-7 players at or above replacement.
    Medium,
    /// 8+ players at or above replacement.
    Low,
}

impl ScarcityUrgency {
    /// Determine urgency from the count of players at or above replacement.
    pub fn from_count(players_above_replacement: usize) -> Self {
        match players_above_replacement {
            0..=2 => ScarcityUrgency::Critical,
            3..=4 => ScarcityUrgency::High,
            5..=7 => ScarcityUrgency::Medium,
            _ => ScarcityUrgency::Low,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScarcityUrgency::Critical => "CRITICAL",
            ScarcityUrgency::High => "HIGH",
            ScarcityUrgency::Medium => "MEDIUM",
            ScarcityUrgency::Low => "LOW",
        }
    }
}

// ---------------------------------------------------------------------------
// Scarcity entry
// ---------------------------------------------------------------------------

/// Scarcity analysis for a single position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScarcityEntry {
    pub position: Position,
    /// Remaining players whose projection is at or above replacement.
    pub players_above_replacement: usize,
    /// VORP of the best remaining player.
    pub top_available_vorp: f64,
    /// VORP of the 3rd-best remaining player; the worst one (or 0.0) when
    /// fewer than three remain.
    pub third_vorp: f64,
    /// `top_available_vorp - third_vorp`.
    pub dropoff: f64,
    pub urgency: ScarcityUrgency,
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

/// Compute positional scarcity for every position, most urgent first, then
/// by dropoff descending.
pub fn compute_scarcity(state: &DraftState, levels: &ReplacementLevels) -> Vec<ScarcityEntry> {
    let mut entries: Vec<ScarcityEntry> = Position::ALL
        .iter()
        .map(|&pos| {
            let vorps: Vec<f64> = remaining_pool(state, pos)
                .into_iter()
                .map(|p| levels.vorp(p))
                .collect();
            let players_above_replacement = vorps.iter().filter(|v| **v >= 0.0).count();
            let top_available_vorp = vorps.first().copied().unwrap_or(0.0);
            let third_vorp = vorps
                .get(2)
                .or_else(|| vorps.last())
                .copied()
                .unwrap_or(0.0);
            ScarcityEntry {
                position: pos,
                players_above_replacement,
                top_available_vorp,
                third_vorp,
                dropoff: top_available_vorp - third_vorp,
                urgency: ScarcityUrgency::from_count(players_above_replacement),
            }
        })
        .collect();

    entries.sort_by(|a, b| {
        a.urgency
            .cmp(&b.urgency)
            .then_with(|| b.dropoff.partial_cmp(&a.dropoff).unwrap_or(Ordering::Equal))
            .then_with(|| a.position.cmp(&b.position))
    });
    entries
}

/// Look up the scarcity entry for a given position.
pub fn scarcity_for_position(
    scarcity: &[ScarcityEntry],
    position: Position,
) -> Option<&ScarcityEntry> {
    scarcity.iter().find(|e| e.position == position)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
