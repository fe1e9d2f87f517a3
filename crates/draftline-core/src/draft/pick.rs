// Positions, roster slot kinds and the immutable pick record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Football positions that can be drafted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    Quarterback,
    RunningBack,
    WideReceiver,
    TightEnd,
    Kicker,
    Defense,
}

/// Positions eligible for a standard FLEX slot.
pub const FLEX_ELIGIBLE: &[Position] = &[
    Position::RunningBack,
    Position::WideReceiver,
    Position::TightEnd,
];

/// Positions eligible for a SUPER_FLEX slot.
pub const SUPER_FLEX_ELIGIBLE: &[Position] = &[
    Position::Quarterback,
    Position::RunningBack,
    Position::WideReceiver,
    Position::TightEnd,
];

impl Position {
    /// Every draftable position, in display order.
    pub const ALL: [Position; 6] = [
        Position::Quarterback,
        Position::RunningBack,
        Position::WideReceiver,
        Position::TightEnd,
        Position::Kicker,
        Position::Defense,
    ];

    /// Parse a position abbreviation as used by projection files and draft
    /// hosts ("QB", "RB", "WR", "TE", "K", "DEF").
    ///
    /// Team defenses appear under several spellings ("DEF", "DST", "D/ST").
    pub fn from_str_pos(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "QB" => Some(Position::Quarterback),
            "RB" => Some(Position::RunningBack),
            "WR" => Some(Position::WideReceiver),
            "TE" => Some(Position::TightEnd),
            "K" | "PK" => Some(Position::Kicker),
            "DEF" | "DST" | "D/ST" => Some(Position::Defense),
            _ => None,
        }
    }

    /// Return the display string for this position.
    pub fn display_str(&self) -> &'static str {
        match self {
            Position::Quarterback => "QB",
            Position::RunningBack => "RB",
            Position::WideReceiver => "WR",
            Position::TightEnd => "TE",
            Position::Kicker => "K",
            Position::Defense => "DEF",
        }
    }

    /// Deterministic ordering index for lineup display.
    pub fn sort_index(&self) -> u8 {
        match self {
            Position::Quarterback => 0,
            Position::RunningBack => 1,
            Position::WideReceiver => 2,
            Position::TightEnd => 3,
            Position::Kicker => 4,
            Position::Defense => 5,
        }
    }

    /// Whether the position can occupy a standard FLEX slot.
    pub fn is_flex_eligible(&self) -> bool {
        FLEX_ELIGIBLE.contains(self)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

/// The designation of a single lineup slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotKind {
    /// A dedicated starting slot for one position.
    Starter(Position),
    /// RB/WR/TE flex.
    Flex,
    /// QB/RB/WR/TE flex.
    SuperFlex,
    Bench,
}

impl SlotKind {
    /// Parse a roster config key or host slot name.
    ///
    /// Handles "FLEX", "SUPER_FLEX" (also "SUPERFLEX"), "BN"/"BE"/"BENCH", and
    /// any position abbreviation accepted by [`Position::from_str_pos`].
    pub fn from_str_slot(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "FLEX" => Some(SlotKind::Flex),
            "SUPER_FLEX" | "SUPERFLEX" => Some(SlotKind::SuperFlex),
            "BN" | "BE" | "BENCH" => Some(SlotKind::Bench),
            other => Position::from_str_pos(other).map(SlotKind::Starter),
        }
    }

    /// Whether a player at `pos` may fill this slot.
    pub fn accepts(&self, pos: Position) -> bool {
        match self {
            SlotKind::Starter(p) => *p == pos,
            SlotKind::Flex => pos.is_flex_eligible(),
            SlotKind::SuperFlex => SUPER_FLEX_ELIGIBLE.contains(&pos),
            SlotKind::Bench => true,
        }
    }

    /// Whether the slot counts toward the starting lineup.
    pub fn is_starter(&self) -> bool {
        !matches!(self, SlotKind::Bench)
    }
}

/// A single observed draft pick.
///
/// Created once by the poller when the pick is first seen and never mutated
/// afterwards. `pick_number` is the source of truth for ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pick {
    /// Overall pick number (1-indexed).
    pub pick_number: u32,
    /// Round number (1-indexed).
    pub round: u32,
    /// Draft slot that made the pick (1..=num_teams).
    pub draft_slot: u32,
    /// Team that owns the pick.
    pub team_id: u32,
    /// Host player identity. `None` for a slot the host reports without a
    /// player attached.
    pub player_id: Option<String>,
    /// Player name as reported by the host, used for identity fallback.
    #[serde(default)]
    pub player_name: Option<String>,
    /// Position as reported by the host. Keeps roster accounting correct for
    /// players missing from the projection table.
    #[serde(default)]
    pub position: Option<Position>,
    /// When the pick was first observed locally.
    pub observed_at: DateTime<Utc>,
}
