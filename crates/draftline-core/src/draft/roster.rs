// Team rosters: lineup layout and per-team pick accounting.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::pick::{Pick, Position, SlotKind};

/// The lineup every team drafts into, expanded to one entry per slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterLayout {
    slots: Vec<SlotKind>,
}

fn slot_order(slot: &SlotKind) -> u8 {
    match slot {
        SlotKind::Starter(pos) => pos.sort_index(),
        SlotKind::Flex => 10,
        SlotKind::SuperFlex => 11,
        SlotKind::Bench => 12,
    }
}

fn take_slot(open: &mut [Option<SlotKind>], kind: SlotKind) -> Option<SlotKind> {
    let idx = open.iter().position(|s| *s == Some(kind))?;
    open[idx].take()
}

impl RosterLayout {
    /// Build a layout from a config mapping slot names to counts, e.g.
    /// `{"QB": 1, "RB": 2, "FLEX": 1, "BN": 6}`.
    ///
    /// Unknown slot names (IR, taxi, IDP) are skipped with a warning.
    pub fn from_counts(counts: &HashMap<String, usize>) -> Self {
        let mut slots = Vec::new();
        for (name, &count) in counts {
            match SlotKind::from_str_slot(name) {
                Some(kind) => slots.extend(std::iter::repeat(kind).take(count)),
                None => warn!("ignoring unsupported roster slot '{}'", name),
            }
        }
        slots.sort_by_key(slot_order);
        RosterLayout { slots }
    }

    /// All slots in display order.
    pub fn slots(&self) -> &[SlotKind] {
        &self.slots
    }

    /// Dedicated starting slots for `pos` (flex slots excluded).
    pub fn starters(&self, pos: Position) -> usize {
        self.count(SlotKind::Starter(pos))
    }

    pub fn flex_slots(&self) -> usize {
        self.count(SlotKind::Flex)
    }

    pub fn super_flex_slots(&self) -> usize {
        self.count(SlotKind::SuperFlex)
    }

    pub fn bench_slots(&self) -> usize {
        self.count(SlotKind::Bench)
    }

    /// Total picks each team makes to fill the lineup.
    pub fn total(&self) -> usize {
        self.slots.len()
    }

    fn count(&self, kind: SlotKind) -> usize {
        self.slots.iter().filter(|s| **s == kind).count()
    }
}

/// A pick as held on a team's roster, with the data derived when applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub pick: Pick,
    /// Position used for accounting: projection table first, host metadata
    /// as fallback. `None` when neither knows the player.
    pub position: Option<Position>,
    pub bye_week: Option<u8>,
    /// Whether the player resolved to a row of the projection table.
    pub mapped: bool,
    /// Lineup slot the player occupies; `None` once the lineup is full.
    pub slot: Option<SlotKind>,
}

/// One team's drafted players.
///
/// Owned by the draft state; other components only ever see it through
/// shared references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRoster {
    pub team_id: u32,
    entries: Vec<RosterEntry>,
}

impl TeamRoster {
    pub fn new(team_id: u32) -> Self {
        TeamRoster {
            team_id,
            entries: Vec::new(),
        }
    }

    /// Insert an entry in pick order and re-run slot assignment.
    ///
    /// Slot assignment priority per player, in pick order:
    /// 1. Dedicated starting slot
    /// 2. FLEX, then SUPER_FLEX
    /// 3. Bench
    pub(crate) fn add_entry(&mut self, entry: RosterEntry, layout: &RosterLayout) {
        let idx = self
            .entries
            .partition_point(|e| e.pick.pick_number < entry.pick.pick_number);
        self.entries.insert(idx, entry);
        self.assign_slots(layout);
    }

    fn assign_slots(&mut self, layout: &RosterLayout) {
        let mut open: Vec<Option<SlotKind>> = layout.slots().iter().copied().map(Some).collect();

        for entry in &mut self.entries {
            entry.slot = match entry.position {
                Some(pos) => {
                    let mut slot = take_slot(&mut open, SlotKind::Starter(pos));
                    for kind in [SlotKind::Flex, SlotKind::SuperFlex] {
                        if slot.is_none() && kind.accepts(pos) {
                            slot = take_slot(&mut open, kind);
                        }
                    }
                    slot.or_else(|| take_slot(&mut open, SlotKind::Bench))
                }
                // Unknown players still consume a bench spot.
                None if entry.pick.player_id.is_some() => take_slot(&mut open, SlotKind::Bench),
                None => None,
            };
        }
    }

    /// Roster entries in pick order.
    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    /// The team's picks in pick order.
    pub fn picks(&self) -> impl Iterator<Item = &Pick> {
        self.entries.iter().map(|e| &e.pick)
    }

    /// Total players rostered at `pos`.
    pub fn position_count(&self, pos: Position) -> usize {
        self.entries
            .iter()
            .filter(|e| e.position == Some(pos))
            .count()
    }

    /// Players at `pos` occupying a starting slot (dedicated or flex).
    pub fn starters_filled(&self, pos: Position) -> usize {
        self.entries
            .iter()
            .filter(|e| e.position == Some(pos) && e.slot.is_some_and(|s| s.is_starter()))
            .count()
    }

    /// Players at `pos` not in a starting slot.
    pub fn bench_filled(&self, pos: Position) -> usize {
        self.position_count(pos) - self.starters_filled(pos)
    }

    /// Rostered players at `pos` whose bye falls in `bye_week`.
    pub fn bye_week_count(&self, pos: Position, bye_week: u8) -> usize {
        self.entries
            .iter()
            .filter(|e| e.position == Some(pos) && e.bye_week == Some(bye_week))
            .count()
    }

    /// Picks whose player could not be matched to the projection table.
    pub fn unmapped(&self) -> impl Iterator<Item = &RosterEntry> {
        self.entries
            .iter()
            .filter(|e| !e.mapped && e.pick.player_id.is_some())
    }

    /// Positional count summary.
    pub fn position_counts(&self) -> BTreeMap<Position, usize> {
        let mut counts = BTreeMap::new();
        for pos in Position::ALL {
            counts.insert(pos, self.position_count(pos));
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
