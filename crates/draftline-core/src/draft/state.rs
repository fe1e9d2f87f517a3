// Draft state: league settings, the pick ledger, team rosters and the pick pointer.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::pick::{Pick, Position};
use super::roster::{RosterEntry, RosterLayout, TeamRoster};
use crate::projections::{PlayerProjection, ProjectionTable};

// ---------------------------------------------------------------------------
// League settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftOrder {
    /// Direction reverses every round.
    Snake,
    /// Every round runs 1..T.
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringFormat {
    Ppr,
    HalfPpr,
    Standard,
}

impl ScoringFormat {
    /// Parse a host scoring label ("ppr", "half_ppr", "std", "2qb_ppr", ...).
    pub fn from_label(s: &str) -> Option<Self> {
        let s = s.to_lowercase();
        if s.contains("half") {
            Some(ScoringFormat::HalfPpr)
        } else if s.contains("ppr") {
            Some(ScoringFormat::Ppr)
        } else if s.contains("std") || s.contains("standard") {
            Some(ScoringFormat::Standard)
        } else {
            None
        }
    }
}

/// League structure the draft runs under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeagueSettings {
    pub num_teams: u32,
    pub rounds: u32,
    pub draft_order: DraftOrder,
    pub scoring: ScoringFormat,
    pub roster: RosterLayout,
    /// Draft slot → team id. Empty means team id equals slot.
    #[serde(default)]
    pub slot_to_team: BTreeMap<u32, u32>,
}

/// One position in the draft order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickSlot {
    pub pick_number: u32,
    pub round: u32,
    pub draft_slot: u32,
    pub team_id: u32,
}

impl LeagueSettings {
    pub fn total_picks(&self) -> u32 {
        self.num_teams * self.rounds
    }

    /// Team that owns `draft_slot`.
    pub fn team_for_slot(&self, draft_slot: u32) -> u32 {
        self.slot_to_team
            .get(&draft_slot)
            .copied()
            .unwrap_or(draft_slot)
    }

    /// Round and draft slot for overall pick `p` (1-indexed).
    ///
    /// With `T` teams, round `r = (p-1)/T + 1` and index `i = (p-1)%T + 1`;
    /// snake drafts reverse even rounds to slot `T - i + 1`.
    pub fn slot_for_pick(&self, pick_number: u32) -> PickSlot {
        let t = self.num_teams.max(1);
        let p = pick_number.max(1);
        let round = (p - 1) / t + 1;
        let i = (p - 1) % t + 1;
        let draft_slot = match self.draft_order {
            DraftOrder::Snake if round % 2 == 0 => t - i + 1,
            _ => i,
        };
        PickSlot {
            pick_number: p,
            round,
            draft_slot,
            team_id: self.team_for_slot(draft_slot),
        }
    }

    /// Pick numbers owned by `team` at or after `from_pick`, in order.
    pub fn team_turns(&self, team_id: u32, from_pick: u32) -> impl Iterator<Item = u32> + '_ {
        (from_pick.max(1)..=self.total_picks())
            .filter(move |&p| self.slot_for_pick(p).team_id == team_id)
    }
}

// ---------------------------------------------------------------------------
// DraftState
// ---------------------------------------------------------------------------

/// Canonical model of one draft.
///
/// Mutated only through [`DraftState::apply_pick`] and
/// [`DraftState::apply_batch`]; everything else is a read-only query.
#[derive(Debug, Clone)]
pub struct DraftState {
    pub draft_id: String,
    settings: LeagueSettings,
    projections: Arc<ProjectionTable>,
    picks: BTreeMap<u32, Pick>,
    rosters: BTreeMap<u32, TeamRoster>,
    /// Projection-table ids of every drafted player.
    drafted: HashSet<String>,
    /// Accounting position of each applied pick.
    pick_positions: HashMap<u32, Position>,
    /// Smallest pick number not yet applied.
    next_pick: u32,
    /// Host reported the draft finished, whatever the pick count.
    closed: bool,
}

impl DraftState {
    pub fn new(
        draft_id: impl Into<String>,
        settings: LeagueSettings,
        projections: Arc<ProjectionTable>,
    ) -> Self {
        DraftState {
            draft_id: draft_id.into(),
            settings,
            projections,
            picks: BTreeMap::new(),
            rosters: BTreeMap::new(),
            drafted: HashSet::new(),
            pick_positions: HashMap::new(),
            next_pick: 1,
            closed: false,
        }
    }

    pub fn settings(&self) -> &LeagueSettings {
        &self.settings
    }

    pub fn projections(&self) -> &Arc<ProjectionTable> {
        &self.projections
    }

    // -- Mutation --

    /// Record a pick. Returns `false` when the pick number is already known,
    /// in which case nothing changes.
    ///
    /// Players missing from the projection table are still placed on the
    /// team's roster using the host-reported position, and flagged unmapped.
    pub fn apply_pick(&mut self, pick: Pick) -> bool {
        if pick.pick_number == 0 {
            warn!("ignoring pick with pick number 0");
            return false;
        }
        if let Some(existing) = self.picks.get(&pick.pick_number) {
            if existing.player_id != pick.player_id {
                warn!(
                    "pick {} already recorded as {:?}, ignoring conflicting player {:?}",
                    pick.pick_number, existing.player_id, pick.player_id
                );
            }
            return false;
        }

        let resolved = self
            .projections
            .resolve(
                pick.player_id.as_deref(),
                pick.player_name.as_deref(),
                pick.position,
            )
            .cloned();

        let entry = match &resolved {
            Some(player) => {
                if !self.drafted.insert(player.player_id.clone()) {
                    warn!(
                        "player '{}' drafted again at pick {}",
                        player.name, pick.pick_number
                    );
                }
                RosterEntry {
                    pick: pick.clone(),
                    position: Some(player.position),
                    bye_week: player.bye_week,
                    mapped: true,
                    slot: None,
                }
            }
            None => {
                if let Some(id) = &pick.player_id {
                    warn!(
                        "pick {}: player {} ({}) not in projection table, recording as unmapped",
                        pick.pick_number,
                        id,
                        pick.player_name.as_deref().unwrap_or("unknown")
                    );
                }
                RosterEntry {
                    pick: pick.clone(),
                    position: pick.position,
                    bye_week: None,
                    mapped: false,
                    slot: None,
                }
            }
        };

        if let Some(pos) = entry.position {
            self.pick_positions.insert(pick.pick_number, pos);
        }
        self.rosters
            .entry(pick.team_id)
            .or_insert_with(|| TeamRoster::new(pick.team_id))
            .add_entry(entry, &self.settings.roster);

        debug!(
            "applied pick {} (round {}, team {})",
            pick.pick_number, pick.round, pick.team_id
        );
        self.picks.insert(pick.pick_number, pick);
        while self.picks.contains_key(&self.next_pick) {
            self.next_pick += 1;
        }
        true
    }

    /// Replace the draft-slot → team map. Returns `true` when it changed.
    ///
    /// Picks already recorded keep the team they were observed under.
    pub fn set_slot_map(&mut self, slot_to_team: BTreeMap<u32, u32>) -> bool {
        if self.settings.slot_to_team == slot_to_team {
            return false;
        }
        debug!("draft {}: slot map now {:?}", self.draft_id, slot_to_team);
        self.settings.slot_to_team = slot_to_team;
        true
    }

    /// Close the draft on the host's word. Returns `true` the first time.
    pub fn mark_complete(&mut self) -> bool {
        !std::mem::replace(&mut self.closed, true)
    }

    /// Apply a whole poll cycle's picks in pick-number order. Returns how
    /// many were new.
    pub fn apply_batch(&mut self, mut picks: Vec<Pick>) -> usize {
        picks.sort_by_key(|p| p.pick_number);
        let mut applied = 0;
        for pick in picks {
            if self.apply_pick(pick) {
                applied += 1;
            }
        }
        applied
    }

    /// Filter `incoming` down to picks whose number is not yet recorded,
    /// de-duplicated and ordered by pick number.
    pub fn new_picks(&self, incoming: Vec<Pick>) -> Vec<Pick> {
        let mut seen = HashSet::new();
        let mut fresh: Vec<Pick> = incoming
            .into_iter()
            .filter(|p| !self.picks.contains_key(&p.pick_number) && seen.insert(p.pick_number))
            .collect();
        fresh.sort_by_key(|p| p.pick_number);
        fresh
    }

    // -- Queries --

    /// Players in the projection table nobody has drafted, in table order.
    pub fn remaining_players(&self) -> Vec<&PlayerProjection> {
        self.projections
            .players()
            .iter()
            .filter(|p| !self.drafted.contains(&p.player_id))
            .collect()
    }

    pub fn is_drafted(&self, player_id: &str) -> bool {
        self.drafted.contains(player_id)
    }

    /// Number of distinct projection-table players drafted.
    pub fn drafted_mapped_count(&self) -> usize {
        self.drafted.len()
    }

    pub fn current_roster(&self, team_id: u32) -> Option<&TeamRoster> {
        self.rosters.get(&team_id)
    }

    pub fn rosters(&self) -> impl Iterator<Item = &TeamRoster> {
        self.rosters.values()
    }

    /// All recorded picks in pick-number order.
    pub fn picks(&self) -> impl DoubleEndedIterator<Item = &Pick> {
        self.picks.values()
    }

    pub fn pick_count(&self) -> usize {
        self.picks.len()
    }

    /// The pick currently on the clock: the smallest pick number not yet
    /// applied.
    pub fn current_pick(&self) -> u32 {
        self.next_pick
    }

    pub fn current_round(&self) -> u32 {
        self.settings.slot_for_pick(self.next_pick).round
    }

    /// Team on the clock, `None` once the draft is complete.
    pub fn on_the_clock_team(&self) -> Option<u32> {
        if self.is_complete() {
            return None;
        }
        Some(self.settings.slot_for_pick(self.next_pick).team_id)
    }

    /// The next `count` slots in draft order starting at the current pick.
    pub fn next_slots(&self, count: usize) -> Vec<PickSlot> {
        if self.closed {
            return Vec::new();
        }
        (self.next_pick..=self.settings.total_picks())
            .filter(|p| !self.picks.contains_key(p))
            .take(count)
            .map(|p| self.settings.slot_for_pick(p))
            .collect()
    }

    /// Picks made by other teams before `team_id` is next on the clock,
    /// counting from `from_pick`. `Some(0)` when `team_id` owns `from_pick`;
    /// `None` when the team has no picks left.
    pub fn picks_until_next_turn(&self, team_id: u32, from_pick: u32) -> Option<u32> {
        self.settings
            .team_turns(team_id, from_pick)
            .next()
            .map(|p| p - from_pick.max(1))
    }

    /// The team's next two turns from the current pick.
    pub fn upcoming_turns(&self, team_id: u32) -> (Option<u32>, Option<u32>) {
        let mut turns = self.settings.team_turns(team_id, self.next_pick);
        (turns.next(), turns.next())
    }

    /// Every pick is in, or the host closed the draft early.
    pub fn is_complete(&self) -> bool {
        self.closed || self.next_pick > self.settings.total_picks()
    }

    pub fn picks_by_team(&self, team_id: u32) -> Vec<&Pick> {
        self.picks.values().filter(|p| p.team_id == team_id).collect()
    }

    pub fn picks_by_round(&self, round: u32) -> Vec<&Pick> {
        self.picks.values().filter(|p| p.round == round).collect()
    }

    /// Players drafted at `position` league-wide, unmapped picks included.
    pub fn drafted_count(&self, position: Position) -> usize {
        self.rosters.values().map(|r| r.position_count(position)).sum()
    }

    /// Accounting position of an applied pick.
    pub fn position_of_pick(&self, pick_number: u32) -> Option<Position> {
        self.pick_positions.get(&pick_number).copied()
    }

    /// Picks whose player could not be matched to the projection table.
    pub fn unmapped_picks(&self) -> Vec<&RosterEntry> {
        let mut entries: Vec<&RosterEntry> =
            self.rosters.values().flat_map(|r| r.unmapped()).collect();
        entries.sort_by_key(|e| e.pick.pick_number);
        entries
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{league, pick, pick_named, table};

    #[test]
    fn snake_order_twelve_teams() {
        let settings = league(12, 15);
        assert_eq!(settings.slot_for_pick(1).team_id, 1);
        assert_eq!(settings.slot_for_pick(12).team_id, 12);
        assert_eq!(settings.slot_for_pick(13).team_id, 12);
        assert_eq!(settings.slot_for_pick(24).team_id, 1);
        assert_eq!(settings.slot_for_pick(25).team_id, 1);
        assert_eq!(settings.slot_for_pick(24).round, 2);
        assert_eq!(settings.slot_for_pick(25).round, 3);
    }

    #[test]
    fn linear_order_never_reverses() {
        let mut settings = league(10, 3);
        settings.draft_order = DraftOrder::Linear;
        assert_eq!(settings.slot_for_pick(11).draft_slot, 1);
        assert_eq!(settings.slot_for_pick(20).draft_slot, 10);
    }

    #[test]
    fn slot_map_translates_to_team_ids() {
        let mut settings = league(4, 2);
        settings.slot_to_team = BTreeMap::from([(1, 7), (2, 3), (3, 1), (4, 2)]);
        assert_eq!(settings.slot_for_pick(1).team_id, 7);
        // Round two reverses: pick 5 is slot 4.
        assert_eq!(settings.slot_for_pick(5).team_id, 2);
    }

    #[test]
    fn on_the_clock_follows_pointer() {
        let mut state = DraftState::new("d", league(12, 15), Arc::new(table(40)));
        assert_eq!(state.on_the_clock_team(), Some(1));
        for n in 1..=12 {
            state.apply_pick(pick(&state, n, &format!("p{n}")));
        }
        assert_eq!(state.current_pick(), 13);
        assert_eq!(state.on_the_clock_team(), Some(12));
        assert_eq!(state.current_round(), 2);
    }

    #[test]
    fn apply_pick_is_idempotent() {
        let mut state = DraftState::new("d", league(12, 15), Arc::new(table(40)));
        let first = pick(&state, 1, "p1");
        assert!(state.apply_pick(first.clone()));
        let picks_once: Vec<Pick> = state.picks().cloned().collect();
        let remaining_once = state.remaining_players().len();

        assert!(!state.apply_pick(first));
        assert_eq!(state.picks().cloned().collect::<Vec<_>>(), picks_once);
        assert_eq!(state.remaining_players().len(), remaining_once);
        assert_eq!(state.current_roster(1).unwrap().len(), 1);
    }

    #[test]
    fn conflicting_repeat_is_ignored() {
        let mut state = DraftState::new("d", league(12, 15), Arc::new(table(40)));
        state.apply_pick(pick(&state, 1, "p1"));
        assert!(!state.apply_pick(pick(&state, 1, "p2")));
        assert!(state.is_drafted("p1"));
        assert!(!state.is_drafted("p2"));
    }

    #[test]
    fn conservation_with_unmapped_picks() {
        let projections = Arc::new(table(40));
        let mut state = DraftState::new("d", league(12, 15), projections.clone());
        state.apply_pick(pick(&state, 1, "p1"));
        state.apply_pick(pick(&state, 2, "p2"));
        state.apply_pick(pick_named(&state, 3, "ghost", "Ghost Kicker", Position::Kicker));

        let mapped_picked = state.drafted_mapped_count();
        assert_eq!(mapped_picked, 2);
        assert_eq!(
            mapped_picked + state.remaining_players().len(),
            projections.len()
        );
        let unmapped = state.unmapped_picks();
        assert_eq!(unmapped.len(), 1);
        assert_eq!(unmapped[0].pick.pick_number, 3);
        // Roster accounting still sees the kicker.
        assert_eq!(state.drafted_count(Position::Kicker), 1);
        assert_eq!(state.current_roster(state.settings().slot_for_pick(3).team_id).unwrap().len(), 1);
    }

    #[test]
    fn picked_and_available_are_disjoint() {
        let mut state = DraftState::new("d", league(12, 15), Arc::new(table(40)));
        for n in 1..=10 {
            state.apply_pick(pick(&state, n, &format!("p{}", n * 3)));
        }
        for player in state.remaining_players() {
            assert!(!state.is_drafted(&player.player_id));
        }
        assert_eq!(state.remaining_players().len(), 30);
    }

    #[test]
    fn name_fallback_maps_pick() {
        let projections = Arc::new(table(10));
        let target = projections.get("p4").unwrap().clone();
        let mut state = DraftState::new("d", league(12, 15), projections);
        state.apply_pick(pick_named(&state, 1, "host-404", &target.name, target.position));
        assert!(state.is_drafted("p4"));
        assert!(state.unmapped_picks().is_empty());
    }

    #[test]
    fn pointer_skips_gaps_until_filled() {
        let mut state = DraftState::new("d", league(12, 15), Arc::new(table(40)));
        state.apply_pick(pick(&state, 1, "p1"));
        state.apply_pick(pick(&state, 3, "p3"));
        assert_eq!(state.current_pick(), 2);
        state.apply_pick(pick(&state, 2, "p2"));
        assert_eq!(state.current_pick(), 4);
    }

    #[test]
    fn batch_applies_in_pick_order_and_counts_new() {
        let mut state = DraftState::new("d", league(12, 15), Arc::new(table(40)));
        let batch = vec![pick(&state, 3, "p3"), pick(&state, 1, "p1"), pick(&state, 2, "p2")];
        assert_eq!(state.apply_batch(batch.clone()), 3);
        assert_eq!(state.apply_batch(batch), 0);
        let numbers: Vec<u32> = state.picks().map(|p| p.pick_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn new_picks_diffs_by_pick_number() {
        let mut state = DraftState::new("d", league(12, 15), Arc::new(table(40)));
        state.apply_pick(pick(&state, 1, "p1"));
        let incoming = vec![
            pick(&state, 1, "p1"),
            pick(&state, 2, "p2"),
            pick(&state, 2, "p2"),
        ];
        let fresh = state.new_picks(incoming);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].pick_number, 2);
    }

    #[test]
    fn null_player_advances_pointer_without_roster_position() {
        let mut state = DraftState::new("d", league(12, 15), Arc::new(table(40)));
        let mut empty = pick(&state, 1, "p1");
        empty.player_id = None;
        empty.player_name = None;
        empty.position = None;
        assert!(state.apply_pick(empty));
        assert_eq!(state.current_pick(), 2);
        let roster = state.current_roster(1).unwrap();
        assert_eq!(roster.len(), 1);
        assert!(roster.entries()[0].position.is_none());
        assert!(state.unmapped_picks().is_empty());
    }

    #[test]
    fn picks_until_next_turn_snake() {
        let state = DraftState::new("d", league(12, 15), Arc::new(table(10)));
        // Team 1 picks at 1, 24, 25, 48...
        assert_eq!(state.picks_until_next_turn(1, 1), Some(0));
        assert_eq!(state.picks_until_next_turn(1, 2), Some(22));
        assert_eq!(state.picks_until_next_turn(1, 24), Some(0));
        // Team 12 picks at 12 and 13 back to back.
        assert_eq!(state.picks_until_next_turn(12, 13), Some(0));
        assert_eq!(state.picks_until_next_turn(12, 14), Some(22));
        assert_eq!(state.picks_until_next_turn(5, 180), None);
        assert_eq!(state.upcoming_turns(1), (Some(1), Some(24)));
    }

    #[test]
    fn next_slots_and_completion() {
        let mut state = DraftState::new("d", league(2, 2), Arc::new(table(10)));
        let slots = state.next_slots(3);
        let teams: Vec<u32> = slots.iter().map(|s| s.team_id).collect();
        assert_eq!(teams, vec![1, 2, 2]);
        for n in 1..=4 {
            state.apply_pick(pick(&state, n, &format!("p{n}")));
        }
        assert!(state.is_complete());
        assert_eq!(state.on_the_clock_team(), None);
        assert!(state.next_slots(3).is_empty());
    }

    #[test]
    fn host_can_close_the_draft_early() {
        let mut state = DraftState::new("d", league(4, 3), Arc::new(table(20)));
        for n in 1..=5 {
            state.apply_pick(pick(&state, n, &format!("p{n}")));
        }
        assert!(!state.is_complete());
        assert!(state.mark_complete());
        assert!(!state.mark_complete());
        assert!(state.is_complete());
        assert_eq!(state.on_the_clock_team(), None);
        assert!(state.next_slots(2).is_empty());
        assert_eq!(state.pick_count(), 5);
    }

    #[test]
    fn slot_map_refresh_applies_to_later_picks() {
        let mut state = DraftState::new("d", league(4, 3), Arc::new(table(20)));
        state.apply_pick(pick(&state, 1, "p1"));
        assert!(state.set_slot_map(BTreeMap::from([(1, 3), (2, 4), (3, 1), (4, 2)])));
        assert!(!state.set_slot_map(BTreeMap::from([(1, 3), (2, 4), (3, 1), (4, 2)])));
        assert_eq!(state.on_the_clock_team(), Some(4));
        state.apply_pick(pick(&state, 2, "p2"));
        // Pick 1 stays with the team it was made under.
        assert_eq!(state.current_roster(1).map(|r| r.len()), Some(1));
        assert_eq!(state.current_roster(4).map(|r| r.len()), Some(1));
    }

    #[test]
    fn picks_by_team_and_round() {
        let mut state = DraftState::new("d", league(2, 3), Arc::new(table(10)));
        for n in 1..=5 {
            state.apply_pick(pick(&state, n, &format!("p{n}")));
        }
        let team1: Vec<u32> = state.picks_by_team(1).iter().map(|p| p.pick_number).collect();
        assert_eq!(team1, vec![1, 4, 5]);
        let round2: Vec<u32> = state.picks_by_round(2).iter().map(|p| p.pick_number).collect();
        assert_eq!(round2, vec![3, 4]);
    }

    #[test]
    fn scoring_labels() {
        assert_eq!(ScoringFormat::from_label("ppr"), Some(ScoringFormat::Ppr));
        assert_eq!(ScoringFormat::from_label("half_ppr"), Some(ScoringFormat::HalfPpr));
        assert_eq!(ScoringFormat::from_label("2qb_ppr"), Some(ScoringFormat::Ppr));
        assert_eq!(ScoringFormat::from_label("std"), Some(ScoringFormat::Standard));
        assert_eq!(ScoringFormat::from_label("idp"), None);
    }
}
