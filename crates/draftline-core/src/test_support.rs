// Shared fixtures for unit tests.

use chrono::Utc;

use crate::config::LeagueConfig;
use crate::draft::pick::{Pick, Position};
use crate::draft::state::{DraftState, LeagueSettings};
use crate::projections::{PlayerProjection, ProjectionTable};

/// Snake league with the default 1/2/2/1/FLEX/K/DEF + 6 bench lineup.
pub(crate) fn league(num_teams: u32, rounds: u32) -> LeagueSettings {
    let mut settings = LeagueConfig::default().settings();
    settings.num_teams = num_teams;
    settings.rounds = rounds;
    settings
}

pub(crate) fn player(
    id: &str,
    pos: Position,
    points: f64,
    adp: Option<f64>,
    bye_week: Option<u8>,
) -> PlayerProjection {
    PlayerProjection {
        player_id: id.to_string(),
        name: format!("Player {id}"),
        position: pos,
        team: "FA".into(),
        projected_points: points,
        adp,
        bye_week,
    }
}

/// `n` players `p1..pn` cycling RB, WR, QB, TE, K, DEF with descending
/// projections and ADP equal to the index.
pub(crate) fn table(n: usize) -> ProjectionTable {
    const CYCLE: [Position; 6] = [
        Position::RunningBack,
        Position::WideReceiver,
        Position::Quarterback,
        Position::TightEnd,
        Position::Kicker,
        Position::Defense,
    ];
    let players = (1..=n)
        .map(|i| {
            player(
                &format!("p{i}"),
                CYCLE[(i - 1) % CYCLE.len()],
                400.0 - 2.0 * i as f64,
                Some(i as f64),
                Some(5 + (i % 10) as u8),
            )
        })
        .collect();
    ProjectionTable::from_players(players).unwrap()
}

/// A pick of `player_id` at overall pick `n`, owned per the draft order.
pub(crate) fn pick(state: &DraftState, n: u32, player_id: &str) -> Pick {
    let slot = state.settings().slot_for_pick(n);
    Pick {
        pick_number: n,
        round: slot.round,
        draft_slot: slot.draft_slot,
        team_id: slot.team_id,
        player_id: Some(player_id.to_string()),
        player_name: None,
        position: None,
        observed_at: Utc::now(),
    }
}

/// A pick carrying host name and position metadata.
pub(crate) fn pick_named(
    state: &DraftState,
    n: u32,
    player_id: &str,
    name: &str,
    pos: Position,
) -> Pick {
    Pick {
        player_name: Some(name.to_string()),
        position: Some(pos),
        ..pick(state, n, player_id)
    }
}
