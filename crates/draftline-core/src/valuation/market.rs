// Market efficiency: positional runs, reaches and falling value against ADP.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::MarketConfig;
use crate::draft::pick::Position;
use crate::draft::state::DraftState;
use crate::valuation::replacement::ReplacementLevels;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Categorical market read for one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketState {
    Normal,
    RunStarting,
    RunEnding,
    ValueFalling,
}

impl MarketState {
    pub fn label(&self) -> &'static str {
        match self {
            MarketState::Normal => "NORMAL",
            MarketState::RunStarting => "RUN_STARTING",
            MarketState::RunEnding => "RUN_ENDING",
            MarketState::ValueFalling => "VALUE_FALLING",
        }
    }
}

/// Rolling pick rate at one position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSignal {
    pub position: Position,
    pub state: MarketState,
    /// Picks at the position within the current window.
    pub recent_count: usize,
    /// `recent_count / window`.
    pub observed_rate: f64,
    /// Share of the position among players whose ADP falls near the
    /// current pick.
    pub expected_rate: f64,
    /// Observed rate for the window ending half a window ago.
    pub prior_rate: f64,
}

/// A remaining player available well past their ADP.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallingPlayer {
    pub player_id: String,
    pub name: String,
    pub position: Position,
    pub adp: f64,
    /// Picks past ADP: `current_pick - adp`.
    pub slippage: f64,
    pub vorp: f64,
}

/// A recent pick taken well ahead of its ADP.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reach {
    pub pick_number: u32,
    pub team_id: u32,
    pub player_id: String,
    pub adp: f64,
}

/// Market read for the whole draft at one pick.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarketReport {
    pub current_pick: u32,
    pub window: usize,
    pub signals: BTreeMap<Position, MarketSignal>,
    /// Falling players, largest slippage first.
    pub falling: Vec<FallingPlayer>,
    pub reaches: Vec<Reach>,
}

impl MarketReport {
    pub fn state(&self, pos: Position) -> MarketState {
        self.signals
            .get(&pos)
            .map(|s| s.state)
            .unwrap_or(MarketState::Normal)
    }

    pub fn is_falling(&self, player_id: &str) -> bool {
        self.falling.iter().any(|f| f.player_id == player_id)
    }

    /// Position → state.
    pub fn as_map(&self) -> BTreeMap<Position, MarketState> {
        self.signals.iter().map(|(p, s)| (*p, s.state)).collect()
    }
}

// ---------------------------------------------------------------------------
// Window measurements
// ---------------------------------------------------------------------------

/// Positions of the last `window` picks made before `end_pick`.
///
/// Picks with no known position still occupy a window slot.
pub fn recent_positions(state: &DraftState, end_pick: u32, window: usize) -> Vec<Option<Position>> {
    state
        .picks()
        .rev()
        .filter(|p| p.pick_number < end_pick)
        .take(window)
        .map(|p| state.position_of_pick(p.pick_number))
        .collect()
}

/// Share of `pos` among all players whose ADP lies within `center ± window`.
pub fn expected_rate(state: &DraftState, pos: Position, center: u32, window: usize) -> f64 {
    let lo = center as f64 - window as f64;
    let hi = center as f64 + window as f64;
    let mut total = 0usize;
    let mut at_pos = 0usize;
    for player in state.projections().players() {
        if let Some(adp) = player.adp {
            if adp >= lo && adp <= hi {
                total += 1;
                if player.position == pos {
                    at_pos += 1;
                }
            }
        }
    }
    if total == 0 {
        0.0
    } else {
        at_pos as f64 / total as f64
    }
}

/// Count, rate and run test for one window.
struct WindowRead {
    count: usize,
    rate: f64,
    expected: f64,
    is_run: bool,
}

fn read_window(
    state: &DraftState,
    pos: Position,
    end_pick: u32,
    cfg: &MarketConfig,
) -> WindowRead {
    let count = recent_positions(state, end_pick, cfg.window)
        .into_iter()
        .filter(|p| *p == Some(pos))
        .count();
    let rate = count as f64 / cfg.window as f64;
    let expected = expected_rate(state, pos, end_pick, cfg.window);
    let is_run = count >= cfg.min_run_picks && rate >= expected * cfg.run_ratio;
    WindowRead {
        count,
        rate,
        expected,
        is_run,
    }
}

/// Classify one position from its current and prior windows.
///
/// `RUN_STARTING` when the current window passes the run test. `RUN_ENDING`
/// when the prior window passed it and the current rate fell to at most
/// `prior × (1 - run_end_drop)`. `VALUE_FALLING` when neither applies but a
/// player at the position is falling.
pub fn classify(
    state: &DraftState,
    pos: Position,
    has_falling: bool,
    cfg: &MarketConfig,
) -> MarketSignal {
    let current_pick = state.current_pick();
    let current = read_window(state, pos, current_pick, cfg);
    let offset = cfg.window.div_ceil(2) as u32;
    let prior = if current_pick > offset + 1 {
        Some(read_window(state, pos, current_pick - offset, cfg))
    } else {
        None
    };
    let prior_rate = prior.as_ref().map(|p| p.rate).unwrap_or(0.0);

    let run_ended = prior
        .as_ref()
        .is_some_and(|p| p.is_run && current.rate <= p.rate * (1.0 - cfg.run_end_drop));

    let market_state = if current.is_run {
        MarketState::RunStarting
    } else if run_ended {
        MarketState::RunEnding
    } else if has_falling {
        MarketState::ValueFalling
    } else {
        MarketState::Normal
    };

    MarketSignal {
        position: pos,
        state: market_state,
        recent_count: current.count,
        observed_rate: current.rate,
        expected_rate: current.expected,
        prior_rate,
    }
}

// ---------------------------------------------------------------------------
// Player-level signals
// ---------------------------------------------------------------------------

/// Picks past ADP before a player counts as falling. Defaults to one round.
fn falling_margin(state: &DraftState, cfg: &MarketConfig) -> f64 {
    cfg.falling_margin.unwrap_or(state.settings().num_teams) as f64
}

/// Remaining players with positive VORP who have slipped at least
/// `falling_margin` picks past ADP and further than the focus team's wait
/// until its next turn.
pub fn falling_players(
    state: &DraftState,
    levels: &ReplacementLevels,
    focus_team: Option<u32>,
    cfg: &MarketConfig,
) -> Vec<FallingPlayer> {
    let current_pick = state.current_pick();
    let margin = falling_margin(state, cfg);
    let wait = focus_team
        .and_then(|team| state.picks_until_next_turn(team, current_pick))
        .unwrap_or(0) as f64;

    let mut falling: Vec<FallingPlayer> = state
        .remaining_players()
        .into_iter()
        .filter_map(|player| {
            let adp = player.adp?;
            let slippage = current_pick as f64 - adp;
            let vorp = levels.vorp(player);
            (slippage >= margin && slippage > wait && vorp > 0.0).then(|| FallingPlayer {
                player_id: player.player_id.clone(),
                name: player.name.clone(),
                position: player.position,
                adp,
                slippage,
                vorp,
            })
        })
        .collect();
    falling.sort_by(|a, b| {
        b.slippage
            .partial_cmp(&a.slippage)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.player_id.cmp(&b.player_id))
    });
    falling
}

/// Recent picks (current window) taken at least `falling_margin` picks
/// ahead of ADP.
pub fn recent_reaches(state: &DraftState, cfg: &MarketConfig) -> Vec<Reach> {
    let margin = falling_margin(state, cfg);
    let mut reaches: Vec<Reach> = state
        .picks()
        .rev()
        .take(cfg.window)
        .filter_map(|pick| {
            let player = state.projections().resolve(
                pick.player_id.as_deref(),
                pick.player_name.as_deref(),
                pick.position,
            )?;
            let adp = player.adp?;
            (adp - pick.pick_number as f64 >= margin).then(|| Reach {
                pick_number: pick.pick_number,
                team_id: pick.team_id,
                player_id: player.player_id.clone(),
                adp,
            })
        })
        .collect();
    reaches.sort_by_key(|r| r.pick_number);
    reaches
}

/// Full market read against one state.
pub fn detect(
    state: &DraftState,
    levels: &ReplacementLevels,
    focus_team: Option<u32>,
    cfg: &MarketConfig,
) -> MarketReport {
    let falling = falling_players(state, levels, focus_team, cfg);
    let signals = Position::ALL
        .iter()
        .map(|&pos| {
            let has_falling = falling.iter().any(|f| f.position == pos);
            (pos, classify(state, pos, has_falling, cfg))
        })
        .collect();
    MarketReport {
        current_pick: state.current_pick(),
        window: cfg.window,
        signals,
        falling,
        reaches: recent_reaches(state, cfg),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
