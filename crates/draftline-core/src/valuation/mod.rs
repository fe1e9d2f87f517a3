// Valuation engine: replacement levels, roster need, market signals, ranking.

pub mod market;
pub mod need;
pub mod recommend;
pub mod replacement;
pub mod scarcity;

use crate::config::StrategyConfig;
use crate::draft::state::DraftState;

use market::MarketReport;
use replacement::ReplacementLevels;
use scarcity::ScarcityEntry;

/// Team-independent valuation inputs computed against one draft state.
///
/// Everything in here is derived from the same `DraftState` reference, so
/// levels, scarcity and market always describe the same pick.
#[derive(Debug, Clone, Default)]
pub struct Valuation {
    pub levels: ReplacementLevels,
    pub scarcity: Vec<ScarcityEntry>,
    pub market: MarketReport,
}

impl Valuation {
    /// ReplacementLevel → Scarcity → Market. `focus_team` sets the turn
    /// distance used for falling-value detection.
    pub fn compute(state: &DraftState, strategy: &StrategyConfig, focus_team: Option<u32>) -> Self {
        let levels = replacement::recompute(state, &strategy.replacement);
        let scarcity = scarcity::compute_scarcity(state, &levels);
        let market = market::detect(state, &levels, focus_team, &strategy.market);
        Valuation {
            levels,
            scarcity,
            market,
        }
    }
}
