// Configuration loading and parsing (league.toml, strategy.toml).

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::draft::pick::Position;
use crate::draft::roster::RosterLayout;
use crate::draft::state::{DraftOrder, LeagueSettings, ScoringFormat};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub league: LeagueConfig,
    pub strategy: StrategyConfig,
    pub polling: PollingConfig,
    pub host: HostConfig,
    pub data_paths: DataPaths,
}

// ---------------------------------------------------------------------------
// league.toml structs
// ---------------------------------------------------------------------------

/// Wrapper for the top-level `[league]` table in league.toml.
#[derive(Debug, Clone, Deserialize)]
struct LeagueFile {
    league: LeagueConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeagueConfig {
    pub name: String,
    pub num_teams: u32,
    pub rounds: u32,
    #[serde(default = "default_draft_order")]
    pub draft_order: DraftOrder,
    #[serde(default = "default_scoring")]
    pub scoring: ScoringFormat,
    /// The caller's draft slot; recommendations default to this team.
    #[serde(default)]
    pub my_slot: Option<u32>,
    #[serde(default)]
    pub draft_id: Option<String>,
    /// Slot name → count, e.g. `QB = 1`, `FLEX = 1`, `BN = 6`.
    pub roster: HashMap<String, usize>,
}

fn default_draft_order() -> DraftOrder {
    DraftOrder::Snake
}

fn default_scoring() -> ScoringFormat {
    ScoringFormat::Ppr
}

impl Default for LeagueConfig {
    fn default() -> Self {
        let roster = [
            ("QB", 1),
            ("RB", 2),
            ("WR", 2),
            ("TE", 1),
            ("FLEX", 1),
            ("K", 1),
            ("DEF", 1),
            ("BN", 6),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        LeagueConfig {
            name: "League".into(),
            num_teams: 12,
            rounds: 15,
            draft_order: DraftOrder::Snake,
            scoring: ScoringFormat::Ppr,
            my_slot: None,
            draft_id: None,
            roster,
        }
    }
}

impl LeagueConfig {
    /// League settings as configured locally, before any remote override.
    pub fn settings(&self) -> LeagueSettings {
        LeagueSettings {
            num_teams: self.num_teams,
            rounds: self.rounds,
            draft_order: self.draft_order,
            scoring: self.scoring,
            roster: RosterLayout::from_counts(&self.roster),
            slot_to_team: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// strategy.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct StrategyFile {
    #[serde(default)]
    polling: PollingConfig,
    #[serde(default)]
    replacement: ReplacementConfig,
    #[serde(default)]
    need: NeedConfig,
    #[serde(default)]
    market: MarketConfig,
    #[serde(default = "default_blend")]
    blend: Vec<BlendRow>,
    #[serde(default)]
    recommendations: RecommendationConfig,
    #[serde(default)]
    host: HostConfig,
    #[serde(default)]
    data_paths: DataPaths,
}

/// Valuation tunables assembled from strategy.toml.
#[derive(Debug, Clone)]
pub struct StrategyConfig {
    pub replacement: ReplacementConfig,
    pub need: NeedConfig,
    pub market: MarketConfig,
    pub blend: Vec<BlendRow>,
    pub recommendations: RecommendationConfig,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig {
            replacement: ReplacementConfig::default(),
            need: NeedConfig::default(),
            market: MarketConfig::default(),
            blend: default_blend(),
            recommendations: RecommendationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_secs: u64,
    pub timeout_secs: u64,
    /// Consecutive failures before status drops to degraded.
    pub degraded_after: u32,
    pub max_backoff_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        PollingConfig {
            interval_secs: 5,
            timeout_secs: 10,
            degraded_after: 3,
            max_backoff_secs: 60,
        }
    }
}

/// Fixed historical shares used to charge flex demand to positions.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReplacementConfig {
    pub flex_share: HashMap<String, f64>,
    pub super_flex_share: HashMap<String, f64>,
}

impl Default for ReplacementConfig {
    fn default() -> Self {
        let table = |pairs: &[(&str, f64)]| {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<HashMap<_, _>>()
        };
        ReplacementConfig {
            flex_share: table(&[("RB", 0.45), ("WR", 0.45), ("TE", 0.10)]),
            super_flex_share: table(&[("QB", 0.80), ("RB", 0.08), ("WR", 0.10), ("TE", 0.02)]),
        }
    }
}

impl ReplacementConfig {
    pub fn flex_share_for(&self, pos: Position) -> f64 {
        share_for(&self.flex_share, pos)
    }

    pub fn super_flex_share_for(&self, pos: Position) -> f64 {
        share_for(&self.super_flex_share, pos)
    }
}

fn share_for(table: &HashMap<String, f64>, pos: Position) -> f64 {
    table
        .iter()
        .find(|(k, _)| Position::from_str_pos(k) == Some(pos))
        .map(|(_, v)| *v)
        .unwrap_or(0.0)
}

/// Roster-need tier constants.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NeedConfig {
    /// No players at a starting position.
    pub top_tier: f64,
    /// Starters filled, bench below target.
    pub moderate_tier: f64,
    /// Starters and bench target met.
    pub saturated_tier: f64,
    /// Per-player decay past the saturation point.
    pub saturation_decay: f64,
    pub bye_penalty: f64,
    pub bench_target: HashMap<String, usize>,
}

impl Default for NeedConfig {
    fn default() -> Self {
        let bench_target = [("QB", 1), ("RB", 1), ("WR", 2), ("TE", 1), ("K", 0), ("DEF", 0)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        NeedConfig {
            top_tier: 1.5,
            moderate_tier: 1.1,
            saturated_tier: 0.7,
            saturation_decay: 0.85,
            bye_penalty: 0.92,
            bench_target,
        }
    }
}

impl NeedConfig {
    pub fn bench_target_for(&self, pos: Position) -> usize {
        self.bench_target
            .iter()
            .find(|(k, _)| Position::from_str_pos(k) == Some(pos))
            .map(|(_, v)| *v)
            .unwrap_or(0)
    }
}

/// Market detector window and score adjustments.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Rolling window K in picks.
    pub window: usize,
    /// Observed/expected ratio that counts as a run.
    pub run_ratio: f64,
    pub min_run_picks: usize,
    /// Fractional drop from the prior window that ends a run.
    pub run_end_drop: f64,
    /// Picks past ADP before a player counts as falling. `None` means one
    /// round.
    pub falling_margin: Option<u32>,
    pub falling_boost: f64,
    pub run_ending_penalty: f64,
    pub run_starting_boost: f64,
    pub turn_urgency: f64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        MarketConfig {
            window: 8,
            run_ratio: 1.5,
            min_run_picks: 3,
            run_end_drop: 0.5,
            falling_margin: None,
            falling_boost: 1.10,
            run_ending_penalty: 0.90,
            run_starting_boost: 1.05,
            turn_urgency: 0.05,
        }
    }
}

/// One row of the round-keyed blend table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BlendRow {
    pub round: u32,
    pub need_weight: f64,
    pub market_weight: f64,
}

fn default_blend() -> Vec<BlendRow> {
    vec![
        BlendRow { round: 1, need_weight: 0.2, market_weight: 0.3 },
        BlendRow { round: 5, need_weight: 0.6, market_weight: 0.6 },
        BlendRow { round: 10, need_weight: 1.0, market_weight: 1.0 },
    ]
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    /// Recommendations that get a rationale string.
    pub top_n: usize,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        RecommendationConfig { top_n: 10 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub base_url: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig {
            base_url: "https://api.sleeper.app/v1".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataPaths {
    pub projections: String,
}

impl Default for DataPaths {
    fn default() -> Self {
        DataPaths {
            projections: "data/projections.csv".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load and validate configuration from `base_dir/config/`.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- league.toml (required) ---
    let league_path = config_dir.join(CONFIG_FILES[0]);
    let league_text = read_file(&league_path)?;
    let league_file: LeagueFile =
        toml::from_str(&league_text).map_err(|e| ConfigError::ParseError {
            path: league_path.clone(),
            source: e,
        })?;

    // --- strategy.toml (required) ---
    let strategy_path = config_dir.join(CONFIG_FILES[1]);
    let strategy_text = read_file(&strategy_path)?;
    let strategy_file: StrategyFile =
        toml::from_str(&strategy_text).map_err(|e| ConfigError::ParseError {
            path: strategy_path.clone(),
            source: e,
        })?;

    let config = Config {
        league: league_file.league,
        strategy: StrategyConfig {
            replacement: strategy_file.replacement,
            need: strategy_file.need,
            market: strategy_file.market,
            blend: strategy_file.blend,
            recommendations: strategy_file.recommendations,
        },
        polling: strategy_file.polling,
        host: strategy_file.host,
        data_paths: strategy_file.data_paths,
    };

    validate(&config)?;

    Ok(config)
}

/// Files read from `config/`, in load order.
pub const CONFIG_FILES: [&str; 2] = ["league.toml", "strategy.toml"];

/// Copy each of [`CONFIG_FILES`] missing from `config/` out of `defaults/`.
///
/// Files already in `config/` are left alone. A file with no default is
/// skipped here and reported as `FileNotFound` by the loader. Returns the
/// paths written.
pub fn seed_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let config_dir = base_dir.join("config");
    let defaults_dir = base_dir.join("defaults");

    let mut seeded = Vec::new();
    for name in CONFIG_FILES {
        let target = config_dir.join(name);
        let source = defaults_dir.join(name);
        if target.exists() || !source.is_file() {
            continue;
        }
        std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("cannot create {}: {e}", config_dir.display()),
        })?;
        std::fs::copy(&source, &target).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("cannot copy {} to {}: {e}", source.display(), target.display()),
        })?;
        info!("seeded {} from defaults", target.display());
        seeded.push(target);
    }
    Ok(seeded)
}

/// Loads config relative to the current working directory, seeding
/// `config/` from `defaults/` first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    seed_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_shares(field: &str, shares: &HashMap<String, f64>, required: bool) -> Result<(), ConfigError> {
    if shares.is_empty() && !required {
        return Ok(());
    }
    for (key, value) in shares {
        if Position::from_str_pos(key).is_none() {
            return Err(invalid(field, format!("unknown position `{key}`")));
        }
        if *value < 0.0 {
            return Err(invalid(field, format!("share for {key} must be >= 0, got {value}")));
        }
    }
    let total: f64 = shares.values().sum();
    if (total - 1.0).abs() > 0.01 {
        return Err(invalid(field, format!("shares must sum to 1.0, got {total}")));
    }
    Ok(())
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    // League validations
    let league = &config.league;
    if league.num_teams == 0 {
        return Err(invalid("league.num_teams", "must be greater than 0"));
    }
    if league.rounds == 0 {
        return Err(invalid("league.rounds", "must be greater than 0"));
    }
    if let Some(slot) = league.my_slot {
        if slot == 0 || slot > league.num_teams {
            return Err(invalid(
                "league.my_slot",
                format!("must be between 1 and {}, got {slot}", league.num_teams),
            ));
        }
    }

    // Polling
    let polling = &config.polling;
    if !(3..=30).contains(&polling.interval_secs) {
        return Err(invalid(
            "polling.interval_secs",
            format!("must be between 3 and 30, got {}", polling.interval_secs),
        ));
    }
    if polling.timeout_secs == 0 {
        return Err(invalid("polling.timeout_secs", "must be > 0"));
    }
    if polling.degraded_after == 0 {
        return Err(invalid("polling.degraded_after", "must be > 0"));
    }
    if polling.max_backoff_secs < polling.interval_secs {
        return Err(invalid(
            "polling.max_backoff_secs",
            "must be at least polling.interval_secs",
        ));
    }

    // Replacement shares
    let has_flex = league
        .roster
        .iter()
        .any(|(k, v)| k.eq_ignore_ascii_case("FLEX") && *v > 0);
    validate_shares("replacement.flex_share", &config.strategy.replacement.flex_share, has_flex)?;
    validate_shares(
        "replacement.super_flex_share",
        &config.strategy.replacement.super_flex_share,
        false,
    )?;

    // Need tiers
    let need = &config.strategy.need;
    let tiers: &[(&str, f64)] = &[
        ("need.top_tier", need.top_tier),
        ("need.moderate_tier", need.moderate_tier),
        ("need.saturated_tier", need.saturated_tier),
        ("need.bye_penalty", need.bye_penalty),
    ];
    for (name, val) in tiers {
        if *val <= 0.0 {
            return Err(invalid(name, format!("must be > 0, got {val}")));
        }
    }
    if need.saturated_tier >= 1.0 {
        return Err(invalid("need.saturated_tier", "must be < 1.0"));
    }
    if need.moderate_tier <= 1.0 {
        return Err(invalid("need.moderate_tier", "must be > 1.0"));
    }
    if need.top_tier <= need.moderate_tier {
        return Err(invalid("need.top_tier", "must be greater than need.moderate_tier"));
    }
    if !(need.saturation_decay > 0.0 && need.saturation_decay < 1.0) {
        return Err(invalid("need.saturation_decay", "must be between 0 and 1 exclusive"));
    }

    // Market
    let market = &config.strategy.market;
    if !(5..=10).contains(&market.window) {
        return Err(invalid(
            "market.window",
            format!("must be between 5 and 10, got {}", market.window),
        ));
    }
    if market.run_ratio <= 1.0 {
        return Err(invalid("market.run_ratio", "must be > 1.0"));
    }
    if !(0.0..1.0).contains(&market.run_end_drop) {
        return Err(invalid("market.run_end_drop", "must be in [0, 1)"));
    }
    for (name, val) in [
        ("market.falling_boost", market.falling_boost),
        ("market.run_ending_penalty", market.run_ending_penalty),
        ("market.run_starting_boost", market.run_starting_boost),
    ] {
        if val <= 0.0 {
            return Err(invalid(name, format!("must be > 0, got {val}")));
        }
    }

    // Blend table
    let blend = &config.strategy.blend;
    if blend.is_empty() {
        return Err(invalid("blend", "must have at least one row"));
    }
    if blend.windows(2).any(|w| w[0].round >= w[1].round) {
        return Err(invalid("blend", "rows must be sorted by strictly increasing round"));
    }
    for row in blend {
        if !(0.0..=1.0).contains(&row.need_weight) || !(0.0..=1.0).contains(&row.market_weight) {
            return Err(invalid(
                "blend",
                format!("weights for round {} must be within [0, 1]", row.round),
            ));
        }
    }

    if config.strategy.recommendations.top_n == 0 {
        return Err(invalid("recommendations.top_n", "must be > 0"));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
