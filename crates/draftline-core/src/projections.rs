// Projection table loading, name normalization and identity resolution.
//
// Reads a single CSV with one row per player:
// player_id,name,position,team,projected_points,adp,bye_week

use crate::draft::pick::Position;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::warn;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Season projection and market data for one player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerProjection {
    pub player_id: String,
    pub name: String,
    pub position: Position,
    pub team: String,
    pub projected_points: f64,
    /// Average draft position; `None` when the player has no market data.
    pub adp: Option<f64>,
    pub bye_week: Option<u8>,
}

/// The static player pool for one draft, indexed for lookup.
///
/// Built once before the draft starts and shared read-only behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct ProjectionTable {
    players: Vec<PlayerProjection>,
    by_id: HashMap<String, usize>,
    by_name: HashMap<(String, Position), usize>,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("validation error: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Raw CSV row (private)
// ---------------------------------------------------------------------------

/// Extra columns are ignored by the csv deserializer; blank `adp` and
/// `bye_week` cells deserialize to `None`.
#[derive(Debug, Deserialize)]
struct RawProjection {
    player_id: String,
    name: String,
    position: String,
    #[serde(default)]
    team: String,
    projected_points: f64,
    #[serde(default)]
    adp: Option<f64>,
    #[serde(default)]
    bye_week: Option<u8>,
}

// ---------------------------------------------------------------------------
// Name normalization
// ---------------------------------------------------------------------------

const NAME_SUFFIXES: &[&str] = &["jr", "sr", "ii", "iii", "iv", "v"];

/// Normalize a player name for cross-source matching.
///
/// Lowercases, strips punctuation, drops generational suffixes and collapses
/// whitespace: "Odell Beckham Jr." and "odell beckham" both become
/// "odell beckham".
pub fn normalize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c == '-' { ' ' } else { c })
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    let mut words: Vec<&str> = cleaned.split_whitespace().collect();
    while words.len() > 1 && words.last().is_some_and(|w| NAME_SUFFIXES.contains(w)) {
        words.pop();
    }
    words.join(" ")
}

// ---------------------------------------------------------------------------
// ProjectionTable
// ---------------------------------------------------------------------------

impl ProjectionTable {
    /// Index a list of players. Duplicate ids keep the first row.
    pub fn from_players(players: Vec<PlayerProjection>) -> Result<Self, ProjectionError> {
        if players.is_empty() {
            return Err(ProjectionError::Validation(
                "projection table has no players".into(),
            ));
        }

        let mut table = ProjectionTable::default();
        for player in players {
            if table.by_id.contains_key(&player.player_id) {
                warn!(
                    "duplicate projection row for player id '{}', keeping first",
                    player.player_id
                );
                continue;
            }
            let idx = table.players.len();
            table.by_id.insert(player.player_id.clone(), idx);
            table
                .by_name
                .entry((normalize_name(&player.name), player.position))
                .or_insert(idx);
            table.players.push(player);
        }
        Ok(table)
    }

    /// All players, in file order.
    pub fn players(&self) -> &[PlayerProjection] {
        &self.players
    }

    pub fn get(&self, player_id: &str) -> Option<&PlayerProjection> {
        self.by_id.get(player_id).map(|&i| &self.players[i])
    }

    /// Resolve a remote player to a table row.
    ///
    /// Exact player id first, then normalized name + position.
    pub fn resolve(
        &self,
        player_id: Option<&str>,
        name: Option<&str>,
        position: Option<Position>,
    ) -> Option<&PlayerProjection> {
        if let Some(found) = player_id.and_then(|id| self.get(id)) {
            return Some(found);
        }
        let (name, position) = (name?, position?);
        self.by_name
            .get(&(normalize_name(name), position))
            .map(|&i| &self.players[i])
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Loaders
// ---------------------------------------------------------------------------

fn load_from_reader<R: Read>(rdr: R) -> Result<Vec<PlayerProjection>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(rdr);
    let mut players = Vec::new();
    for result in reader.deserialize::<RawProjection>() {
        match result {
            Ok(raw) => {
                let Some(position) = Position::from_str_pos(&raw.position) else {
                    warn!(
                        "skipping player '{}': unknown position '{}'",
                        raw.name, raw.position
                    );
                    continue;
                };
                if !raw.projected_points.is_finite() || raw.adp.is_some_and(|a| !a.is_finite()) {
                    warn!("skipping player '{}': non-finite projection or ADP", raw.name);
                    continue;
                }
                if raw.player_id.is_empty() {
                    warn!("skipping player '{}': missing player_id", raw.name);
                    continue;
                }
                players.push(PlayerProjection {
                    player_id: raw.player_id,
                    name: raw.name,
                    position,
                    team: raw.team,
                    projected_points: raw.projected_points,
                    adp: raw.adp,
                    bye_week: raw.bye_week,
                });
            }
            Err(e) => {
                warn!("skipping malformed projection row: {}", e);
            }
        }
    }
    Ok(players)
}

/// Parse a projection table from any reader. Exposed for tests and for
/// callers that already hold the CSV in memory.
pub fn load_projections_from_reader<R: Read>(rdr: R) -> Result<ProjectionTable, ProjectionError> {
    let players = load_from_reader(rdr).map_err(|e| ProjectionError::Csv {
        path: "<reader>".into(),
        source: e,
    })?;
    ProjectionTable::from_players(players)
}

/// Load the projection table from a CSV file.
pub fn load_projections(path: &Path) -> Result<ProjectionTable, ProjectionError> {
    let file = std::fs::File::open(path).map_err(|e| ProjectionError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let players = load_from_reader(file).map_err(|e| ProjectionError::Csv {
        path: path.display().to_string(),
        source: e,
    })?;
    if players.is_empty() {
        return Err(ProjectionError::Validation(format!(
            "{} produced zero valid rows",
            path.display()
        )));
    }
    ProjectionTable::from_players(players)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
