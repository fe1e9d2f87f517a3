// Remote draft host: wire types, errors and the `DraftHost` seam.
//
// The poller and monitor only ever talk to a `dyn DraftHost`, so tests can
// drive them with a scripted host instead of the network.

pub mod sleeper;

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use draftline_core::draft::pick::{Pick, Position};
use draftline_core::draft::roster::RosterLayout;
use draftline_core::draft::state::{DraftOrder, LeagueSettings, ScoringFormat};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum HostError {
    #[error("draft {0} not found")]
    NotFound(String),

    #[error("request timed out")]
    Timeout,

    #[error("host returned HTTP {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl HostError {
    /// Whether retrying the same request later can succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            HostError::NotFound(_) => false,
            HostError::Status(code) => *code == 429 || *code >= 500,
            HostError::Timeout | HostError::Transport(_) | HostError::Malformed(_) => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Draft metadata as returned by `GET draft/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DraftMetadata {
    #[serde(default)]
    pub draft_id: Option<String>,
    /// "pre_draft", "drafting", "paused" or "complete".
    #[serde(default)]
    pub status: String,
    /// "snake", "linear" or "auction".
    #[serde(rename = "type", default)]
    pub draft_type: String,
    #[serde(default)]
    pub settings: DraftSettings,
    /// Draft slot (as a string key) → roster id.
    #[serde(default)]
    pub slot_to_roster_id: Option<HashMap<String, Option<u32>>>,
    #[serde(default)]
    pub metadata: Option<DraftMetadataExtra>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DraftSettings {
    #[serde(default)]
    pub teams: Option<u32>,
    #[serde(default)]
    pub rounds: Option<u32>,
    /// Every other numeric setting; roster counts arrive as `slots_qb`,
    /// `slots_flex`, `slots_bn` and so on.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DraftMetadataExtra {
    #[serde(default)]
    pub scoring_type: Option<String>,
}

impl DraftMetadata {
    pub fn is_auction(&self) -> bool {
        self.draft_type.eq_ignore_ascii_case("auction")
    }

    pub fn is_complete(&self) -> bool {
        self.status.eq_ignore_ascii_case("complete")
    }

    /// Roster slot counts from the `slots_*` settings, keyed the way
    /// `league.toml` keys them ("QB", "FLEX", "SUPER_FLEX", "BN", ...).
    pub fn roster_counts(&self) -> HashMap<String, usize> {
        self.settings
            .extra
            .iter()
            .filter_map(|(key, value)| {
                let slot = key.strip_prefix("slots_")?;
                let count = value.as_u64()?;
                Some((slot.to_uppercase(), count as usize))
            })
            .filter(|(_, count)| *count > 0)
            .collect()
    }

    /// League settings with remote values taking precedence over `fallback`.
    pub fn league_settings(&self, fallback: &LeagueSettings) -> LeagueSettings {
        let mut settings = fallback.clone();
        if let Some(teams) = self.settings.teams.filter(|t| *t > 0) {
            settings.num_teams = teams;
        }
        if let Some(rounds) = self.settings.rounds.filter(|r| *r > 0) {
            settings.rounds = rounds;
        }
        match self.draft_type.to_lowercase().as_str() {
            "snake" => settings.draft_order = DraftOrder::Snake,
            "linear" => settings.draft_order = DraftOrder::Linear,
            _ => {}
        }
        if let Some(scoring) = self
            .metadata
            .as_ref()
            .and_then(|m| m.scoring_type.as_deref())
            .and_then(ScoringFormat::from_label)
        {
            settings.scoring = scoring;
        }
        let counts = self.roster_counts();
        if !counts.is_empty() {
            settings.roster = RosterLayout::from_counts(&counts);
        }
        if let Some(map) = &self.slot_to_roster_id {
            settings.slot_to_team = map
                .iter()
                .filter_map(|(slot, roster)| Some((slot.parse::<u32>().ok()?, (*roster)?)))
                .collect::<BTreeMap<_, _>>();
        }
        debug!(
            "league settings: {} teams, {} rounds, {:?}, {} roster slots",
            settings.num_teams,
            settings.rounds,
            settings.draft_order,
            settings.roster.total()
        );
        settings
    }
}

/// One entry of `GET draft/{id}/picks`.
#[derive(Debug, Clone, Deserialize)]
pub struct RemotePick {
    pub pick_no: u32,
    pub round: u32,
    pub draft_slot: u32,
    #[serde(default)]
    pub roster_id: Option<u32>,
    #[serde(default)]
    pub player_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<RemotePlayer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemotePlayer {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
}

impl RemotePick {
    /// Convert to a ledger pick. The owning team comes from the draft slot
    /// via the league's slot map.
    pub fn to_pick(&self, settings: &LeagueSettings, observed_at: DateTime<Utc>) -> Pick {
        let player_id = self
            .player_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(String::from);
        let meta = self.metadata.as_ref();
        let player_name = meta.and_then(|m| {
            let first = m.first_name.as_deref().unwrap_or("").trim();
            let last = m.last_name.as_deref().unwrap_or("").trim();
            let full = format!("{first} {last}").trim().to_string();
            (!full.is_empty()).then_some(full)
        });
        let position = meta
            .and_then(|m| m.position.as_deref())
            .and_then(Position::from_str_pos);
        Pick {
            pick_number: self.pick_no,
            round: self.round,
            draft_slot: self.draft_slot,
            team_id: settings.team_for_slot(self.draft_slot),
            player_id,
            player_name,
            position,
            observed_at,
        }
    }
}

/// Convert a whole remote pick list, stamping every pick with `observed_at`.
pub fn to_picks(remote: &[RemotePick], settings: &LeagueSettings, observed_at: DateTime<Utc>) -> Vec<Pick> {
    remote.iter().map(|p| p.to_pick(settings, observed_at)).collect()
}

// ---------------------------------------------------------------------------
// DraftHost trait
// ---------------------------------------------------------------------------

/// A remote draft host the poller can read from.
#[async_trait]
pub trait DraftHost: Send + Sync {
    async fn fetch_draft(&self, draft_id: &str) -> Result<DraftMetadata, HostError>;

    async fn fetch_picks(&self, draft_id: &str) -> Result<Vec<RemotePick>, HostError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
