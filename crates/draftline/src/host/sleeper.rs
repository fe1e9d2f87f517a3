// Sleeper REST client.
//
// Two read-only endpoints, no authentication:
//   GET {base}/draft/{id}        -> draft metadata (JSON `null` when unknown)
//   GET {base}/draft/{id}/picks  -> every pick made so far

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;

use draftline_core::config::Config;

use super::{DraftHost, DraftMetadata, HostError, RemotePick};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const DEFAULT_BASE_URL: &str = "https://api.sleeper.app/v1";

const USER_AGENT: &str = concat!("draftline/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// SleeperClient
// ---------------------------------------------------------------------------

pub struct SleeperClient {
    http: reqwest::Client,
    base_url: String,
}

impl SleeperClient {
    /// Create a client against `base_url` with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, HostError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| HostError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Build a client from `[host]` and `[polling]` settings.
    pub fn from_config(config: &Config) -> Result<Self, HostError> {
        let base_url = if config.host.base_url.trim().is_empty() {
            DEFAULT_BASE_URL.to_string()
        } else {
            config.host.base_url.clone()
        };
        Self::new(base_url, Duration::from_secs(config.polling.timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, draft_id: &str) -> Result<T, HostError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("GET {}", url);
        let response = self.http.get(&url).send().await.map_err(map_reqwest_error)?;
        check_status(response.status(), draft_id)?;
        let body = response.text().await.map_err(map_reqwest_error)?;
        parse_body(&body, draft_id)
    }
}

#[async_trait]
impl DraftHost for SleeperClient {
    async fn fetch_draft(&self, draft_id: &str) -> Result<DraftMetadata, HostError> {
        self.get_json(&format!("draft/{draft_id}"), draft_id).await
    }

    async fn fetch_picks(&self, draft_id: &str) -> Result<Vec<RemotePick>, HostError> {
        self.get_json(&format!("draft/{draft_id}/picks"), draft_id).await
    }
}

// ---------------------------------------------------------------------------
// Response handling
// ---------------------------------------------------------------------------

fn map_reqwest_error(err: reqwest::Error) -> HostError {
    if err.is_timeout() {
        HostError::Timeout
    } else if err.is_decode() {
        HostError::Malformed(err.to_string())
    } else if let Some(status) = err.status() {
        HostError::Status(status.as_u16())
    } else {
        HostError::Transport(err.to_string())
    }
}

fn check_status(status: StatusCode, draft_id: &str) -> Result<(), HostError> {
    if status == StatusCode::NOT_FOUND {
        Err(HostError::NotFound(draft_id.to_string()))
    } else if status.is_success() {
        Ok(())
    } else {
        Err(HostError::Status(status.as_u16()))
    }
}

/// Decode a response body. Sleeper answers unknown drafts with a literal
/// `null`, which maps to `NotFound`.
fn parse_body<T: DeserializeOwned>(body: &str, draft_id: &str) -> Result<T, HostError> {
    let value: Option<T> =
        serde_json::from_str(body).map_err(|e| HostError::Malformed(e.to_string()))?;
    value.ok_or_else(|| HostError::NotFound(draft_id.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_body_is_not_found() {
        let result: Result<DraftMetadata, _> = parse_body("null", "42");
        assert!(matches!(result, Err(HostError::NotFound(id)) if id == "42"));
    }

    #[test]
    fn schema_mismatch_is_malformed() {
        let result: Result<Vec<RemotePick>, _> = parse_body(r#"{"picks": 3}"#, "42");
        assert!(matches!(result, Err(HostError::Malformed(_))));
        let result: Result<Vec<RemotePick>, _> = parse_body("<html>", "42");
        assert!(matches!(result, Err(HostError::Malformed(_))));
    }

    #[test]
    fn empty_pick_list_parses() {
        let picks: Vec<RemotePick> = parse_body("[]", "42").unwrap();
        assert!(picks.is_empty());
    }

    #[test]
    fn status_mapping() {
        assert!(check_status(StatusCode::OK, "1").is_ok());
        assert!(matches!(
            check_status(StatusCode::NOT_FOUND, "1"),
            Err(HostError::NotFound(_))
        ));
        let err = check_status(StatusCode::SERVICE_UNAVAILABLE, "1").unwrap_err();
        assert!(matches!(err, HostError::Status(503)));
        assert!(err.is_transient());
        let err = check_status(StatusCode::TOO_MANY_REQUESTS, "1").unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn client_trims_base_url() {
        let client = SleeperClient::new("http://localhost:9000/v1/", Duration::from_secs(2)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:9000/v1");
    }

    #[test]
    fn empty_configured_base_url_uses_default() {
        let mut config = Config::default();
        config.host.base_url = String::new();
        let client = SleeperClient::from_config(&config).unwrap();
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
    }
}
