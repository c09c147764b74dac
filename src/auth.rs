//! OAuth token state: load, expiry check, transparent refresh.
//!
//! Token state lives in a JSON file written by the provider's authorization
//! flow (`token.json` by default). Each run loads it once; when the access
//! token is expired or about to expire, a `refresh_token` grant is posted to
//! the token endpoint and the updated state is written back.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, SweepError};

/// Refresh the token if it expires within this window.
const REFRESH_THRESHOLD_SECS: i64 = 60;

/// Persisted credential state for one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenState {
    /// Current bearer access token.
    #[serde(rename = "token")]
    pub access_token: String,

    /// Long-lived refresh token.
    pub refresh_token: String,

    /// OAuth token endpoint.
    pub token_uri: String,

    pub client_id: String,
    pub client_secret: String,

    /// When the access token expires (UTC).
    pub expiry: DateTime<Utc>,
}

/// Shape of the token endpoint's refresh response.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    /// Seconds until the new token expires.
    expires_in: i64,
}

impl TokenState {
    /// Load token state from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SweepError::Auth(format!("cannot read '{}': {e}", path.display())))?;
        serde_json::from_str(&contents)
            .map_err(|e| SweepError::Auth(format!("bad token state in '{}': {e}", path.display())))
    }

    /// Write token state back to disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| SweepError::Auth(format!("cannot serialize token state: {e}")))?;
        std::fs::write(path, contents).map_err(|e| SweepError::io(path, e))
    }

    /// Whether the access token is expired or expires within the threshold.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiry - Duration::seconds(REFRESH_THRESHOLD_SECS)
    }

    /// Obtain a fresh access token via the refresh grant.
    pub fn refresh(&mut self, http: &reqwest::blocking::Client) -> Result<()> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", self.refresh_token.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        let response = http
            .post(&self.token_uri)
            .form(&params)
            .send()
            .map_err(|e| SweepError::Auth(format!("token refresh failed: {e}")))?;
        if !response.status().is_success() {
            return Err(SweepError::Auth(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }
        let refreshed: RefreshResponse = response
            .json()
            .map_err(|e| SweepError::Auth(format!("bad token refresh response: {e}")))?;

        self.access_token = refreshed.access_token;
        self.expiry = Utc::now() + Duration::seconds(refreshed.expires_in);
        Ok(())
    }
}

/// Return a valid bearer token, refreshing and re-persisting if needed.
pub fn access_token(path: &Path, http: &reqwest::blocking::Client) -> Result<String> {
    let mut state = TokenState::load(path)?;
    if state.is_expired(Utc::now()) {
        info!("access token expired, refreshing");
        state.refresh(http)?;
        state.save(path)?;
    }
    Ok(state.access_token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_state(expiry: DateTime<Utc>) -> TokenState {
        TokenState {
            access_token: "ya29.abc".to_string(),
            refresh_token: "1//refresh".to_string(),
            token_uri: "https://oauth2.example.com/token".to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            expiry,
        }
    }

    #[test]
    fn test_expiry_detection() {
        let expiry = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let state = sample_state(expiry);

        let well_before = Utc.with_ymd_and_hms(2024, 6, 1, 11, 0, 0).unwrap();
        assert!(!state.is_expired(well_before));

        // Inside the refresh threshold counts as expired.
        let just_before = Utc.with_ymd_and_hms(2024, 6, 1, 11, 59, 30).unwrap();
        assert!(state.is_expired(just_before));

        let after = Utc.with_ymd_and_hms(2024, 6, 1, 13, 0, 0).unwrap();
        assert!(state.is_expired(after));
    }

    #[test]
    fn test_load_save_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("token.json");
        let expiry = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        sample_state(expiry).save(&path).expect("save");

        let loaded = TokenState::load(&path).expect("load");
        assert_eq!(loaded.access_token, "ya29.abc");
        assert_eq!(loaded.expiry, expiry);
    }

    #[test]
    fn test_token_field_uses_wire_name() {
        // The authorization flow writes the access token under "token".
        let json = r#"{
            "token": "ya29.wire",
            "refresh_token": "r",
            "token_uri": "https://oauth2.example.com/token",
            "client_id": "c",
            "client_secret": "s",
            "expiry": "2024-06-01T12:00:00Z"
        }"#;
        let state: TokenState = serde_json::from_str(json).expect("parse");
        assert_eq!(state.access_token, "ya29.wire");
    }

    #[test]
    fn test_missing_state_is_auth_error() {
        let err = TokenState::load(Path::new("/nonexistent/token.json")).unwrap_err();
        assert!(matches!(err, SweepError::Auth(_)));
    }
}
