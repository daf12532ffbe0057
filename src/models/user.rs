use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Safety margin subtracted from the credential expiry: a token that expires
/// within this window is treated as already expired so it cannot lapse
/// mid-sync.
pub const TOKEN_EXPIRY_SKEW_SECONDS: i64 = 5;

/// A registered account. Rows are created by the OAuth callback and deleted
/// by the account-removal route; the sync core only updates the credential
/// columns and `drive_playlist_id`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub spotify_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub token_expires_on: DateTime<Utc>,
    /// Identifier of the user's Daily Music Drive playlist. None until the
    /// playlist has been provisioned; written exactly once.
    pub drive_playlist_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn credential(&self) -> Credential {
        Credential {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_at: self.token_expires_on,
        }
    }
}

/// OAuth access/refresh token pair with its absolute expiry instant.
#[derive(Debug, Clone)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Whether the access token must be refreshed before use. True once
    /// `now` has reached the expiry minus the skew window.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at - Duration::seconds(TOKEN_EXPIRY_SKEW_SECONDS)
    }
}
