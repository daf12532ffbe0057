use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{PlaylistItem, PlaylistSummary};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const ACCOUNTS_AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";
const ACCOUNTS_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE_URL: &str = "https://api.spotify.com/v1";

/// Scopes requested at login: read the curated source, modify the user's
/// private drive playlist.
const OAUTH_SCOPES: &str = "playlist-read-private playlist-read-collaborative \
                            playlist-modify-private playlist-modify-public";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Token endpoint response. Spotify may omit `refresh_token` on a refresh
/// grant, in which case the previous one stays valid.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

/// Port trait wrapping the Spotify Web API capabilities used by the sync
/// core and the OAuth glue. The production implementation is
/// [`SpotifyClient`]; tests use the generated mock.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SpotifyApi: Send + Sync {
    /// Authorization URL the login route redirects to.
    fn authorize_url(&self, state: &str) -> String;

    /// Exchange an authorization code for a token pair (callback route).
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant>;

    /// Exchange a refresh token for a fresh token pair.
    async fn refresh_credential(&self, refresh_token: &str) -> Result<TokenGrant>;

    /// Spotify id of the user the access token belongs to.
    async fn current_user_id(&self, access_token: &str) -> Result<String>;

    /// Create a private playlist owned by `owner_remote_id`, returning its id.
    async fn create_playlist(
        &self,
        access_token: &str,
        owner_remote_id: &str,
        name: &str,
        description: &str,
    ) -> Result<String>;

    /// Upload a JPEG cover to a playlist.
    async fn upload_cover_image(
        &self,
        access_token: &str,
        playlist_id: &str,
        image: &[u8],
    ) -> Result<()>;

    /// Search the catalog for playlists matching `query`.
    async fn search_playlists(
        &self,
        access_token: &str,
        query: &str,
    ) -> Result<Vec<PlaylistSummary>>;

    /// Complete item list of a playlist, following pagination.
    async fn get_playlist_tracks(
        &self,
        access_token: &str,
        playlist_id: &str,
    ) -> Result<Vec<PlaylistItem>>;

    /// Remove the given URIs from a playlist. Callers keep each request
    /// within the API batch limit.
    async fn remove_tracks(
        &self,
        access_token: &str,
        playlist_id: &str,
        track_uris: &[String],
    ) -> Result<()>;

    /// Append the given URIs to a playlist, preserving order.
    async fn add_tracks(
        &self,
        access_token: &str,
        playlist_id: &str,
        track_uris: &[String],
    ) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct SpotifyClient {
    client_id: String,
    client_secret: String,
    redirect_url: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct Me {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CreatedPlaylist {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    playlists: SearchPage,
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    // Search pages occasionally contain null slots.
    #[serde(default)]
    items: Vec<Option<PlaylistSummary>>,
}

#[derive(Debug, Deserialize)]
struct TracksPage {
    #[serde(default)]
    items: Vec<TrackEntry>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrackEntry {
    // Null for items the market filter removed.
    track: Option<PlaylistItem>,
}

impl SpotifyClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client_id: config.spotify_client_id.clone(),
            client_secret: config.spotify_client_secret.clone(),
            redirect_url: config.redirect_url.clone(),
            client: Client::new(),
        }
    }

    fn basic_auth_header(&self) -> String {
        format!(
            "Basic {}",
            BASE64.encode(format!("{}:{}", self.client_id, self.client_secret))
        )
    }

    /// POST to the accounts token endpoint with client credentials in a
    /// Basic auth header, as the token endpoint requires.
    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenGrant> {
        let response = self
            .client
            .post(ACCOUNTS_TOKEN_URL)
            .form(params)
            .header("Authorization", self.basic_auth_header())
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| AppError::RemoteApi(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::RemoteApi(format!(
                "Token endpoint returned status {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::RemoteApi(format!("Failed to parse token response: {}", e)))
    }

    async fn check_status(context: &str, response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        tracing::error!("Spotify API error during {}: {} - {}", context, status, body);
        Err(AppError::RemoteApi(format!(
            "{} returned status {}: {}",
            context, status, body
        )))
    }
}

#[async_trait::async_trait]
impl SpotifyApi for SpotifyClient {
    fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&response_type=code&redirect_uri={}&state={}&scope={}",
            ACCOUNTS_AUTHORIZE_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_url),
            urlencoding::encode(state),
            urlencoding::encode(OAUTH_SCOPES)
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &self.redirect_url),
        ])
        .await
    }

    async fn refresh_credential(&self, refresh_token: &str) -> Result<TokenGrant> {
        // Refresh failures get their own error class: nothing after an
        // unauthenticated client can succeed.
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
        .map_err(|e| AppError::AuthRefresh(e.to_string()))
    }

    async fn current_user_id(&self, access_token: &str) -> Result<String> {
        let response = self
            .client
            .get(format!("{}/me", API_BASE_URL))
            .bearer_auth(access_token)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| AppError::RemoteApi(format!("Request failed: {}", e)))?;

        let response = Self::check_status("current user lookup", response).await?;
        let me: Me = response
            .json()
            .await
            .map_err(|e| AppError::RemoteApi(format!("Failed to parse response: {}", e)))?;
        Ok(me.id)
    }

    async fn create_playlist(
        &self,
        access_token: &str,
        owner_remote_id: &str,
        name: &str,
        description: &str,
    ) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/users/{}/playlists", API_BASE_URL, owner_remote_id))
            .bearer_auth(access_token)
            .json(&serde_json::json!({
                "name": name,
                "description": description,
                "public": false,
            }))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| AppError::RemoteApi(format!("Request failed: {}", e)))?;

        let response = Self::check_status("playlist creation", response).await?;
        let playlist: CreatedPlaylist = response
            .json()
            .await
            .map_err(|e| AppError::RemoteApi(format!("Failed to parse response: {}", e)))?;
        Ok(playlist.id)
    }

    async fn upload_cover_image(
        &self,
        access_token: &str,
        playlist_id: &str,
        image: &[u8],
    ) -> Result<()> {
        // The images endpoint expects the raw body to be base64-encoded JPEG.
        let response = self
            .client
            .put(format!("{}/playlists/{}/images", API_BASE_URL, playlist_id))
            .bearer_auth(access_token)
            .header("Content-Type", "image/jpeg")
            .body(BASE64.encode(image))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| AppError::RemoteApi(format!("Request failed: {}", e)))?;

        Self::check_status("cover upload", response).await?;
        Ok(())
    }

    async fn search_playlists(
        &self,
        access_token: &str,
        query: &str,
    ) -> Result<Vec<PlaylistSummary>> {
        tracing::debug!("Searching playlists for '{}'", query);

        let response = self
            .client
            .get(format!("{}/search", API_BASE_URL))
            .bearer_auth(access_token)
            .query(&[("q", query), ("type", "playlist"), ("limit", "50")])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| AppError::RemoteApi(format!("Request failed: {}", e)))?;

        let response = Self::check_status("playlist search", response).await?;
        let data: SearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::RemoteApi(format!("Failed to parse response: {}", e)))?;

        Ok(data.playlists.items.into_iter().flatten().collect())
    }

    async fn get_playlist_tracks(
        &self,
        access_token: &str,
        playlist_id: &str,
    ) -> Result<Vec<PlaylistItem>> {
        let mut items = Vec::new();
        let mut offset = 0usize;

        loop {
            let response = self
                .client
                .get(format!("{}/playlists/{}/tracks", API_BASE_URL, playlist_id))
                .bearer_auth(access_token)
                .query(&[("limit", "100"), ("offset", &offset.to_string())])
                .timeout(REQUEST_TIMEOUT)
                .send()
                .await
                .map_err(|e| AppError::RemoteApi(format!("Request failed: {}", e)))?;

            let response = Self::check_status("playlist tracks fetch", response).await?;
            let page: TracksPage = response
                .json()
                .await
                .map_err(|e| AppError::RemoteApi(format!("Failed to parse response: {}", e)))?;

            offset += page.items.len();
            items.extend(page.items.into_iter().filter_map(|entry| entry.track));

            if page.next.is_none() {
                break;
            }
        }

        Ok(items)
    }

    async fn remove_tracks(
        &self,
        access_token: &str,
        playlist_id: &str,
        track_uris: &[String],
    ) -> Result<()> {
        let tracks: Vec<_> = track_uris
            .iter()
            .map(|uri| serde_json::json!({ "uri": uri }))
            .collect();

        let response = self
            .client
            .delete(format!("{}/playlists/{}/tracks", API_BASE_URL, playlist_id))
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "tracks": tracks }))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| AppError::RemoteApi(format!("Request failed: {}", e)))?;

        Self::check_status("track removal", response).await?;
        Ok(())
    }

    async fn add_tracks(
        &self,
        access_token: &str,
        playlist_id: &str,
        track_uris: &[String],
    ) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/playlists/{}/tracks", API_BASE_URL, playlist_id))
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "uris": track_uris }))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| AppError::RemoteApi(format!("Request failed: {}", e)))?;

        Self::check_status("track addition", response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> SpotifyClient {
        SpotifyClient {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            redirect_url: "https://example.org/callback".to_string(),
            client: Client::new(),
        }
    }

    #[test]
    fn test_authorize_url_carries_state_and_scopes() {
        let url = test_client().authorize_url("abc123");

        assert!(url.starts_with(ACCOUNTS_AUTHORIZE_URL));
        assert!(url.contains("client_id=client-id"));
        assert!(url.contains("state=abc123"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("playlist-modify-private"));
    }

    #[test]
    fn test_basic_auth_header_encodes_credentials() {
        let header = test_client().basic_auth_header();
        assert_eq!(
            header,
            format!("Basic {}", BASE64.encode("client-id:client-secret"))
        );
    }

    #[test]
    fn test_token_grant_tolerates_missing_refresh_token() {
        let grant: TokenGrant = serde_json::from_str(
            r#"{"access_token": "at", "expires_in": 3600, "token_type": "Bearer"}"#,
        )
        .unwrap();

        assert_eq!(grant.access_token, "at");
        assert_eq!(grant.refresh_token, None);
        assert_eq!(grant.expires_in, 3600);
    }

    #[test]
    fn test_search_page_drops_null_slots() {
        let data: SearchResponse = serde_json::from_str(
            r#"{"playlists": {"items": [
                {"id": "p1", "name": "Daily Drive", "owner": {"id": "spotify"}},
                null
            ]}}"#,
        )
        .unwrap();

        let items: Vec<_> = data.playlists.items.into_iter().flatten().collect();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "p1");
    }

    #[test]
    fn test_tracks_page_skips_unavailable_tracks() {
        let page: TracksPage = serde_json::from_str(
            r#"{"items": [
                {"track": {"uri": "spotify:track:1", "type": "track"}},
                {"track": null},
                {"track": {"uri": "spotify:episode:2", "type": "episode"}}
            ], "next": null}"#,
        )
        .unwrap();

        let items: Vec<_> = page.items.into_iter().filter_map(|e| e.track).collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_music());
        assert!(!items[1].is_music());
    }
}
