use crate::config::{Config, API_TRACK_BATCH_LIMIT};
use crate::error::{AppError, Result};
use crate::models::{Credential, PlaylistSummary, User};
use crate::services::{AccountStore, SpotifyApi};
use chrono::{Duration, Utc};
use std::sync::Arc;
use std::time::Instant;

/// Tunables of the sync routine. One parameterized implementation rather
/// than per-playlist variants.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Display name of the curated playlist to copy from.
    pub source_name: String,
    /// Owner id the source playlist must belong to. Several public playlists
    /// share the display name; only the canonical publisher's counts.
    pub source_owner_id: String,
    pub target_name: String,
    pub target_description: String,
    /// Tracks removed per request while draining the target.
    pub removal_batch_size: usize,
    /// Tracks added per request, bounded by the API ceiling.
    pub add_batch_size: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            source_name: "Daily Drive".to_string(),
            source_owner_id: "spotify".to_string(),
            target_name: "Daily Music Drive".to_string(),
            target_description: "Spotify's Daily Drive without podcasts".to_string(),
            removal_batch_size: 5,
            add_batch_size: API_TRACK_BATCH_LIMIT,
        }
    }
}

impl SyncOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            removal_batch_size: config.removal_batch_size.min(API_TRACK_BATCH_LIMIT),
            ..Self::default()
        }
    }
}

/// Generates the Daily Music Drive for one user at a time: refresh the
/// credential, make sure the drive playlist exists, locate the curated
/// source, then replace the drive's content with the source's music tracks.
pub struct Generator {
    spotify: Arc<dyn SpotifyApi>,
    store: Arc<dyn AccountStore>,
    cover_image: Vec<u8>,
    options: SyncOptions,
}

impl Generator {
    pub fn new(
        spotify: Arc<dyn SpotifyApi>,
        store: Arc<dyn AccountStore>,
        cover_image: Vec<u8>,
        options: SyncOptions,
    ) -> Self {
        Self {
            spotify,
            store,
            cover_image,
            options,
        }
    }

    /// Run a full sync for one user. Each step's failure aborts the rest of
    /// this user's run; callers isolate failures between users.
    pub async fn sync_user(&self, user: &User) -> Result<()> {
        let started = Instant::now();
        tracing::info!("Generating Daily Music Drive for user {}", user.id);

        let credential = self.ensure_fresh_credential(user).await?;
        let drive_id = self.ensure_drive_playlist(user, &credential).await?;
        let source = self.resolve_source_playlist(&credential).await?;
        let copied = self
            .replace_drive_tracks(&credential, &drive_id, &source.id)
            .await?;

        tracing::info!(
            "Done for user {}: {} tracks copied in {:.2}s",
            user.id,
            copied,
            started.elapsed().as_secs_f64()
        );
        Ok(())
    }

    /// Returns a credential guaranteed valid for the remainder of this run.
    /// Refreshes at most once, immediately before use, and persists the new
    /// pair before returning so a later crash cannot lose it.
    async fn ensure_fresh_credential(&self, user: &User) -> Result<Credential> {
        let credential = user.credential();
        if !credential.needs_refresh(Utc::now()) {
            return Ok(credential);
        }

        tracing::info!("Refreshing access credential for user {}", user.id);
        let grant = self
            .spotify
            .refresh_credential(&credential.refresh_token)
            .await?;

        let refreshed = Credential {
            access_token: grant.access_token,
            // The token endpoint may not rotate the refresh token.
            refresh_token: grant.refresh_token.unwrap_or(credential.refresh_token),
            expires_at: Utc::now() + Duration::seconds(grant.expires_in),
        };
        self.store.update_credential(user.id, &refreshed).await?;

        Ok(refreshed)
    }

    /// Returns the id of the user's drive playlist, creating it on first
    /// use. The id is persisted before any track operation touches it; a
    /// crash between creation and persistence leaves an orphaned empty
    /// playlist in the account, never a dangling reference in the store.
    async fn ensure_drive_playlist(&self, user: &User, credential: &Credential) -> Result<String> {
        if let Some(drive_id) = &user.drive_playlist_id {
            return Ok(drive_id.clone());
        }

        tracing::info!(
            "Creating '{}' playlist for user {}",
            self.options.target_name,
            user.id
        );
        let drive_id = self
            .spotify
            .create_playlist(
                &credential.access_token,
                &user.spotify_id,
                &self.options.target_name,
                &self.options.target_description,
            )
            .await?;

        tracing::info!("Uploading playlist cover for user {}", user.id);
        self.spotify
            .upload_cover_image(&credential.access_token, &drive_id, &self.cover_image)
            .await?;

        self.store.update_target_playlist(user.id, &drive_id).await?;

        Ok(drive_id)
    }

    /// Locate the curated source playlist among the search results. The
    /// search is best-effort, not an exhaustive index; a miss is fatal for
    /// this run and usually transient across days.
    async fn resolve_source_playlist(&self, credential: &Credential) -> Result<PlaylistSummary> {
        let results = self
            .spotify
            .search_playlists(&credential.access_token, &self.options.source_name)
            .await?;

        results
            .into_iter()
            .find(|playlist| {
                playlist.name == self.options.source_name
                    && playlist.owner.id == self.options.source_owner_id
            })
            .ok_or_else(|| {
                AppError::SourceNotFound(format!(
                    "'{}' owned by '{}' absent from search results",
                    self.options.source_name, self.options.source_owner_id
                ))
            })
    }

    /// Replace the drive's content with the source's music tracks. Removal
    /// runs in sequential fixed-size batches until the drive is empty, then
    /// the filtered source list is appended in source order. Not atomic: a
    /// crash mid-way leaves the drive partially modified until the next run.
    async fn replace_drive_tracks(
        &self,
        credential: &Credential,
        drive_id: &str,
        source_id: &str,
    ) -> Result<usize> {
        tracing::debug!("Removing old tracks from drive {}", drive_id);
        let current: Vec<String> = self
            .spotify
            .get_playlist_tracks(&credential.access_token, drive_id)
            .await?
            .into_iter()
            .map(|item| item.uri)
            .collect();

        for batch in current.chunks(self.options.removal_batch_size) {
            self.spotify
                .remove_tracks(&credential.access_token, drive_id, batch)
                .await?;
        }

        tracing::debug!("Copying music tracks from source {}", source_id);
        let music_uris: Vec<String> = self
            .spotify
            .get_playlist_tracks(&credential.access_token, source_id)
            .await?
            .into_iter()
            .filter(|item| item.is_music())
            .map(|item| item.uri)
            .collect();

        for batch in music_uris.chunks(self.options.add_batch_size) {
            self.spotify
                .add_tracks(&credential.access_token, drive_id, batch)
                .await?;
        }

        Ok(music_uris.len())
    }
}
