use crate::config::Config;
use crate::services::{AccountStore, Generator};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Triggers full syncs: once at process start when configured, then daily at
/// a fixed UTC hour. Each user's sync runs as its own tracked task through a
/// bounded pool so one slow or failing user never stalls or aborts the rest.
pub struct Scheduler {
    generator: Arc<Generator>,
    store: Arc<dyn AccountStore>,
    sync_hour_utc: u32,
    sync_on_start: bool,
    max_concurrent: usize,
}

impl Scheduler {
    pub fn new(generator: Arc<Generator>, store: Arc<dyn AccountStore>, config: &Config) -> Self {
        Self {
            generator,
            store,
            sync_hour_utc: config.sync_hour_utc,
            sync_on_start: config.sync_on_start,
            max_concurrent: config.max_concurrent_syncs,
        }
    }

    pub async fn run(&self) {
        tracing::info!("Daily sync scheduled for {:02}:00 UTC", self.sync_hour_utc);

        if self.sync_on_start {
            self.sync_all().await;
        }

        loop {
            let delay = self.next_run_delay(Utc::now());
            tracing::debug!("Next full sync in {}s", delay.as_secs());
            tokio::time::sleep(delay).await;
            self.sync_all().await;
        }
    }

    /// Generate the Daily Music Drive for every registered user. Failures
    /// are logged per user and never propagate to siblings or the timer.
    pub async fn sync_all(&self) {
        let users = match self.store.list_all().await {
            Ok(users) => users,
            Err(e) => {
                tracing::error!("Failed to list users for full sync: {}", e);
                return;
            }
        };

        tracing::info!("Generating Daily Music Drives for {} users", users.len());
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));

        let tasks: Vec<_> = users
            .into_iter()
            .map(|user| {
                let generator = self.generator.clone();
                let semaphore = semaphore.clone();
                tokio::spawn(async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return;
                    };
                    if let Err(e) = generator.sync_user(&user).await {
                        tracing::error!("Sync failed for user {}: {}", user.id, e);
                    }
                })
            })
            .collect();

        for task in futures::future::join_all(tasks).await {
            if let Err(e) = task {
                tracing::error!("Sync task panicked: {}", e);
            }
        }

        tracing::info!("Full sync finished");
    }

    fn next_run_delay(&self, now: DateTime<Utc>) -> std::time::Duration {
        let Some(todays_run) = now
            .date_naive()
            .and_hms_opt(self.sync_hour_utc, 0, 0)
            .map(|t| t.and_utc())
        else {
            return std::time::Duration::from_secs(24 * 60 * 60);
        };

        let next = if todays_run > now {
            todays_run
        } else {
            todays_run + Duration::days(1)
        };

        (next - now).to_std().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{ItemKind, PlaylistItem, PlaylistOwner, PlaylistSummary, User};
    use crate::services::account_store::MockAccountStore;
    use crate::services::generator::SyncOptions;
    use crate::services::spotify::MockSpotifyApi;

    fn scheduler_with(
        spotify: MockSpotifyApi,
        store: MockAccountStore,
        hour: u32,
    ) -> Scheduler {
        let store = Arc::new(store);
        let generator = Arc::new(Generator::new(
            Arc::new(spotify),
            store.clone(),
            vec![],
            SyncOptions::default(),
        ));
        Scheduler {
            generator,
            store,
            sync_hour_utc: hour,
            sync_on_start: false,
            max_concurrent: 1,
        }
    }

    fn user(id: i64, access_token: &str, expires_at: DateTime<Utc>) -> User {
        User {
            id,
            spotify_id: format!("spotify-user-{}", id),
            access_token: access_token.to_string(),
            refresh_token: format!("refresh-{}", id),
            token_expires_on: expires_at,
            drive_playlist_id: Some(format!("drive-{}", id)),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_next_run_delay_before_and_after_the_boundary() {
        let scheduler = scheduler_with(MockSpotifyApi::new(), MockAccountStore::new(), 3);

        let before = "2024-05-01T01:00:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(scheduler.next_run_delay(before).as_secs(), 2 * 60 * 60);

        let after = "2024-05-01T04:00:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(scheduler.next_run_delay(after).as_secs(), 23 * 60 * 60);
    }

    /// One user's failed sync does not abort the other users' runs.
    #[tokio::test]
    async fn test_sync_all_isolates_per_user_failures() {
        let mut spotify = MockSpotifyApi::new();
        let mut store = MockAccountStore::new();

        let failing = user(1, "token-1", Utc::now() - Duration::hours(1));
        let healthy = user(2, "token-2", Utc::now() + Duration::hours(1));
        store
            .expect_list_all()
            .times(1)
            .returning(move || Ok(vec![failing.clone(), healthy.clone()]));

        // User 1 dies at the refresh step and must make no further calls.
        spotify
            .expect_refresh_credential()
            .withf(|token| token == "refresh-1")
            .times(1)
            .returning(|_| Err(AppError::AuthRefresh("invalid_grant".to_string())));

        // User 2 still completes a full replacement.
        spotify
            .expect_search_playlists()
            .withf(|token, _| token == "token-2")
            .times(1)
            .returning(|_, _| {
                Ok(vec![PlaylistSummary {
                    id: "source".to_string(),
                    name: "Daily Drive".to_string(),
                    owner: PlaylistOwner {
                        id: "spotify".to_string(),
                    },
                }])
            });
        spotify
            .expect_get_playlist_tracks()
            .withf(|_, playlist_id| playlist_id == "drive-2")
            .times(1)
            .returning(|_, _| Ok(vec![]));
        spotify
            .expect_get_playlist_tracks()
            .withf(|_, playlist_id| playlist_id == "source")
            .times(1)
            .returning(|_, _| {
                Ok(vec![PlaylistItem {
                    uri: "spotify:track:1".to_string(),
                    kind: ItemKind::Track,
                }])
            });
        spotify
            .expect_add_tracks()
            .withf(|_, playlist_id, uris| playlist_id == "drive-2" && uris.len() == 1)
            .times(1)
            .returning(|_, _, _| Ok(()));

        scheduler_with(spotify, store, 3).sync_all().await;
    }
}
