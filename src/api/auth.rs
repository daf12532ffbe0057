use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::models::Credential;
use crate::services::state_store::random_token;
use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Router,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;

pub fn auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", get(login))
        .route("/callback", get(callback))
}

async fn login(State(state): State<Arc<AppState>>) -> Redirect {
    let oauth_state = random_token(6);
    state.login_states.insert(oauth_state.clone()).await;
    Redirect::to(&state.spotify.authorize_url(&oauth_state))
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: String,
    state: String,
}

async fn callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
) -> Result<Redirect> {
    // Single-use: a replayed or forged state is rejected here.
    if !state.login_states.consume(&query.state).await {
        return Err(AppError::Validation("Invalid login state".to_string()));
    }

    let grant = state.spotify.exchange_code(&query.code).await?;
    let credential = Credential {
        access_token: grant.access_token,
        refresh_token: grant.refresh_token.ok_or_else(|| {
            AppError::RemoteApi("Token grant is missing a refresh token".to_string())
        })?,
        expires_at: Utc::now() + Duration::seconds(grant.expires_in),
    };

    let spotify_id = state.spotify.current_user_id(&credential.access_token).await?;

    let user = match state.store.find_by_remote_id(&spotify_id).await? {
        Some(existing) => {
            tracing::info!("Spotify id {} logged in as user {}", spotify_id, existing.id);
            state.store.update_credential(existing.id, &credential).await?;
            existing
        }
        None => {
            let user = state.store.create(&spotify_id, &credential).await?;
            tracing::info!("Spotify id {} registered as user {}", spotify_id, user.id);

            // First drive generation for a new account. Tracked so its
            // outcome is observed and logged, never silently dropped.
            let generator = state.generator.clone();
            let new_user = user.clone();
            tokio::spawn(async move {
                if let Err(e) = generator.sync_user(&new_user).await {
                    tracing::error!("Initial sync failed for user {}: {}", new_user.id, e);
                }
            });

            user
        }
    };

    let removal_token = format!("{}-{}", user.id, random_token(128));
    state.removal_tokens.insert(removal_token.clone()).await;

    Ok(Redirect::to(&format!("/success.html?token={}", removal_token)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use crate::services::account_store::MockAccountStore;
    use crate::services::generator::SyncOptions;
    use crate::services::spotify::{MockSpotifyApi, TokenGrant};
    use crate::services::Generator;
    use axum::http::header::LOCATION;
    use axum::response::IntoResponse;

    fn token_grant() -> TokenGrant {
        TokenGrant {
            access_token: "granted-access".to_string(),
            refresh_token: Some("granted-refresh".to_string()),
            expires_in: 3600,
        }
    }

    fn registered_user(id: i64) -> User {
        User {
            id,
            spotify_id: "remote-1".to_string(),
            access_token: "granted-access".to_string(),
            refresh_token: "granted-refresh".to_string(),
            token_expires_on: Utc::now() + Duration::seconds(3600),
            drive_playlist_id: None,
            created_at: Utc::now(),
        }
    }

    fn app_state(spotify: MockSpotifyApi, store: MockAccountStore) -> Arc<AppState> {
        let spotify = Arc::new(spotify);
        let store = Arc::new(store);
        let generator = Arc::new(Generator::new(
            spotify.clone(),
            store.clone(),
            vec![],
            SyncOptions::default(),
        ));
        Arc::new(AppState::new(spotify, store, generator))
    }

    #[tokio::test]
    async fn test_callback_rejects_unknown_state() {
        let state = app_state(MockSpotifyApi::new(), MockAccountStore::new());

        let err = callback(
            State(state),
            Query(CallbackQuery {
                code: "code".to_string(),
                state: "never-issued".to_string(),
            }),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_callback_registers_new_account() {
        let mut spotify = MockSpotifyApi::new();
        let mut store = MockAccountStore::new();

        spotify
            .expect_exchange_code()
            .times(1)
            .returning(|_| Ok(token_grant()));
        spotify
            .expect_current_user_id()
            .times(1)
            .returning(|_| Ok("remote-1".to_string()));
        store
            .expect_find_by_remote_id()
            .times(1)
            .returning(|_| Ok(None));
        store
            .expect_create()
            .withf(|remote_id, credential| {
                remote_id == "remote-1" && credential.refresh_token == "granted-refresh"
            })
            .times(1)
            .returning(|_, _| Ok(registered_user(7)));
        // The spawned initial sync may or may not get scheduled before the
        // test ends; when it does, it stops at the provisioning step.
        spotify
            .expect_create_playlist()
            .times(0..=1)
            .returning(|_, _, _, _| Err(AppError::RemoteApi("down".to_string())));

        let state = app_state(spotify, store);
        state.login_states.insert("abc123".to_string()).await;

        let redirect = callback(
            State(state.clone()),
            Query(CallbackQuery {
                code: "code".to_string(),
                state: "abc123".to_string(),
            }),
        )
        .await
        .unwrap();

        let response = redirect.into_response();
        let location = response.headers()[LOCATION].to_str().unwrap().to_string();
        assert!(location.starts_with("/success.html?token=7-"));

        // The removal token named in the redirect is live in the store.
        let token = location.trim_start_matches("/success.html?token=");
        assert!(state.removal_tokens.consume(token).await);
    }

    #[tokio::test]
    async fn test_callback_updates_credential_of_existing_account() {
        let mut spotify = MockSpotifyApi::new();
        let mut store = MockAccountStore::new();

        spotify
            .expect_exchange_code()
            .times(1)
            .returning(|_| Ok(token_grant()));
        spotify
            .expect_current_user_id()
            .times(1)
            .returning(|_| Ok("remote-1".to_string()));
        store
            .expect_find_by_remote_id()
            .times(1)
            .returning(|_| Ok(Some(registered_user(7))));
        store
            .expect_update_credential()
            .withf(|user_id, credential| {
                *user_id == 7 && credential.access_token == "granted-access"
            })
            .times(1)
            .returning(|_, _| Ok(()));
        store.expect_create().times(0);

        let state = app_state(spotify, store);
        state.login_states.insert("abc123".to_string()).await;

        callback(
            State(state),
            Query(CallbackQuery {
                code: "code".to_string(),
                state: "abc123".to_string(),
            }),
        )
        .await
        .unwrap();
    }
}
