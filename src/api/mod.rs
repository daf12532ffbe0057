use crate::services::{AccountStore, ExpiringTokenStore, Generator, SpotifyApi};
use std::sync::Arc;
use std::time::Duration;

pub mod account;
pub mod auth;

pub use account::account_routes;
pub use auth::auth_routes;

/// Pending OAuth states and account-removal tokens both expire after ten
/// minutes.
const TOKEN_TTL: Duration = Duration::from_secs(10 * 60);

pub struct AppState {
    pub spotify: Arc<dyn SpotifyApi>,
    pub store: Arc<dyn AccountStore>,
    pub generator: Arc<Generator>,
    pub login_states: ExpiringTokenStore,
    pub removal_tokens: ExpiringTokenStore,
}

impl AppState {
    pub fn new(
        spotify: Arc<dyn SpotifyApi>,
        store: Arc<dyn AccountStore>,
        generator: Arc<Generator>,
    ) -> Self {
        Self {
            spotify,
            store,
            generator,
            login_states: ExpiringTokenStore::new(TOKEN_TTL),
            removal_tokens: ExpiringTokenStore::new(TOKEN_TTL),
        }
    }
}
