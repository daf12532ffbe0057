pub mod account_store;
pub mod generator;
pub mod scheduler;
pub mod spotify;
pub mod state_store;

pub use account_store::{AccountStore, PgAccountStore};
pub use generator::{Generator, SyncOptions};
pub use scheduler::Scheduler;
pub use spotify::{SpotifyApi, SpotifyClient};
pub use state_store::ExpiringTokenStore;
