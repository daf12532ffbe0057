use rand::Rng;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Process-scoped store for short-lived single-use tokens: pending OAuth
/// states and account-removal tokens. Entries are inserted when issued and
/// leave the store on first use or when their TTL lapses; expired entries
/// are purged whenever the store is touched.
pub struct ExpiringTokenStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, Instant>>,
}

impl ExpiringTokenStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn insert(&self, token: String) {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        entries.retain(|_, issued_at| now.duration_since(*issued_at) < self.ttl);
        entries.insert(token, now);
    }

    /// Take a token out of the store. Returns true only if it was present
    /// and still within its TTL; a token can be consumed at most once.
    pub async fn consume(&self, token: &str) -> bool {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        entries.retain(|_, issued_at| now.duration_since(*issued_at) < self.ttl);
        entries.remove(token).is_some()
    }
}

/// Random alphanumeric token of the given length, used for OAuth states and
/// account-removal tokens.
pub fn random_token(length: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}
