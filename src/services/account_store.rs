use crate::error::Result;
use crate::models::{Credential, User};
use sqlx::PgPool;

/// Port trait over the user record store. The sync core reads users and
/// updates their credential and drive-playlist columns; the HTTP glue also
/// creates and deletes rows during registration and account removal.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AccountStore: Send + Sync {
    async fn find(&self, user_id: i64) -> Result<Option<User>>;

    async fn find_by_remote_id(&self, remote_id: &str) -> Result<Option<User>>;

    /// Register a new account with its initial credential.
    async fn create(&self, remote_id: &str, credential: &Credential) -> Result<User>;

    async fn update_credential(&self, user_id: i64, credential: &Credential) -> Result<()>;

    /// Record the provisioned drive playlist id. Written once per account.
    async fn update_target_playlist(&self, user_id: i64, playlist_id: &str) -> Result<()>;

    async fn list_all(&self) -> Result<Vec<User>>;

    async fn delete(&self, user_id: i64) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct PgAccountStore {
    db: PgPool,
}

impl PgAccountStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl AccountStore for PgAccountStore {
    async fn find(&self, user_id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_remote_id(&self, remote_id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE spotify_id = $1")
            .bind(remote_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn create(&self, remote_id: &str, credential: &Credential) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (spotify_id, access_token, refresh_token, token_expires_on)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(remote_id)
        .bind(&credential.access_token)
        .bind(&credential.refresh_token)
        .bind(credential.expires_at)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn update_credential(&self, user_id: i64, credential: &Credential) -> Result<()> {
        sqlx::query(
            "UPDATE users SET access_token = $2, refresh_token = $3, token_expires_on = $4
             WHERE id = $1",
        )
        .bind(user_id)
        .bind(&credential.access_token)
        .bind(&credential.refresh_token)
        .bind(credential.expires_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn update_target_playlist(&self, user_id: i64, playlist_id: &str) -> Result<()> {
        sqlx::query("UPDATE users SET drive_playlist_id = $2 WHERE id = $1")
            .bind(user_id)
            .bind(playlist_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id")
            .fetch_all(&self.db)
            .await?;
        Ok(users)
    }

    async fn delete(&self, user_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
