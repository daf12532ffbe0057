use crate::api::AppState;
use crate::error::{AppError, Result};
use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

pub fn account_routes() -> Router<Arc<AppState>> {
    Router::new().route("/remove-account", get(remove_account))
}

#[derive(Debug, Deserialize)]
struct RemoveAccountQuery {
    token: String,
}

/// Delete the account named by a removal token issued at login. Tokens are
/// single-use and expire after ten minutes.
async fn remove_account(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RemoveAccountQuery>,
) -> Result<Redirect> {
    if !state.removal_tokens.consume(&query.token).await {
        return Err(AppError::Validation(
            "Invalid or expired account removal token. Please try again, right after logging in."
                .to_string(),
        ));
    }

    // Token format: "{user_id}-{random}".
    let user_id: i64 = query
        .token
        .split('-')
        .next()
        .and_then(|prefix| prefix.parse().ok())
        .ok_or_else(|| AppError::Validation("Malformed removal token".to_string()))?;

    state.store.delete(user_id).await?;
    tracing::info!("Removed account {}", user_id);

    Ok(Redirect::to("/?notice=removed"))
}
