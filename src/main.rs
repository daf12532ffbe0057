mod api;
mod config;
mod error;
mod frontend;
mod models;
mod services;

use crate::api::AppState;
use crate::config::Config;
use crate::services::{
    Generator, PgAccountStore, Scheduler, SpotifyClient, SyncOptions,
};
use axum::{
    http::{header, Method},
    routing::get,
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,daily_music_drive=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Connect to database
    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("./migrations").run(&db).await?;
    tracing::info!("Database migrations completed");

    // The cover art is baked into the binary alongside the static pages.
    let cover_image = frontend::Assets::get("cover.jpg")
        .map(|file| file.data.into_owned())
        .ok_or_else(|| anyhow::anyhow!("cover.jpg missing from embedded assets"))?;

    // Initialize services
    let spotify = Arc::new(SpotifyClient::new(&config));
    let store = Arc::new(PgAccountStore::new(db.clone()));
    let generator = Arc::new(Generator::new(
        spotify.clone(),
        store.clone(),
        cover_image,
        SyncOptions::from_config(&config),
    ));

    let app_state = Arc::new(AppState::new(
        spotify.clone(),
        store.clone(),
        generator.clone(),
    ));

    // Daily trigger (plus the optional startup sync) runs beside the server.
    let scheduler = Scheduler::new(generator, store, &config);
    tokio::spawn(async move { scheduler.run().await });

    // Build router
    let app = Router::new()
        .merge(api::auth_routes())
        .merge(api::account_routes())
        .with_state(app_state)
        // Landing/success pages - catch-all route (must be last)
        .fallback(get(frontend::serve_assets))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET])
                .allow_headers([header::CONTENT_TYPE]),
        );

    // Start server
    let addr = format!("{}:{}", config.server_host, config.server_port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
