//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the collaborator REST API on its own, backed by an empty in-memory collaborator.
//!
//! ## Intended use
//! Useful for development and for pointing the `amend` CLI at a throwaway server. The
//! workspace's main `amend-run` binary serves the same API with a seeded demo directory.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use amend_core::MemoryCollaborator;
use api_rest::{cors_from_env_value, router, AppState};

/// Main entry point for the amendment discussion REST API server
///
/// # Environment Variables
/// - `AMEND_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `CORS_ORIGINS`: Comma-separated allowed origins, `*` for any (default: "http://localhost:3000")
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - `CORS_ORIGINS` contains an invalid origin,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("AMEND_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let cors = cors_from_env_value(std::env::var("CORS_ORIGINS").ok())?;

    tracing::info!("-- Starting amendment discussion REST API on {}", addr);

    let app = router(AppState::new(Arc::new(MemoryCollaborator::new()))).layer(cors);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
