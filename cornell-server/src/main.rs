//! Cornell notes REST API server.
//!
//! # Environment Variables
//! - `CORNELL_ADDR`: listen address (default: "0.0.0.0:3001")
//! - `CORNELL_NOTES_FILE`: JSON file holding the notes (default: "notes.json")
//!
//! A `.env` file in the working directory is read first.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cornell_core::{JsonFileStore, NoteStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cornell_server=info".parse()?)
                .add_directive("cornell_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("CORNELL_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());
    let notes_file = std::env::var("CORNELL_NOTES_FILE").unwrap_or_else(|_| "notes.json".into());

    tracing::info!("-- Starting Cornell notes API on {} (notes in {})", addr, notes_file);

    let store: Arc<dyn NoteStore> = Arc::new(JsonFileStore::new(notes_file));
    let app = cornell_server::router(store);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
