//! Example consumer: serves the models in `models.json` through restgen.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Without DATABASE_URL the records live in memory.

use restgen::{
    create_router, load_from_path, ControllerOptions, HandlerOptions, MemoryStore, PgStore, RecordStore, RouterEntry,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("restgen=info,example_consumer=info")),
        )
        .init();

    let models_path = std::env::var("MODELS_PATH").unwrap_or_else(|_| "example_consumer/models.json".into());
    let schema = load_from_path(&models_path).await?;

    let store: Arc<dyn RecordStore> = match std::env::var("DATABASE_URL") {
        Ok(url) => Arc::new(PgStore::connect(&url, schema).await?),
        Err(_) => {
            tracing::info!("DATABASE_URL not set, using in-memory store");
            Arc::new(MemoryStore::new(schema))
        }
    };

    let app = create_router(
        store,
        [
            RouterEntry::with_options(
                "author",
                ControllerOptions::new().create_children(true).relationships(["posts"]),
            ),
            RouterEntry::with_options(
                "post",
                ControllerOptions::new()
                    .relationships(["author"])
                    .handlers(HandlerOptions::default().delete(false)),
            ),
        ],
        ControllerOptions::new().limit(100),
    )?;

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".into());
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("Example consumer listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
