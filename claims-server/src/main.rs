//! claims-server - claims listing, detail, review flags, notes and dashboard.
//!
//! Configuration is read from the environment (see `config`). A `.env` file
//! in the working directory is loaded first when present.

use std::sync::Arc;

use claims_core::{ClaimStore, MemoryStore, PgClaimStore};
use claims_server::config::ServerConfig;
use claims_server::middleware::jwt::JwtConfig;
use claims_server::router::build_router;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "claims_server=debug,claims_core=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting claims server");

    let config = ServerConfig::from_env();

    let store: Arc<dyn ClaimStore> = match &config.database {
        Some(db_config) => {
            let store = PgClaimStore::connect(db_config).await?;
            if config.run_migrations {
                store.migrate().await?;
            }
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let jwt_config =
        JwtConfig::from_secret(config.jwt_secret.as_bytes()).with_login_url(&config.login_url);
    let app = build_router(store, jwt_config);

    let listener = TcpListener::bind(&config.bind_addr).await.map_err(|e| {
        tracing::error!("Failed to bind to {}: {}", config.bind_addr, e);
        e
    })?;
    tracing::info!("claims-server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
