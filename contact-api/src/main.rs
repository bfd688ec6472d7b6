use std::sync::Arc;

use axum::Router;
use envconfig::Envconfig;
use eyre::Result;

use contact_api::auth::{HttpTokenValidator, StaticTokenValidator, TokenValidator};
use contact_api::config::Config;
use contact_api::handlers::{app, AppState};
use crm_common::metrics::setup_metrics_routes;
use crm_common::store::{MemoryStore, PgStore, Store};

async fn listen(app: Router, bind: String) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;

    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::init_from_env().expect("failed to load configuration from env");

    let store: Arc<dyn Store> = if config.memory_store {
        tracing::warn!("using in-memory store, nothing will be persisted");
        Arc::new(MemoryStore::new())
    } else {
        let store = PgStore::new(&config.database_url, config.max_pg_connections)
            .expect("failed to create store");
        store
            .run_migrations()
            .await
            .expect("failed to run migrations");
        Arc::new(store)
    };

    let validator: Arc<dyn TokenValidator> = if config.identity_provider_url.is_empty() {
        tracing::warn!("no identity provider configured, using the static API token");
        Arc::new(StaticTokenValidator::new(config.api_token.clone()))
    } else {
        Arc::new(HttpTokenValidator::new(config.identity_provider_url.clone()))
    };

    let app = app(AppState { store, validator });
    let app = setup_metrics_routes(app);

    tracing::info!("listening on {}", config.bind());
    match listen(app, config.bind()).await {
        Ok(_) => {}
        Err(e) => tracing::error!("failed to start contact-api http server, {}", e),
    }
}
