use std::sync::Arc;

use axum::Router;
use envconfig::Envconfig;
use eyre::Result;

use crm_common::notify::{HttpNotifier, LogNotifier, Notifier};
use crm_common::store::{MemoryStore, PgStore, Store};
use crm_common::time::SystemClock;
use lead_intake::config::Config;
use lead_intake::router::{router, AppState};

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

    let notifier: Arc<dyn Notifier> = if config.notification_endpoint.is_empty() {
        Arc::new(LogNotifier)
    } else {
        Arc::new(HttpNotifier::new(config.notification_endpoint.clone()))
    };

    let state = AppState {
        store,
        notifier,
        clock: Arc::new(SystemClock),
        recipients: config.recipients(),
    };

    let app = router(state, config.export_prometheus);

    tracing::info!("listening on {}", config.bind());
    match listen(app, config.bind()).await {
        Ok(_) => {}
        Err(e) => tracing::error!("failed to start lead-intake http server, {}", e),
    }
}
