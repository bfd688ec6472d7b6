use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use config::Config;
use envconfig::Envconfig;
use eyre::Result;
use futures::future::{select, Either};
use sweep::Sweeper;
use tokio::sync::Semaphore;

use crm_common::store::{MemoryStore, PgStore, Store};
use crm_common::time::SystemClock;

mod config;
mod handlers;
mod sweep;

async fn listen(app: Router, bind: String) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;

    axum::serve(listener, app).await?;

    Ok(())
}

async fn sweep_loop(sweeper: Arc<Sweeper>, interval_secs: u64) {
    let semaphore = Semaphore::new(1);
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        let _permit = semaphore.acquire().await;
        interval.tick().await;
        if let Err(e) = sweeper.sweep().await {
            // the next tick retries the whole sweep, nothing to resume
            tracing::error!("scheduled sweep failed: {}", e);
        }
        drop(_permit);
    }
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

    let sweeper = Arc::new(Sweeper::new(
        store,
        Arc::new(SystemClock),
        chrono::Duration::seconds(config.lock_duration_secs as i64),
    ));

    let sweep_loop = Box::pin(sweep_loop(sweeper.clone(), config.sweep_interval_secs));

    let recorder_handle = crm_common::metrics::setup_metrics_recorder();
    let app = handlers::app(sweeper, Some(recorder_handle));
    let http_server = Box::pin(listen(app, config.bind()));

    match select(http_server, sweep_loop).await {
        Either::Left((listen_result, _)) => match listen_result {
            Ok(_) => {}
            Err(e) => tracing::error!("failed to start lead-reconciler http server, {}", e),
        },
        Either::Right((_, _)) => {
            tracing::error!("lead-reconciler sweep task exited")
        }
    };
}
