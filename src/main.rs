use std::sync::Arc;

use fleet_trips::config::AppConfig;
use fleet_trips::db::{self, PgTripStore, TripStore};
use fleet_trips::kafka;
use fleet_trips::processor::dispatcher::Dispatcher;
use fleet_trips::processor::trip_engine::TripEngine;
use fleet_trips::processor::trip_queries::TripQueries;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = AppConfig::load()?;

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    info!("Starting Fleet Trips Service...");

    // Init DB
    let pool = db::init_pool(&config.database_url, config.db_max_connections).await?;
    info!("Connected to database");

    let store: Arc<dyn TripStore> = Arc::new(PgTripStore::new(pool));
    // Startup visibility check: trips still open from before this process started.
    let active = TripQueries::new(store.clone()).active_trips_for_all().await?;
    info!("Resuming with {} active trips", active.len());

    let engine = Arc::new(TripEngine::new(store));
    let dispatcher = Dispatcher::spawn(engine, config.trip_workers, config.trip_queue_capacity);

    let result = tokio::select! {
        result = kafka::start_kafka_consumer(&config, &dispatcher) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
            Ok(())
        }
    };

    info!("Draining trip workers...");
    dispatcher.shutdown().await;

    if let Err(e) = &result {
        error!("Consumer stopped: {}", e);
    }
    result
}
