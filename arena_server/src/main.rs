//! Heads-up hold'em arena server.
//!
//! Hosts one session coordinator for the process lifetime: loads
//! configuration, connects the store, seeds the configured room and runs
//! the deadline sweeps until Ctrl+C.

mod config;
mod logging;
mod metrics;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Error};
use holdem_arena::{
    SessionCoordinator,
    db::{ArenaStore, Database, MemoryStore, RoomRepository},
    spawn_sweeps,
};
use log::{info, warn};
use pico_args::Arguments;
use tokio::sync::watch;

use config::{CliOverrides, ServerConfig};

const HELP: &str = "\
Run the heads-up hold'em arena

USAGE:
  arena_server [OPTIONS]

OPTIONS:
  --db-url     URL         Database connection string  [default: env DATABASE_URL]
  --metrics    IP:PORT     Prometheus scrape address   [default: env METRICS_BIND, disabled if unset]

FLAGS:
  --in-memory              Keep all state in process memory
  --apply-schema           Create the database schema on startup
  -h, --help               Print help information

ENVIRONMENT:
  DATABASE_URL             PostgreSQL connection string
  ACTION_TIMEOUT_SECS      Seconds per turn (default 30)
  RECONNECT_GRACE_SECS     Seconds to reconnect after a disconnect (default 30)
  ROOM_ID, ROOM_SMALL_BLIND, ROOM_BIG_BLIND, ROOM_MIN_BUYIN
                           Room seeded on startup
  RUST_LOG                 Log filter (default info,sqlx=warn)
  (See .env file for all configuration options)
";

/// How often process gauges are refreshed
const GAUGE_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let overrides = CliOverrides {
        database_url: pargs.opt_value_from_str("--db-url")?,
        metrics_bind: pargs.opt_value_from_str("--metrics")?,
        in_memory: pargs.contains("--in-memory"),
        apply_schema: pargs.contains("--apply-schema"),
    };

    logging::init();

    let config = ServerConfig::from_env(overrides)?;
    config.validate()?;

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(Error::msg)?;
        info!("Prometheus metrics at http://{addr}/metrics");
    }

    let (store, database): (Arc<dyn ArenaStore>, Option<Database>) = if config.in_memory {
        info!("Using in-memory store");
        let store: Arc<dyn ArenaStore> = Arc::new(MemoryStore::new());
        (store, None)
    } else {
        info!("Connecting to database");
        let db = Database::new(&config.database)
            .await
            .context("Failed to connect to database")?;
        if config.apply_schema {
            db.apply_schema().await.context("Failed to apply schema")?;
            info!("Database schema applied");
        }
        let store: Arc<dyn ArenaStore> = Arc::new(db.store());
        (store, Some(db))
    };

    store
        .upsert_room(&config.room)
        .await
        .context("Failed to seed room")?;
    info!(
        "Room '{}' ready: blinds {}/{}, minimum buy-in {}",
        config.room.id, config.room.small_blind, config.room.big_blind, config.room.min_buyin
    );

    let coordinator = Arc::new(SessionCoordinator::new(store, config.arena.clone()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = spawn_sweeps(coordinator.clone(), shutdown_rx.clone());
    tasks.push(tokio::spawn(refresh_gauges(coordinator.clone(), shutdown_rx)));

    info!("Arena is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    info!("Shutting down arena...");
    let _ = shutdown_tx.send(true);
    for task in tasks {
        if let Err(e) = task.await {
            warn!("Background task ended abnormally: {e}");
        }
    }
    coordinator.shutdown();
    if let Some(db) = database {
        db.close().await;
    }

    Ok(())
}

async fn refresh_gauges(coordinator: Arc<SessionCoordinator>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(GAUGE_INTERVAL);
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => metrics::live_tables(coordinator.live_tables()),
        }
    }
}
