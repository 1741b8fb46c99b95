//! Background deadline sweeps.

use chrono::Utc;
use std::{sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle, time::interval};

use super::coordinator::SessionCoordinator;

/// Spawn the table sweep (turn and reconnect deadlines) and the session
/// expiry sweep. Both stop when `shutdown` flips to `true`.
pub fn spawn_sweeps(
    coordinator: Arc<SessionCoordinator>,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let table_period = coordinator.config().table_sweep_interval();
    let session_period = coordinator.config().session_sweep_interval();

    let tables = {
        let coordinator = coordinator.clone();
        tokio::spawn(run_sweep(
            "table",
            table_period,
            shutdown.clone(),
            move || {
                let coordinator = coordinator.clone();
                async move { coordinator.sweep_tables(Utc::now()).await }
            },
        ))
    };
    let sessions = tokio::spawn(run_sweep(
        "session",
        session_period,
        shutdown,
        move || {
            let coordinator = coordinator.clone();
            async move { coordinator.sweep_sessions(Utc::now()).await }
        },
    ));

    vec![tables, sessions]
}

async fn run_sweep<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut sweep: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = usize>,
{
    log::info!("{name} sweep running every {period:?}");
    let mut ticker = interval(period);

    loop {
        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }

            _ = ticker.tick() => {
                let changed = sweep().await;
                if changed > 0 {
                    log::debug!("{name} sweep acted on {changed} items");
                }
            }
        }
    }

    log::info!("{name} sweep stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::table::ArenaConfig;

    #[tokio::test]
    async fn test_sweeps_stop_on_shutdown() {
        let store = Arc::new(MemoryStore::new());
        let config = ArenaConfig {
            table_sweep_interval_ms: 10,
            session_sweep_interval_secs: 1,
            ..ArenaConfig::default()
        };
        let coordinator = Arc::new(SessionCoordinator::new(store, config));
        let (tx, rx) = watch::channel(false);

        let handles = spawn_sweeps(coordinator, rx);
        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();

        for handle in handles {
            tokio::time::timeout(Duration::from_secs(1), handle)
                .await
                .unwrap()
                .unwrap();
        }
    }
}
