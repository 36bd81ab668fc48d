//! Background ticker orchestration (§4.7 "State machine"): two
//! `tokio::spawn`ed tasks, a graceful-shutdown channel apiece, matching the
//! teacher's `spawn_worker`/`WorkerConfig` pairing in shape.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::app::monitor::run_cycle;
use crate::app::state::AppState;

#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    pub enabled: bool,
    pub poll_interval_secs: u64,
    pub tally_sweep_interval_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: 15,
            tally_sweep_interval_secs: 300,
        }
    }
}

impl WorkerConfig {
    #[must_use]
    pub fn from_state(state: &AppState) -> Self {
        Self {
            enabled: true,
            poll_interval_secs: state.config.poll_interval_secs,
            tally_sweep_interval_secs: state.config.tally_sweep_interval_secs,
        }
    }
}

/// Spawns the main cycle ticker and the tally-sweep ticker (§4.7 `Start`),
/// returning join handles and a shutdown sender for `Stop`.
pub fn spawn_worker(
    state: Arc<AppState>,
    config: WorkerConfig,
) -> (Vec<JoinHandle<()>>, watch::Sender<bool>) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    if !config.enabled {
        return (Vec::new(), shutdown_tx);
    }

    let cycle_handle = {
        let state = Arc::clone(&state);
        let mut shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(config.poll_interval_secs));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        run_cycle(&state).await;
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("monitor cycle ticker stopping");
                            break;
                        }
                    }
                }
            }
        })
    };

    let sweep_handle = {
        let state = Arc::clone(&state);
        let mut shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(config.tally_sweep_interval_secs));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        state.tally.sweep();
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("tally sweep ticker stopping");
                            break;
                        }
                    }
                }
            }
        })
    };

    (vec![cycle_handle, sweep_handle], shutdown_tx)
}
