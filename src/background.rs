use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, info_span, Instrument};
use crate::state::AppState;

/// Handle to the periodic token purge. Dropping it without calling
/// [`PurgeWorker::shutdown`] also stops the loop at its next boundary.
pub struct PurgeWorker {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PurgeWorker {
    /// Signals the loop and waits until it has exited.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.handle.await {
            error!("Purge worker ended abnormally: {:?}", e);
        }
        info!("Purge worker stopped");
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

pub fn start_purge_worker(state: Arc<AppState>) -> PurgeWorker {
    let every = state.config.purge_interval;
    start_purge_worker_every(state, every)
}

pub fn start_purge_worker_every(state: Arc<AppState>, every: Duration) -> PurgeWorker {
    let (stop, mut stop_rx) = watch::channel(false);
    info!(interval_secs = every.as_secs(), "Starting token purge worker...");

    let handle = tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                changed = stop_rx.changed() => {
                    // A dropped sender counts as a stop request too.
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    run_purge_cycle(&state).instrument(info_span!("token_purge")).await;
                }
            }
        }
    });

    PurgeWorker { stop, handle }
}

/// One sweep. Failures are logged and left for the next tick.
pub async fn run_purge_cycle(state: &AppState) {
    match state.password_resets.purge(state.config.purge_retention).await {
        Ok(0) => {}
        Ok(deleted) => info!(deleted, "Purged password reset tokens"),
        Err(e) => error!("Token purge failed: {}", e),
    }
    state.rate_limiter.sweep(state.clock.now());
}
