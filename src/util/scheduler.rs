//! Repeating background tasks bound to a fixed cadence

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Sender half used to stop every task spawned with [`RepeatingTask::spawn`].
pub type ShutdownTx = watch::Sender<bool>;
/// Receiver half handed to each repeating task.
pub type ShutdownRx = watch::Receiver<bool>;

/// Create a shutdown channel in the "running" state.
pub fn shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    watch::channel(false)
}

/// A job run once per period by a single task.
///
/// The job runs inline on the task, so a run never overlaps the previous one.
/// If a run overruns its period the missed periods are skipped rather than
/// replayed back to back.
pub struct RepeatingTask;

impl RepeatingTask {
    pub fn spawn<F>(
        name: &'static str,
        period: Duration,
        mut shutdown: ShutdownRx,
        mut job: F,
    ) -> JoinHandle<u64>
    where
        F: FnMut() + Send + 'static,
    {
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut runs = 0u64;

            info!(task = name, period_ms = period.as_millis() as u64, "Repeating task started");

            loop {
                if *shutdown.borrow() {
                    break;
                }

                tokio::select! {
                    _ = ticker.tick() => {
                        job();
                        runs += 1;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            debug!(task = name, "Shutdown sender dropped");
                            break;
                        }
                    }
                }
            }

            info!(task = name, runs, "Repeating task stopped");
            runs
        })
    }
}
