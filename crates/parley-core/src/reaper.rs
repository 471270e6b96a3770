//! Inactivity reaper: a periodic background task that marks idle sessions
//! offline.
//!
//! Each tick performs one [`SessionRegistry::mark_idle_offline`] sweep, so
//! the whole pass over the session map is a single critical section. The
//! task waits on a ticker between sweeps and carries a stop signal so tests
//! (and shutdown) can end it cleanly; in normal operation it runs for the
//! lifetime of the process.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::registry::SessionRegistry;

/// How long a session may go without activity before a sweep demotes it.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// How often the reaper sweeps the registry.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Handle to a running reaper task.
pub struct ReaperHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// Signal the reaper to stop and wait for the task to finish.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        let _ = self.task.await;
    }
}

/// Spawn the reaper task. Sessions idle for longer than `idle_after` are
/// marked offline on each sweep; records themselves are never removed.
pub fn spawn_reaper(
    registry: SessionRegistry,
    idle_after: Duration,
    sweep_every: Duration,
) -> ReaperHandle {
    let (stop, mut stopped) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_every);
        // The first tick fires immediately; that sweep is a harmless no-op
        // on a fresh registry.
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let demoted = registry.mark_idle_offline(idle_after).await;
                    if demoted > 0 {
                        debug!(demoted, "Marked idle sessions offline");
                    }
                }
                _ = stopped.changed() => {
                    info!("Reaper stopping");
                    break;
                }
            }
        }
    });

    ReaperHandle { stop, task }
}
