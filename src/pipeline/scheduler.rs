//! Scheduler - fires a regeneration cycle at startup and then on every
//! interval boundary. A trigger that lands while a cycle is still running is
//! dropped, so cycles never overlap.

use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info, warn};

use super::CycleController;

/// What the scheduler did before it was stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub triggered: usize,
    pub dropped: usize,
}

pub struct Scheduler {
    controller: Arc<CycleController>,
    period: Duration,
}

impl Scheduler {
    pub fn new(controller: Arc<CycleController>, period: Duration) -> Self {
        Self { controller, period }
    }

    /// Tick until `shutdown` resolves, then stop the in-flight cycle at its
    /// next record boundary and wait for it.
    ///
    /// The first cycle uses the cache as loaded by bootstrap; later ones
    /// reload it from the store when `reload_each_cycle` is set.
    pub async fn run_until<F>(self, shutdown: F) -> SchedulerStats
    where
        F: Future<Output = ()>,
    {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut stats = SchedulerStats::default();
        let mut in_flight: Option<JoinHandle<()>> = None;
        tokio::pin!(shutdown);

        info!("Scheduler started, regenerating every {:?}", self.period);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping scheduler");
                    break;
                }
                _ = ticker.tick() => {
                    let Some(guard) = self.controller.try_acquire() else {
                        stats.dropped += 1;
                        warn!("Previous regeneration cycle still running, dropping scheduled trigger");
                        continue;
                    };

                    let reload = stats.triggered > 0 && self.controller.options().reload_each_cycle;
                    stats.triggered += 1;

                    let controller = self.controller.clone();
                    in_flight = Some(tokio::spawn(async move {
                        if let Err(e) = controller.run_guarded(guard, reload).await {
                            error!("Regeneration cycle aborted, will retry at next trigger: {}", e);
                        }
                    }));
                }
            }
        }

        self.controller.request_stop();
        if let Some(handle) = in_flight {
            if !handle.is_finished() {
                info!("Waiting for in-flight regeneration cycle to reach a record boundary");
            }
            if let Err(e) = handle.await {
                error!("Regeneration cycle task failed: {}", e);
            }
        }

        info!("Scheduler stopped after {} cycles ({} triggers dropped)", stats.triggered, stats.dropped);
        stats
    }
}
