use crate::oracle::WorldOracle;
use crate::positional::PositionalMixer;
use crate::registry::SessionRegistry;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

/// Drives the periodic mixing cycle.
///
/// Each tick dispatches one independent mixing unit per active listener,
/// waits on the barrier until every unit has reported, then trims one
/// frame from every non-empty ingestion buffer. Listeners are mixed from
/// read-only views of the speaker buffers and write only their own output
/// buffer, so the units never contend with each other.
pub struct TickScheduler {
    registry: Arc<SessionRegistry>,
    oracle: Arc<dyn WorldOracle>,
    period: Duration,
}

impl TickScheduler {
    pub fn new(
        registry: Arc<SessionRegistry>,
        oracle: Arc<dyn WorldOracle>,
        period: Duration,
    ) -> Self {
        Self {
            registry,
            oracle,
            period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Run one complete tick: dispatch, barrier, trim.
    ///
    /// The barrier is bounded by one tick period. A unit that fails counts
    /// as complete with no output; a unit still running at the deadline is
    /// aborted and counted the same way, so a single stalled listener can
    /// never wedge the cycle.
    pub async fn run_once(&self) {
        let listeners = self.registry.active_sessions();

        if !listeners.is_empty() {
            let mut units = JoinSet::new();
            for listener in listeners {
                let registry = Arc::clone(&self.registry);
                let oracle = Arc::clone(&self.oracle);
                units.spawn(async move {
                    PositionalMixer::new(&registry, oracle.as_ref()).mix(&listener);
                });
            }

            let deadline = tokio::time::sleep(self.period);
            tokio::pin!(deadline);
            loop {
                tokio::select! {
                    unit = units.join_next() => match unit {
                        None => break,
                        Some(Ok(())) => {}
                        Some(Err(e)) => warn!("mixing unit failed: {}", e),
                    },
                    _ = &mut deadline => {
                        warn!(
                            "mixing units missed the tick period, aborting {} stragglers",
                            units.len()
                        );
                        units.abort_all();
                        break;
                    }
                }
            }
        }

        // Trimming strictly after the barrier: no frame is evicted while a
        // mixing unit may still read it
        self.registry.trim_inputs();
    }

    /// Run the periodic loop until the shutdown signal changes.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!("tick scheduler running at {:?}", self.period);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.run_once().await,
                _ = shutdown.changed() => {
                    debug!("tick scheduler stopping");
                    break;
                }
            }
        }
    }
}
