//! Process sampler

use playwarden_host_api::ProcessRegistry;
use playwarden_store::Ledger;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Source of "now" in Unix epoch seconds
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Clock backed by [`playwarden_util::unix_now`], which honours mock time in debug builds
pub fn system_clock() -> Clock {
    Arc::new(playwarden_util::unix_now)
}

/// Bills one tick to the ledger for every sample in which any tracked
/// process is running.
pub struct Sampler {
    registry: Arc<dyn ProcessRegistry>,
    ledger: Arc<dyn Ledger>,
    tracked: Arc<[String]>,
    active: Arc<AtomicBool>,
    first_sample: Arc<Notify>,
}

impl Sampler {
    pub fn new(
        registry: Arc<dyn ProcessRegistry>,
        ledger: Arc<dyn Ledger>,
        tracked: Arc<[String]>,
    ) -> Self {
        Self {
            registry,
            ledger,
            tracked,
            active: Arc::new(AtomicBool::new(false)),
            first_sample: Arc::new(Notify::new()),
        }
    }

    /// Shared "currently active" flag, set by every sample
    pub fn active_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.active)
    }

    /// Notified once the spawned loop has taken its first sample, or has
    /// stopped without taking one
    pub fn first_sample(&self) -> Arc<Notify> {
        Arc::clone(&self.first_sample)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Take one sample at `now`. Returns whether a tracked process was running.
    ///
    /// Stops at the first running process, so several tracked processes
    /// running at once still bill a single tick.
    pub async fn sample(&self, now: i64) -> bool {
        let mut running = None;
        for name in self.tracked.iter() {
            if self.registry.is_running(name).await {
                running = Some(name);
                break;
            }
        }

        // Publish the flag first: a reader that sees this tick's usage must
        // also see that a session is running
        let active = running.is_some();
        self.active.store(active, Ordering::SeqCst);

        if let Some(name) = running {
            debug!(process = %name, now, "Tracked process running");
            if let Err(e) = self.ledger.record_tick(now) {
                debug!(error = %e, "Usage tick kept in memory only");
            }
        }

        active
    }

    /// Sample every `period` until `running` is cleared
    pub fn spawn(self, period: Duration, running: Arc<AtomicBool>, clock: Clock) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let mut primed = false;
            loop {
                interval.tick().await;
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                self.sample(clock()).await;
                if !primed {
                    self.first_sample.notify_one();
                    primed = true;
                }
            }

            self.active.store(false, Ordering::SeqCst);
            self.first_sample.notify_one();
            debug!("Sampler stopped");
        })
    }
}
