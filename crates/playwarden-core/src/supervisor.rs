//! Supervisor: owns configuration, the usage ledger and both periodic loops

use playwarden_host_api::ProcessRegistry;
use playwarden_store::{FileLedger, Ledger};
use playwarden_util::{MIN_WEEKLY_LIMIT_SECS, PlaywardenError, Result};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, broadcast};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::{Clock, CoreEvent, Enforcer, Sampler, system_clock};

/// Default period between process samples; each active sample bills this much
pub const DEFAULT_SAMPLE_PERIOD: Duration = Duration::from_secs(1);

/// Default period between enforcement checks
pub const DEFAULT_ENFORCE_INTERVAL: Duration = Duration::from_millis(100);

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct Budget {
    tracked: Arc<[String]>,
    limit_seconds: u64,
}

struct Run {
    running: Arc<AtomicBool>,
    ledger: Arc<dyn Ledger>,
    sampler: JoinHandle<()>,
    enforcement: JoinHandle<()>,
}

/// Weekly budget supervisor.
///
/// Lifecycle: construct, [`configure`](Self::configure),
/// [`start`](Self::start), [`stop`](Self::stop). The owner must `stop`
/// before dropping it; dropping a running supervisor aborts both loops
/// without flushing the ledger.
pub struct Supervisor {
    registry: Arc<dyn ProcessRegistry>,
    budget: Option<Budget>,
    sample_period: Duration,
    enforce_interval: Duration,
    clock: Clock,
    events: broadcast::Sender<CoreEvent>,
    run: Option<Run>,
}

impl Supervisor {
    pub fn new(registry: Arc<dyn ProcessRegistry>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            registry,
            budget: None,
            sample_period: DEFAULT_SAMPLE_PERIOD,
            enforce_interval: DEFAULT_ENFORCE_INTERVAL,
            clock: system_clock(),
            events,
            run: None,
        }
    }

    /// Replace the source of "now"
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Set the sample period (whole seconds, at least one) and the
    /// enforcement interval (non-zero).
    pub fn set_timing(&mut self, sample_period: Duration, enforce_interval: Duration) -> Result<()> {
        if self.is_running() {
            return Err(PlaywardenError::AlreadyRunning);
        }
        if sample_period.as_secs() == 0 || sample_period.subsec_nanos() != 0 {
            return Err(PlaywardenError::config(format!(
                "sample period must be a whole number of seconds, at least 1 (got {:?})",
                sample_period
            )));
        }
        if enforce_interval.is_zero() {
            return Err(PlaywardenError::config("enforce interval must be non-zero"));
        }
        if let Some(budget) = &self.budget
            && budget.limit_seconds < sample_period.as_secs()
        {
            return Err(PlaywardenError::config(format!(
                "weekly limit {}s is shorter than the sample period",
                budget.limit_seconds
            )));
        }

        self.sample_period = sample_period;
        self.enforce_interval = enforce_interval;
        Ok(())
    }

    /// Set the tracked processes and the weekly limit.
    ///
    /// Names are trimmed and deduplicated case-insensitively, keeping the
    /// first spelling. Rejected while running.
    pub fn configure<I, S>(&mut self, tracked: I, weekly_limit_seconds: u64) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self.is_running() {
            return Err(PlaywardenError::AlreadyRunning);
        }

        if weekly_limit_seconds < MIN_WEEKLY_LIMIT_SECS {
            return Err(PlaywardenError::config(format!(
                "weekly limit must be at least {}s (got {}s)",
                MIN_WEEKLY_LIMIT_SECS, weekly_limit_seconds
            )));
        }
        if weekly_limit_seconds < self.sample_period.as_secs() {
            return Err(PlaywardenError::config(format!(
                "weekly limit {}s is shorter than the sample period",
                weekly_limit_seconds
            )));
        }

        let mut names: Vec<String> = Vec::new();
        for name in tracked {
            let name = name.as_ref().trim();
            if name.is_empty() {
                return Err(PlaywardenError::config("tracked process name is empty"));
            }
            if !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
                names.push(name.to_string());
            }
        }
        if names.is_empty() {
            return Err(PlaywardenError::config("no tracked processes"));
        }

        info!(
            tracked = names.len(),
            limit_seconds = weekly_limit_seconds,
            "Supervisor configured"
        );

        self.budget = Some(Budget {
            tracked: names.into(),
            limit_seconds: weekly_limit_seconds,
        });
        Ok(())
    }

    /// Tracked process names, if configured
    pub fn tracked(&self) -> Option<&[String]> {
        self.budget.as_ref().map(|b| &*b.tracked)
    }

    /// Weekly limit in seconds, if configured
    pub fn weekly_limit_seconds(&self) -> Option<u64> {
        self.budget.as_ref().map(|b| b.limit_seconds)
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    /// Subscribe to budget transitions
    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.events.subscribe()
    }

    /// Load the ledger from `log_path` and start the sampler and enforcement loops.
    ///
    /// A missing or malformed log starts an empty ledger. Must be called from
    /// within a tokio runtime.
    pub fn start(&mut self, log_path: impl AsRef<Path>) -> Result<()> {
        if self.is_running() {
            return Err(PlaywardenError::AlreadyRunning);
        }
        let budget = self.budget.clone().ok_or(PlaywardenError::NotConfigured)?;
        tokio::runtime::Handle::try_current()
            .map_err(|e| PlaywardenError::internal(format!("no tokio runtime: {}", e)))?;

        let log_path = log_path.as_ref();
        let ledger: Arc<dyn Ledger> = Arc::new(FileLedger::open(log_path));
        let running = Arc::new(AtomicBool::new(true));

        let sampler = Sampler::new(
            Arc::clone(&self.registry),
            Arc::clone(&ledger),
            Arc::clone(&budget.tracked),
        );
        let active = sampler.active_flag();
        let first_sample = sampler.first_sample();
        let sampler = sampler.spawn(self.sample_period, Arc::clone(&running), Arc::clone(&self.clock));

        let enforcement = tokio::spawn(enforcement_loop(EnforcementLoop {
            enforcer: Enforcer::new(budget.limit_seconds),
            registry: Arc::clone(&self.registry),
            ledger: Arc::clone(&ledger),
            tracked: budget.tracked,
            active,
            first_sample,
            running: Arc::clone(&running),
            events: self.events.clone(),
            clock: Arc::clone(&self.clock),
            interval: self.enforce_interval,
            sample_period: self.sample_period.as_secs(),
        }));

        info!(
            ledger = %log_path.display(),
            sample_period = ?self.sample_period,
            enforce_interval = ?self.enforce_interval,
            "Supervisor started"
        );

        self.run = Some(Run {
            running,
            ledger,
            sampler,
            enforcement,
        });
        Ok(())
    }

    /// Stop both loops, wait for them to finish and persist the ledger
    pub async fn stop(&mut self) -> Result<()> {
        let run = self.run.take().ok_or(PlaywardenError::NotRunning)?;
        run.running.store(false, Ordering::SeqCst);

        for (name, task) in [("sampler", run.sampler), ("enforcement", run.enforcement)] {
            if let Err(e) = task.await {
                warn!(task = name, error = %e, "Loop task ended abnormally");
            }
        }

        run.ledger
            .flush()
            .map_err(|e| PlaywardenError::store(e.to_string()))?;

        info!("Supervisor stopped");
        Ok(())
    }

    /// Seconds used in the trailing seven days.
    ///
    /// Trims aged-out ticks as a side effect. Only available while running.
    pub fn current_usage_seconds(&self) -> Result<u64> {
        let run = self.run.as_ref().ok_or(PlaywardenError::NotRunning)?;
        Ok(run
            .ledger
            .used_seconds((self.clock)(), self.sample_period.as_secs()))
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        if let Some(run) = self.run.take() {
            warn!("Supervisor dropped while running; call stop() first");
            run.running.store(false, Ordering::SeqCst);
            run.sampler.abort();
            run.enforcement.abort();
        }
    }
}

struct EnforcementLoop {
    enforcer: Enforcer,
    registry: Arc<dyn ProcessRegistry>,
    ledger: Arc<dyn Ledger>,
    tracked: Arc<[String]>,
    active: Arc<AtomicBool>,
    first_sample: Arc<Notify>,
    running: Arc<AtomicBool>,
    events: broadcast::Sender<CoreEvent>,
    clock: Clock,
    interval: Duration,
    sample_period: u64,
}

async fn enforcement_loop(mut state: EnforcementLoop) {
    // The first reading must see the first sample's active flag, or a session
    // already running at start would lose its grace
    state.first_sample.notified().await;

    let mut interval = tokio::time::interval(state.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        if !state.running.load(Ordering::SeqCst) {
            break;
        }

        let now = (state.clock)();
        let current = state.ledger.used_seconds(now, state.sample_period);
        let active = state.active.load(Ordering::SeqCst);

        let events = state
            .enforcer
            .tick(current, active, state.registry.as_ref(), &state.tracked)
            .await;

        for event in events {
            // No subscribers is fine
            let _ = state.events.send(event);
        }
    }

    debug!("Enforcement loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use playwarden_host_api::MockRegistry;
    use std::sync::atomic::AtomicI64;
    use tokio::time::timeout;

    const NOW: i64 = 1_700_000_000;

    fn supervisor(registry: &Arc<MockRegistry>) -> Supervisor {
        Supervisor::new(registry.clone()).with_clock(Arc::new(|| NOW))
    }

    async fn next_matching(
        rx: &mut broadcast::Receiver<CoreEvent>,
        pred: impl Fn(&CoreEvent) -> bool,
    ) -> CoreEvent {
        timeout(Duration::from_secs(5), async {
            loop {
                match rx.recv().await {
                    Ok(event) if pred(&event) => return event,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(e) => panic!("event channel closed: {e}"),
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    #[test]
    fn configure_rejects_bad_input() {
        let registry = Arc::new(MockRegistry::new());
        let mut sup = supervisor(&registry);

        assert!(matches!(
            sup.configure(["hl2.exe"], 0),
            Err(PlaywardenError::ConfigError(_))
        ));
        assert!(matches!(
            sup.configure(["hl2.exe"], 59),
            Err(PlaywardenError::ConfigError(_))
        ));
        assert!(matches!(
            sup.configure(Vec::<String>::new(), 3600),
            Err(PlaywardenError::ConfigError(_))
        ));
        assert!(matches!(
            sup.configure(["hl2.exe", " "], 3600),
            Err(PlaywardenError::ConfigError(_))
        ));
        assert!(sup.tracked().is_none());
    }

    #[test]
    fn configure_dedupes_names() {
        let registry = Arc::new(MockRegistry::new());
        let mut sup = supervisor(&registry);

        sup.configure(["hl2.exe", "HL2.EXE", " dota2.exe "], 60).unwrap();
        assert_eq!(sup.tracked().unwrap(), ["hl2.exe", "dota2.exe"]);
        assert_eq!(sup.weekly_limit_seconds(), Some(60));
    }

    #[test]
    fn timing_validation() {
        let registry = Arc::new(MockRegistry::new());
        let mut sup = supervisor(&registry);

        assert!(sup.set_timing(Duration::ZERO, DEFAULT_ENFORCE_INTERVAL).is_err());
        assert!(sup.set_timing(Duration::from_millis(1500), DEFAULT_ENFORCE_INTERVAL).is_err());
        assert!(sup.set_timing(DEFAULT_SAMPLE_PERIOD, Duration::ZERO).is_err());

        sup.configure(["hl2.exe"], 60).unwrap();
        assert!(sup.set_timing(Duration::from_secs(120), DEFAULT_ENFORCE_INTERVAL).is_err());
        assert!(sup.set_timing(Duration::from_secs(10), Duration::from_millis(50)).is_ok());
    }

    #[tokio::test]
    async fn lifecycle_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("time_log.txt");
        let registry = Arc::new(MockRegistry::new());
        let mut sup = supervisor(&registry);

        assert!(matches!(sup.start(&path), Err(PlaywardenError::NotConfigured)));
        assert!(matches!(sup.stop().await, Err(PlaywardenError::NotRunning)));
        assert!(matches!(
            sup.current_usage_seconds(),
            Err(PlaywardenError::NotRunning)
        ));

        sup.configure(["hl2.exe"], 3600).unwrap();
        sup.start(&path).unwrap();
        assert!(sup.is_running());
        assert!(matches!(sup.start(&path), Err(PlaywardenError::AlreadyRunning)));
        assert!(matches!(
            sup.configure(["dota2.exe"], 3600),
            Err(PlaywardenError::AlreadyRunning)
        ));

        sup.stop().await.unwrap();
        assert!(!sup.is_running());

        // Restart after stop is allowed
        sup.start(&path).unwrap();
        sup.stop().await.unwrap();
    }

    #[test]
    fn start_outside_runtime_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(MockRegistry::new());
        let mut sup = supervisor(&registry);
        sup.configure(["hl2.exe"], 3600).unwrap();

        assert!(matches!(
            sup.start(dir.path().join("time_log.txt")),
            Err(PlaywardenError::Internal(_))
        ));
        assert!(!sup.is_running());
    }

    #[tokio::test]
    async fn malformed_log_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("time_log.txt");
        std::fs::write(&path, format!("{}\nnot-a-number\n{}\n", NOW - 10, NOW - 5)).unwrap();

        let registry = Arc::new(MockRegistry::new());
        let mut sup = supervisor(&registry);
        sup.configure(["hl2.exe"], 3600).unwrap();
        sup.start(&path).unwrap();

        assert_eq!(sup.current_usage_seconds().unwrap(), 0);
        sup.stop().await.unwrap();
    }

    #[tokio::test]
    async fn samples_are_persisted_on_stop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("time_log.txt");

        let registry = Arc::new(MockRegistry::new());
        registry.launch("hl2.exe");
        let mut sup = supervisor(&registry);
        sup.configure(["hl2.exe"], 3600).unwrap();
        sup.start(&path).unwrap();

        // The first sample fires immediately
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(sup.current_usage_seconds().unwrap() >= 1);
        sup.stop().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.lines().all(|l| l == NOW.to_string()));
        assert!(!content.is_empty());
    }

    #[tokio::test]
    async fn grace_then_enforcement_on_relaunch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("time_log.txt");
        let ticks: Vec<String> = (0..60).map(|i| (NOW - 3600 + i).to_string()).collect();
        std::fs::write(&path, ticks.join("\n")).unwrap();

        let registry = Arc::new(MockRegistry::new());
        registry.launch("hl2.exe");
        let mut sup = supervisor(&registry);
        sup.configure(["hl2.exe"], 60).unwrap();
        let mut rx = sup.subscribe();
        sup.start(&path).unwrap();

        let reached = next_matching(&mut rx, |e| matches!(e, CoreEvent::LimitReached { .. })).await;
        assert!(matches!(reached, CoreEvent::LimitReached { limit_seconds: 60, .. }));

        next_matching(&mut rx, |e| {
            matches!(e, CoreEvent::LimitStillExceeded { graced: true, .. })
        })
        .await;
        assert!(registry.kill_calls().is_empty());

        // Session ends; the next sample clears the active flag and the grace
        registry.exit("hl2.exe");
        next_matching(&mut rx, |e| {
            matches!(e, CoreEvent::LimitStillExceeded { graced: false, .. })
        })
        .await;

        registry.launch("hl2.exe");
        let terminated =
            next_matching(&mut rx, |e| matches!(e, CoreEvent::ProcessTerminated { .. })).await;
        assert_eq!(
            terminated,
            CoreEvent::ProcessTerminated {
                name: "hl2.exe".into()
            }
        );
        assert!(registry.running().is_empty());

        sup.stop().await.unwrap();
    }

    #[tokio::test]
    async fn budget_restored_as_window_ages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("time_log.txt");
        let ticks: Vec<String> = (0..60).map(|i| (NOW + i).to_string()).collect();
        std::fs::write(&path, ticks.join("\n")).unwrap();

        let registry = Arc::new(MockRegistry::new());
        let now = Arc::new(AtomicI64::new(NOW + 60));
        let clock_now = Arc::clone(&now);
        let mut sup = Supervisor::new(registry.clone())
            .with_clock(Arc::new(move || clock_now.load(Ordering::SeqCst)));
        sup.configure(["hl2.exe"], 60).unwrap();
        let mut rx = sup.subscribe();
        sup.start(&path).unwrap();

        next_matching(&mut rx, |e| matches!(e, CoreEvent::LimitReached { .. })).await;

        // First tick ages out exactly at NOW + 7d
        now.store(NOW + playwarden_util::ROLLING_WINDOW_SECS, Ordering::SeqCst);
        let restored =
            next_matching(&mut rx, |e| matches!(e, CoreEvent::BudgetRestored { .. })).await;
        assert_eq!(
            restored,
            CoreEvent::BudgetRestored {
                used_seconds: 59,
                limit_seconds: 60
            }
        );

        sup.stop().await.unwrap();
    }
}
