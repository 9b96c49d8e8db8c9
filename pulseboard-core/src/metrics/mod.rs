mod aggregator;
mod fallback;
mod fetcher;
mod transformer;
mod trend;

pub use aggregator::{ComparisonRow, FleetAggregator, FleetKpis, FleetOverview};
pub use fallback::fallback_roster;
pub use fetcher::{CounterSource, FetchOutcome, HttpMetricsFetcher};
pub use transformer::{
    classify_agent, requests_per_minute, split_error_breakdown, transform, TransformOptions,
    GENERAL_AGENT_TYPE,
};
pub use trend::{TrendSynthesizer, DEFAULT_SPACING_MINUTES, DEFAULT_TREND_POINTS};

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::PulseConfig;
use crate::error::{PulseError, PulseResult};
use crate::models::{AgentPerformance, RawAgentCounters};

/// Poll cycle state exposed to the presentation layer.
///
/// `Degraded` replaces the Loading/Error oscillation once failures pass
/// the configured threshold: the last good snapshot stays visible
/// behind a staleness banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Loading,
    Ready,
    Empty,
    Error,
    Degraded,
}

impl PollState {
    pub fn is_loading(&self) -> bool {
        matches!(self, PollState::Loading)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, PollState::Error | PollState::Degraded)
    }

    pub fn indicator(&self) -> &'static str {
        match self {
            PollState::Loading => "⟳",
            PollState::Ready => "✓",
            PollState::Empty => "∅",
            PollState::Error => "✗",
            PollState::Degraded => "⚠",
        }
    }
}

/// Atomic result of one poll cycle: the derived records plus the
/// fleet overview computed from them. Replaced only as a whole, so a
/// consumer never observes a half-updated view.
#[derive(Debug, Clone, Default)]
pub struct DashboardSnapshot {
    pub agents: Vec<AgentPerformance>,
    pub overview: FleetOverview,
    pub fetched_at: Option<DateTime<Utc>>,
    /// True when the snapshot was built from the fallback roster.
    pub synthetic: bool,
}

impl DashboardSnapshot {
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn age_seconds(&self, now: DateTime<Utc>) -> Option<i64> {
        self.fetched_at.map(|at| (now - at).num_seconds())
    }
}

/// Drives the fetch → transform → aggregate cycle on a fixed interval,
/// deduplicates concurrent refreshes, and owns the mutable snapshot.
pub struct MetricsPoller {
    inner: Arc<PollerInner>,
}

struct PollerInner {
    source: Arc<dyn CounterSource>,
    transform_opts: TransformOptions,
    aggregator: FleetAggregator,
    interval: Duration,
    degraded_threshold: u32,

    snapshot: RwLock<DashboardSnapshot>,
    state: RwLock<PollState>,
    last_success_at: RwLock<Option<DateTime<Utc>>>,
    consecutive_failures: AtomicU32,

    /// Monotonically increasing fetch generation; responses older than
    /// the latest applied generation are discarded.
    generation: AtomicU64,
    applied: AtomicU64,
    in_flight: AtomicBool,
    /// Liveness guard: results arriving after teardown must not mutate
    /// a snapshot no one observes.
    live: AtomicBool,
    running: AtomicBool,
    completed_tx: watch::Sender<u64>,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    task_handle: Mutex<Option<JoinHandle<()>>>,
}

impl MetricsPoller {
    pub fn new(config: &PulseConfig) -> Self {
        let source = Arc::new(HttpMetricsFetcher::new(&config.endpoint));
        Self::with_source(source, config)
    }

    /// Construct against an arbitrary counter source; used by tests and
    /// by hosts that inject their own transport.
    pub fn with_source(source: Arc<dyn CounterSource>, config: &PulseConfig) -> Self {
        let (completed_tx, _) = watch::channel(0u64);
        Self {
            inner: Arc::new(PollerInner {
                source,
                transform_opts: TransformOptions::from(&config.transform),
                aggregator: FleetAggregator::from_config(&config.aggregation),
                interval: Duration::from_secs(config.polling.interval_secs),
                degraded_threshold: config.polling.degraded_threshold,
                snapshot: RwLock::new(DashboardSnapshot::default()),
                state: RwLock::new(PollState::Loading),
                last_success_at: RwLock::new(None),
                consecutive_failures: AtomicU32::new(0),
                generation: AtomicU64::new(0),
                applied: AtomicU64::new(0),
                in_flight: AtomicBool::new(false),
                live: AtomicBool::new(true),
                running: AtomicBool::new(false),
                completed_tx,
                shutdown_tx: Mutex::new(None),
                task_handle: Mutex::new(None),
            }),
        }
    }

    /// Start the periodic poll loop. The first cycle runs immediately.
    pub async fn start(&self) -> PulseResult<()> {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return Err(PulseError::PollerAlreadyRunning);
        }
        self.inner.live.store(true, Ordering::SeqCst);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        *self.inner.shutdown_tx.lock().await = Some(shutdown_tx);

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            inner.poll_loop(shutdown_rx).await;
        });
        *self.inner.task_handle.lock().await = Some(handle);

        info!(
            interval_secs = self.inner.interval.as_secs(),
            "Metrics poller started"
        );
        Ok(())
    }

    /// Tear down the poll loop. Any in-flight fetch result arriving
    /// afterward is discarded.
    pub async fn stop(&self) {
        self.inner.live.store(false, Ordering::SeqCst);
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            debug!("Metrics poller was not running");
            return;
        }

        if let Some(tx) = self.inner.shutdown_tx.lock().await.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.inner.task_handle.lock().await.take() {
            let _ = handle.await;
        }

        info!("Metrics poller stopped");
    }

    /// Run one refresh cycle, or ride along with the cycle already in
    /// flight. At most one network call is ever outstanding; concurrent
    /// callers all resolve against its single result.
    pub async fn refresh(&self) -> PollState {
        self.inner.refresh().await
    }

    pub async fn snapshot(&self) -> DashboardSnapshot {
        self.inner.snapshot.read().await.clone()
    }

    pub async fn state(&self) -> PollState {
        *self.inner.state.read().await
    }

    pub async fn last_success_at(&self) -> Option<DateTime<Utc>> {
        *self.inner.last_success_at.read().await
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner.consecutive_failures.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }
}

impl PollerInner {
    async fn poll_loop(self: Arc<Self>, mut shutdown_rx: oneshot::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.tick().await;

        self.refresh().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.running.load(Ordering::SeqCst) {
                        break;
                    }
                    self.refresh().await;
                }
                _ = &mut shutdown_rx => {
                    debug!("Poll loop received shutdown");
                    break;
                }
            }
        }
    }

    async fn refresh(&self) -> PollState {
        if !self.live.load(Ordering::SeqCst) {
            return *self.state.read().await;
        }

        if self.in_flight.swap(true, Ordering::SeqCst) {
            return self.await_in_flight().await;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        {
            let mut state = self.state.write().await;
            if *state != PollState::Degraded {
                *state = PollState::Loading;
            }
        }

        let outcome = self.source.fetch().await;
        self.apply_outcome(generation, outcome).await;

        self.in_flight.store(false, Ordering::SeqCst);
        // send_replace stores the value even with no subscribers, so a
        // coalescer that checks in after completion still sees it.
        self.completed_tx.send_replace(generation);

        *self.state.read().await
    }

    /// Coalesce into the cycle currently in flight and share its result.
    async fn await_in_flight(&self) -> PollState {
        let target = self.generation.load(Ordering::SeqCst);
        let mut rx = self.completed_tx.subscribe();

        while *rx.borrow_and_update() < target {
            if rx.changed().await.is_err() {
                break;
            }
        }

        *self.state.read().await
    }

    async fn apply_outcome(&self, generation: u64, outcome: FetchOutcome) {
        if !self.live.load(Ordering::SeqCst) {
            debug!(generation, "Discarding fetch result after teardown");
            return;
        }
        if generation <= self.applied.load(Ordering::SeqCst) {
            debug!(generation, "Discarding superseded fetch result");
            return;
        }

        let now = Utc::now();

        if outcome.is_empty_dataset() {
            // Backend healthy but unpopulated; distinct from a failure.
            let snapshot = self.build_snapshot(&[], false, now);
            *self.snapshot.write().await = snapshot;
            self.applied.store(generation, Ordering::SeqCst);
            self.consecutive_failures.store(0, Ordering::SeqCst);
            *self.last_success_at.write().await = Some(now);
            *self.state.write().await = PollState::Empty;
            info!("Poll cycle completed with an empty dataset");
            return;
        }

        match outcome.cause {
            None => {
                let snapshot = self.build_snapshot(&outcome.counters, false, now);
                let agents = snapshot.agents.len();
                *self.snapshot.write().await = snapshot;
                self.applied.store(generation, Ordering::SeqCst);
                self.consecutive_failures.store(0, Ordering::SeqCst);
                *self.last_success_at.write().await = Some(now);
                *self.state.write().await = PollState::Ready;
                debug!(generation, agents, "Published fresh snapshot");
            }
            Some(cause) => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                let degraded = failures >= self.degraded_threshold;

                let has_good_snapshot = {
                    let snapshot = self.snapshot.read().await;
                    snapshot.fetched_at.is_some() && !snapshot.synthetic
                };

                // Keep the last good snapshot untouched; only publish
                // the fallback when there is nothing better to show.
                if !has_good_snapshot {
                    let snapshot = self.build_snapshot(&outcome.counters, true, now);
                    *self.snapshot.write().await = snapshot;
                }
                self.applied.store(generation, Ordering::SeqCst);
                *self.state.write().await = if degraded {
                    PollState::Degraded
                } else {
                    PollState::Error
                };

                warn!(
                    generation,
                    consecutive_failures = failures,
                    degraded,
                    error = %cause,
                    "Poll cycle failed"
                );
            }
        }
    }

    fn build_snapshot(
        &self,
        counters: &[RawAgentCounters],
        synthetic: bool,
        now: DateTime<Utc>,
    ) -> DashboardSnapshot {
        let agents: Vec<AgentPerformance> = counters
            .iter()
            .map(|raw| transform(raw, now, &self.transform_opts))
            .collect();
        let overview = self.aggregator.aggregate(&agents);

        DashboardSnapshot {
            agents,
            overview,
            fetched_at: Some(now),
            synthetic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    struct ScriptedSource {
        outcomes: StdMutex<VecDeque<FetchOutcome>>,
        calls: AtomicU32,
        delay: Option<Duration>,
    }

    impl ScriptedSource {
        fn new(outcomes: Vec<FetchOutcome>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: StdMutex::new(outcomes.into()),
                calls: AtomicU32::new(0),
                delay: None,
            })
        }

        fn slow(outcomes: Vec<FetchOutcome>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                outcomes: StdMutex::new(outcomes.into()),
                calls: AtomicU32::new(0),
                delay: Some(delay),
            })
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CounterSource for ScriptedSource {
        async fn fetch(&self) -> FetchOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| FetchOutcome::live(fallback_roster(Utc::now())))
        }
    }

    fn test_config() -> PulseConfig {
        let mut config = PulseConfig::default();
        config.polling.degraded_threshold = 2;
        config
    }

    fn live_outcome() -> FetchOutcome {
        FetchOutcome::live(vec![
            RawAgentCounters {
                agent_id: "code-reviewer".to_string(),
                requests: 50,
                errors: 2,
                total_duration_ms: 45_000,
                last_used_at: Some(Utc::now()),
                is_active: true,
                total_tokens: 20_000,
            },
            RawAgentCounters::new("idle-agent"),
        ])
    }

    fn failed_outcome() -> FetchOutcome {
        FetchOutcome::fallback(
            fallback_roster(Utc::now()),
            PulseError::RequestTimeout {
                url: "http://test/api/metrics/agents".to_string(),
                timeout_secs: 1,
            },
        )
    }

    #[tokio::test]
    async fn test_initial_state_is_loading() {
        let poller = MetricsPoller::with_source(ScriptedSource::new(vec![]), &test_config());
        assert_eq!(poller.state().await, PollState::Loading);
        assert!(poller.snapshot().await.is_empty());
        assert!(poller.last_success_at().await.is_none());
    }

    #[tokio::test]
    async fn test_refresh_publishes_ready_snapshot() {
        let poller =
            MetricsPoller::with_source(ScriptedSource::new(vec![live_outcome()]), &test_config());

        let state = poller.refresh().await;
        assert_eq!(state, PollState::Ready);

        let snapshot = poller.snapshot().await;
        assert_eq!(snapshot.agents.len(), 2);
        assert!(!snapshot.synthetic);
        assert!(snapshot.fetched_at.is_some());
        assert!(poller.last_success_at().await.is_some());
        assert_eq!(poller.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn test_failure_without_prior_snapshot_publishes_fallback() {
        let poller =
            MetricsPoller::with_source(ScriptedSource::new(vec![failed_outcome()]), &test_config());

        let state = poller.refresh().await;
        assert_eq!(state, PollState::Error);

        let snapshot = poller.snapshot().await;
        assert!(snapshot.synthetic);
        assert!(!snapshot.is_empty());
        // KPIs come from the fallback roster, not NaN placeholders.
        assert!(snapshot.overview.kpis.avg_response_time_ms.is_finite());
        assert!(snapshot.overview.kpis.avg_success_rate > 0.0);
        assert_eq!(poller.consecutive_failures(), 1);
    }

    #[tokio::test]
    async fn test_failure_retains_previous_good_snapshot() {
        let source = ScriptedSource::new(vec![live_outcome(), failed_outcome()]);
        let poller = MetricsPoller::with_source(source, &test_config());

        poller.refresh().await;
        let good = poller.snapshot().await;

        let state = poller.refresh().await;
        assert_eq!(state, PollState::Error);

        let retained = poller.snapshot().await;
        assert!(!retained.synthetic);
        assert_eq!(retained.fetched_at, good.fetched_at);
        assert_eq!(retained.agents.len(), good.agents.len());
    }

    #[tokio::test]
    async fn test_degraded_after_threshold() {
        let source = ScriptedSource::new(vec![
            live_outcome(),
            failed_outcome(),
            failed_outcome(),
            failed_outcome(),
        ]);
        let poller = MetricsPoller::with_source(source, &test_config());

        poller.refresh().await;
        assert_eq!(poller.refresh().await, PollState::Error);
        assert_eq!(poller.refresh().await, PollState::Degraded);
        assert_eq!(poller.refresh().await, PollState::Degraded);
        assert_eq!(poller.consecutive_failures(), 3);

        // Last good snapshot stays visible while degraded.
        assert!(!poller.snapshot().await.synthetic);
    }

    #[tokio::test]
    async fn test_recovery_resets_failures() {
        let source = ScriptedSource::new(vec![failed_outcome(), live_outcome()]);
        let poller = MetricsPoller::with_source(source, &test_config());

        poller.refresh().await;
        assert_eq!(poller.consecutive_failures(), 1);

        let state = poller.refresh().await;
        assert_eq!(state, PollState::Ready);
        assert_eq!(poller.consecutive_failures(), 0);
        assert!(!poller.snapshot().await.synthetic);
    }

    #[tokio::test]
    async fn test_empty_dataset_is_distinct_state() {
        let poller = MetricsPoller::with_source(
            ScriptedSource::new(vec![FetchOutcome::empty()]),
            &test_config(),
        );

        let state = poller.refresh().await;
        assert_eq!(state, PollState::Empty);

        let snapshot = poller.snapshot().await;
        assert!(snapshot.is_empty());
        assert!(!snapshot.synthetic);
        assert_eq!(snapshot.overview.kpis.active_agents, 0);
        assert_eq!(snapshot.overview.kpis.avg_response_time_ms, 0.0);
        // The backend answered, so this still counts as contact.
        assert!(poller.last_success_at().await.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_coalesce_into_one_fetch() {
        let source = ScriptedSource::slow(
            vec![live_outcome()],
            Duration::from_millis(150),
        );
        let poller = Arc::new(MetricsPoller::with_source(
            Arc::clone(&source) as Arc<dyn CounterSource>,
            &test_config(),
        ));

        let first = {
            let poller = Arc::clone(&poller);
            tokio::spawn(async move { poller.refresh().await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        let second = {
            let poller = Arc::clone(&poller);
            tokio::spawn(async move { poller.refresh().await })
        };

        let (a, b) = (first.await.unwrap(), second.await.unwrap());
        assert_eq!(a, PollState::Ready);
        assert_eq!(b, PollState::Ready);
        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test]
    async fn test_stale_generation_is_discarded() {
        let poller =
            MetricsPoller::with_source(ScriptedSource::new(vec![]), &test_config());
        let inner = &poller.inner;

        inner.apply_outcome(2, live_outcome()).await;
        let fresh = poller.snapshot().await;
        assert_eq!(fresh.agents.len(), 2);

        // A slow fetch from an older generation resolves afterward and
        // must not overwrite the newer snapshot.
        inner.apply_outcome(1, failed_outcome()).await;
        let unchanged = poller.snapshot().await;
        assert_eq!(unchanged.fetched_at, fresh.fetched_at);
        assert!(!unchanged.synthetic);
    }

    #[tokio::test]
    async fn test_stop_discards_in_flight_result() {
        let source = ScriptedSource::slow(vec![live_outcome()], Duration::from_millis(100));
        let poller = Arc::new(MetricsPoller::with_source(
            Arc::clone(&source) as Arc<dyn CounterSource>,
            &test_config(),
        ));

        let handle = {
            let poller = Arc::clone(&poller);
            tokio::spawn(async move { poller.refresh().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        poller.stop().await;
        handle.await.unwrap();

        // The result arrived after teardown and was dropped.
        assert!(poller.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let poller = MetricsPoller::with_source(ScriptedSource::new(vec![]), &test_config());

        poller.start().await.unwrap();
        assert!(poller.is_running());
        assert!(matches!(
            poller.start().await,
            Err(PulseError::PollerAlreadyRunning)
        ));

        poller.stop().await;
        assert!(!poller.is_running());
    }

    #[tokio::test]
    async fn test_started_loop_runs_initial_refresh() {
        let source = ScriptedSource::new(vec![live_outcome()]);
        let poller = MetricsPoller::with_source(
            Arc::clone(&source) as Arc<dyn CounterSource>,
            &test_config(),
        );

        poller.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(poller.state().await, PollState::Ready);
        assert!(source.call_count() >= 1);
        poller.stop().await;
    }

    #[test]
    fn test_poll_state_indicators() {
        assert_eq!(PollState::Loading.indicator(), "⟳");
        assert_eq!(PollState::Ready.indicator(), "✓");
        assert_eq!(PollState::Empty.indicator(), "∅");
        assert_eq!(PollState::Error.indicator(), "✗");
        assert_eq!(PollState::Degraded.indicator(), "⚠");
        assert!(PollState::Degraded.is_error());
        assert!(!PollState::Ready.is_error());
    }

    #[test]
    fn test_snapshot_age() {
        let now = Utc::now();
        let snapshot = DashboardSnapshot {
            fetched_at: Some(now - chrono::Duration::seconds(90)),
            ..Default::default()
        };
        assert_eq!(snapshot.age_seconds(now), Some(90));
        assert_eq!(DashboardSnapshot::default().age_seconds(now), None);
    }
}
