/// Market-aware auto-refresh
///
/// Owns the recurring tick and the latest-result slot. Background ticks only
/// fetch while the padded session is open; user refreshes always fetch.
/// Fetches may overlap. Each carries a sequence number and the symbol it was
/// issued for. An outcome is applied only when it is newer than the applied
/// one and its symbol is still current, so a late response never rolls the
/// result back or shows a ticker the user already left.
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::client::PredictionSource;
use crate::error::{MonitorError, Result};
use crate::time::{Clock, SessionWindow, US_EQUITY_SESSION};
use crate::types::{Config, PredictionRequest, PredictionResponse};

/// Background poll period
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    /// Ticker edited or manual refresh; never gated
    UserInitiated,
    /// Timer tick; gated on the session window
    BackgroundScheduled,
}

impl RefreshTrigger {
    pub fn as_str(&self) -> &str {
        match self {
            RefreshTrigger::UserInitiated => "foreground",
            RefreshTrigger::BackgroundScheduled => "background",
        }
    }
}

/// Read-only view of the scheduler state
#[derive(Debug, Clone, Default)]
pub struct RefreshSnapshot {
    pub symbol: String,
    /// `None` before the first load and after any failed fetch
    pub result: Option<Arc<PredictionResponse>>,
    pub foreground_in_flight: bool,
    pub background_in_flight: bool,
    pub last_error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub issued_seq: u64,
    pub applied_seq: u64,
}

struct RefreshState {
    symbol: String,
    result: Option<Arc<PredictionResponse>>,
    // Counts rather than booleans so overlapping fetches of one kind
    // don't clear each other's flag
    foreground_pending: usize,
    background_pending: usize,
    last_error: Option<String>,
    updated_at: Option<DateTime<Utc>>,
    issued_seq: u64,
    applied_seq: u64,
}

impl RefreshState {
    fn snapshot(&self) -> RefreshSnapshot {
        RefreshSnapshot {
            symbol: self.symbol.clone(),
            result: self.result.clone(),
            foreground_in_flight: self.foreground_pending > 0,
            background_in_flight: self.background_pending > 0,
            last_error: self.last_error.clone(),
            updated_at: self.updated_at,
            issued_seq: self.issued_seq,
            applied_seq: self.applied_seq,
        }
    }

    fn pending_mut(&mut self, trigger: RefreshTrigger) -> &mut usize {
        match trigger {
            RefreshTrigger::UserInitiated => &mut self.foreground_pending,
            RefreshTrigger::BackgroundScheduled => &mut self.background_pending,
        }
    }
}

struct SchedulerCore {
    source: Arc<dyn PredictionSource>,
    clock: Arc<dyn Clock>,
    session: SessionWindow,
    config: Arc<Config>,
    state: RwLock<RefreshState>,
    /// Bumped on every state change
    updates: watch::Sender<u64>,
}

impl SchedulerCore {
    async fn tick(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let now = self.clock.now();
        if self.session.is_open_for_refresh(now) {
            Some(self.issue(RefreshTrigger::BackgroundScheduled).await)
        } else {
            debug!("Session closed at {} - background refresh skipped", now);
            None
        }
    }

    async fn issue(self: &Arc<Self>, trigger: RefreshTrigger) -> JoinHandle<()> {
        let (seq, request) = {
            let mut state = self.state.write().await;
            state.issued_seq += 1;
            *state.pending_mut(trigger) += 1;
            (
                state.issued_seq,
                PredictionRequest::for_symbol(&state.symbol, &self.config),
            )
        };
        self.notify();

        debug!("Issued {} fetch #{} for {}", trigger.as_str(), seq, request.symbol);

        let core = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(core.source.fetch(&request))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(MonitorError::TaskFailed(format!("fetch #{} panicked", seq))));
            core.complete(seq, &request.symbol, trigger, outcome).await;
        })
    }

    async fn complete(
        &self,
        seq: u64,
        symbol: &str,
        trigger: RefreshTrigger,
        outcome: Result<PredictionResponse>,
    ) {
        {
            let mut state = self.state.write().await;
            let pending = state.pending_mut(trigger);
            *pending = pending.saturating_sub(1);

            if seq <= state.applied_seq {
                debug!(
                    "Discarding {} fetch #{} (#{} already applied)",
                    trigger.as_str(),
                    seq,
                    state.applied_seq
                );
            } else if symbol != state.symbol {
                debug!(
                    "Discarding {} fetch #{} for {} (now {})",
                    trigger.as_str(),
                    seq,
                    symbol,
                    state.symbol
                );
            } else {
                match outcome {
                    Ok(response) => {
                        state.result = Some(Arc::new(response));
                        state.last_error = None;
                        debug!("Applied {} fetch #{}", trigger.as_str(), seq);
                    }
                    Err(e) => {
                        warn!(
                            "{} fetch #{} failed: {} ({})",
                            trigger.as_str(),
                            seq,
                            e,
                            e.error_code()
                        );
                        state.result = None;
                        state.last_error = Some(e.to_string());
                    }
                }
                state.applied_seq = seq;
                state.updated_at = Some(self.clock.now());
            }
        }
        self.notify();
    }

    fn notify(&self) {
        self.updates.send_modify(|version| *version += 1);
    }
}

pub struct RefreshScheduler {
    core: Arc<SchedulerCore>,
    ticker: Option<JoinHandle<()>>,
}

impl RefreshScheduler {
    pub fn new(source: Arc<dyn PredictionSource>, clock: Arc<dyn Clock>, config: Arc<Config>) -> Self {
        Self::with_session(source, clock, config, US_EQUITY_SESSION)
    }

    pub fn with_session(
        source: Arc<dyn PredictionSource>,
        clock: Arc<dyn Clock>,
        config: Arc<Config>,
        session: SessionWindow,
    ) -> Self {
        let (updates, _) = watch::channel(0);
        let state = RefreshState {
            symbol: config.symbol.clone(),
            result: None,
            foreground_pending: 0,
            background_pending: 0,
            last_error: None,
            updated_at: None,
            issued_seq: 0,
            applied_seq: 0,
        };

        RefreshScheduler {
            core: Arc::new(SchedulerCore {
                source,
                clock,
                session,
                config,
                state: RwLock::new(state),
                updates,
            }),
            ticker: None,
        }
    }

    /// Initial unconditional load, then a recurring tick every [`REFRESH_INTERVAL`]
    pub async fn start(&mut self) -> Option<JoinHandle<()>> {
        if self.is_running() {
            warn!("Refresh scheduler already running");
            return None;
        }

        let initial = self.core.issue(RefreshTrigger::UserInitiated).await;

        let core = Arc::clone(&self.core);
        self.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + REFRESH_INTERVAL, REFRESH_INTERVAL);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                core.tick().await;
            }
        }));

        info!("Refresh scheduler started (every {}s)", REFRESH_INTERVAL.as_secs());
        Some(initial)
    }

    /// Cancel the recurring tick; fetches already in flight still complete
    pub fn stop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
            info!("Refresh scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.ticker.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Issue a refresh. Background triggers return `None` while the session is closed
    pub async fn refresh(&self, trigger: RefreshTrigger) -> Option<JoinHandle<()>> {
        match trigger {
            RefreshTrigger::UserInitiated => Some(self.core.issue(trigger).await),
            RefreshTrigger::BackgroundScheduled => self.core.tick().await,
        }
    }

    /// Switch ticker and load it immediately
    pub async fn set_symbol(&self, symbol: &str) -> Result<JoinHandle<()>> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(MonitorError::InvalidParameter("symbol is empty".to_string()));
        }

        {
            let mut state = self.core.state.write().await;
            if state.symbol != symbol {
                info!("Symbol changed: {} -> {}", state.symbol, symbol);
                state.symbol = symbol;
            }
        }
        Ok(self.core.issue(RefreshTrigger::UserInitiated).await)
    }

    pub async fn snapshot(&self) -> RefreshSnapshot {
        self.core.state.read().await.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.core.updates.subscribe()
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualClock;
    use crate::types::Consensus;
    use chrono::TimeZone;
    use chrono_tz::America::New_York;
    use futures_util::future::BoxFuture;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    enum Step {
        Ok(&'static str),
        Fail,
        Panic,
    }

    /// Replays scripted outcomes, each after a delay
    struct ScriptedSource {
        script: Mutex<VecDeque<(u64, Step)>>,
        requests: Mutex<Vec<PredictionRequest>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<(u64, Step)>) -> Arc<Self> {
            Arc::new(ScriptedSource {
                script: Mutex::new(script.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    fn tagged(tag: &str) -> PredictionResponse {
        PredictionResponse {
            consensus: Some(Consensus {
                kind: tag.to_string(),
                avg_entry: None,
                avg_exit: None,
                risk_reward: None,
            }),
            ..Default::default()
        }
    }

    impl PredictionSource for ScriptedSource {
        fn fetch<'a>(&'a self, request: &'a PredictionRequest) -> BoxFuture<'a, Result<PredictionResponse>> {
            self.requests.lock().unwrap().push(request.clone());
            let step = self.script.lock().unwrap().pop_front();
            Box::pin(async move {
                let (delay_ms, step) = step.unwrap_or((0, Step::Ok("default")));
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                match step {
                    Step::Ok(tag) => Ok(tagged(tag)),
                    Step::Fail => Err(MonitorError::NetworkTimeout("scripted".to_string())),
                    Step::Panic => panic!("scripted panic"),
                }
            })
        }
    }

    fn clock_at(h: u32, m: u32) -> Arc<ManualClock> {
        let t = New_York.with_ymd_and_hms(2024, 6, 3, h, m, 0).unwrap().with_timezone(&Utc);
        Arc::new(ManualClock::new(t))
    }

    fn scheduler(source: Arc<ScriptedSource>, clock: Arc<ManualClock>) -> RefreshScheduler {
        RefreshScheduler::new(source, clock, Arc::new(Config::default()))
    }

    fn kind(snap: &RefreshSnapshot) -> Option<String> {
        snap.result.as_ref()?.consensus.as_ref().map(|c| c.kind.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_load_runs_when_session_closed() {
        let source = ScriptedSource::new(vec![(0, Step::Ok("initial"))]);
        let mut sched = scheduler(Arc::clone(&source), clock_at(16, 6));

        sched.start().await.unwrap().await.unwrap();
        assert_eq!(source.calls(), 1);
        assert_eq!(kind(&sched.snapshot().await).as_deref(), Some("initial"));

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_ticks_while_open() {
        let source = ScriptedSource::new(vec![]);
        let mut sched = scheduler(Arc::clone(&source), clock_at(10, 0));

        sched.start().await;
        tokio::time::sleep(Duration::from_millis(31_000)).await;
        // initial + ticks at 10s, 20s, 30s
        assert_eq!(source.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_follow_session_window() {
        let source = ScriptedSource::new(vec![]);
        let clock = clock_at(16, 4);
        let mut sched = scheduler(Arc::clone(&source), Arc::clone(&clock));

        sched.start().await;
        tokio::time::sleep(Duration::from_millis(10_500)).await;
        assert_eq!(source.calls(), 2);

        clock.advance(chrono::Duration::minutes(2)); // 16:06
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(source.calls(), 2);

        // No catch-up once the window reopens; the next tick just fetches
        clock.set(New_York.with_ymd_and_hms(2024, 6, 4, 9, 25, 0).unwrap().with_timezone(&Utc));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_refresh_bypasses_session_check() {
        let source = ScriptedSource::new(vec![]);
        let sched = scheduler(Arc::clone(&source), clock_at(16, 6));

        assert!(sched.refresh(RefreshTrigger::BackgroundScheduled).await.is_none());
        assert_eq!(source.calls(), 0);

        sched.refresh(RefreshTrigger::UserInitiated).await.unwrap().await.unwrap();
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetch_clears_result_and_flags() {
        let source = ScriptedSource::new(vec![(0, Step::Ok("good")), (100, Step::Fail)]);
        let sched = scheduler(Arc::clone(&source), clock_at(11, 0));

        sched.refresh(RefreshTrigger::UserInitiated).await.unwrap().await.unwrap();
        assert!(sched.snapshot().await.result.is_some());

        let bg = sched.refresh(RefreshTrigger::BackgroundScheduled).await.unwrap();
        let during = sched.snapshot().await;
        assert!(during.background_in_flight);
        assert!(!during.foreground_in_flight);

        bg.await.unwrap();
        let snap = sched.snapshot().await;
        assert!(snap.result.is_none());
        assert!(snap.last_error.is_some());
        assert!(!snap.foreground_in_flight);
        assert!(!snap.background_in_flight);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_requested_wins() {
        // First request is slow, second fast: the slow answer must not overwrite
        let source = ScriptedSource::new(vec![(5_000, Step::Ok("old")), (1_000, Step::Ok("new"))]);
        let sched = scheduler(Arc::clone(&source), clock_at(11, 0));

        let slow = sched.refresh(RefreshTrigger::UserInitiated).await.unwrap();
        let fast = sched.set_symbol("qqq").await.unwrap();

        let during = sched.snapshot().await;
        assert!(during.foreground_in_flight);
        assert_eq!(during.issued_seq, 2);

        fast.await.unwrap();
        assert_eq!(kind(&sched.snapshot().await).as_deref(), Some("new"));
        assert!(sched.snapshot().await.foreground_in_flight);

        slow.await.unwrap();
        let snap = sched.snapshot().await;
        assert_eq!(kind(&snap).as_deref(), Some("new"));
        assert_eq!(snap.applied_seq, 2);
        assert!(!snap.foreground_in_flight);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_slower_than_tick_still_applies() {
        // Every answer takes longer than the tick, so fetches always overlap
        let script = (0..20).map(|_| (12_000, Step::Ok("slow"))).collect();
        let source = ScriptedSource::new(script);
        let mut sched = scheduler(Arc::clone(&source), clock_at(10, 0));

        sched.start().await;
        tokio::time::sleep(Duration::from_secs(13)).await;
        let first = sched.snapshot().await;
        assert_eq!(kind(&first).as_deref(), Some("slow"));
        assert_eq!(first.applied_seq, 1);

        // t=115s: initial + 11 ticks issued, all but the last answered
        tokio::time::sleep(Duration::from_secs(102)).await;
        let snap = sched.snapshot().await;
        assert_eq!(source.calls(), 12);
        assert!(snap.result.is_some());
        assert_eq!(snap.applied_seq, 11);
        assert_eq!(snap.issued_seq, 12);
        assert!(snap.background_in_flight);
    }

    #[tokio::test(start_paused = true)]
    async fn test_previous_symbol_answer_discarded() {
        // SPY answers first, after the switch to QQQ was requested
        let source = ScriptedSource::new(vec![(1_000, Step::Ok("spy")), (5_000, Step::Ok("qqq"))]);
        let sched = scheduler(Arc::clone(&source), clock_at(11, 0));

        let spy = sched.refresh(RefreshTrigger::UserInitiated).await.unwrap();
        let qqq = sched.set_symbol("qqq").await.unwrap();

        spy.await.unwrap();
        let during = sched.snapshot().await;
        assert!(during.result.is_none());
        assert_eq!(during.applied_seq, 0);
        assert!(during.foreground_in_flight);

        qqq.await.unwrap();
        let snap = sched.snapshot().await;
        assert_eq!(kind(&snap).as_deref(), Some("qqq"));
        assert_eq!(snap.applied_seq, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_failure_does_not_clear_newer_result() {
        let source = ScriptedSource::new(vec![(5_000, Step::Fail), (0, Step::Ok("fresh"))]);
        let sched = scheduler(Arc::clone(&source), clock_at(11, 0));

        let stale = sched.refresh(RefreshTrigger::BackgroundScheduled).await.unwrap();
        sched.refresh(RefreshTrigger::UserInitiated).await.unwrap().await.unwrap();
        stale.await.unwrap();

        let snap = sched.snapshot().await;
        assert_eq!(kind(&snap).as_deref(), Some("fresh"));
        assert!(snap.last_error.is_none());
        assert!(!snap.background_in_flight);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_symbol_requests_new_ticker() {
        let source = ScriptedSource::new(vec![]);
        let sched = scheduler(Arc::clone(&source), clock_at(11, 0));

        sched.set_symbol(" aapl ").await.unwrap().await.unwrap();
        assert_eq!(source.requests.lock().unwrap()[0].symbol, "AAPL");
        assert_eq!(sched.snapshot().await.symbol, "AAPL");

        assert!(sched.set_symbol("  ").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_ticker() {
        let source = ScriptedSource::new(vec![]);
        let mut sched = scheduler(Arc::clone(&source), clock_at(10, 0));

        sched.start().await.unwrap().await.unwrap();
        assert!(sched.is_running());
        assert!(sched.start().await.is_none());

        sched.stop();
        assert!(!sched.is_running());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_ticker() {
        let source = ScriptedSource::new(vec![]);
        {
            let mut sched = scheduler(Arc::clone(&source), clock_at(10, 0));
            sched.start().await.unwrap().await.unwrap();
        }
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_fetch_still_clears_flags() {
        let source = ScriptedSource::new(vec![(0, Step::Panic)]);
        let sched = scheduler(Arc::clone(&source), clock_at(10, 0));

        sched.refresh(RefreshTrigger::UserInitiated).await.unwrap().await.unwrap();
        let snap = sched.snapshot().await;
        assert!(!snap.foreground_in_flight);
        assert!(snap.result.is_none());
        assert!(snap.last_error.unwrap().contains("panicked"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_notified_on_apply() {
        let source = ScriptedSource::new(vec![]);
        let sched = scheduler(Arc::clone(&source), clock_at(10, 0));
        let mut rx = sched.subscribe();

        sched.refresh(RefreshTrigger::UserInitiated).await.unwrap().await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 2);
        assert_eq!(sched.snapshot().await.applied_seq, 1);
    }
}
