//! Poll scheduler.
//!
//! Drives the fetcher on a fixed interval and on demand, with at most one
//! fetch outstanding at any time:
//!
//! ```text
//! Idle --(tick | trigger)--> InFlight --(fetch done, ok or err)--> Idle
//!   any --(stop)--> Stopped
//! ```
//!
//! A trigger that arrives while a fetch is in flight is dropped, not queued.
//! Because only one fetch ever runs, published updates are ordered by
//! completion time without further bookkeeping.
//!
//! Failures are reported to the sink once and never end the polling loop;
//! the last published update stays in place until the next good cycle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::error::PollError;
use crate::fetcher::ReadingSource;
use crate::pipeline::{render_update, DisplayUpdate, RenderSettings};
use crate::sink::{deliver, DisplaySink};

// ---

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    InFlight,
    Stopped,
}

/// Result of asking the scheduler to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Started,
    /// A fetch was already in flight; this request was dropped.
    Coalesced,
    Stopped,
}

#[derive(Debug, Clone, Copy)]
enum Origin {
    Timer,
    Manual,
}

/// Fetch once and render the result as of `now`.
pub async fn run_once<S: ReadingSource>(
    source: &S,
    settings: &RenderSettings,
    now: DateTime<Utc>,
) -> Result<DisplayUpdate, PollError> {
    // ---
    let reading = source.fetch().await?;
    Ok(render_update(&reading, settings, now)?)
}

struct Shared<S, K> {
    source: S,
    sink: K,
    settings: RenderSettings,
    state: Mutex<PollState>,
    latest: Mutex<Option<DisplayUpdate>>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    runtime: Handle,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to a running poll loop.
///
/// Must be started inside a Tokio runtime; after that, `trigger` may be
/// called from any thread.
pub struct PollScheduler<S, K> {
    shared: Arc<Shared<S, K>>,
}

impl<S: ReadingSource, K: DisplaySink> PollScheduler<S, K> {
    /// Start polling. The first fetch is issued immediately.
    pub fn start(source: S, sink: K, settings: RenderSettings, period: Duration) -> Self {
        // ---
        let shared = Arc::new(Shared {
            source,
            sink,
            settings,
            state: Mutex::new(PollState::Idle),
            latest: Mutex::new(None),
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
            runtime: Handle::current(),
        });

        let timer = Arc::clone(&shared);
        shared
            .tracker
            .spawn_on(run_timer(timer, period), &shared.runtime);

        info!("Poll scheduler started, interval {:?}", period);
        PollScheduler { shared }
    }

    /// Request an immediate poll, subject to in-flight exclusion.
    pub fn trigger(&self) -> TriggerOutcome {
        trigger(&self.shared, Origin::Manual)
    }

    pub fn state(&self) -> PollState {
        *lock(&self.shared.state)
    }

    /// Last successfully published update, if any.
    pub fn latest(&self) -> Option<DisplayUpdate> {
        lock(&self.shared.latest).clone()
    }

    /// Cancel the timer and any in-flight fetch, then wait for every task.
    ///
    /// Nothing is published or reported once this returns.
    pub async fn stop(&self) {
        // ---
        *lock(&self.shared.state) = PollState::Stopped;
        self.shared.cancel.cancel();
        self.shared.tracker.close();
        self.shared.tracker.wait().await;
        info!("Poll scheduler stopped");
    }
}

impl<S, K> Drop for PollScheduler<S, K> {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

fn trigger<S: ReadingSource, K: DisplaySink>(
    shared: &Arc<Shared<S, K>>,
    origin: Origin,
) -> TriggerOutcome {
    // ---
    let mut state = lock(&shared.state);
    match *state {
        PollState::Stopped => TriggerOutcome::Stopped,
        PollState::InFlight => {
            debug!(?origin, "Fetch already in flight, dropping trigger");
            TriggerOutcome::Coalesced
        }
        PollState::Idle => {
            *state = PollState::InFlight;
            // Spawn under the lock so stop() cannot slip in between.
            let cycle = Arc::clone(shared);
            shared
                .tracker
                .spawn_on(async move { cycle.run_cycle(origin).await }, &shared.runtime);
            TriggerOutcome::Started
        }
    }
}

async fn run_timer<S: ReadingSource, K: DisplaySink>(shared: Arc<Shared<S, K>>, period: Duration) {
    // ---
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => break,
            _ = ticker.tick() => {
                if trigger(&shared, Origin::Timer) == TriggerOutcome::Stopped {
                    break;
                }
            }
        }
    }
    debug!("Poll timer stopped");
}

/// Returns the scheduler to `Idle` when a cycle ends, including by panic
/// in a sink or cancellation of the cycle future.
struct CycleGuard<'a>(&'a Mutex<PollState>);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        let mut state = lock(self.0);
        if *state == PollState::InFlight {
            *state = PollState::Idle;
        }
    }
}

impl<S: ReadingSource, K: DisplaySink> Shared<S, K> {
    async fn run_cycle(&self, origin: Origin) {
        // ---
        let _guard = CycleGuard(&self.state);
        debug!(?origin, "Poll cycle started");

        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!("In-flight fetch cancelled");
                return;
            }
            outcome = run_once(&self.source, &self.settings, Utc::now()) => outcome,
        };

        match &outcome {
            Ok(update) => debug!("Poll cycle succeeded: {}", update.label_text()),
            Err(e) => warn!("Poll cycle failed: {}", e),
        }
        if deliver(&self.sink, &outcome) {
            *lock(&self.latest) = outcome.ok();
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::error::{ErrorKind, FetchError};
    use crate::models::{Direction, Reading};
    use crate::pipeline::DirectionIcons;
    use chrono::TimeZone;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::{Notify, Semaphore};
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);
    const NEVER: Duration = Duration::from_secs(3600);

    struct Script {
        calls: AtomicUsize,
        started: Notify,
        gate: Semaphore,
        results: Mutex<VecDeque<Result<Reading, FetchError>>>,
    }

    /// Source that blocks on a gate and replays scripted results.
    #[derive(Clone)]
    struct ScriptedSource(Arc<Script>);

    impl ScriptedSource {
        fn new(open: bool, results: Vec<Result<Reading, FetchError>>) -> Self {
            let permits = if open { Semaphore::MAX_PERMITS } else { 0 };
            ScriptedSource(Arc::new(Script {
                calls: AtomicUsize::new(0),
                started: Notify::new(),
                gate: Semaphore::new(permits),
                results: Mutex::new(results.into()),
            }))
        }

        fn calls(&self) -> usize {
            self.0.calls.load(Ordering::SeqCst)
        }

        fn open_gate(&self) {
            self.0.gate.add_permits(Semaphore::MAX_PERMITS);
        }
    }

    impl ReadingSource for ScriptedSource {
        async fn fetch(&self) -> Result<Reading, FetchError> {
            self.0.calls.fetch_add(1, Ordering::SeqCst);
            self.0.started.notify_one();
            let _permit = self
                .0
                .gate
                .acquire()
                .await
                .map_err(|e| FetchError::Transport(e.to_string()))?;
            lock(&self.0.results)
                .pop_front()
                .unwrap_or_else(|| Ok(reading()))
        }
    }

    #[derive(Default)]
    struct Recorded {
        updates: Mutex<Vec<DisplayUpdate>>,
        errors: Mutex<Vec<(ErrorKind, String)>>,
        event: Notify,
    }

    #[derive(Clone, Default)]
    struct RecordingSink(Arc<Recorded>);

    impl RecordingSink {
        fn updates(&self) -> Vec<DisplayUpdate> {
            lock(&self.0.updates).clone()
        }

        fn errors(&self) -> Vec<(ErrorKind, String)> {
            lock(&self.0.errors).clone()
        }

        async fn next_event(&self) {
            timeout(WAIT, self.0.event.notified())
                .await
                .expect("sink event");
        }
    }

    impl DisplaySink for RecordingSink {
        fn publish(&self, update: &DisplayUpdate) {
            lock(&self.0.updates).push(update.clone());
            self.0.event.notify_one();
        }

        fn report_error(&self, error: &PollError) {
            lock(&self.0.errors).push((error.kind(), error.to_string()));
            self.0.event.notify_one();
        }
    }

    fn reading() -> Reading {
        Reading {
            sgv: 120.0,
            delta: -3.0,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            direction: Direction::Flat,
        }
    }

    fn settings(units: &str) -> RenderSettings {
        RenderSettings {
            label: "{sgv}{direction}".into(),
            tooltip: "({sgv_delta})".into(),
            direction_icons: DirectionIcons::default(),
            units: units.into(),
        }
    }

    async fn wait_started(source: &ScriptedSource) {
        timeout(WAIT, source.0.started.notified())
            .await
            .expect("fetch started");
    }

    async fn trigger_when_idle<S: ReadingSource, K: DisplaySink>(scheduler: &PollScheduler<S, K>) {
        // ---
        timeout(WAIT, async {
            while scheduler.trigger() != TriggerOutcome::Started {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("scheduler became idle");
    }

    #[tokio::test]
    async fn test_triggers_while_in_flight_are_dropped() {
        // ---
        let source = ScriptedSource::new(false, vec![]);
        let sink = RecordingSink::default();
        let scheduler = PollScheduler::start(source.clone(), sink.clone(), settings("mg/dl"), NEVER);

        wait_started(&source).await;
        assert_eq!(scheduler.state(), PollState::InFlight);
        assert_eq!(scheduler.trigger(), TriggerOutcome::Coalesced);
        assert_eq!(scheduler.trigger(), TriggerOutcome::Coalesced);

        source.open_gate();
        sink.next_event().await;
        scheduler.stop().await;

        assert_eq!(source.calls(), 1);
        assert_eq!(sink.updates().len(), 1);
        assert!(sink.errors().is_empty());
    }

    #[tokio::test]
    async fn test_failure_keeps_last_update() {
        // ---
        let source = ScriptedSource::new(
            true,
            vec![
                Ok(reading()),
                Err(FetchError::BadStatus(500)),
                Err(FetchError::MalformedResponse("missing field `direction`".into())),
            ],
        );
        let sink = RecordingSink::default();
        let scheduler = PollScheduler::start(source.clone(), sink.clone(), settings("mg/dl"), NEVER);

        sink.next_event().await;
        let first = scheduler.latest().expect("first update");
        assert_eq!(first.state.sgv, "120");
        assert_eq!(first.label_text(), "120➡️");

        trigger_when_idle(&scheduler).await;
        sink.next_event().await;
        trigger_when_idle(&scheduler).await;
        sink.next_event().await;
        scheduler.stop().await;

        assert_eq!(scheduler.latest(), Some(first));
        assert_eq!(sink.updates().len(), 1);

        let errors = sink.errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].0, ErrorKind::BadStatus);
        assert!(errors[0].1.contains("500"));
        assert_eq!(errors[1].0, ErrorKind::MalformedResponse);
    }

    #[tokio::test]
    async fn test_wrong_units_reported_without_update() {
        // ---
        let source = ScriptedSource::new(true, vec![]);
        let sink = RecordingSink::default();
        let scheduler = PollScheduler::start(source.clone(), sink.clone(), settings("mmol"), NEVER);

        sink.next_event().await;
        scheduler.stop().await;

        assert!(sink.updates().is_empty());
        assert_eq!(
            sink.errors(),
            vec![(
                ErrorKind::InvalidConfiguration,
                "Wrong measurement units".to_string()
            )]
        );
        assert_eq!(scheduler.latest(), None);
    }

    #[tokio::test]
    async fn test_stop_cancels_in_flight_fetch() {
        // ---
        let source = ScriptedSource::new(false, vec![]);
        let sink = RecordingSink::default();
        let scheduler = PollScheduler::start(source.clone(), sink.clone(), settings("mg/dl"), NEVER);

        wait_started(&source).await;
        timeout(WAIT, scheduler.stop()).await.expect("stop completes");

        // Opening the gate after stop must not produce a late publish.
        source.open_gate();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(scheduler.state(), PollState::Stopped);
        assert_eq!(scheduler.trigger(), TriggerOutcome::Stopped);
        assert!(sink.updates().is_empty());
        assert!(sink.errors().is_empty());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_timer_polls_repeatedly() {
        // ---
        let source = ScriptedSource::new(true, vec![]);
        let sink = RecordingSink::default();
        let scheduler = PollScheduler::start(
            source.clone(),
            sink.clone(),
            settings("mg/dl"),
            Duration::from_millis(20),
        );

        timeout(WAIT, async {
            while sink.updates().len() < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("three timer cycles");
        scheduler.stop().await;

        assert!(source.calls() >= 3);
        let updates = sink.updates();
        assert!(updates.windows(2).all(|w| w[0].label == w[1].label));
    }

    /// Sink whose first publish panics; later events are recorded.
    #[derive(Clone, Default)]
    struct PanicOnceSink {
        panicked: Arc<AtomicUsize>,
        inner: RecordingSink,
    }

    impl DisplaySink for PanicOnceSink {
        fn publish(&self, update: &DisplayUpdate) {
            if self.panicked.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("display went away");
            }
            self.inner.publish(update);
        }

        fn report_error(&self, error: &PollError) {
            self.inner.report_error(error);
        }
    }

    #[tokio::test]
    async fn test_sink_panic_does_not_wedge_scheduler() {
        // ---
        let source = ScriptedSource::new(true, vec![]);
        let sink = PanicOnceSink::default();
        let scheduler = PollScheduler::start(source.clone(), sink.clone(), settings("mg/dl"), NEVER);

        timeout(WAIT, async {
            while source.calls() == 0 || scheduler.state() != PollState::Idle {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("state released after panic");
        assert_eq!(scheduler.latest(), None);

        trigger_when_idle(&scheduler).await;
        sink.inner.next_event().await;
        scheduler.stop().await;

        assert_eq!(source.calls(), 2);
        assert_eq!(sink.inner.updates().len(), 1);
        assert!(scheduler.latest().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_trigger_from_outside_runtime() {
        // ---
        let source = ScriptedSource::new(true, vec![]);
        let sink = RecordingSink::default();
        let scheduler = PollScheduler::start(source.clone(), sink.clone(), settings("mg/dl"), NEVER);

        sink.next_event().await;
        timeout(WAIT, async {
            while scheduler.state() != PollState::Idle {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("first cycle finished");

        let outcome = std::thread::scope(|s| s.spawn(|| scheduler.trigger()).join().unwrap());
        assert_eq!(outcome, TriggerOutcome::Started);

        sink.next_event().await;
        scheduler.stop().await;

        assert_eq!(source.calls(), 2);
        assert_eq!(sink.updates().len(), 2);
    }

    #[tokio::test]
    async fn test_run_once() {
        // ---
        let source = ScriptedSource::new(true, vec![Err(FetchError::Transport("refused".into()))]);
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 2, 0).unwrap();

        let err = run_once(&source, &settings("mg/dl"), now).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);

        let update = run_once(&source, &settings("mmol/l"), now).await.unwrap();
        assert_eq!(update.state.sgv, "6.7");
        assert_eq!(update.state.delta_time_in_minutes, "2");
    }
}
