use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use msgpump::{
    BackoffPolicy, Event, EventKind, HandlerError, HandlerFn, HandlerRef, JitterPolicy,
    LifecycleError, MemoryTransport, Receiver, ReceiverBuilder, ReceiverConfig, RunState,
    Subscribe, Transport, TransportError,
};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

enum Step {
    Batch(Vec<u32>),
    Fail,
    /// Never resolves and ignores cancellation.
    Hang,
}

#[derive(Default)]
struct ScriptedInner {
    steps: Mutex<VecDeque<Step>>,
    fail_setup: AtomicBool,
    creates: AtomicUsize,
    stops: AtomicUsize,
    fetches: AtomicUsize,
    requested: Mutex<Vec<usize>>,
    last_cancel: Mutex<Option<CancellationToken>>,
    cancel_seen_at_stop: AtomicBool,
}

/// Transport replaying a fixed script, then returning empty batches.
#[derive(Clone, Default)]
struct Scripted(Arc<ScriptedInner>);

impl Scripted {
    fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        let s = Self::default();
        s.0.steps.lock().unwrap().extend(steps);
        s
    }

    fn creates(&self) -> usize {
        self.0.creates.load(Ordering::SeqCst)
    }

    fn stops(&self) -> usize {
        self.0.stops.load(Ordering::SeqCst)
    }

    fn fetches(&self) -> usize {
        self.0.fetches.load(Ordering::SeqCst)
    }

    fn requested(&self) -> Vec<usize> {
        self.0.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for Scripted {
    type Message = u32;

    fn kind(&self) -> &str {
        "scripted"
    }

    async fn create_receiver(&self) -> Result<(), TransportError> {
        self.0.creates.fetch_add(1, Ordering::SeqCst);
        if self.0.fail_setup.load(Ordering::SeqCst) {
            return Err(TransportError::Connection {
                error: "broker unreachable".into(),
            });
        }
        Ok(())
    }

    async fn fetch_batch(
        &self,
        max: usize,
        cancel: CancellationToken,
    ) -> Result<Vec<u32>, TransportError> {
        self.0.fetches.fetch_add(1, Ordering::SeqCst);
        self.0.requested.lock().unwrap().push(max);
        *self.0.last_cancel.lock().unwrap() = Some(cancel);

        let step = self.0.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Batch(batch)) => Ok(batch),
            Some(Step::Fail) => Err(TransportError::Receive {
                error: "socket reset".into(),
            }),
            Some(Step::Hang) => std::future::pending().await,
            None => {
                tokio::time::sleep(Duration::from_millis(1)).await;
                Ok(Vec::new())
            }
        }
    }

    fn stop_receiver(&self) {
        self.0.stops.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = self.0.last_cancel.lock().unwrap().as_ref() {
            self.0
                .cancel_seen_at_stop
                .store(token.is_cancelled(), Ordering::SeqCst);
        }
    }
}

/// Counts handler invocations and the peak number running at once.
#[derive(Default)]
struct Tracker {
    active: AtomicUsize,
    peak: AtomicUsize,
    started: AtomicUsize,
    finished: AtomicUsize,
    seen: Mutex<Vec<u32>>,
}

impl Tracker {
    fn enter(&self, n: u32) {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(n);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.finished.fetch_add(1, Ordering::SeqCst);
    }

    fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    fn seen(&self) -> Vec<u32> {
        self.seen.lock().unwrap().clone()
    }
}

fn sleeping_handler(tracker: &Arc<Tracker>, pause: Duration) -> HandlerRef<u32> {
    let tracker = Arc::clone(tracker);
    HandlerFn::arc(move |n: u32| {
        let tracker = Arc::clone(&tracker);
        async move {
            tracker.enter(n);
            tokio::time::sleep(pause).await;
            tracker.exit();
            Ok(())
        }
    })
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    fn of_kind(&self, kind: EventKind) -> Vec<Event> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().unwrap().iter().map(|e| e.kind).collect()
    }
}

#[async_trait]
impl Subscribe for Recorder {
    async fn on_event(&self, event: &Event) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

fn config(max_concurrent: usize) -> ReceiverConfig {
    ReceiverConfig {
        max_concurrent,
        fetch_backoff: Some(BackoffPolicy {
            first: Duration::from_millis(1),
            max: Duration::from_millis(5),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }),
        ..ReceiverConfig::default()
    }
}

fn recorded<T: Transport>(transport: T, cfg: ReceiverConfig) -> (Receiver<T>, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let receiver = ReceiverBuilder::new(transport, cfg)
        .with_subscriber(recorder.clone())
        .build();
    (receiver, recorder)
}

async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_never_exceeds_limit() {
    // Batches of 10 regardless of the requested size.
    let steps = (0..5).map(|b| Step::Batch((b * 10..b * 10 + 10).collect()));
    let transport = Scripted::new(steps);
    let receiver = ReceiverBuilder::new(transport.clone(), config(3)).build();

    let tracker = Arc::new(Tracker::default());
    receiver
        .start(sleeping_handler(&tracker, Duration::from_millis(3)))
        .await
        .unwrap();
    wait_until("all 50 handled", || tracker.finished() == 50).await;
    receiver.dispose().await;

    assert!(tracker.peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(tracker.peak.load(Ordering::SeqCst), 3);
    let mut seen = tracker.seen();
    seen.sort_unstable();
    assert_eq!(seen, (0..50).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_start_twice_is_rejected() {
    let transport = Scripted::default();
    let receiver = ReceiverBuilder::new(transport.clone(), config(2)).build();
    let tracker = Arc::new(Tracker::default());

    receiver
        .start(sleeping_handler(&tracker, Duration::ZERO))
        .await
        .unwrap();
    let err = receiver
        .start(sleeping_handler(&tracker, Duration::ZERO))
        .await
        .unwrap_err();

    assert!(matches!(err, LifecycleError::AlreadyRunning));
    assert_eq!(err.as_label(), "lifecycle_already_running");
    assert_eq!(receiver.state(), RunState::Running);
    assert_eq!(transport.creates(), 1);
    receiver.dispose().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stop_waits_for_running_handlers() {
    let transport = Scripted::new([Step::Batch(vec![1, 2, 3, 4, 5])]);
    let (receiver, recorder) = recorded(transport.clone(), config(2));
    let tracker = Arc::new(Tracker::default());

    receiver
        .start(sleeping_handler(&tracker, Duration::from_millis(50)))
        .await
        .unwrap();
    wait_until("first handler", || tracker.started() >= 1).await;
    receiver.stop().await;

    assert_eq!(receiver.state(), RunState::Stopped);
    assert_eq!(tracker.active.load(Ordering::SeqCst), 0);
    assert_eq!(tracker.finished(), tracker.started());
    assert!(tracker.started() <= 2, "queued messages started");
    assert_eq!(transport.stops(), 1);

    // Messages 3..5 were cancelled while queued; that is not a failure.
    receiver.dispose().await;
    assert!(recorder.of_kind(EventKind::HandlerFailed).is_empty());
    assert!(recorder.of_kind(EventKind::FetchFailed).is_empty());
    assert_eq!(recorder.of_kind(EventKind::ReceiverStopped).len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_abandons_fetch_that_ignores_cancellation() {
    let transport = Scripted::new([Step::Hang]);
    let (receiver, recorder) = recorded(transport.clone(), config(4));
    let tracker = Arc::new(Tracker::default());

    receiver
        .start(sleeping_handler(&tracker, Duration::ZERO))
        .await
        .unwrap();
    wait_until("fetch in progress", || transport.fetches() == 1).await;

    let began = Instant::now();
    receiver.stop().await;
    assert!(began.elapsed() < Duration::from_millis(150));
    assert!(transport.0.cancel_seen_at_stop.load(Ordering::SeqCst));

    receiver.dispose().await;
    let abandoned = recorder.of_kind(EventKind::FetchAbandoned);
    assert_eq!(abandoned.len(), 1);
    assert_eq!(abandoned[0].requested, Some(4));
    assert_eq!(tracker.started(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_empty_batches_are_refetched() {
    let transport = Scripted::new([
        Step::Batch(vec![]),
        Step::Batch(vec![]),
        Step::Batch(vec![7]),
    ]);
    let receiver = ReceiverBuilder::new(transport.clone(), config(2)).build();
    let tracker = Arc::new(Tracker::default());

    receiver
        .start(sleeping_handler(&tracker, Duration::ZERO))
        .await
        .unwrap();
    wait_until("message 7", || tracker.finished() == 1).await;
    receiver.dispose().await;

    assert!(transport.fetches() >= 3);
    assert_eq!(tracker.seen(), vec![7]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failing_handler_is_reported_once_and_isolated() {
    let transport = Scripted::new([Step::Batch(vec![1, 2, 3, 4, 5])]);
    let (receiver, recorder) = recorded(transport, config(3));

    let ok = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ok);
    let handler: HandlerRef<u32> = HandlerFn::arc(move |n: u32| {
        let counter = Arc::clone(&counter);
        async move {
            if n == 3 {
                return Err(HandlerError::fail("poison message"));
            }
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    });

    receiver.start(handler).await.unwrap();
    wait_until("siblings handled", || ok.load(Ordering::SeqCst) == 4).await;
    receiver.dispose().await;

    let failed = recorder.of_kind(EventKind::HandlerFailed);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].label, Some("pump_handler_failed"));
    assert_eq!(failed[0].receiver_kind.as_deref(), Some("scripted"));
    let reason = failed[0].reason.as_deref().unwrap();
    assert!(reason.contains("poison message"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_panicking_handler_is_contained() {
    let transport = Scripted::new([Step::Batch(vec![1, 2, 3])]);
    let (receiver, recorder) = recorded(transport, config(2));

    let ok = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ok);
    let handler: HandlerRef<u32> = HandlerFn::arc(move |n: u32| {
        let counter = Arc::clone(&counter);
        async move {
            if n == 2 {
                panic!("handler blew up");
            }
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    });

    receiver.start(handler).await.unwrap();
    wait_until("siblings handled", || ok.load(Ordering::SeqCst) == 2).await;
    receiver.dispose().await;

    let failed = recorder.of_kind(EventKind::HandlerFailed);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].label, Some("pump_handler_panicked"));
    let reason = failed[0].reason.as_deref().unwrap();
    assert!(reason.contains("handler blew up"));
}

async fn count_reported_failures(messages: u32, cfg: ReceiverConfig) -> usize {
    let queue: MemoryTransport<u32> = MemoryTransport::new();
    queue.extend(0..messages);
    let (receiver, recorder) = recorded(queue, cfg);

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let handler: HandlerRef<u32> = HandlerFn::arc(move |n: u32| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(HandlerError::fail(format!("reject {n}")))
        }
    });

    receiver.start(handler).await.unwrap();
    let total = messages as usize;
    wait_until("every handler", || calls.load(Ordering::SeqCst) == total).await;
    receiver.dispose().await;

    recorder.of_kind(EventKind::HandlerFailed).len()
}

#[tokio::test(flavor = "current_thread")]
async fn test_failure_burst_survives_a_tiny_ring() {
    let cfg = ReceiverConfig {
        bus_capacity: 4,
        ..config(64)
    };
    assert_eq!(count_reported_failures(200, cfg).await, 200);
}

#[tokio::test(flavor = "current_thread")]
async fn test_failure_burst_with_default_ring() {
    let reported = count_reported_failures(5000, config(4096)).await;
    assert_eq!(reported, 5000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_third_message_waits_for_a_free_permit() {
    let transport = Scripted::new([Step::Batch(vec![1, 2, 3])]);
    let receiver = ReceiverBuilder::new(transport.clone(), config(2)).build();

    let release = Arc::new(Semaphore::new(0));
    let tracker = Arc::new(Tracker::default());
    let handler: HandlerRef<u32> = {
        let release = Arc::clone(&release);
        let tracker = Arc::clone(&tracker);
        HandlerFn::arc(move |n: u32| {
            let release = Arc::clone(&release);
            let tracker = Arc::clone(&tracker);
            async move {
                tracker.enter(n);
                if n != 3 {
                    release.acquire().await.unwrap().forget();
                }
                tracker.exit();
                Ok(())
            }
        })
    };

    receiver.start(handler).await.unwrap();
    wait_until("m1 and m2 running", || tracker.started() == 2).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    let mut running = tracker.seen();
    running.sort_unstable();
    assert_eq!(running, vec![1, 2]);
    assert_eq!(transport.requested()[0], 2);

    release.add_permits(1);
    wait_until("m3 ran", || tracker.seen().contains(&3)).await;
    assert_eq!(tracker.peak.load(Ordering::SeqCst), 2);

    release.add_permits(1);
    wait_until("all done", || tracker.finished() == 3).await;
    receiver.dispose().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_immediate_stop_then_dispose() {
    let queue: MemoryTransport<u32> = MemoryTransport::new();
    let (receiver, recorder) = recorded(queue.clone(), config(4));
    let tracker = Arc::new(Tracker::default());

    receiver
        .start(sleeping_handler(&tracker, Duration::ZERO))
        .await
        .unwrap();
    receiver.stop().await;
    receiver.dispose().await;

    assert_eq!(receiver.state(), RunState::Disposed);
    assert_eq!(tracker.started(), 0);
    assert!(!queue.is_open());
    // The first fetch may or may not have begun before stop.
    let kinds: Vec<_> = recorder
        .kinds()
        .into_iter()
        .filter(|k| *k != EventKind::FetchAbandoned)
        .collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::ReceiverStarted,
            EventKind::StopRequested,
            EventKind::ReceiverStopped,
            EventKind::ReceiverDisposed,
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_setup_failure_leaves_receiver_restartable() {
    let transport = Scripted::default();
    transport.0.fail_setup.store(true, Ordering::SeqCst);
    let receiver = ReceiverBuilder::new(transport.clone(), config(2)).build();
    let tracker = Arc::new(Tracker::default());

    let err = receiver
        .start(sleeping_handler(&tracker, Duration::ZERO))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::Setup(TransportError::Connection { .. })
    ));
    assert_eq!(receiver.state(), RunState::Stopped);
    assert_eq!(transport.fetches(), 0);

    transport.0.fail_setup.store(false, Ordering::SeqCst);
    receiver
        .start(sleeping_handler(&tracker, Duration::ZERO))
        .await
        .unwrap();
    assert_eq!(receiver.state(), RunState::Running);
    assert_eq!(transport.creates(), 2);
    receiver.dispose().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_restart_after_stop() {
    let queue: MemoryTransport<u32> = MemoryTransport::new();
    let receiver = ReceiverBuilder::new(queue.clone(), config(2)).build();
    let tracker = Arc::new(Tracker::default());

    queue.push(1);
    receiver
        .start(sleeping_handler(&tracker, Duration::ZERO))
        .await
        .unwrap();
    wait_until("first cycle", || tracker.finished() == 1).await;
    receiver.stop().await;
    assert_eq!(receiver.state(), RunState::Stopped);

    queue.push(2);
    receiver
        .start(sleeping_handler(&tracker, Duration::ZERO))
        .await
        .unwrap();
    wait_until("second cycle", || tracker.finished() == 2).await;
    receiver.dispose().await;

    assert_eq!(tracker.seen(), vec![1, 2]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dispose_is_terminal_and_idempotent() {
    let transport = Scripted::default();
    let receiver = ReceiverBuilder::new(transport.clone(), config(2)).build();
    let tracker = Arc::new(Tracker::default());

    receiver.dispose().await;
    receiver.dispose().await;
    assert_eq!(receiver.state(), RunState::Disposed);

    let err = receiver
        .start(sleeping_handler(&tracker, Duration::ZERO))
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Disposed));
    assert_eq!(transport.creates(), 0);
    assert_eq!(transport.stops(), 0);

    // stop on a disposed receiver is a no-op
    receiver.stop().await;
    assert_eq!(receiver.state(), RunState::Disposed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_fetch_failures_are_reported_and_retried() {
    let transport = Scripted::new([Step::Fail, Step::Fail, Step::Batch(vec![9])]);
    let (receiver, recorder) = recorded(transport, config(2));
    let tracker = Arc::new(Tracker::default());

    receiver
        .start(sleeping_handler(&tracker, Duration::ZERO))
        .await
        .unwrap();
    wait_until("message after failures", || tracker.finished() == 1).await;
    receiver.dispose().await;

    let failed = recorder.of_kind(EventKind::FetchFailed);
    assert_eq!(failed.len(), 2);
    assert_eq!(failed[0].label, Some("pump_fetch_failed"));
    assert_eq!(failed[0].attempt, Some(1));
    assert_eq!(failed[0].delay_ms, Some(1));
    assert_eq!(failed[1].attempt, Some(2));
    assert_eq!(failed[1].delay_ms, Some(2));
    let reason = failed[0].reason.as_deref().unwrap();
    assert!(reason.contains("socket reset"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_fetch_timeout_is_reported_and_loop_continues() {
    let transport = Scripted::new([Step::Hang, Step::Batch(vec![5])]);
    let cfg = ReceiverConfig {
        fetch_timeout: Duration::from_millis(20),
        fetch_backoff: None,
        ..config(2)
    };
    let (receiver, recorder) = recorded(transport, cfg);
    let tracker = Arc::new(Tracker::default());

    receiver
        .start(sleeping_handler(&tracker, Duration::ZERO))
        .await
        .unwrap();
    wait_until("message after timeout", || tracker.finished() == 1).await;
    receiver.dispose().await;

    let failed = recorder.of_kind(EventKind::FetchFailed);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].label, Some("pump_fetch_timeout"));
    assert_eq!(failed[0].delay_ms, None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_requested_size_follows_free_permits_and_batch_cap() {
    let transport = Scripted::default();
    let receiver = ReceiverBuilder::new(transport.clone(), config(4)).build();
    let tracker = Arc::new(Tracker::default());
    receiver
        .start(sleeping_handler(&tracker, Duration::ZERO))
        .await
        .unwrap();
    wait_until("a few fetches", || transport.fetches() >= 3).await;
    receiver.dispose().await;
    assert!(transport.requested().iter().all(|&n| n == 4));

    let capped = Scripted::default();
    let cfg = ReceiverConfig {
        max_batch: 2,
        ..config(4)
    };
    let receiver = ReceiverBuilder::new(capped.clone(), cfg).build();
    receiver
        .start(sleeping_handler(&tracker, Duration::ZERO))
        .await
        .unwrap();
    wait_until("a few fetches", || capped.fetches() >= 3).await;
    receiver.dispose().await;
    assert!(capped.requested().iter().all(|&n| n == 2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_default_id_and_named_receiver() {
    let named = ReceiverBuilder::new(
        Scripted::default(),
        ReceiverConfig {
            name: Some("orders".into()),
            ..ReceiverConfig::default()
        },
    )
    .build();
    assert_eq!(named.id(), "orders");
    assert_eq!(named.kind(), "scripted");

    let anonymous = ReceiverBuilder::new(Scripted::default(), ReceiverConfig::default()).build();
    assert!(anonymous.id().starts_with("scripted-"));
    assert_eq!(anonymous.state(), RunState::Stopped);
}
