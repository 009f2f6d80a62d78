#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use queue_actors::JobQueue;
use queue_core::{
    EnqueueError, JobItem, QueueConfig, QueueStats, ReadyNotifier, StartOutcome, ready_channel,
};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn config(threads: usize, size: usize, parallel: usize) -> QueueConfig {
    QueueConfig::new("test")
        .with_max_threads(threads)
        .with_max_queue_size(size)
        .with_max_parallel_pending_work_count(parallel)
        .with_sweep_interval(Duration::from_millis(20))
        .with_trace_processing_threads(true)
}

/// Owner object handed to the queue.
#[derive(Debug, Default)]
pub struct Root;

pub async fn start_queue(config: QueueConfig) -> JobQueue {
    init_tracing();
    JobQueue::start(config, Arc::new(Root)).await.unwrap()
}

/// Manual-reset event for holding routines in place.
#[derive(Clone, Default)]
pub struct Gate {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Gate {
    pub fn open(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap() = true;
        cvar.notify_all();
    }

    pub fn wait(&self) {
        let (lock, cvar) = &*self.inner;
        let mut open = lock.lock().unwrap();
        while !*open {
            open = cvar.wait(open).unwrap();
        }
    }
}

/// Notifiers collected from asynchronous starts.
#[derive(Clone, Default)]
pub struct Readiness {
    notifiers: Arc<Mutex<Vec<ReadyNotifier>>>,
}

impl Readiness {
    fn push(&self, notifier: ReadyNotifier) {
        self.notifiers.lock().unwrap().push(notifier);
    }

    pub fn parked(&self) -> usize {
        self.notifiers.lock().unwrap().len()
    }

    /// Fire the oldest collected notifier.
    pub fn fire_one(&self) -> bool {
        let mut notifiers = self.notifiers.lock().unwrap();
        if notifiers.is_empty() {
            return false;
        }
        notifiers.remove(0).notify();
        true
    }

    pub fn fire_all(&self) -> usize {
        let drained: Vec<_> = self.notifiers.lock().unwrap().drain(..).collect();
        let count = drained.len();
        for notifier in drained {
            notifier.notify();
        }
        count
    }
}

/// Hook counters shared by a group of test jobs.
#[derive(Default)]
pub struct Probe {
    pub started: AtomicUsize,
    pub finish_entered: AtomicUsize,
    pub finished: AtomicUsize,
    pub timed_out: AtomicUsize,
    pub enqueue_failed: AtomicUsize,
    running: AtomicUsize,
    pub max_running: AtomicUsize,
    /// Tags of tagged jobs, in start order.
    order: Mutex<Vec<usize>>,
}

impl Probe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn finish_entered(&self) -> usize {
        self.finish_entered.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn timed_out(&self) -> usize {
        self.timed_out.load(Ordering::SeqCst)
    }

    pub fn enqueue_failed(&self) -> usize {
        self.enqueue_failed.load(Ordering::SeqCst)
    }

    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    pub fn order(&self) -> Vec<usize> {
        self.order.lock().unwrap().clone()
    }

    fn enter(&self) {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.running.fetch_sub(1, Ordering::SeqCst);
    }
}

enum Mode {
    Sync,
    Async(Readiness),
    /// Goes asynchronous and signals readiness before returning.
    AsyncImmediate,
    /// Goes asynchronous and drops the notifier.
    AsyncAbandoned,
    Panic,
}

/// Configurable job recording its hooks on a [`Probe`].
pub struct TestJob {
    probe: Arc<Probe>,
    mode: Mode,
    start_gate: Option<Gate>,
    finish_gate: Option<Gate>,
    timeout: Option<Duration>,
    tag: Option<usize>,
}

impl TestJob {
    pub fn sync(probe: &Arc<Probe>) -> Self {
        Self::with_mode(probe, Mode::Sync)
    }

    pub fn asynchronous(probe: &Arc<Probe>, readiness: &Readiness) -> Self {
        Self::with_mode(probe, Mode::Async(readiness.clone()))
    }

    pub fn async_immediate(probe: &Arc<Probe>) -> Self {
        Self::with_mode(probe, Mode::AsyncImmediate)
    }

    pub fn async_abandoned(probe: &Arc<Probe>) -> Self {
        Self::with_mode(probe, Mode::AsyncAbandoned)
    }

    pub fn panicking(probe: &Arc<Probe>) -> Self {
        Self::with_mode(probe, Mode::Panic)
    }

    fn with_mode(probe: &Arc<Probe>, mode: Mode) -> Self {
        Self {
            probe: probe.clone(),
            mode,
            start_gate: None,
            finish_gate: None,
            timeout: None,
            tag: None,
        }
    }

    pub fn hold_start(mut self, gate: &Gate) -> Self {
        self.start_gate = Some(gate.clone());
        self
    }

    pub fn hold_finish(mut self, gate: &Gate) -> Self {
        self.finish_gate = Some(gate.clone());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn tagged(mut self, tag: usize) -> Self {
        self.tag = Some(tag);
        self
    }
}

impl JobItem for TestJob {
    fn desc(&self) -> &str {
        "test-job"
    }

    fn work_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn start_work(&mut self) -> StartOutcome {
        self.probe.started.fetch_add(1, Ordering::SeqCst);
        if let Some(tag) = self.tag {
            self.probe.order.lock().unwrap().push(tag);
        }
        self.probe.enter();
        if let Some(gate) = &self.start_gate {
            gate.wait();
        }
        self.probe.leave();

        match &self.mode {
            Mode::Sync => StartOutcome::Completed,
            Mode::Async(readiness) => {
                let (notifier, signal) = ready_channel();
                readiness.push(notifier);
                StartOutcome::Pending(signal)
            }
            Mode::AsyncImmediate => {
                let (notifier, signal) = ready_channel();
                notifier.notify();
                StartOutcome::Pending(signal)
            }
            Mode::AsyncAbandoned => {
                let (_notifier, signal) = ready_channel();
                StartOutcome::Pending(signal)
            }
            Mode::Panic => panic!("intentional test panic"),
        }
    }

    fn end_work(&mut self) {
        self.probe.finish_entered.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.finish_gate {
            gate.wait();
        }
        self.probe.finished.fetch_add(1, Ordering::SeqCst);
    }

    fn on_start_work_timed_out(&mut self) {
        self.probe.timed_out.fetch_add(1, Ordering::SeqCst);
    }

    fn on_enqueue_failed(&mut self, reason: EnqueueError) {
        assert_eq!(reason, EnqueueError::QueueFull);
        self.probe.enqueue_failed.fetch_add(1, Ordering::SeqCst);
    }
}

const WAIT_LIMIT: Duration = Duration::from_secs(10);

/// Poll queue stats until `pred` holds.
pub async fn wait_for_stats(
    queue: &JobQueue,
    what: &str,
    pred: impl Fn(&QueueStats) -> bool,
) -> QueueStats {
    let deadline = Instant::now() + WAIT_LIMIT;
    loop {
        let stats = queue.stats().await.unwrap();
        if pred(&stats) {
            return stats;
        }
        assert!(
            Instant::now() < deadline,
            "timed out waiting for {what}: {stats:?}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Poll until `cond` holds.
pub async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + WAIT_LIMIT;
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
