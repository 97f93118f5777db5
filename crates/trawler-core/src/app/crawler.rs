//! Crawler - ディスパッチャ本体
//!
//! # 設計メモ
//! - 設定系（`register_*` / `set_*`）は `&mut self`、実行系（`submit` / `run`）は `&self`。
//!   run 中の登録は借用チェッカーが禁止する
//! - ワーカーは `std::thread::scope` で起動し、`run` から抜ける前に必ず join する
//! - 停止は 2 系統
//!   - drain: outstanding が 0 になったら Stop をワーカー数だけ投入
//!   - abort: キャンセルフラグを立て、Abort をワーカー数だけ投入（バックログは捨てる）

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, error, info, info_span, warn};

use super::config::CrawlerConfig;
use super::status::{RunReport, Stats};
use super::worker_loop;
use crate::domain::{
    CrawlEvent, CrawlerError, EventKind, Follow, Outcome, Signal, Task, TaskError, TaskId,
};
use crate::filter::{Filter, FilterChain};
use crate::ports::{
    ArgsSeeder, Client, Clock, EventSink, IdGenerator, Seeder, SystemClock, TracingSink,
    UlidGenerator,
};
use crate::queue::TaskQueue;
use crate::routing::{Context, Handler, HandlerRegistry, RoutineFactory};

/// What `submit` did with a task.
///
/// Unmatched and filtered-out tasks are dropped, not errors; they are also
/// reported to the event sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Queued(TaskId),
    Unmatched,
    FilteredOut,
    /// Sentinel pushed as is.
    Signal(Signal),
}

impl Admission {
    pub fn is_queued(&self) -> bool {
        matches!(self, Admission::Queued(_))
    }
}

/// Pool-wide cancellation state shared with `CancelHandle`s.
pub(crate) struct Shutdown<C> {
    cancelled: AtomicBool,
    workers: AtomicUsize,
    /// Workers that have not exited yet.
    live: AtomicUsize,
    queue: Arc<TaskQueue<C>>,
}

impl<C> Shutdown<C> {
    fn new(queue: Arc<TaskQueue<C>>) -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            workers: AtomicUsize::new(0),
            live: AtomicUsize::new(0),
            queue,
        }
    }

    /// Record the pool size. Wakes the pool right away when cancellation
    /// already happened.
    fn arm(&self, workers: usize) {
        self.workers.store(workers, Ordering::SeqCst);
        self.live.store(workers, Ordering::SeqCst);
        if self.is_cancelled() {
            self.wake_workers(workers);
        }
    }

    /// Set the cancel flag. Only the first call has an effect; returns
    /// whether this call was it.
    pub(crate) fn trigger(&self) -> bool {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.queue.interrupt();
        self.wake_workers(self.workers.load(Ordering::SeqCst));
        true
    }

    /// Called once by every worker on its way out. The last one closes the
    /// queue, so `run` stops waiting for work nobody can execute.
    pub(crate) fn worker_exited(&self) {
        if self.live.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.queue.close();
        }
    }

    fn wake_workers(&self, count: usize) {
        for _ in 0..count {
            self.queue.push(Task::abort());
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Cancels a crawl from any thread.
///
/// Tasks already executing run to completion; nothing new starts.
pub struct CancelHandle<C> {
    shutdown: Arc<Shutdown<C>>,
}

impl<C> CancelHandle<C> {
    pub fn cancel(&self) {
        if self.shutdown.trigger() {
            info!("cancellation requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl<C> Clone for CancelHandle<C> {
    fn clone(&self) -> Self {
        Self {
            shutdown: Arc::clone(&self.shutdown),
        }
    }
}

impl<C> fmt::Debug for CancelHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Task dispatcher: handler routing, admission filters, a priority queue and
/// a pool of worker threads.
///
/// # 使用例
/// ```ignore
/// let mut crawler = Crawler::new(DirectClient::new());
/// crawler.register_fn(r"//example\.com/", 0, |ctx| Ok(Outcome::done()))?;
/// crawler.register_filter(DedupFilter::new());
/// let report = crawler.run(&["https://example.com/".into()], 4)?;
/// ```
pub struct Crawler<C: Client> {
    registry: HandlerRegistry<C>,
    filters: Mutex<FilterChain<C>>,
    pub(super) queue: Arc<TaskQueue<C>>,
    pub(super) client: C,
    seeder: Box<dyn Seeder<C>>,
    sink: Box<dyn EventSink>,
    clock: Arc<dyn Clock>,
    ids: Box<dyn IdGenerator>,
    config: CrawlerConfig,
    stats: Stats,
    pub(super) shutdown: Arc<Shutdown<C>>,
    started: AtomicBool,
}

impl<C: Client> Crawler<C> {
    /// Crawler with the default configuration, `ArgsSeeder`, `TracingSink`
    /// and the system clock.
    pub fn new(client: C) -> Self {
        let queue = Arc::new(TaskQueue::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            registry: HandlerRegistry::new(),
            filters: Mutex::new(FilterChain::new()),
            shutdown: Arc::new(Shutdown::new(Arc::clone(&queue))),
            queue,
            client,
            seeder: Box::new(ArgsSeeder),
            sink: Box::new(TracingSink),
            ids: Box::new(UlidGenerator::new(Arc::clone(&clock))),
            clock,
            config: CrawlerConfig::default(),
            stats: Stats::default(),
            started: AtomicBool::new(false),
        }
    }

    pub fn with_config(client: C, config: CrawlerConfig) -> Result<Self, CrawlerError> {
        let mut crawler = Self::new(client);
        crawler.set_config(config)?;
        Ok(crawler)
    }

    pub fn set_config(&mut self, config: CrawlerConfig) -> Result<(), CrawlerError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Compile `pattern` and register the handler. An invalid pattern fails
    /// here, never at dispatch time.
    pub fn register_handler(
        &mut self,
        pattern: &str,
        priority: i64,
        routine: RoutineFactory<C>,
    ) -> Result<Arc<Handler<C>>, CrawlerError> {
        let handler = self.registry.add(pattern, priority, routine)?;
        debug!(pattern, priority, "handler registered");
        Ok(handler)
    }

    /// `register_handler` with a shared closure routine.
    pub fn register_fn<F>(
        &mut self,
        pattern: &str,
        priority: i64,
        routine: F,
    ) -> Result<Arc<Handler<C>>, CrawlerError>
    where
        F: Fn(&Context<'_, C>) -> Result<Outcome<C>, TaskError> + Send + Sync + 'static,
    {
        self.register_handler(pattern, priority, RoutineFactory::from_fn(routine))
    }

    pub fn register_filter<F>(&mut self, filter: F)
    where
        F: Filter<C> + 'static,
    {
        self.filters.get_mut().add(filter);
    }

    pub fn set_seeder<S>(&mut self, seeder: S)
    where
        S: Seeder<C> + 'static,
    {
        self.seeder = Box::new(seeder);
    }

    pub fn set_event_sink<S>(&mut self, sink: S)
    where
        S: EventSink + 'static,
    {
        self.sink = Box::new(sink);
    }

    /// Replace the clock. Ids are regenerated from the new clock as well.
    pub fn set_clock<K>(&mut self, clock: K)
    where
        K: Clock + 'static,
    {
        let clock: Arc<dyn Clock> = Arc::new(clock);
        self.ids = Box::new(UlidGenerator::new(Arc::clone(&clock)));
        self.clock = clock;
    }

    pub fn set_id_generator<G>(&mut self, ids: G)
    where
        G: IdGenerator + 'static,
    {
        self.ids = Box::new(ids);
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    pub fn registry(&self) -> &HandlerRegistry<C> {
        &self.registry
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Tasks currently in the queue (sentinels included).
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn cancel_handle(&self) -> CancelHandle<C> {
        CancelHandle {
            shutdown: Arc::clone(&self.shutdown),
        }
    }

    pub fn cancel(&self) {
        self.cancel_handle().cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Counters so far. `pending` counts admitted work not completed yet.
    pub fn report(&self) -> RunReport {
        self.stats.snapshot(self.queue.outstanding())
    }

    /// Resolve, filter and enqueue one task or bare target.
    ///
    /// Bare targets get `default_priority`. Sentinels skip resolution and
    /// filtering. An empty target is a caller error.
    pub fn submit(&self, item: impl Into<Follow<C>>) -> Result<Admission, CrawlerError> {
        self.admit(item.into().into_task(self.config.default_priority))
    }

    /// `submit` for each item, in order. Stops at the first error; items
    /// before it stay submitted.
    pub fn submit_all<I, F>(&self, items: I) -> Result<Vec<Admission>, CrawlerError>
    where
        I: IntoIterator<Item = F>,
        F: Into<Follow<C>>,
    {
        items.into_iter().map(|item| self.submit(item)).collect()
    }

    fn admit(&self, mut task: Task<C>) -> Result<Admission, CrawlerError> {
        if let Some(signal) = task.signal() {
            debug!(?signal, "sentinel queued");
            self.queue.push(task);
            return Ok(Admission::Signal(signal));
        }

        let target = task.target().unwrap_or_default().to_string();
        if target.is_empty() {
            return Err(CrawlerError::EmptyTarget);
        }
        let task_id = match task.id() {
            Some(id) => id,
            None => {
                let id = self.ids.generate_task_id();
                task.assign_id(id);
                id
            }
        };

        if !task.is_bound() {
            match self.registry.resolve(&target) {
                Some((handler, captures)) => task.bind(handler, captures),
                None => {
                    debug!(task_id = %task_id, url = %target, "no handler matches");
                    self.emit(Some(task_id), &target, EventKind::Unmatched);
                    return Ok(Admission::Unmatched);
                }
            }
        }

        // whole chain under one lock: a stateful filter sees each task atomically
        let verdict = panic::catch_unwind(AssertUnwindSafe(|| self.filters.lock().evaluate(&task)));
        let admitted = verdict.unwrap_or_else(|_| {
            error!(task_id = %task_id, url = %target, "filter panicked, task rejected");
            false
        });
        if !admitted {
            debug!(task_id = %task_id, url = %target, "filtered out");
            self.emit(Some(task_id), &target, EventKind::FilteredOut);
            return Ok(Admission::FilteredOut);
        }

        let priority = task.priority();
        self.emit(Some(task_id), &target, EventKind::Queued { priority });
        self.queue.push(task);
        Ok(Admission::Queued(task_id))
    }

    /// Record the event and hand it to the sink. A panicking sink loses the
    /// event and nothing else.
    pub(super) fn emit(&self, task_id: Option<TaskId>, target: &str, kind: EventKind) {
        self.stats.record(&kind);
        let event = CrawlEvent::new(self.clock.now(), task_id, target, kind);
        if panic::catch_unwind(AssertUnwindSafe(|| self.sink.emit(&event))).is_err() {
            warn!(event = event.name(), url = target, "event sink panicked, event dropped");
        }
    }

    /// `run` with `config.workers` workers.
    pub fn run_default(&self, seed_args: &[String]) -> Result<RunReport, CrawlerError> {
        self.run(seed_args, self.config.workers)
    }

    /// Start `worker_count` workers, seed once, wait until every task is
    /// exhausted, stop the pool and join it.
    ///
    /// A crawler runs once. Returns `Interrupted` when the crawl was
    /// cancelled (by a `CancelHandle` or an Abort sentinel); the counters
    /// stay available through `report`. When Stop sentinels submitted by the
    /// caller end every worker early, `run` returns the report with the
    /// unexecuted work counted as `pending`.
    pub fn run(&self, seed_args: &[String], worker_count: usize) -> Result<RunReport, CrawlerError> {
        if worker_count == 0 {
            return Err(CrawlerError::InvalidWorkerCount);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(CrawlerError::AlreadyRunning);
        }

        let run_id = self.ids.generate_run_id();
        let span = info_span!("crawl", run_id = %run_id, workers = worker_count);
        let _entered = span.enter();
        self.shutdown.arm(worker_count);
        info!(handlers = self.registry.len(), "crawl started");

        let panicked = thread::scope(|scope| {
            let mut workers = Vec::with_capacity(worker_count);
            for index in 0..worker_count {
                let span = span.clone();
                let spawned = thread::Builder::new()
                    .name(format!("{}-{index}", self.config.thread_name))
                    .spawn_scoped(scope, move || {
                        let _entered = span.enter();
                        worker_loop::run_guarded(self, index);
                    });
                match spawned {
                    Ok(handle) => workers.push(handle),
                    Err(source) => {
                        error!(worker = index, error = %source, "failed to spawn worker");
                        self.shutdown.trigger();
                        return Err(CrawlerError::Spawn(source));
                    }
                }
            }

            self.seed(seed_args);
            if self.queue.join() {
                info!("all tasks exhausted, stopping workers");
                for _ in 0..worker_count {
                    self.queue.push(Task::stop());
                }
            } else if !self.shutdown.is_cancelled() {
                warn!("every worker stopped before the queue drained");
            }
            Ok(workers
                .into_iter()
                .map(|handle| handle.join())
                .filter(Result::is_err)
                .count())
        })?;

        let report = self.report();
        if panicked > 0 {
            error!(panicked, "crawl ended with dead workers");
            return Err(CrawlerError::WorkerPanicked(panicked));
        }
        if self.shutdown.is_cancelled() {
            warn!(
                finished = report.finished,
                pending = report.pending,
                "crawl interrupted"
            );
            return Err(CrawlerError::Interrupted);
        }
        info!(
            finished = report.finished,
            failed = report.failed,
            unmatched = report.unmatched,
            filtered_out = report.filtered_out,
            pending = report.pending,
            "crawl finished"
        );
        Ok(report)
    }

    /// Invoke the seeder once; bare targets get `seed_priority`.
    fn seed(&self, args: &[String]) {
        let seeds = match panic::catch_unwind(AssertUnwindSafe(|| self.seeder.produce(args))) {
            Ok(seeds) => seeds,
            Err(_) => {
                error!("seeder panicked, cancelling crawl");
                self.shutdown.trigger();
                return;
            }
        };

        let count = seeds.len();
        for seed in seeds {
            let task = seed.into_task(self.config.seed_priority);
            if let Err(err) = self.admit(task) {
                warn!(error = %err, "seed rejected");
            }
        }
        info!(seeds = count, "seeded");
    }
}

impl<C: Client> fmt::Debug for Crawler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crawler")
            .field("handlers", &self.registry.len())
            .field("queued", &self.queue.len())
            .field("config", &self.config)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
