//! In-memory priority queue shared by the worker pool.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::domain::Task;

/// Heap entry. `BinaryHeap` is a max-heap and not stable, so the ordering
/// key is (priority, reversed sequence number): highest priority first,
/// earliest push first among equals.
struct Entry<C> {
    priority: i64,
    seq: u64,
    task: Task<C>,
}

impl<C> PartialEq for Entry<C> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl<C> Eq for Entry<C> {}

impl<C> PartialOrd for Entry<C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<C> Ord for Entry<C> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct QueueState<C> {
    heap: BinaryHeap<Entry<C>>,
    /// Next sequence number. Assigned under the same lock as the insertion,
    /// so pop order of equal priorities equals push order across threads.
    next_seq: u64,
    /// Work tasks pushed but not yet marked done.
    outstanding: usize,
    /// Set by `interrupt`; releases `join` waiters for good.
    interrupted: bool,
    /// Set by `close` once no consumer is left; releases `join` as well.
    closed: bool,
}

/// Unbounded, thread-safe priority queue of tasks.
///
/// # 設計メモ
/// - `pop` は空の間ブロックする（唯一のサスペンドポイント）
/// - `push` は内部ロックの間だけブロックする
/// - sentinel（Stop/Abort）は outstanding に数えない
pub struct TaskQueue<C> {
    state: Mutex<QueueState<C>>,
    /// Signalled on push.
    available: Condvar,
    /// Signalled when outstanding reaches zero or on interrupt.
    idle: Condvar,
}

impl<C> TaskQueue<C> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                heap: BinaryHeap::new(),
                next_seq: 0,
                outstanding: 0,
                interrupted: false,
                closed: false,
            }),
            available: Condvar::new(),
            idle: Condvar::new(),
        }
    }

    /// Insert `task`. Work tasks count as outstanding until `task_done`.
    pub fn push(&self, task: Task<C>) {
        {
            let mut state = self.state.lock();
            let seq = state.next_seq;
            state.next_seq += 1;
            if !task.is_sentinel() {
                state.outstanding += 1;
            }
            state.heap.push(Entry {
                priority: task.priority(),
                seq,
                task,
            });
        }
        self.available.notify_one();
    }

    /// Remove the highest-priority (then earliest) task, waiting while empty.
    pub fn pop(&self) -> Task<C> {
        let mut state = self.state.lock();
        loop {
            if let Some(entry) = state.heap.pop() {
                return entry.task;
            }
            self.available.wait(&mut state);
        }
    }

    /// Like `pop`, giving up after `timeout`.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<Task<C>> {
        let mut state = self.state.lock();
        loop {
            if let Some(entry) = state.heap.pop() {
                return Some(entry.task);
            }
            if self.available.wait_for(&mut state, timeout).timed_out() {
                return state.heap.pop().map(|entry| entry.task);
            }
        }
    }

    /// Mark one popped work task as fully processed (follow-ups included).
    pub fn task_done(&self) {
        let mut state = self.state.lock();
        state.outstanding = state.outstanding.saturating_sub(1);
        if state.outstanding == 0 {
            self.idle.notify_all();
        }
    }

    /// Block until every pushed work task was marked done.
    ///
    /// Returns `false` when released by `interrupt`, or by `close` with work
    /// still outstanding.
    pub fn join(&self) -> bool {
        let mut state = self.state.lock();
        while state.outstanding > 0 && !state.interrupted && !state.closed {
            self.idle.wait(&mut state);
        }
        state.outstanding == 0 && !state.interrupted
    }

    /// Release current and future `join` callers.
    pub fn interrupt(&self) {
        self.state.lock().interrupted = true;
        self.idle.notify_all();
    }

    pub fn is_interrupted(&self) -> bool {
        self.state.lock().interrupted
    }

    /// Mark the queue as having no consumer left. Outstanding work can no
    /// longer complete, so `join` stops waiting for it.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.idle.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Tasks currently queued (sentinels included).
    pub fn len(&self) -> usize {
        self.state.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().heap.is_empty()
    }

    /// Work tasks pushed and not yet marked done.
    pub fn outstanding(&self) -> usize {
        self.state.lock().outstanding
    }
}

impl<C> Default for TaskQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::domain::Signal;

    type Q = TaskQueue<()>;
    type T = Task<()>;

    fn drain_targets(q: &Q) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(task) = q.pop_timeout(Duration::ZERO) {
            out.push(task.target().unwrap_or("<signal>").to_string());
        }
        out
    }

    #[test]
    fn higher_priority_pops_first() {
        let q = Q::new();
        for p in [1, 2, 3] {
            q.push(T::new(p.to_string()).with_priority(p));
        }
        assert_eq!(drain_targets(&q), vec!["3", "2", "1"]);
    }

    #[test]
    fn equal_priority_is_fifo() {
        let q = Q::new();
        for i in 0..100 {
            q.push(T::new(i.to_string()));
        }
        let expected: Vec<String> = (0..100).map(|i| i.to_string()).collect();
        assert_eq!(drain_targets(&q), expected);
    }

    #[test]
    fn duplicates_are_kept() {
        let q = Q::new();
        for target in ["a", "a", "b"] {
            q.push(T::new(target));
        }
        assert_eq!(drain_targets(&q), vec!["a", "a", "b"]);
    }

    #[test]
    fn stop_sentinel_drains_after_work_and_abort_jumps_ahead() {
        let q = Q::new();
        q.push(T::new("low").with_priority(-1_000_000));
        q.push(T::stop());
        q.push(T::new("high").with_priority(1_000_000));
        q.push(T::abort());

        assert_eq!(q.pop().signal(), Some(Signal::Abort));
        assert_eq!(q.pop().target(), Some("high"));
        assert_eq!(q.pop().target(), Some("low"));
        assert_eq!(q.pop().signal(), Some(Signal::Stop));
        assert!(q.is_empty());
    }

    #[test]
    fn concurrent_pushers_keep_fifo_per_producer_and_lose_nothing() {
        let q = Arc::new(Q::new());
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let q = Arc::clone(&q);
                thread::spawn(move || {
                    for i in 0..250 {
                        q.push(T::new(format!("{p}:{i}")));
                    }
                })
            })
            .collect();
        for h in producers {
            h.join().unwrap();
        }

        let popped = drain_targets(&q);
        assert_eq!(popped.len(), 1000);
        for p in 0..4 {
            let prefix = format!("{p}:");
            let seq: Vec<usize> = popped
                .iter()
                .filter_map(|t| t.strip_prefix(&prefix))
                .map(|i| i.parse().unwrap())
                .collect();
            assert_eq!(seq, (0..250).collect::<Vec<_>>());
        }
    }

    #[test]
    fn pop_blocks_until_push() {
        let q = Arc::new(Q::new());
        let consumer = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.pop().target().map(str::to_string))
        };
        thread::sleep(Duration::from_millis(50));
        q.push(T::new("late"));
        assert_eq!(consumer.join().unwrap().as_deref(), Some("late"));
    }

    #[test]
    fn pop_timeout_gives_up_on_empty_queue() {
        let q = Q::new();
        assert!(q.pop_timeout(Duration::from_millis(20)).is_none());
    }

    #[test]
    fn outstanding_counts_work_but_not_sentinels() {
        let q = Q::new();
        q.push(T::new("a"));
        q.push(T::new("b"));
        q.push(T::stop());
        assert_eq!(q.outstanding(), 2);
        assert_eq!(q.len(), 3);

        let _ = q.pop();
        q.task_done();
        assert_eq!(q.outstanding(), 1);
    }

    #[test]
    fn join_returns_when_all_work_is_done() {
        let q = Arc::new(Q::new());
        q.push(T::new("a"));
        q.push(T::new("b"));

        let worker = {
            let q = Arc::clone(&q);
            thread::spawn(move || {
                for _ in 0..2 {
                    let _ = q.pop();
                    thread::sleep(Duration::from_millis(10));
                    q.task_done();
                }
            })
        };
        assert!(q.join());
        assert_eq!(q.outstanding(), 0);
        worker.join().unwrap();
    }

    #[test]
    fn interrupt_releases_join() {
        let q = Arc::new(Q::new());
        q.push(T::new("never processed"));

        let joiner = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.join())
        };
        thread::sleep(Duration::from_millis(20));
        q.interrupt();
        assert!(!joiner.join().unwrap());
        assert!(q.is_interrupted());
    }

    #[test]
    fn close_releases_join_with_work_left() {
        let q = Arc::new(Q::new());
        q.push(T::new("orphan"));

        let joiner = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.join())
        };
        thread::sleep(Duration::from_millis(20));
        q.close();
        assert!(!joiner.join().unwrap());
        assert!(q.is_closed());
        assert!(!q.is_interrupted());
        assert_eq!(q.outstanding(), 1);
    }

    #[test]
    fn join_after_close_reports_a_drained_queue() {
        let q = Q::new();
        q.close();
        assert!(q.join());
    }

    #[test]
    fn join_on_empty_queue_returns_immediately() {
        assert!(Q::new().join());
    }
}
