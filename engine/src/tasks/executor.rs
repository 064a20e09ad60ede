//! A fixed-size worker pool.
//!
//! Work reaches the workers over one shared crossbeam channel. Besides fire-and-forget tasks
//! the pool supports [scopes](Executor::scope), whose tasks may borrow from the caller's stack
//! and are all joined before the scope returns.
//!
//! ```text
//!             ┌──────────── shared queue ────────────┐
//!  execute ──►│ Task │ Steal(q1) │ Task │ Steal(q2) │ │──► worker 0..n
//!             └──────────────────────────────────────┘
//!  scope 1 ──► local q1 ◄── drained by its own waiting thread and by stealing workers
//!  scope 2 ──► local q2
//! ```

use std::any::Any;
use std::cell::Cell;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{Receiver, Sender, TryRecvError, bounded, select, unbounded};
use log::{debug, warn};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// The payload of a panic caught on a worker, carried back to the thread that owns the work.
pub(crate) type Panic = Box<dyn Any + Send + 'static>;

enum Message {
    /// A detached task, run by whichever worker receives it.
    Task(Task),
    /// A nudge to pull one task from a scope's local queue, if any is still there.
    Steal(Receiver<Task>),
    Shutdown,
}

/// A pool of worker threads.
///
/// Dropping the executor lets the workers finish everything already queued, then joins them.
pub struct Executor {
    sender: Sender<Message>,
    workers: Vec<JoinHandle<()>>,
}

impl Executor {
    /// Start a pool of `size` workers.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero, or if the OS refuses to start a thread.
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "an executor needs at least one worker");

        let (sender, receiver) = unbounded();
        let workers = (0..size)
            .map(|id| spawn_worker(id, receiver.clone()))
            .collect();

        debug!("executor started with {size} worker(s)");
        Self { sender, workers }
    }

    #[inline]
    pub fn single_threaded() -> Self {
        Self::new(1)
    }

    /// Queue `f` to run on some worker. A panic in `f` is logged and swallowed.
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(Message::Task(Box::new(f)));
    }

    /// Queue `f` and return a handle to its result.
    pub fn spawn<F, T>(&self, f: F) -> TaskFuture<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.handle().spawn(f)
    }

    /// A cloneable submitter that can be moved to other threads.
    pub fn handle(&self) -> ExecutorHandle {
        ExecutorHandle {
            sender: self.sender.clone(),
        }
    }

    /// Number of worker threads.
    #[inline]
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Run `f` with a [`Scope`] whose tasks may borrow anything that outlives the call.
    ///
    /// Returns once every task spawned in the scope has finished. While it waits, the calling
    /// thread runs queued tasks of this scope itself, so a scope opened from inside a worker
    /// (nested decomposition) cannot starve the pool. A panic in any scoped task is resumed
    /// on the calling thread once every task has finished.
    ///
    /// ```ignore
    /// let mut totals = [0u64; 4];
    /// executor.scope(|s| {
    ///     for (i, total) in totals.iter_mut().enumerate() {
    ///         s.spawn(move || *total = (0..=i as u64).sum());
    ///     }
    /// });
    /// assert_eq!(totals, [0, 1, 3, 6]);
    /// ```
    pub fn scope<'env, F, R>(&'env self, f: F) -> R
    where
        F: FnOnce(&Scope<'env>) -> R,
    {
        let scope = Scope::new(self);
        let result = f(&scope);

        if let Some(payload) = scope.wait_all() {
            panic::resume_unwind(payload);
        }

        result
    }

    fn submit(&self, message: Message) {
        // Workers hold their receivers until `Drop`, which needs `&mut self`.
        self.sender
            .send(message)
            .expect("executor workers outlive the executor borrow");
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        // One shutdown per worker, queued behind any outstanding work.
        for _ in 0..self.workers.len() {
            let _ = self.sender.send(Message::Shutdown);
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn spawn_worker(id: usize, receiver: Receiver<Message>) -> JoinHandle<()> {
    thread::Builder::new()
        .name(format!("rusty-ecs-worker-{id}"))
        .spawn(move || {
            for message in receiver.iter() {
                match message {
                    Message::Task(task) => run_detached(task),
                    // The owning thread may have drained the queue already.
                    Message::Steal(local) => {
                        if let Ok(task) = local.try_recv() {
                            task();
                        }
                    }
                    Message::Shutdown => break,
                }
            }
            debug!("executor worker {id} stopped");
        })
        .expect("failed to spawn executor worker thread")
}

/// Runs a fire-and-forget task, keeping the worker alive if it panics.
fn run_detached(task: Task) {
    if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
        warn!("detached executor task panicked");
    }
}

/// Spawns tasks that may borrow data living for `'env`.
///
/// Spawned tasks go to a queue local to the scope. Workers are nudged to pull from it, and the
/// thread waiting on the scope drains it too, so that thread only ever runs work it owns.
pub struct Scope<'env> {
    executor: &'env Executor,
    local_tx: Sender<Task>,
    local_rx: Receiver<Task>,
    done_tx: Sender<Option<Panic>>,
    done_rx: Receiver<Option<Panic>>,
    pending: Cell<usize>,
    // Invariant in 'env.
    _env: PhantomData<Cell<&'env ()>>,
}

impl<'env> Scope<'env> {
    fn new(executor: &'env Executor) -> Self {
        let (local_tx, local_rx) = unbounded();
        let (done_tx, done_rx) = unbounded();
        Self {
            executor,
            local_tx,
            local_rx,
            done_tx,
            done_rx,
            pending: Cell::new(0),
            _env: PhantomData,
        }
    }

    /// Spawn `f` within the scope.
    pub fn spawn<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'env,
    {
        let done = self.done_tx.clone();
        let task: Box<dyn FnOnce() + Send + 'env> = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(f));
            let _ = done.send(outcome.err());
        });

        // SAFETY: the task only borrows data that lives for 'env. The scope waits for every
        // spawned task to report on `done_rx` before it is gone (in `Executor::scope`, or in
        // `Drop` when unwinding), and the scope cannot outlive 'env.
        let task: Task = unsafe { std::mem::transmute(task) };

        self.pending.set(self.pending.get() + 1);
        // Both ends of the local queue live in `self`, so the send cannot fail.
        let _ = self.local_tx.send(task);
        self.executor.submit(Message::Steal(self.local_rx.clone()));
    }

    /// Spawn `f` within the scope and return a handle to its result.
    pub fn spawn_with_result<F, T>(&self, f: F) -> TaskFuture<T>
    where
        F: FnOnce() -> T + Send + 'env,
        T: Send + 'static,
    {
        let (tx, receiver) = bounded(1);
        self.spawn(move || {
            let _ = tx.send(f());
        });
        TaskFuture { receiver }
    }

    /// Number of spawned tasks that have not reported completion yet.
    #[inline]
    pub fn pending(&self) -> usize {
        self.pending.get()
    }

    /// Blocks until a message arrives on `rx`, running this scope's queued tasks while it waits.
    ///
    /// Returns `None` once `rx` is disconnected and drained.
    pub fn recv_helping<T>(&self, rx: &Receiver<T>) -> Option<T> {
        loop {
            // Completion messages still count against `pending`.
            self.collect_finished();

            select! {
                recv(rx) -> message => return message.ok(),
                recv(self.local_rx) -> task => {
                    if let Ok(task) = task {
                        task();
                    }
                }
            }
        }
    }

    fn record(&self, outcome: Option<Panic>, first_panic: &mut Option<Panic>) {
        self.pending.set(self.pending.get() - 1);
        if first_panic.is_none() {
            *first_panic = outcome;
        }
    }

    fn collect_finished(&self) -> Option<Panic> {
        let mut first_panic = None;
        while let Ok(outcome) = self.done_rx.try_recv() {
            self.record(outcome, &mut first_panic);
        }
        first_panic
    }

    /// Waits for every spawned task, returning the first panic payload if any task panicked.
    fn wait_all(&self) -> Option<Panic> {
        let mut first_panic = self.collect_finished();

        while self.pending.get() > 0 {
            select! {
                // `done_tx` lives in `self`, so this channel never disconnects.
                recv(self.done_rx) -> outcome => {
                    if let Ok(outcome) = outcome {
                        self.record(outcome, &mut first_panic);
                    }
                }
                recv(self.local_rx) -> task => {
                    if let Ok(task) = task {
                        task();
                    }
                }
            }
        }

        first_panic
    }
}

impl Drop for Scope<'_> {
    fn drop(&mut self) {
        // Only does work when the scope closure unwound before `Executor::scope` could wait.
        let _ = self.wait_all();
    }
}

/// Submits work to an [`Executor`] from any thread.
#[derive(Clone)]
pub struct ExecutorHandle {
    sender: Sender<Message>,
}

impl ExecutorHandle {
    /// Queue `f` to run on some worker. Tasks submitted after the executor is gone are dropped.
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let _ = self.sender.send(Message::Task(Box::new(f)));
    }

    /// Queue `f` and return a handle to its result.
    pub fn spawn<F, T>(&self, f: F) -> TaskFuture<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, receiver) = bounded(1);
        self.execute(move || {
            let _ = tx.send(f());
        });
        TaskFuture { receiver }
    }
}

/// The eventual result of a spawned task.
pub struct TaskFuture<T> {
    receiver: Receiver<T>,
}

impl<T> TaskFuture<T> {
    /// Block until the task has finished.
    ///
    /// Fails if the task panicked or was dropped without running.
    pub fn wait(self) -> Result<T, TaskError> {
        self.receiver.recv().map_err(|_| TaskError::TaskFailed)
    }

    /// The result if the task has finished, `None` if it is still queued or running.
    pub fn try_wait(&self) -> Result<Option<T>, TaskError> {
        match self.receiver.try_recv() {
            Ok(result) => Ok(Some(result)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(TaskError::TaskFailed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// The task panicked, or the executor was dropped before running it.
    #[error("task failed to complete")]
    TaskFailed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier, Mutex};
    use std::time::Duration;

    #[test]
    fn spawned_results_come_back_in_submission_slots() {
        // Given
        let executor = Executor::new(3);

        // When
        let squares: Vec<_> = (0u64..16)
            .map(|n| executor.spawn(move || n * n))
            .map(|future| future.wait().unwrap())
            .collect();

        // Then
        assert_eq!(squares, (0u64..16).map(|n| n * n).collect::<Vec<_>>());
        assert_eq!(executor.size(), 3);
    }

    #[test]
    fn workers_run_concurrently() {
        // Given - every task waits for all the others
        let executor = Executor::new(4);
        let barrier = Arc::new(Barrier::new(4));

        // When
        let futures: Vec<_> = (0..4)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                executor.spawn(move || barrier.wait().is_leader())
            })
            .collect();

        // Then - nobody deadlocked, exactly one leader
        let leaders = futures
            .into_iter()
            .map(|future| future.wait().unwrap())
            .filter(|&leader| leader)
            .count();
        assert_eq!(leaders, 1);
    }

    #[test]
    fn handles_submit_from_other_threads() {
        let executor = Executor::new(2);
        let hits = Arc::new(AtomicUsize::new(0));

        let submitters: Vec<_> = (0..3)
            .map(|_| {
                let handle = executor.handle();
                let hits = Arc::clone(&hits);
                thread::spawn(move || {
                    (0..4)
                        .map(|_| {
                            let hits = Arc::clone(&hits);
                            handle.spawn(move || hits.fetch_add(1, Ordering::SeqCst))
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        for submitter in submitters {
            for future in submitter.join().unwrap() {
                future.wait().unwrap();
            }
        }
        assert_eq!(hits.load(Ordering::SeqCst), 12);
    }

    #[test]
    fn drop_finishes_queued_work() {
        // Given - more slow tasks than workers
        let executor = Executor::new(2);
        let finished = Arc::new(AtomicUsize::new(0));
        for _ in 0..6 {
            let finished = Arc::clone(&finished);
            executor.execute(move || {
                thread::sleep(Duration::from_millis(10));
                finished.fetch_add(1, Ordering::SeqCst);
            });
        }

        // When
        drop(executor);

        // Then
        assert_eq!(finished.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn detached_panic_leaves_the_worker_usable() {
        let executor = Executor::single_threaded();

        executor.execute(|| panic!("detached failure"));

        assert_eq!(executor.spawn(|| "still alive").wait(), Ok("still alive"));
    }

    #[test]
    fn spawned_panic_is_reported_as_failure() {
        let executor = Executor::single_threaded();

        let future = executor.spawn(|| -> u32 { panic!("spawned failure") });

        assert_eq!(future.wait(), Err(TaskError::TaskFailed));
    }

    #[test]
    fn try_wait_before_and_after() {
        // Given - a task held back by a gate
        let executor = Executor::single_threaded();
        let (gate_tx, gate_rx) = bounded::<()>(0);
        let future = executor.spawn(move || {
            let _ = gate_rx.recv();
            5
        });

        // Then
        assert_eq!(future.try_wait(), Ok(None));

        // When
        gate_tx.send(()).unwrap();

        // Then
        assert_eq!(future.wait(), Ok(5));
    }

    #[test]
    fn scope_tasks_mutate_borrowed_rows() {
        // Given
        let executor = Executor::new(3);
        let mut rows = vec![vec![1u32, 2, 3], vec![4, 5], vec![6]];

        // When
        executor.scope(|s| {
            for row in rows.iter_mut() {
                s.spawn(move || row.iter_mut().for_each(|v| *v += 100));
            }
        });

        // Then
        assert_eq!(rows, vec![vec![101, 102, 103], vec![104, 105], vec![106]]);
    }

    #[test]
    fn scope_returns_the_closure_result() {
        let executor = Executor::new(2);
        let weights = [3, 1, 4, 1, 5];

        let total = executor.scope(|s| {
            let futures: Vec<_> = weights
                .iter()
                .map(|w| s.spawn_with_result(move || w * 2))
                .collect();
            futures.into_iter().map(|f| f.wait().unwrap()).sum::<i32>()
        });

        assert_eq!(total, 28);
    }

    #[test]
    fn scope_waits_for_slow_tasks() {
        // Given
        let executor = Executor::single_threaded();
        let log = Arc::new(Mutex::new(Vec::new()));

        // When
        executor.scope(|s| {
            for i in 0..4 {
                let log = Arc::clone(&log);
                s.spawn(move || {
                    thread::sleep(Duration::from_millis(5));
                    log.lock().unwrap().push(i);
                });
            }
            assert!(s.pending() <= 4);
        });

        // Then
        let mut seen = log.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn nested_scopes_on_single_worker() {
        // Given - one worker, and tasks that open their own scopes
        let executor = Executor::single_threaded();
        let mut buckets = vec![vec![1u32; 8], vec![2u32; 8], vec![3u32; 8]];

        // When
        executor.scope(|outer| {
            let executor = &executor;
            for bucket in buckets.iter_mut() {
                outer.spawn(move || {
                    executor.scope(|inner| {
                        for value in bucket.iter_mut() {
                            inner.spawn(move || *value *= 10);
                        }
                    });
                });
            }
        });

        // Then - no deadlock, and every nested task ran
        assert_eq!(buckets[0], vec![10; 8]);
        assert_eq!(buckets[1], vec![20; 8]);
        assert_eq!(buckets[2], vec![30; 8]);
    }

    #[test]
    fn scope_resumes_panic_after_siblings() {
        let executor = Executor::new(2);
        let finished = AtomicUsize::new(0);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            executor.scope(|s| {
                s.spawn(|| panic!("scoped failure"));
                s.spawn(|| {
                    thread::sleep(Duration::from_millis(20));
                    finished.fetch_add(1, Ordering::SeqCst);
                });
            });
        }));

        // The panic surfaces, but only after the sibling task finished.
        assert!(outcome.is_err());
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn recv_helping_runs_local_work() {
        let executor = Executor::single_threaded();
        // Keep the only worker busy so the waiting thread must run the task itself.
        let (block_tx, block_rx) = bounded::<()>(0);
        executor.execute(move || {
            let _ = block_rx.recv();
        });

        let value = executor.scope(|s| {
            let (tx, rx) = unbounded();
            s.spawn(move || {
                let _ = tx.send(42);
            });
            s.recv_helping(&rx)
        });

        let _ = block_tx.send(());
        assert_eq!(value, Some(42));
    }
}
