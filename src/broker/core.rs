//! # Broker Core
//!
//! This module defines the generic building blocks for batch execution.
//!
//! ## Key Types
//!
//! - [`Operation`]: The trait every unit of work implements.
//! - [`Task`]: An immutable, indexed payload bound to its operation.
//! - [`Broker`]: The bounded worker pool.
//! - [`TaskResult`] / [`TaskError`]: Per-item outcome, tagged with the submission index.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::fmt::Debug;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, warn};

// =============================================================================
// 1. THE ABSTRACTION (Operations and Tasks)
// =============================================================================

/// The work performed for every task in a batch.
///
/// # Architecture Note
/// The broker never knows what it is creating or deleting. A batch is a list of
/// payloads plus one `Operation`; associated types keep the payload, the value
/// produced and the failure type tied together, so a tenant payload can't be
/// handed to a user-deletion operation.
///
/// Implementations must not touch shared bookkeeping. They receive an owned
/// payload and hand back a value; whoever called [`Broker::run`] decides what
/// to do with it.
#[async_trait]
pub trait Operation: Send + Sync + 'static {
    /// Input for a single task. Rendered with `Debug` when the task fails.
    type Payload: Debug + Send + 'static;

    /// Value produced by a successful task.
    type Output: Send + 'static;

    /// Error raised by a failed task.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Perform the work for one payload.
    async fn execute(&self, payload: Self::Payload) -> Result<Self::Output, Self::Error>;
}

/// An [`Operation`] backed by an async closure. Build one with [`from_fn`].
pub struct FnOperation<F, P> {
    f: F,
    _payload: PhantomData<fn(P)>,
}

/// Wraps an async closure as an [`Operation`].
///
/// ```rust
/// use tenant_broker::broker::{from_fn, Broker, Task};
/// use tenant_broker::clients::CloudError;
///
/// # #[tokio::main]
/// # async fn main() {
/// let double = from_fn(|n: u32| async move { Ok::<_, CloudError>(n * 2) });
/// let results = Broker::new(4).run(Task::batch(double, 0..8)).await;
/// assert_eq!(results.len(), 8);
/// # }
/// ```
pub fn from_fn<F, Fut, P, T, E>(f: F) -> FnOperation<F, P>
where
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    P: Debug + Send + 'static,
    T: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    FnOperation {
        f,
        _payload: PhantomData,
    }
}

#[async_trait]
impl<F, Fut, P, T, E> Operation for FnOperation<F, P>
where
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    P: Debug + Send + 'static,
    T: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    type Payload = P;
    type Output = T;
    type Error = E;

    async fn execute(&self, payload: P) -> Result<T, E> {
        (self.f)(payload).await
    }
}

/// One unit of work: a payload, the operation that consumes it, and the
/// position it was submitted at.
///
/// Tasks are immutable once built. The operation is shared through an `Arc`
/// so a batch of a thousand tasks holds a single client.
pub struct Task<O: Operation> {
    index: usize,
    payload: O::Payload,
    operation: Arc<O>,
}

impl<O: Operation> Task<O> {
    pub fn new(index: usize, payload: O::Payload, operation: Arc<O>) -> Self {
        Self {
            index,
            payload,
            operation,
        }
    }

    /// Numbers `payloads` from 0 in iteration order, all sharing `operation`.
    pub fn batch(operation: O, payloads: impl IntoIterator<Item = O::Payload>) -> Vec<Self> {
        let operation = Arc::new(operation);
        payloads
            .into_iter()
            .enumerate()
            .map(|(index, payload)| Self::new(index, payload, operation.clone()))
            .collect()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Runs the operation in its own Tokio task so a panic surfaces as a
    /// [`JoinError`] instead of unwinding the worker.
    ///
    /// The spawned task is aborted if this future is dropped first, so a
    /// cancelled batch stops issuing remote calls.
    async fn execute(self) -> (String, Result<O::Output, TaskError<O::Error>>) {
        let Task {
            payload, operation, ..
        } = self;
        let label = format!("{payload:?}");

        let mut guard = AbortOnDrop(tokio::spawn(async move { operation.execute(payload).await }));
        let outcome = match (&mut guard.0).await {
            Ok(result) => result.map_err(TaskError::Failed),
            Err(join_error) => Err(classify_join_error(join_error)),
        };
        (label, outcome)
    }
}

/// Aborts the wrapped task when dropped. A no-op once the task has finished.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl<O: Operation> Debug for Task<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("index", &self.index)
            .field("payload", &self.payload)
            .finish()
    }
}

// =============================================================================
// 2. RESULTS & ERRORS
// =============================================================================

/// Why a single task produced no value.
#[derive(Debug, thiserror::Error)]
pub enum TaskError<E> {
    /// The operation returned an error.
    #[error(transparent)]
    Failed(E),
    /// The operation panicked. Holds the panic message when it was a string.
    #[error("operation panicked: {0}")]
    Panicked(String),
    /// The task never reported (cancelled, or its worker was torn down).
    #[error("task aborted: {0}")]
    Aborted(String),
}

/// Outcome of one task, tagged with the index it was submitted at.
#[derive(Debug)]
pub struct TaskResult<T, E> {
    pub index: usize,
    pub outcome: Result<T, TaskError<E>>,
}

impl<T, E> TaskResult<T, E> {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Splits results into successes and failures, keeping submission order in both.
#[allow(clippy::type_complexity)]
pub fn partition_results<T, E>(
    results: Vec<TaskResult<T, E>>,
) -> (Vec<(usize, T)>, Vec<(usize, TaskError<E>)>) {
    let mut successes = Vec::new();
    let mut failures = Vec::new();
    for TaskResult { index, outcome } in results {
        match outcome {
            Ok(value) => successes.push((index, value)),
            Err(e) => failures.push((index, e)),
        }
    }
    (successes, failures)
}

fn classify_join_error<E>(join_error: JoinError) -> TaskError<E> {
    if !join_error.is_panic() {
        return TaskError::Aborted(join_error.to_string());
    }
    let panic = join_error.into_panic();
    let message = if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    };
    TaskError::Panicked(message)
}

// =============================================================================
// 3. THE WORKER POOL
// =============================================================================

/// A bounded worker pool that executes a batch and returns results in
/// submission order.
///
/// # Concurrency Model
/// Every call to [`Broker::run`] spins up a fresh set of workers and joins them
/// before returning; no worker outlives the call. Workers pull from a shared,
/// pre-filled queue and exit as soon as it is empty, so at most
/// `concurrency` operations are ever in flight.
///
/// Each worker keeps the `(slot, outcome)` pairs it produced and hands them
/// back through its join handle. The caller drops them into a pre-sized slot
/// array, so results come out ordered without a lock or a sort.
#[derive(Debug, Clone, Copy)]
pub struct Broker {
    concurrency: usize,
    throttle: Duration,
}

impl Broker {
    /// Creates a broker running at most `concurrency` tasks at once (minimum 1).
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            throttle: Duration::ZERO,
        }
    }

    /// Delay each worker takes after dequeuing a task, to smooth the request
    /// rate against a rate-limited backend. Zero disables it.
    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Number of workers spawned for a batch of `tasks`.
    pub fn workers_for(&self, tasks: usize) -> usize {
        if tasks == 0 {
            0
        } else {
            self.concurrency.clamp(1, tasks)
        }
    }

    /// Executes every task and returns one result per task, ordered by task
    /// index. Blocks until all tasks have finished; never returns partial
    /// results and never retries.
    pub async fn run<O: Operation>(
        &self,
        mut tasks: Vec<Task<O>>,
    ) -> Vec<TaskResult<O::Output, O::Error>> {
        let total = tasks.len();
        if total == 0 {
            return Vec::new();
        }
        let workers = self.workers_for(total);
        debug!(total, workers, "Broker run started");

        tasks.sort_by_key(Task::index);
        let indexes: Vec<usize> = tasks.iter().map(Task::index).collect();
        let queue: VecDeque<(usize, Task<O>)> = tasks.into_iter().enumerate().collect();
        let queue = Arc::new(Mutex::new(queue));

        let mut pool = JoinSet::new();
        for worker_id in 0..workers {
            pool.spawn(worker(worker_id, queue.clone(), self.throttle));
        }

        let mut slots: Vec<Option<Result<O::Output, TaskError<O::Error>>>> =
            (0..total).map(|_| None).collect();
        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(finished) => {
                    for (slot, outcome) in finished {
                        slots[slot] = Some(outcome);
                    }
                }
                Err(e) => error!(error = %e, "Broker worker terminated abnormally"),
            }
        }

        let results: Vec<_> = slots
            .into_iter()
            .zip(indexes)
            .map(|(slot, index)| TaskResult {
                index,
                outcome: slot.unwrap_or_else(|| {
                    Err(TaskError::Aborted("worker exited before reporting".to_string()))
                }),
            })
            .collect();

        let failed = results.iter().filter(|r| !r.is_success()).count();
        debug!(total, failed, "Broker run finished");
        results
    }
}

type Finished<O> = Vec<(
    usize,
    Result<<O as Operation>::Output, TaskError<<O as Operation>::Error>>,
)>;

async fn worker<O: Operation>(
    worker_id: usize,
    queue: Arc<Mutex<VecDeque<(usize, Task<O>)>>>,
    throttle: Duration,
) -> Finished<O> {
    let mut finished = Vec::new();
    loop {
        let next = queue.lock().await.pop_front();
        let Some((slot, task)) = next else { break };
        if !throttle.is_zero() {
            tokio::time::sleep(throttle).await;
        }

        let index = task.index();
        let (label, outcome) = task.execute().await;
        if let Err(e) = &outcome {
            warn!(worker_id, index, payload = %label, error = %e, "Task failed");
        }
        finished.push((slot, outcome));
    }
    finished
}

// =============================================================================
// 4. TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::CloudError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[tokio::test]
    async fn test_empty_batch_returns_immediately() {
        let op = from_fn(|n: u32| async move { Ok::<_, CloudError>(n) });
        let results = Broker::new(4).run(Task::batch(op, Vec::new())).await;
        assert!(results.is_empty());
    }

    #[test]
    fn test_worker_count_is_clamped() {
        let broker = Broker::new(10);
        assert_eq!(broker.workers_for(0), 0);
        assert_eq!(broker.workers_for(3), 3);
        assert_eq!(broker.workers_for(25), 10);
        assert_eq!(Broker::new(0).concurrency(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_results_follow_submission_order() {
        for (n, k) in [(1, 1), (5, 1), (8, 3), (12, 12), (6, 40)] {
            // Later tasks finish first.
            let op = from_fn(move |i: usize| async move {
                tokio::time::sleep(Duration::from_millis(((n - i) * 3) as u64)).await;
                Ok::<_, CloudError>(i * 10)
            });
            let results = Broker::new(k).run(Task::batch(op, 0..n)).await;

            assert_eq!(results.len(), n);
            for (i, result) in results.into_iter().enumerate() {
                assert_eq!(result.index, i);
                assert_eq!(result.outcome.unwrap(), i * 10);
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_single_failure_is_isolated() {
        let op = from_fn(|i: usize| async move {
            if i == 3 {
                Err(CloudError::Remote(format!("boom {i}")))
            } else {
                Ok(i)
            }
        });
        let results = Broker::new(3).run(Task::batch(op, 0..7)).await;

        assert_eq!(results.len(), 7);
        let (ok, failed) = partition_results(results);
        assert_eq!(ok.len(), 6);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, 3);
        assert!(matches!(failed[0].1, TaskError::Failed(CloudError::Remote(_))));
        assert!(ok.iter().all(|(index, value)| index == value));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_panicking_task_becomes_failure() {
        let op = from_fn(|i: usize| async move {
            if i == 1 {
                panic!("exploded on {i}");
            }
            Ok::<_, CloudError>(i)
        });
        let results = Broker::new(2).run(Task::batch(op, 0..4)).await;

        assert_eq!(results.len(), 4);
        match &results[1].outcome {
            Err(TaskError::Panicked(msg)) => assert!(msg.contains("exploded on 1")),
            other => panic!("expected a panic failure, got {other:?}"),
        }
        assert!(results[0].is_success());
        assert!(results[2].is_success());
        assert!(results[3].is_success());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrency_never_exceeds_bound() {
        for k in [1, 2, 5] {
            let active = Arc::new(AtomicUsize::new(0));
            let peak = Arc::new(AtomicUsize::new(0));
            let (active_c, peak_c) = (active.clone(), peak.clone());

            let op = from_fn(move |_: usize| {
                let active = active_c.clone();
                let peak = peak_c.clone();
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, CloudError>(())
                }
            });
            let results = Broker::new(k).run(Task::batch(op, 0..20)).await;

            assert_eq!(results.len(), 20);
            assert!(peak.load(Ordering::SeqCst) <= k);
            assert_eq!(active.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn test_out_of_order_tasks_are_returned_by_index() {
        let op = Arc::new(from_fn(|s: &'static str| async move {
            Ok::<_, CloudError>(s.len())
        }));
        let tasks = vec![
            Task::new(2, "ccc", op.clone()),
            Task::new(0, "a", op.clone()),
            Task::new(1, "bb", op),
        ];
        let results = Broker::new(2).run(tasks).await;

        let indexes: Vec<_> = results.iter().map(|r| r.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert_eq!(results[2].outcome.as_ref().unwrap(), &3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_dropped_run_stops_in_flight_operations() {
        let completed = Arc::new(AtomicUsize::new(0));
        let counter = completed.clone();
        let op = from_fn(move |_: usize| {
            let counter = counter.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CloudError>(())
            }
        });

        let broker = Broker::new(4);
        let run = broker.run(Task::batch(op, 0..4));
        assert!(tokio::time::timeout(Duration::from_millis(20), run).await.is_err());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(completed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_throttle_delays_each_dequeue() {
        let op = from_fn(|i: usize| async move { Ok::<_, CloudError>(i) });
        let broker = Broker::new(1).with_throttle(Duration::from_millis(10));

        let started = Instant::now();
        let results = broker.run(Task::batch(op, 0..4)).await;

        assert_eq!(results.len(), 4);
        assert!(started.elapsed() >= Duration::from_millis(40));
    }
}
