//! Fixed-size worker pool
//!
//! `jobs` workers pull units from one shared queue until it is empty. Each
//! unit runs as its own tokio task, so a panicking unit is reported instead
//! of taking its worker down. With `jobs == 1` there is exactly one worker
//! and units run strictly in submission order.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Cooperative stop signal shared by the CLI and every worker
///
/// Workers check it before taking the next unit. The unit in flight is
/// always finished, so completed cache writes are never cut short.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// What became of a single unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The unit ran to completion (its own result may still be a failure)
    Done(T),

    /// Shutdown was requested before the unit started
    Cancelled,

    /// The unit panicked
    Panicked(String),
}

/// Unit result tagged with its submission position and key
#[derive(Debug)]
pub struct TaskResult<K, T> {
    pub index: usize,
    pub key: K,
    pub outcome: Outcome<T>,
}

type Queue<K, F> = Arc<Mutex<VecDeque<(usize, K, F)>>>;

#[derive(Debug, Clone)]
pub struct WorkerPool {
    jobs: usize,
    shutdown: Shutdown,
}

impl WorkerPool {
    /// Creates a pool of `jobs` workers (at least one)
    pub fn new(jobs: usize, shutdown: Shutdown) -> Self {
        Self {
            jobs: jobs.max(1),
            shutdown,
        }
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Runs every unit and returns one result per unit, in submission order
    ///
    /// # Arguments
    ///
    /// * `tasks` - `(key, unit)` pairs; a unit is a closure producing the future to run
    ///
    /// # Returns
    ///
    /// One [`TaskResult`] per submitted unit, sorted by submission index
    pub async fn run<K, T, F, Fut, I>(&self, tasks: I) -> Vec<TaskResult<K, T>>
    where
        I: IntoIterator<Item = (K, F)>,
        K: Send + 'static,
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let queue: Queue<K, F> = Arc::new(Mutex::new(
            tasks
                .into_iter()
                .enumerate()
                .map(|(index, (key, unit))| (index, key, unit))
                .collect(),
        ));

        let total = queue.lock().map(|q| q.len()).unwrap_or(0);
        if total == 0 {
            return Vec::new();
        }

        let workers = self.jobs.min(total);
        tracing::debug!("Running {} units on {} worker(s)", total, workers);

        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let queue = Arc::clone(&queue);
            let shutdown = self.shutdown.clone();
            handles.push(tokio::spawn(work(worker, queue, shutdown)));
        }

        let mut results = Vec::with_capacity(total);
        for handle in handles {
            match handle.await {
                Ok(mut finished) => results.append(&mut finished),
                Err(e) => tracing::error!("Worker task failed: {}", e),
            }
        }

        results.sort_by_key(|r| r.index);
        results
    }
}

async fn work<K, T, F, Fut>(
    worker: usize,
    queue: Queue<K, F>,
    shutdown: Shutdown,
) -> Vec<TaskResult<K, T>>
where
    K: Send + 'static,
    T: Send + 'static,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    let mut finished = Vec::new();

    loop {
        // The guard must be dropped before awaiting
        let next = match queue.lock() {
            Ok(mut q) => q.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };
        let Some((index, key, unit)) = next else {
            break;
        };

        if shutdown.is_triggered() {
            finished.push(TaskResult {
                index,
                key,
                outcome: Outcome::Cancelled,
            });
            continue;
        }

        let outcome = match tokio::spawn(unit()).await {
            Ok(value) => Outcome::Done(value),
            Err(e) => {
                tracing::error!("Worker {}: unit {} panicked: {}", worker, index, e);
                Outcome::Panicked(e.to_string())
            }
        };
        finished.push(TaskResult {
            index,
            key,
            outcome,
        });
    }

    finished
}
