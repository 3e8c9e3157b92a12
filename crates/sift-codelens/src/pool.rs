//! Process-wide worker pool for CPU-bound stages.
//!
//! Chunking and tokenization run on a dedicated rayon pool sized to a quarter
//! of the available cores, entered from async code through
//! [`tokio::task::spawn_blocking`] so runtime threads are never blocked.

use std::sync::OnceLock;

use rayon::{ThreadPool, ThreadPoolBuilder};
use sift_core::SiftError;

static POOL: OnceLock<ThreadPool> = OnceLock::new();

/// Number of worker threads: a quarter of the cores, at least one.
pub fn worker_count() -> usize {
    let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
    (cores / 4).max(1)
}

/// The shared pool, built on first use.
///
/// # Errors
///
/// Returns [`SiftError::Worker`] if the threads cannot be spawned.
pub fn worker_pool() -> Result<&'static ThreadPool, SiftError> {
    if let Some(pool) = POOL.get() {
        return Ok(pool);
    }
    let threads = worker_count();
    let pool = ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("sift-worker-{i}"))
        .build()
        .map_err(|e| SiftError::Worker(format!("cannot start worker pool: {e}")))?;
    tracing::debug!(threads, "worker pool started");
    Ok(POOL.get_or_init(|| pool))
}

/// Run `job` inside the worker pool without blocking the async runtime.
///
/// # Errors
///
/// Returns [`SiftError::Worker`] if the pool cannot start or the job panics.
///
/// # Examples
///
/// ```
/// use rayon::prelude::*;
/// use sift_codelens::pool::run_blocking;
///
/// # #[tokio::main]
/// # async fn main() {
/// let total = run_blocking(|| (1..=100u64).into_par_iter().sum::<u64>()).await.unwrap();
/// assert_eq!(total, 5050);
/// # }
/// ```
pub async fn run_blocking<F, T>(job: F) -> Result<T, SiftError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let pool = worker_pool()?;
    tokio::task::spawn_blocking(move || pool.install(job))
        .await
        .map_err(|e| SiftError::Worker(e.to_string()))
}
