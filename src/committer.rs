//! Concurrent Batch Committer
//!
//! A fixed pool of workers drains a shared queue of batches. Each batch is
//! written in its own write transaction: open, run every statement in order,
//! commit. Workers are all joined before `commit_batches` returns.

use crate::backend::{Session, WriteTransaction};
use crate::batch::{Batch, Batches};
use crate::error::{BackendError, LoadError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

pub const DEFAULT_NUM_WORKERS: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct CommitOptions {
    pub num_workers: usize,
    /// Stop handing out batches once one has failed
    pub fail_fast: bool,
}

impl Default for CommitOptions {
    fn default() -> Self {
        Self {
            num_workers: DEFAULT_NUM_WORKERS,
            fail_fast: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub batches: usize,
    pub statements: usize,
    pub elapsed: Duration,
}

#[derive(Default)]
struct WorkerTally {
    batches: usize,
    statements: usize,
    failed: usize,
}

/// Shared state of one commit run
struct Pool {
    queue: Mutex<Batches>,
    failure: Mutex<Option<LoadError>>,
    stopped: AtomicBool,
    fail_fast: bool,
}

impl Pool {
    fn next_batch(&self) -> Option<Batch> {
        if self.fail_fast && self.stopped.load(Ordering::SeqCst) {
            return None;
        }
        match self.queue.lock() {
            Ok(mut queue) => queue.next(),
            Err(poisoned) => poisoned.into_inner().next(),
        }
    }

    fn record_failure(&self, err: LoadError) {
        self.stopped.store(true, Ordering::SeqCst);
        let mut slot = match self.failure.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    fn take_failure(&self) -> Option<LoadError> {
        match self.failure.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

/// Write one batch in one transaction. A failed statement rolls the whole
/// transaction back.
async fn write_batch<S: Session>(session: &S, batch: &Batch) -> Result<(), BackendError> {
    let mut tx = session.open_write().await?;
    for statement in &batch.statements {
        if let Err(e) = tx.insert(statement).await {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("Rollback of batch {} also failed: {}", batch.index, rollback_err);
            }
            return Err(e);
        }
    }
    tx.commit().await
}

async fn run_worker<S: Session>(worker: usize, session: Arc<S>, pool: Arc<Pool>) -> WorkerTally {
    let mut tally = WorkerTally::default();

    while let Some(batch) = pool.next_batch() {
        if batch.is_empty() {
            continue;
        }
        match write_batch(session.as_ref(), &batch).await {
            Ok(()) => {
                debug!("Worker {} committed batch {} ({} statements)", worker, batch.index, batch.len());
                tally.batches += 1;
                tally.statements += batch.len();
            }
            Err(source) => {
                warn!("❌ Batch {} failed on worker {}: {}", batch.index, worker, source);
                tally.failed += 1;
                pool.record_failure(LoadError::Commit {
                    batch: batch.index,
                    source,
                });
            }
        }
    }

    tally
}

/// Commit every batch using `options.num_workers` concurrent workers.
///
/// Returns once every worker has finished. If any batch failed, the first
/// failure is returned; batches committed by other workers stay committed.
pub async fn commit_batches<S>(
    session: Arc<S>,
    batches: Batches,
    options: CommitOptions,
) -> Result<CommitReport, LoadError>
where
    S: Session + 'static,
    S::Transaction: 'static,
{
    let started = Instant::now();
    let pool = Arc::new(Pool {
        queue: Mutex::new(batches),
        failure: Mutex::new(None),
        stopped: AtomicBool::new(false),
        fail_fast: options.fail_fast,
    });

    let mut workers = JoinSet::new();
    for worker in 0..options.num_workers.max(1) {
        workers.spawn(run_worker(worker, session.clone(), pool.clone()));
    }

    let mut report = CommitReport::default();
    let mut failed = 0;
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(tally) => {
                report.batches += tally.batches;
                report.statements += tally.statements;
                failed += tally.failed;
            }
            Err(e) => pool.record_failure(LoadError::Worker(e.to_string())),
        }
    }
    report.elapsed = started.elapsed();

    match pool.take_failure() {
        Some(err) => {
            error!(
                "{} batch(es) failed, {} committed before the run stopped",
                failed, report.batches
            );
            Err(err)
        }
        None => Ok(report),
    }
}
