//! Bulk Loader
//!
//! Partitions one table's statements and commits them through the worker
//! pool against a single data-write session.

use crate::backend::Session;
use crate::batch::{partition, DEFAULT_BATCH_SIZE};
use crate::committer::{commit_batches, CommitOptions, CommitReport, DEFAULT_NUM_WORKERS};
use crate::error::LoadError;
use crate::query::InsertStatement;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    pub batch_size: NonZeroUsize,
    pub num_workers: usize,
    pub fail_fast: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            batch_size: NonZeroUsize::new(DEFAULT_BATCH_SIZE).unwrap_or(NonZeroUsize::MIN),
            num_workers: DEFAULT_NUM_WORKERS,
            fail_fast: false,
        }
    }
}

pub struct BulkLoader<S> {
    session: Arc<S>,
    options: LoadOptions,
}

impl<S> BulkLoader<S>
where
    S: Session + 'static,
    S::Transaction: 'static,
{
    pub fn new(session: Arc<S>, options: LoadOptions) -> Self {
        Self { session, options }
    }

    /// Insert `statements`, blocking until every batch has been attempted.
    pub async fn load(&self, statements: Vec<InsertStatement>) -> Result<CommitReport, LoadError> {
        let total = statements.len();
        let batches = partition(statements, self.options.batch_size);
        info!(
            "⚙️  Committing {} statements in {} batches on {} workers (database={})",
            total,
            batches.len(),
            self.options.num_workers,
            self.session.database()
        );

        let report = commit_batches(
            self.session.clone(),
            batches,
            CommitOptions {
                num_workers: self.options.num_workers,
                fail_fast: self.options.fail_fast,
            },
        )
        .await?;

        info!("⏱️  Time elapsed {:.1} seconds", report.elapsed.as_secs_f64());
        Ok(report)
    }
}
