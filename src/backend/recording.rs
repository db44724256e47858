//! In-memory session that records every transaction, for tests.

use super::{Session, WriteTransaction};
use crate::error::BackendError;
use crate::query::InsertStatement;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Journal {
    committed: Vec<Vec<String>>,
    rolled_back: Vec<Vec<String>>,
    empty_commits: usize,
}

#[derive(Clone, Default)]
pub struct RecordingSession {
    journal: Arc<Mutex<Journal>>,
    opened: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    peak_active: Arc<AtomicUsize>,
    /// Statements containing this text fail on insert
    fail_on: Option<String>,
    /// Batches containing this text are refused at commit
    fail_commit_on: Option<String>,
    /// Holds each insert open so workers overlap
    delay: Option<Duration>,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_on: Some(marker.to_string()),
            ..Self::default()
        }
    }

    pub fn failing_commit_on(marker: &str) -> Self {
        Self {
            fail_commit_on: Some(marker.to_string()),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn committed(&self) -> Vec<Vec<String>> {
        self.journal.lock().unwrap().committed.clone()
    }

    pub fn rolled_back(&self) -> Vec<Vec<String>> {
        self.journal.lock().unwrap().rolled_back.clone()
    }

    pub fn empty_commits(&self) -> usize {
        self.journal.lock().unwrap().empty_commits
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn peak_active(&self) -> usize {
        self.peak_active.load(Ordering::SeqCst)
    }
}

pub struct RecordingTransaction {
    session: RecordingSession,
    statements: Vec<String>,
}

impl RecordingTransaction {
    fn finish(&self) {
        self.session.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Session for RecordingSession {
    type Transaction = RecordingTransaction;

    fn database(&self) -> &str {
        "recording"
    }

    async fn open_write(&self) -> Result<RecordingTransaction, BackendError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_active.fetch_max(now, Ordering::SeqCst);
        Ok(RecordingTransaction {
            session: self.clone(),
            statements: Vec::new(),
        })
    }
}

#[async_trait]
impl WriteTransaction for RecordingTransaction {
    async fn insert(&mut self, statement: &InsertStatement) -> Result<(), BackendError> {
        if let Some(delay) = self.session.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(marker) = &self.session.fail_on {
            if statement.as_str().contains(marker.as_str()) {
                return Err(BackendError::Status {
                    status: 400,
                    body: format!("rejected: {}", statement),
                });
            }
        }
        self.statements.push(statement.as_str().to_string());
        Ok(())
    }

    async fn commit(self) -> Result<(), BackendError> {
        self.finish();
        let mut journal = self.session.journal.lock().unwrap();
        if let Some(marker) = &self.session.fail_commit_on {
            if self.statements.iter().any(|s| s.contains(marker.as_str())) {
                journal.rolled_back.push(self.statements.clone());
                return Err(BackendError::Status {
                    status: 500,
                    body: "commit refused".to_string(),
                });
            }
        }
        if self.statements.is_empty() {
            journal.empty_commits += 1;
        }
        journal.committed.push(self.statements.clone());
        Ok(())
    }

    async fn rollback(self) -> Result<(), BackendError> {
        self.finish();
        let mut journal = self.session.journal.lock().unwrap();
        journal.rolled_back.push(self.statements.clone());
        Ok(())
    }
}
