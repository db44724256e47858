//! Writes committed batches to a TypeQL script instead of a server.
//!
//! Used for dry runs: the output can be reviewed, or replayed later through
//! the TypeDB console.

use super::{Session, WriteTransaction};
use crate::error::BackendError;
use crate::query::InsertStatement;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

pub struct ScriptSession<W> {
    database: String,
    out: Arc<Mutex<W>>,
    commits: Arc<AtomicUsize>,
}

impl<W> ScriptSession<W> {
    pub fn new(database: impl Into<String>, out: W) -> Self {
        Self {
            database: database.into(),
            out: Arc::new(Mutex::new(out)),
            commits: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// The underlying writer, once no transaction holds it any more
    #[cfg(test)]
    pub fn into_inner(self) -> Option<W> {
        Arc::try_unwrap(self.out).ok().map(Mutex::into_inner)
    }
}

impl ScriptSession<tokio::io::BufWriter<tokio::fs::File>> {
    pub async fn create(database: impl Into<String>, path: &std::path::Path) -> Result<Self, BackendError> {
        let file = tokio::fs::File::create(path).await?;
        Ok(Self::new(database, tokio::io::BufWriter::new(file)))
    }
}

pub struct ScriptTransaction<W> {
    statements: Vec<String>,
    out: Arc<Mutex<W>>,
    commits: Arc<AtomicUsize>,
}

#[async_trait]
impl<W> Session for ScriptSession<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    type Transaction = ScriptTransaction<W>;

    fn database(&self) -> &str {
        &self.database
    }

    async fn open_write(&self) -> Result<ScriptTransaction<W>, BackendError> {
        Ok(ScriptTransaction {
            statements: Vec::new(),
            out: self.out.clone(),
            commits: self.commits.clone(),
        })
    }
}

#[async_trait]
impl<W> WriteTransaction for ScriptTransaction<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn insert(&mut self, statement: &InsertStatement) -> Result<(), BackendError> {
        self.statements.push(statement.as_str().to_string());
        Ok(())
    }

    async fn commit(self) -> Result<(), BackendError> {
        // A batch is written in one piece so batches never interleave.
        let mut text = self.statements.join("\n");
        text.push('\n');

        let mut out = self.out.lock().await;
        out.write_all(text.as_bytes()).await?;
        out.flush().await?;
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self) -> Result<(), BackendError> {
        Ok(())
    }
}
