//! Transactional Write Backends
//!
//! A `Session` is scoped to one named database and hands out write
//! transactions. It is shared by every commit worker, so implementations must
//! allow concurrent `open_write` calls.

pub mod script;
pub mod typedb;

#[cfg(test)]
pub(crate) mod recording;

pub use script::ScriptSession;
pub use typedb::TypeDbClient;

use crate::error::BackendError;
use crate::query::InsertStatement;
use async_trait::async_trait;

#[async_trait]
pub trait Session: Send + Sync {
    type Transaction: WriteTransaction;

    /// Name of the database this session writes to
    fn database(&self) -> &str;

    async fn open_write(&self) -> Result<Self::Transaction, BackendError>;
}

#[async_trait]
pub trait WriteTransaction: Send {
    async fn insert(&mut self, statement: &InsertStatement) -> Result<(), BackendError>;

    async fn commit(self) -> Result<(), BackendError>;

    /// Discard everything executed so far
    async fn rollback(self) -> Result<(), BackendError>;
}
