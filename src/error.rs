//! Error taxonomy for the load pipeline.

use thiserror::Error;

/// Failure reported by a backend while opening, writing or committing.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum LoadError {
    /// Mapping or schema problem found before any statement was built.
    #[error("configuration error for `{thing}`: {reason}")]
    Configuration { thing: String, reason: String },

    /// A cell that cannot be read as the attribute's declared value type.
    #[error("row {row} of `{thing}`: cannot read `{value}` in column `{column}` as {expected}")]
    Generation {
        thing: String,
        row: usize,
        column: String,
        value: String,
        expected: String,
    },

    /// A role-player whose identifying values are all missing in one row.
    #[error("row {row} of `{thing}`: role player ${variable} has no identifying value")]
    Unmatchable {
        thing: String,
        row: usize,
        variable: String,
    },

    #[error("batch {batch} failed: {source}")]
    Commit {
        batch: usize,
        #[source]
        source: BackendError,
    },

    #[error("worker task failed: {0}")]
    Worker(String),
}

impl LoadError {
    pub fn config(thing: impl Into<String>, reason: impl Into<String>) -> Self {
        LoadError::Configuration {
            thing: thing.into(),
            reason: reason.into(),
        }
    }
}
