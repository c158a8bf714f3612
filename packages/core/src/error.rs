//! Caller-visible error types for the submission and query API.

use thiserror::Error;

use crate::JobId;

/// Errors surfaced when submitting a job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The request failed validation; no job was created.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The engine is not running or its mailbox is gone.
    #[error("engine unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced when querying job status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    /// The id is unknown to both the status store and the record store.
    #[error("no job found for id {0}")]
    NotFound(JobId),

    /// The engine is not running or the record store cannot be reached.
    #[error("engine unavailable: {0}")]
    Unavailable(String),
}
