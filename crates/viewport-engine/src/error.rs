//! Error types for viewport-engine operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("no occurrence matches recurrence id {0}")]
    InvalidRecurrenceId(String),

    #[error("invalid recurrence rule: {0}")]
    InvalidRule(String),

    #[error("result size limit of {limit} exceeded")]
    ResultSizeExceeded { limit: usize },

    #[error("upstream failure: {0}")]
    Upstream(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
