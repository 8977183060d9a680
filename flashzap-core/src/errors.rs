use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(&'static str),
    #[error("invalid input: {0}")]
    Invalid(&'static str),
    #[error("conflict: {0}")]
    Conflict(&'static str),
    #[error("storage error: {0}")]
    Storage(&'static str),
}

/// Failure of the external grading oracle. Never retried by the core.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OracleError {
    #[error("grader not configured: {0}")]
    NotConfigured(&'static str),
    #[error("grader unavailable: {0}")]
    Unavailable(String),
    #[error("malformed grader response: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error(transparent)]
    Store(#[from] CoreError),
    #[error("review deck is drained")]
    Drained,
    #[error("card is not at the front of the deck")]
    NotCurrent,
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("file is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] CoreError),
}
