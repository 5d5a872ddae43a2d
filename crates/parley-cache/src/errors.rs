//! History load errors.

use thiserror::Error;

/// A history fetch failed. The window is left unchanged and the load may be retried.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The backend answered with a failure.
    #[error("history load rejected: {0}")]
    Rejected(String),
    /// The backend could not be reached.
    #[error("history backend unavailable: {0}")]
    Unavailable(String),
}

impl LoadError {
    /// Short classification string for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Rejected(_) => "rejected",
            Self::Unavailable(_) => "unavailable",
        }
    }
}
