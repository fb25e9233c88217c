use thiserror::Error;

/// Failures surfaced by the GitHub client, the persisted store and the cache
/// gateway. Handlers turn these into HTTP status codes via [`HubError::kind`].
#[derive(Error, Debug)]
pub enum HubError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("GitHub API returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("GitHub rate limit exceeded, resets at {reset_at}")]
    RateLimited { reset_at: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Pagination stopped after {pages} pages without reaching the last page")]
    PageLimitExceeded { pages: u32 },

    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller supplied something unusable.
    Validation,
    /// Caller asked for something that is not there.
    Missing,
    /// GitHub or the persisted store failed.
    Upstream,
}

impl HubError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HubError::InvalidInput(_) => ErrorKind::Validation,
            HubError::NotFound(_) => ErrorKind::Missing,
            _ => ErrorKind::Upstream,
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        HubError::InvalidInput(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, HubError>;
