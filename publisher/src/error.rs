use thiserror::Error;

/// Failures while posting a thread
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PublishError {
    /// Non-2xx response from the platform
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// 2xx response that does not carry a post id
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request signing failed: {0}")]
    Signing(String),

    #[error("publish cancelled")]
    Cancelled,

    #[error("another publisher holds the lock for run {0}")]
    AlreadyInProgress(String),

    /// A previous attempt posted part of the thread and then failed
    #[error("run {run_id} has a failed publish on record with posted ids {partial_ids:?}")]
    PartiallyPublished { run_id: String, partial_ids: Vec<String> },

    #[error("missing credential: {0}")]
    MissingCredentials(String),
}

impl PublishError {
    /// Only rate limiting and server errors are worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            PublishError::Http { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            PublishError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for PublishError {
    fn from(err: reqwest::Error) -> Self {
        PublishError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> PublishError {
        PublishError::Http {
            status,
            body: String::new(),
        }
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(http(429).is_retryable());
        assert!(http(500).is_retryable());
        assert!(http(503).is_retryable());
        assert!(!http(400).is_retryable());
        assert!(!http(401).is_retryable());
        assert!(!http(403).is_retryable());
        assert!(!PublishError::Transport("reset".to_string()).is_retryable());
        assert!(!PublishError::Protocol("no id".to_string()).is_retryable());
    }
}
