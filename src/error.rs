use thiserror::Error;
use tokio::task::JoinError;

#[derive(Error, Debug, Clone)]
pub enum AppError {
    #[error("Transport failure: {0}")]
    Transport(String),
    #[error("Timeout during request: {0}")]
    Timeout(String),
    #[error("Response decode error ({context}): {message}")]
    Decode { message: String, context: String },
    #[error("Store returned HTTP {status} ({context}): {message}")]
    Store {
        status: u16,
        message: String,
        context: String,
    },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Invalid argument provided: {0}")]
    Argument(String),
    #[error("Filesystem I/O error: {0}")]
    Io(String),
    #[error("Tokio task join error: {0}")]
    JoinError(String),
    #[error("Semaphore acquisition error: {0}")]
    SemaphoreAcquire(String),
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AppError::Timeout(e.to_string())
        } else if e.is_decode() {
            AppError::decode(e.to_string(), "response body")
        } else {
            AppError::Transport(e.to_string())
        }
    }
}
impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}
impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::decode(e.to_string(), "json")
    }
}
impl From<JoinError> for AppError {
    fn from(e: JoinError) -> Self {
        AppError::JoinError(e.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn decode<S: Into<String>>(message: S, context: &str) -> AppError {
        AppError::Decode {
            message: message.into(),
            context: context.to_string(),
        }
    }

    pub fn store<S: Into<String>>(status: u16, message: S, context: &str) -> AppError {
        AppError::Store {
            status,
            message: message.into(),
            context: context.to_string(),
        }
    }

    /// True for the error kinds produced by a round trip to the remote store.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            AppError::Transport(_)
                | AppError::Timeout(_)
                | AppError::Decode { .. }
                | AppError::Store { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_kinds_are_flagged() {
        assert!(AppError::Transport("refused".into()).is_remote());
        assert!(AppError::decode("bad", "products").is_remote());
        assert!(AppError::store(409, "conflict", "products").is_remote());
        assert!(!AppError::Config("missing url".into()).is_remote());
        assert!(!AppError::Argument("page size".into()).is_remote());
    }

    #[test]
    fn serde_errors_become_decode() {
        let err = serde_json::from_str::<Vec<i64>>("{").unwrap_err();
        assert!(matches!(AppError::from(err), AppError::Decode { .. }));
    }
}
