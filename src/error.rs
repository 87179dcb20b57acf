use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CorkboardError {
    #[error("Invalid entity: {0}")]
    InvalidEntity(String),

    #[error("Card not found: {0}")]
    CardNotFound(String),

    #[error("Connection {connection_id} not found on card {card_id}")]
    ConnectionNotFound {
        card_id: String,
        connection_id: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Batch queue full ({0} commands pending)")]
    QueueFull(usize),

    #[error("Batcher has shut down")]
    BatcherClosed,

    #[error("Flush task failed: {0}")]
    FlushAborted(String),

    #[error("Gave up after {attempts} failed flush attempts")]
    ExhaustedRetries { attempts: u32 },
}

pub type Result<T> = std::result::Result<T, CorkboardError>;

impl From<std::io::Error> for CorkboardError {
    fn from(e: std::io::Error) -> Self {
        CorkboardError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for CorkboardError {
    fn from(e: serde_json::Error) -> Self {
        CorkboardError::Json(e.to_string())
    }
}

impl CorkboardError {
    /// Whether a later attempt at the same call could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            CorkboardError::Network(_) => true,
            CorkboardError::Http { status, .. } => *status >= 500 || *status == 429,
            CorkboardError::QueueFull(_) | CorkboardError::FlushAborted(_) => true,
            CorkboardError::InvalidEntity(_)
            | CorkboardError::CardNotFound(_)
            | CorkboardError::ConnectionNotFound { .. }
            | CorkboardError::Json(_)
            | CorkboardError::Io(_)
            | CorkboardError::Config(_)
            | CorkboardError::BatcherClosed
            | CorkboardError::ExhaustedRetries { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(CorkboardError::Network("reset".into()).is_transient());
        assert!(CorkboardError::Http {
            status: 503,
            message: "busy".into()
        }
        .is_transient());
        assert!(!CorkboardError::Http {
            status: 404,
            message: "gone".into()
        }
        .is_transient());
        assert!(!CorkboardError::InvalidEntity("".into()).is_transient());
        assert!(CorkboardError::FlushAborted("panicked".into()).is_transient());
    }

    #[test]
    fn test_json_error_conversion() {
        let err: CorkboardError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, CorkboardError::Json(_)));
    }
}
