use thiserror::Error;
use tower::BoxError;
use uuid::Uuid;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bridge Error: {0}")]
    Bridge(#[from] BridgeError),
    #[error("Configuration Error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    InvalidSettings(String),
    #[error("Session {0} is no longer running")]
    SessionClosed(Uuid),
    #[error("Session {0} is not keeping up with input")]
    SessionBusy(Uuid),
    #[error("UI Error: {0}")]
    Ui(String),
}

// Event channel error type, one variant per transport failure a command can hit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("event channel unavailable")]
    ChannelUnavailable,
    #[error("command acknowledgement timed out")]
    CommandTimeout,
    #[error("{0}")]
    CommandRejected(String),
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl BridgeError {
    /// Recovers a `BridgeError` from the boxed error produced by tower middleware.
    pub fn from_boxed(err: BoxError) -> Self {
        if err.is::<tower::timeout::error::Elapsed>() {
            return BridgeError::CommandTimeout;
        }
        match err.downcast::<BridgeError>() {
            Ok(err) => *err,
            Err(other) => BridgeError::Protocol(other.to_string()),
        }
    }
}
