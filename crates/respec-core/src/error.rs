use thiserror::Error;

use crate::config::ConfigError;
use crate::session::SessionError;

/// Top-level error type for the respec-core library.
#[derive(Debug, Error)]
pub enum RespecError {
    /// Configuration read, parse or validation error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Interactive session error.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The session hit a loading failure and must be reloaded before use.
    #[error("session is unusable until reloaded")]
    SessionUnusable,

    /// No session is running; `start` was never called or `stop` already ran.
    #[error("session is not running")]
    NotStarted,

    /// Wraps `std::io::Error`.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, RespecError>;
