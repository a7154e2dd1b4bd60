//! Error types for the detection service.
//!
//! The taxonomy mirrors how each failure is handled rather than where it
//! originates:
//!
//! - [`ShieldError::ModelUnavailable`] is fatal at startup; the process must
//!   not begin serving without usable artifacts.
//! - [`ShieldError::Inference`] and [`ShieldError::Storage`] are recovered
//!   close to where they occur: a failed prediction becomes a fallback
//!   decision, a failed log append never blocks a response.
//! - [`ShieldError::InvalidInput`] is produced at the HTTP boundary and never
//!   reaches the detection core.

use thiserror::Error;

/// Detection service errors.
#[derive(Error, Debug)]
pub enum ShieldError {
    /// Configuration error (bad file, bad env value, invalid rule pattern).
    #[error("Config error: {0}")]
    Config(String),

    /// Malformed inbound request, rejected at the boundary.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Model artifacts missing or unusable at startup.
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Feature transformation or prediction failed at request time.
    #[error("Inference error: {0}")]
    Inference(String),

    /// Query log store error.
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for detection operations
pub type Result<T> = std::result::Result<T, ShieldError>;

impl ShieldError {
    /// Whether the service keeps running after this error.
    ///
    /// Recoverable errors are absorbed at the stage that produced them: an
    /// inference failure turns into a fallback decision, a storage failure
    /// is logged and the response still goes out. Everything else aborts
    /// the operation that raised it.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ShieldError::Inference(_) | ShieldError::Storage(_))
    }
}

impl From<toml::de::Error> for ShieldError {
    fn from(err: toml::de::Error) -> Self {
        ShieldError::Config(err.to_string())
    }
}
