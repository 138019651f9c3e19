use thiserror::Error;

/// Platform-port errors (§7 "Platform"): reconcile bubbles these up and
/// reports via the failure callback, the next tick retries.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("{op} failed: {message}")]
    Operation { op: &'static str, message: String },

    #[error("{kind} {name:?} not found")]
    NotFound { kind: &'static str, name: String },
}

pub type Result<T> = std::result::Result<T, PlatformError>;
