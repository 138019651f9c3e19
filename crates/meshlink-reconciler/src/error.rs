use thiserror::Error;

/// Errors produced by the reconciliation engine (§7). `Fatal` is the only
/// variant the worker does not retry past — it exits carrying the wrapped
/// cause.
#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("registry operation failed: {0}")]
    Registry(#[from] meshlink_registry::RegistryError),

    #[error("platform operation failed: {0}")]
    Platform(#[from] meshlink_platform::PlatformError),

    #[error("invalid peer public key for machine {machine_id:?}: {source}")]
    InvalidPeerKey {
        machine_id: String,
        source: meshlink_types::TypesError,
    },

    #[error("subscription could not be (re)established after retrying: {0}")]
    SubscriptionExhausted(String),

    #[error("{context}: {source}")]
    Fatal {
        context: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

pub type Result<T> = std::result::Result<T, ReconcilerError>;
