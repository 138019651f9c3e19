use thiserror::Error;

/// Error kinds a `Registry` implementation may return (§7). `NodeDead` and
/// `Conflict` are the two the reconciler worker treats specially: the
/// former fails fast with no retry, the latter is handed back to the
/// caller to retry with a fresh `expected_version`.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("local replica is dead")]
    NodeDead,

    #[error("version conflict: expected {expected}, found {found}")]
    Conflict {
        expected: meshlink_types::Version,
        found: meshlink_types::Version,
    },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
