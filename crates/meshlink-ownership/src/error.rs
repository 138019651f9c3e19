use thiserror::Error;

/// Ownership errors (§7). `Contended` is never retried automatically — the
/// caller (or the sweeper, on the next lease check) decides whether to try
/// again.
#[derive(Debug, Error)]
pub enum OwnershipError {
    #[error("deployment {0:?} not found")]
    NotFound(String),

    #[error("deployment {deploy_id:?} is owned by another machine")]
    Contended { deploy_id: String },
}

pub type Result<T> = std::result::Result<T, OwnershipError>;
