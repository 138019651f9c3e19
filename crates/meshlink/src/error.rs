use thiserror::Error;

/// The facade's unified error type — every sub-crate error wrapped once,
/// so a caller that only imports `meshlink` never needs to name a
/// sub-crate's error type directly. Mirrors the teacher's facade-level
/// `KimberliteError`.
#[derive(Debug, Error)]
pub enum MeshlinkError {
    #[error(transparent)]
    Config(#[from] meshlink_config::ConfigError),

    #[error(transparent)]
    State(#[from] meshlink_state::StateError),

    #[error(transparent)]
    Registry(#[from] meshlink_registry::RegistryError),

    #[error(transparent)]
    Reconciler(#[from] meshlink_reconciler::ReconcilerError),

    #[error(transparent)]
    Ownership(#[from] meshlink_ownership::OwnershipError),

    #[error(transparent)]
    Platform(#[from] meshlink_platform::PlatformError),

    #[error("no usable /24 remains in network CIDR {0}")]
    SubnetsExhausted(String),
}

pub type Result<T> = std::result::Result<T, MeshlinkError>;
