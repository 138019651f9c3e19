use thiserror::Error;

/// Configuration errors are always fatal at load time — none are retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config source: {0}")]
    Source(#[from] config::ConfigError),

    #[error("invalid network_cidr {0:?}: {1}")]
    InvalidCidr(String, String),

    #[error("invalid advertise_endpoint {0:?}: {1}")]
    InvalidEndpoint(String, String),

    #[error("invalid bootstrap peer {0:?}: {1}")]
    InvalidBootstrapPeer(String, String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
