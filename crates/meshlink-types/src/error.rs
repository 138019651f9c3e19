use thiserror::Error;

/// Failures produced while constructing or validating replicated rows.
#[derive(Debug, Error)]
pub enum TypesError {
    #[error("invalid public key {0:?}: {1}")]
    InvalidPublicKey(String, String),

    #[error("invalid CIDR {0:?}: {1}")]
    InvalidCidr(String, String),

    #[error("subnet index {index} exhausts {cidr}")]
    SubnetExhausted { cidr: String, index: u32 },

    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },
}

pub type Result<T> = std::result::Result<T, TypesError>;
