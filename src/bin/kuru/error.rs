//! Error types for the command line client.

use kuru_sdk::error::KuruError;

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Environment configuration error: {0}")]
    EnvConfig(#[from] envy::Error),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(#[from] alloy::signers::local::LocalSignerError),

    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(#[from] url::ParseError),

    #[error("Kuru SDK error: {0}")]
    Kuru(#[from] KuruError),

    #[error("Failed to wait for interrupt: {0}")]
    Signal(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
