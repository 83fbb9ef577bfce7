//! Runtime errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("invalid runtime configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to spawn runtime thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    #[error("render backend failed: {0}")]
    Backend(String),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
