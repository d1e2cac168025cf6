//! Error types for the relay. The buffers themselves cannot fail.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("failed to spawn thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
