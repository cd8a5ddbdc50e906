//! Error types shared across crates

use thiserror::Error;

/// Core errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("engine error: {0}")]
    Engine(String),

    #[error("session error: {0}")]
    Session(String),
}

pub type Result<T> = std::result::Result<T, Error>;
