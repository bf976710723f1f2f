//! Error types for rolecall.

use thiserror::Error;

use crate::store::Entity;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0} already exists: {1}")]
    DuplicateKey(Entity, String),

    #[error("{0} not found: {1}")]
    NotFound(Entity, String),

    #[error("Malformed command: {0}")]
    MalformedCommand(String),

    #[error("Reserved command name: {0}")]
    ReservedName(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
