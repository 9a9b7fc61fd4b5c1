use thiserror::Error;

pub type Result<T, E = SyncError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Source unavailable for '{museum}': {message}")]
    SourceUnavailable { museum: String, message: String },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Index write error: {0}")]
    IndexWrite(String),

    #[error("Mirror write error: {0}")]
    MirrorWrite(String),

    #[error("A sync pass is already in progress for '{museum}'")]
    PassInProgress { museum: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod embeddings;
pub mod engine;
pub mod index;
pub mod mirror;
pub mod model;
pub mod normalize;
pub mod sources;
