use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GigiError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid knowledge base: {0}")]
    InvalidKnowledgeBase(String),

    #[error("Invalid intent table: {0}")]
    InvalidIntentTable(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Embedding error: {0}")]
    Embedding(String),
}

impl GigiError {
    /// Wraps a provider failure, keeping the whole context chain.
    pub fn embedding(err: anyhow::Error) -> Self {
        Self::Embedding(format!("{err:#}"))
    }
}

pub type Result<T> = std::result::Result<T, GigiError>;
