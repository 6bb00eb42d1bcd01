use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Network I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ServerError>;
