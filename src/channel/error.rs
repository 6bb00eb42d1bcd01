use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Network I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    #[error("Channel is not connected")]
    NotConnected,
}

pub type Result<T> = std::result::Result<T, ChannelError>;
