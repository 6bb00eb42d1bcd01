//! Message channel abstraction and its UDP/TCP transports
//!
//! A channel delivers whole messages in both directions. It reports its
//! lifecycle and every inbound message as a [`ChannelEvent`] on the `Sender`
//! it was created with, so the owner consumes everything from one queue.

pub mod error;
pub mod frame;
pub mod tcp;
pub mod udp;

pub use error::{ChannelError, Result};
pub use frame::{read_frame, Frame};
pub use tcp::TcpChannel;
pub use udp::UdpChannel;

use clap::ValueEnum;
use std::fmt;
use std::sync::mpsc::Sender;
use std::sync::Arc;

/// Maximum size of one inbound message. Longer TCP lines are dropped.
pub const MAX_MESSAGE_SIZE: usize = 1024;

/// Upper bound on a single stream write
pub const WRITE_TIMEOUT_MS: u64 = 1000;

/// Poll interval for reader threads checking whether their channel was closed
pub const READ_POLL_INTERVAL_MS: u64 = 200;

/// Something that happened on a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Connected,
    Disconnected,
    Message(Vec<u8>),
    Error(String),
}

/// Bidirectional, possibly unreliable, message transport.
pub trait MessageChannel: Send + Sync {
    /// Establishes the underlying connection and emits [`ChannelEvent::Connected`]
    fn connect(&self) -> Result<()>;

    /// Sends one message; fire-and-forget
    fn send(&self, message: &[u8]) -> Result<()>;

    /// Tears the connection down and emits [`ChannelEvent::Disconnected`] once
    fn close(&self);

    fn is_connected(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    /// One message per datagram; unreliable and unordered
    Udp,
    /// Newline-delimited messages over a stream; reliable and ordered
    Tcp,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Udp => write!(f, "udp"),
            Transport::Tcp => write!(f, "tcp"),
        }
    }
}

/// Builds an unconnected channel of the requested transport.
pub fn open(
    transport: Transport,
    addr: &str,
    events: Sender<ChannelEvent>,
) -> Arc<dyn MessageChannel> {
    match transport {
        Transport::Udp => Arc::new(UdpChannel::new(addr, events)),
        Transport::Tcp => Arc::new(TcpChannel::new(addr, events)),
    }
}


#[cfg(test)]
pub use mock::MockChannel;
