//! Protocol module for Pingwatch

pub mod clock;
pub mod error;
pub mod message;

pub use clock::now_ms;
pub use error::{ProtocolError, Result as ProtocolResult};
pub use message::{Echo, Probe, SequenceNumber, WireMessage};
