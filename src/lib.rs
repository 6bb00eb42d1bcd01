//! Pingwatch - live round-trip latency, jitter and packet loss monitor
//!
//! A client sends sequence-numbered probes over a message channel at a fixed
//! interval, a server echoes them back with its own timestamps, and the client
//! keeps a rolling window of round-trip times from which it derives live
//! metrics and a connection quality rating. Probes that stay unanswered past
//! their timeout are swept and counted as lost.

pub mod channel;
pub mod client;
pub mod protocol;
pub mod server;
