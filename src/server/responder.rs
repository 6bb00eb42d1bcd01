//! Stateless echo responder

use crate::protocol::{now_ms, Echo, ProtocolResult, WireMessage};
use tracing::debug;

/// Turns each probe into an echo carrying the probe's fields plus server
/// receive/send timestamps. Holds no per-sequence state.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoResponder;

impl EchoResponder {
    pub fn new() -> Self {
        Self
    }

    /// Builds the echo for `payload` with explicit timestamps. Returns
    /// `Ok(None)` for messages that are valid but not probes.
    pub fn respond_at(
        &self,
        payload: &[u8],
        received_at: u64,
        sent_at: u64,
    ) -> ProtocolResult<Option<Echo>> {
        match WireMessage::decode(payload)? {
            WireMessage::Probe(probe) => Ok(Some(Echo::for_probe(&probe, received_at, sent_at))),
            WireMessage::Echo(echo) => {
                debug!(sequence = echo.sequence_number.0, "Echo received by server, ignored");
                Ok(None)
            }
        }
    }

    /// Encoded echo for `payload`, stamped as sent now
    pub fn respond(&self, payload: &[u8], received_at: u64) -> ProtocolResult<Option<Vec<u8>>> {
        let Some(echo) = self.respond_at(payload, received_at, now_ms())? else {
            return Ok(None);
        };
        Ok(Some(WireMessage::from(echo).encode()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Probe, ProtocolError, SequenceNumber};

    fn probe_bytes(seq: u64, sent_at: u64) -> Vec<u8> {
        WireMessage::from(Probe::new(SequenceNumber(seq), sent_at))
            .encode()
            .unwrap()
    }

    #[test]
    fn test_echo_carries_probe_and_timestamps() {
        let responder = EchoResponder::new();
        let echo = responder
            .respond_at(&probe_bytes(42, 1_000), 1_010, 1_011)
            .unwrap()
            .unwrap();

        assert_eq!(echo.sequence_number, SequenceNumber(42));
        assert_eq!(echo.client_sent_at, 1_000);
        assert_eq!(echo.server_received_at, 1_010);
        assert_eq!(echo.server_sent_at, 1_011);
    }

    #[test]
    fn test_respond_encodes_echo() {
        let responder = EchoResponder::new();
        let bytes = responder.respond(&probe_bytes(1, 5), 7).unwrap().unwrap();
        match WireMessage::decode(&bytes).unwrap() {
            WireMessage::Echo(echo) => {
                assert_eq!(echo.client_sent_at, 5);
                assert_eq!(echo.server_received_at, 7);
                assert!(echo.server_sent_at >= 7);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_same_probe_twice_gives_same_echo() {
        let responder = EchoResponder::new();
        let payload = probe_bytes(9, 100);
        let a = responder.respond_at(&payload, 200, 200).unwrap();
        let b = responder.respond_at(&payload, 200, 200).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_echo_input_is_ignored() {
        let responder = EchoResponder::new();
        let probe = Probe::new(SequenceNumber(1), 1);
        let echo = WireMessage::from(Echo::for_probe(&probe, 2, 3)).encode().unwrap();
        assert_eq!(responder.respond_at(&echo, 4, 4).unwrap(), None);
    }

    #[test]
    fn test_malformed_and_unknown_input() {
        let responder = EchoResponder::new();
        assert!(matches!(
            responder.respond(b"\xff\xfe", 0),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            responder.respond(br#"{"type":"candidate"}"#, 0),
            Err(ProtocolError::UnknownType(_))
        ));
    }
}
