use crate::protocol::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceNumber(pub u64);

impl SequenceNumber {
    pub fn next(self) -> Self {
        SequenceNumber(self.0.wrapping_add(1))
    }
}

/// Client-originated request for an echo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Probe {
    pub sequence_number: SequenceNumber,
    /// Epoch milliseconds on the client clock
    pub client_sent_at: u64,
}

/// Server reply to a [`Probe`]; `client_sent_at` is copied verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Echo {
    pub sequence_number: SequenceNumber,
    pub client_sent_at: u64,
    pub server_received_at: u64,
    pub server_sent_at: u64,
}

impl Probe {
    pub fn new(sequence_number: SequenceNumber, client_sent_at: u64) -> Self {
        Self {
            sequence_number,
            client_sent_at,
        }
    }
}

impl Echo {
    pub fn for_probe(probe: &Probe, server_received_at: u64, server_sent_at: u64) -> Self {
        Self {
            sequence_number: probe.sequence_number,
            client_sent_at: probe.client_sent_at,
            server_received_at,
            server_sent_at,
        }
    }
}

/// Every message that travels over a channel, discriminated by its `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WireMessage {
    Probe(Probe),
    Echo(Echo),
}

impl WireMessage {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes one message.
    ///
    /// Input that is not a JSON object with a string `type` field, or whose
    /// fields do not match the declared type, is [`ProtocolError::Malformed`].
    /// A well-formed object with an unrecognised `type` is
    /// [`ProtocolError::UnknownType`] so callers sharing a channel with other
    /// traffic can ignore it quietly.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes).map_err(|e| {
            debug!(error = %e, len = bytes.len(), "Message is not valid JSON");
            ProtocolError::Malformed(e.to_string())
        })?;

        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ProtocolError::Malformed("missing \"type\" field".into()))?
            .to_owned();

        match kind.as_str() {
            "probe" | "echo" => serde_json::from_value(value).map_err(|e| {
                debug!(kind = %kind, error = %e, "Message fields do not match type");
                ProtocolError::Malformed(e.to_string())
            }),
            _ => Err(ProtocolError::UnknownType(kind)),
        }
    }

    pub fn sequence_number(&self) -> SequenceNumber {
        match self {
            WireMessage::Probe(p) => p.sequence_number,
            WireMessage::Echo(e) => e.sequence_number,
        }
    }
}

impl From<Probe> for WireMessage {
    fn from(probe: Probe) -> Self {
        WireMessage::Probe(probe)
    }
}

impl From<Echo> for WireMessage {
    fn from(echo: Echo) -> Self {
        WireMessage::Echo(echo)
    }
}
