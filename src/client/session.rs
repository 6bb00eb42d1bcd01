//! Per-connection measurement state
//!
//! A [`Session`] exclusively owns the pending probe table, the counters, the
//! rolling sample window and the RTT summary. It never reads the clock:
//! every operation takes `now` in epoch milliseconds, so callers decide how
//! time flows and tests can drive it deterministically.

use crate::client::constants::*;
use crate::client::error::Result;
use crate::client::pending::PendingTable;
use crate::client::statistics::{Counters, Metrics, Quality, QualityThresholds};
use crate::client::summary::RttSummary;
use crate::client::window::SampleWindow;
use crate::protocol::{Echo, Probe, ProtocolResult, SequenceNumber, WireMessage};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    pub ping_interval_ms: u64,
    pub window_capacity: usize,
    pub loss_timeout_factor: u64,
    pub sweep_floor_ms: u64,
    pub thresholds: QualityThresholds,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ping_interval_ms: DEFAULT_PING_INTERVAL_MS,
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            loss_timeout_factor: DEFAULT_LOSS_TIMEOUT_FACTOR,
            sweep_floor_ms: DEFAULT_SWEEP_FLOOR_MS,
            thresholds: QualityThresholds::default(),
        }
    }
}

impl SessionSettings {
    /// Timeout given to a probe sent under the current interval
    pub fn loss_timeout_ms(&self) -> u64 {
        self.ping_interval_ms.saturating_mul(self.loss_timeout_factor)
    }

    pub fn sweep_interval_ms(&self) -> u64 {
        self.ping_interval_ms.max(self.sweep_floor_ms)
    }
}

/// What happened to an inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoOutcome {
    /// Matched a pending probe; its RTT entered the window
    Matched { sequence: SequenceNumber, rtt_ms: u64 },
    /// Already answered, already swept, or never sent by this session
    Ignored { sequence: SequenceNumber },
    /// A probe reflected back at the client
    NotAnEcho,
}

/// Everything a display needs, copied out under one lock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub counters: Counters,
    pub pending: usize,
    pub metrics: Metrics,
    pub quality: Quality,
    pub ping_interval_ms: u64,
}

pub struct Session {
    settings: SessionSettings,
    state: SessionState,
    next_sequence: SequenceNumber,
    pending: PendingTable,
    window: SampleWindow,
    counters: Counters,
    summary: RttSummary,
}

impl Session {
    pub fn new(settings: SessionSettings) -> Result<Self> {
        Ok(Self {
            window: SampleWindow::new(settings.window_capacity),
            settings,
            state: SessionState::Disconnected,
            next_sequence: SequenceNumber(0),
            pending: PendingTable::new(),
            counters: Counters::default(),
            summary: RttSummary::new()?,
        })
    }

    pub fn begin_connecting(&mut self) {
        if self.state == SessionState::Disconnected {
            debug!("Session connecting");
            self.state = SessionState::Connecting;
        }
    }

    /// Starts a fresh session: counters, window, summary and pending probes
    /// are reset. Sequence numbers keep counting so that echoes straggling in
    /// from an earlier session cannot match a new probe.
    pub fn on_connected(&mut self) {
        self.counters = Counters::default();
        self.window.clear();
        self.pending.clear();
        self.summary.reset();
        self.state = SessionState::Connected;
        info!(
            first_sequence = self.next_sequence.0,
            interval_ms = self.settings.ping_interval_ms,
            "Session started"
        );
    }

    /// Ends the session. Pending probes are discarded without being counted
    /// as lost; counters and window stay readable until the next connect.
    pub fn on_disconnected(&mut self) -> u64 {
        let discarded = self.pending.clear();
        self.counters.discarded += discarded;
        if self.state != SessionState::Disconnected {
            info!(
                discarded = discarded,
                packets_sent = self.counters.packets_sent,
                packets_received = self.counters.packets_received,
                lost = self.counters.lost,
                "Session ended"
            );
        }
        self.state = SessionState::Disconnected;
        discarded
    }

    /// Changes the interval for probes sent from now on. Probes already in
    /// flight keep the timeout they were sent with.
    pub fn set_interval(&mut self, interval_ms: u64) {
        self.settings.ping_interval_ms = interval_ms;
    }

    /// Allocates, records and returns the next probe, or `None` when not
    /// connected.
    pub fn next_probe(&mut self, now: u64) -> Option<Probe> {
        if self.state != SessionState::Connected {
            debug!(state = ?self.state, "Ping skipped: not connected");
            return None;
        }

        let sequence = self.next_sequence;
        let timeout_ms = self.settings.loss_timeout_ms();
        if !self.pending.insert(sequence, now, timeout_ms) {
            warn!(sequence = sequence.0, "Sequence number still pending, ping skipped");
            return None;
        }
        self.next_sequence = sequence.next();
        self.counters.packets_sent += 1;

        debug!(sequence = sequence.0, timeout_ms = timeout_ms, "Probe issued");
        Some(Probe::new(sequence, now))
    }

    pub fn handle_echo(&mut self, echo: &Echo, now: u64) -> EchoOutcome {
        let sequence = echo.sequence_number;
        if self.pending.take(sequence).is_none() {
            debug!(sequence = sequence.0, "Echo ignored: no pending probe");
            return EchoOutcome::Ignored { sequence };
        }

        let rtt_ms = now.saturating_sub(echo.client_sent_at);
        self.counters.packets_received += 1;
        self.window.push(rtt_ms);
        self.summary.record(rtt_ms);

        debug!(sequence = sequence.0, rtt_ms = rtt_ms, "Echo matched");
        EchoOutcome::Matched { sequence, rtt_ms }
    }

    /// Decodes an inbound message and applies it. Decoding errors leave the
    /// session untouched.
    pub fn handle_message(&mut self, bytes: &[u8], now: u64) -> ProtocolResult<EchoOutcome> {
        match WireMessage::decode(bytes)? {
            WireMessage::Echo(echo) => Ok(self.handle_echo(&echo, now)),
            WireMessage::Probe(probe) => {
                debug!(sequence = probe.sequence_number.0, "Probe received by client, ignored");
                Ok(EchoOutcome::NotAnEcho)
            }
        }
    }

    /// Counts every expired pending probe as lost. Returns how many expired.
    pub fn sweep(&mut self, now: u64) -> u64 {
        let expired = self.pending.sweep(now);
        if expired > 0 {
            self.counters.lost += expired;
            debug!(expired = expired, lost = self.counters.lost, "Loss sweep");
        }
        expired
    }

    pub fn metrics(&self) -> Metrics {
        Metrics::compute(&self.counters, &self.window)
    }

    pub fn quality(&self) -> Quality {
        Quality::classify(&self.metrics(), &self.settings.thresholds)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let metrics = self.metrics();
        SessionSnapshot {
            state: self.state,
            counters: self.counters,
            pending: self.pending.len(),
            metrics,
            quality: Quality::classify(&metrics, &self.settings.thresholds),
            ping_interval_ms: self.settings.ping_interval_ms,
        }
    }

    /// `sent == received + lost + discarded + pending`
    pub fn is_balanced(&self) -> bool {
        let c = &self.counters;
        c.packets_sent == c.packets_received + c.lost + c.discarded + self.pending.len() as u64
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn window(&self) -> &SampleWindow {
        &self.window
    }

    pub fn summary(&self) -> &RttSummary {
        &self.summary
    }
}
