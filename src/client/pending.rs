//! In-flight probes awaiting an echo

use crate::protocol::SequenceNumber;
use std::collections::HashMap;
use tracing::debug;

/// A probe that has been sent but neither answered nor expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingProbe {
    pub sent_at: u64,
    /// Loss timeout captured when the probe was sent
    pub timeout_ms: u64,
}

impl PendingProbe {
    pub fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.sent_at) > self.timeout_ms
    }
}

/// Sequence number to in-flight probe.
///
/// Every entry leaves the table exactly once, through [`take`](Self::take),
/// [`sweep`](Self::sweep) or [`clear`](Self::clear).
#[derive(Debug, Default)]
pub struct PendingTable {
    entries: HashMap<SequenceNumber, PendingProbe>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a sent probe. Returns `false` and leaves the table unchanged if
    /// the sequence number is already pending.
    pub fn insert(&mut self, sequence: SequenceNumber, sent_at: u64, timeout_ms: u64) -> bool {
        if self.entries.contains_key(&sequence) {
            return false;
        }
        self.entries
            .insert(sequence, PendingProbe { sent_at, timeout_ms });
        true
    }

    /// Removes and returns the matching probe, if it is still pending
    pub fn take(&mut self, sequence: SequenceNumber) -> Option<PendingProbe> {
        self.entries.remove(&sequence)
    }

    /// Removes every probe pending longer than its own timeout and returns how
    /// many were removed.
    pub fn sweep(&mut self, now: u64) -> u64 {
        if self.entries.is_empty() {
            return 0;
        }
        let before = self.entries.len();
        self.entries.retain(|sequence, probe| {
            let expired = probe.is_expired(now);
            if expired {
                debug!(
                    sequence = sequence.0,
                    age_ms = now.saturating_sub(probe.sent_at),
                    timeout_ms = probe.timeout_ms,
                    "Probe expired"
                );
            }
            !expired
        });
        (before - self.entries.len()) as u64
    }

    /// Drops every entry and returns how many there were
    pub fn clear(&mut self) -> u64 {
        let count = self.entries.len() as u64;
        self.entries.clear();
        count
    }

    pub fn contains(&self, sequence: SequenceNumber) -> bool {
        self.entries.contains_key(&sequence)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_rejects_duplicate_sequence() {
        let mut table = PendingTable::new();
        assert!(table.insert(SequenceNumber(1), 100, 1000));
        assert!(!table.insert(SequenceNumber(1), 200, 1000));
        assert_eq!(table.len(), 1);
        assert_eq!(table.take(SequenceNumber(1)).unwrap().sent_at, 100);
    }

    #[test]
    fn test_take_removes_once() {
        let mut table = PendingTable::new();
        table.insert(SequenceNumber(5), 0, 1000);
        assert!(table.take(SequenceNumber(5)).is_some());
        assert!(table.take(SequenceNumber(5)).is_none());
    }

    #[test]
    fn test_sweep_uses_strict_timeout() {
        let mut table = PendingTable::new();
        table.insert(SequenceNumber(1), 0, 1000);

        assert_eq!(table.sweep(1000), 0);
        assert!(table.contains(SequenceNumber(1)));
        assert_eq!(table.sweep(1001), 1);
        assert!(table.is_empty());
    }

    #[test]
    fn test_sweep_honours_per_probe_timeout() {
        let mut table = PendingTable::new();
        table.insert(SequenceNumber(1), 0, 500);
        table.insert(SequenceNumber(2), 0, 5000);

        assert_eq!(table.sweep(600), 1);
        assert!(!table.contains(SequenceNumber(1)));
        assert!(table.contains(SequenceNumber(2)));
    }

    #[test]
    fn test_sweep_never_counts_twice() {
        let mut table = PendingTable::new();
        table.insert(SequenceNumber(1), 0, 1000);

        let lost: u64 = (0..20).map(|i| table.sweep(900 + i * 100)).sum();
        assert_eq!(lost, 1);
    }

    #[test]
    fn test_sweep_empty_table() {
        let mut table = PendingTable::new();
        assert_eq!(table.sweep(u64::MAX), 0);
    }

    #[test]
    fn test_clock_behind_send_time_is_not_expired() {
        let mut table = PendingTable::new();
        table.insert(SequenceNumber(1), 10_000, 1000);
        assert_eq!(table.sweep(5_000), 0);
    }
}
