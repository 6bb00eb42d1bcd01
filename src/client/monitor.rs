//! Wires a message channel, the ping and sweep schedules, and a session
//!
//! All session mutations go through one mutex: the emitter and sweeper
//! threads and the thread delivering channel events each take it for the
//! duration of a single operation. Schedule changes are serialised by a
//! second lock, always taken before the session lock, and old schedules are
//! joined before new ones start so one session never has two emitters.

use crate::channel::{ChannelEvent, MessageChannel};
use crate::client::error::{ClientError, Result};
use crate::client::scheduler::{schedule, ScheduleHandle};
use crate::client::session::{EchoOutcome, Session, SessionSettings, SessionSnapshot, SessionState};
use crate::client::summary::RttSummary;
use crate::protocol::{now_ms, ProtocolError, WireMessage};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

struct Schedules {
    emitter: ScheduleHandle,
    sweeper: ScheduleHandle,
}

impl Schedules {
    fn cancel(self) {
        self.emitter.cancel();
        self.sweeper.cancel();
    }
}

fn lock(session: &Mutex<Session>) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Issues one probe. Returns whether a probe was sent.
fn emit_ping(session: &Mutex<Session>, channel: &dyn MessageChannel) -> bool {
    if !channel.is_connected() {
        debug!("Ping skipped: channel not connected");
        return false;
    }

    let Some(probe) = lock(session).next_probe(now_ms()) else {
        return false;
    };

    // A probe that fails to go out stays pending and expires as lost.
    match WireMessage::from(probe).encode() {
        Ok(bytes) => {
            if let Err(e) = channel.send(&bytes) {
                warn!(sequence = probe.sequence_number.0, error = %e, "Failed to send probe");
            }
        }
        Err(e) => warn!(sequence = probe.sequence_number.0, error = %e, "Failed to encode probe"),
    }
    true
}

fn sweep_lost(session: &Mutex<Session>) -> u64 {
    lock(session).sweep(now_ms())
}

/// Client-side latency measurement engine bound to one channel.
pub struct LatencyMonitor {
    session: Arc<Mutex<Session>>,
    channel: Arc<dyn MessageChannel>,
    schedules: Mutex<Option<Schedules>>,
}

impl LatencyMonitor {
    pub fn new(channel: Arc<dyn MessageChannel>, settings: SessionSettings) -> Result<Self> {
        Ok(Self {
            session: Arc::new(Mutex::new(Session::new(settings)?)),
            channel,
            schedules: Mutex::new(None),
        })
    }

    fn schedules(&self) -> MutexGuard<'_, Option<Schedules>> {
        self.schedules.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Connects the underlying channel. The session becomes `Connected` when
    /// the channel reports [`ChannelEvent::Connected`].
    pub fn connect(&self) -> Result<()> {
        lock(&self.session).begin_connecting();
        self.channel.connect().map_err(|e| {
            warn!(error = %e, "Channel connect failed");
            lock(&self.session).on_disconnected();
            ClientError::Channel(e)
        })
    }

    /// Applies one channel event
    pub fn handle_event(&self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected => self.on_connected(),
            ChannelEvent::Disconnected => self.on_disconnected(),
            ChannelEvent::Message(bytes) => {
                self.handle_message(&bytes);
            }
            ChannelEvent::Error(e) => warn!(error = %e, "Channel error"),
        }
    }

    fn on_connected(&self) {
        let interval_ms = {
            let mut session = lock(&self.session);
            session.on_connected();
            session.settings().ping_interval_ms
        };
        if let Err(e) = self.start(interval_ms) {
            warn!(error = %e, "Failed to start schedules");
        }
    }

    fn on_disconnected(&self) {
        self.teardown(false);
    }

    /// Stops the schedules and ends the session under the schedule lock, so a
    /// concurrent `start` sees either the live session or the ended one.
    fn teardown(&self, close_channel: bool) {
        let mut schedules = self.schedules();
        if let Some(old) = schedules.take() {
            old.cancel();
            debug!("Ping schedule stopped");
        }
        if close_channel {
            self.channel.close();
        }
        lock(&self.session).on_disconnected();
    }

    /// (Re)starts the emitter and the sweeper at `interval_ms`.
    ///
    /// Any running schedules are stopped and joined first. While the session
    /// is not connected only the interval is stored.
    pub fn start(&self, interval_ms: u64) -> Result<()> {
        if interval_ms == 0 {
            return Err(ClientError::Config("ping interval must be > 0".into()));
        }

        let mut schedules = self.schedules();
        if let Some(old) = schedules.take() {
            old.cancel();
        }

        let settings = {
            let mut session = lock(&self.session);
            session.set_interval(interval_ms);
            if session.state() != SessionState::Connected {
                debug!(interval_ms = interval_ms, "Interval stored; session not connected");
                return Ok(());
            }
            *session.settings()
        };

        let emitter = {
            let session = Arc::clone(&self.session);
            let channel = Arc::clone(&self.channel);
            schedule(
                "ping-emitter",
                Duration::from_millis(interval_ms),
                true,
                move || {
                    emit_ping(&session, channel.as_ref());
                },
            )?
        };
        let sweeper = {
            let session = Arc::clone(&self.session);
            schedule(
                "loss-sweeper",
                Duration::from_millis(settings.sweep_interval_ms()),
                false,
                move || {
                    sweep_lost(&session);
                },
            )?
        };

        info!(
            interval_ms = interval_ms,
            sweep_every_ms = settings.sweep_interval_ms(),
            loss_timeout_ms = settings.loss_timeout_ms(),
            "Ping schedule started"
        );
        *schedules = Some(Schedules { emitter, sweeper });
        Ok(())
    }

    /// Changes the ping interval, restarting both schedules
    pub fn set_interval(&self, interval_ms: u64) -> Result<()> {
        info!(interval_ms = interval_ms, "Changing ping interval");
        self.start(interval_ms)
    }

    /// Stops both schedules and waits for them to exit
    pub fn stop(&self) {
        if let Some(schedules) = self.schedules().take() {
            schedules.cancel();
            debug!("Ping schedule stopped");
        }
    }

    /// Sends one probe now, outside the schedule
    pub fn send_ping(&self) -> bool {
        emit_ping(&self.session, self.channel.as_ref())
    }

    /// Runs one loss sweep now, outside the schedule
    pub fn sweep(&self) -> u64 {
        sweep_lost(&self.session)
    }

    /// Applies an inbound message. Malformed or foreign messages are logged
    /// and dropped.
    pub fn handle_message(&self, bytes: &[u8]) -> Option<EchoOutcome> {
        let result = lock(&self.session).handle_message(bytes, now_ms());
        match result {
            Ok(outcome) => Some(outcome),
            Err(ProtocolError::UnknownType(kind)) => {
                info!(kind = %kind, "Ignoring message of unknown type");
                None
            }
            Err(e) => {
                warn!(error = %e, len = bytes.len(), "Dropping malformed message");
                None
            }
        }
    }

    /// Stops the schedules, closes the channel and ends the session
    pub fn disconnect(&self) {
        self.teardown(true);
    }

    /// Processes channel events until the channel disconnects, the event
    /// source goes away, or `deadline` passes.
    pub fn run(&self, events: &Receiver<ChannelEvent>, deadline: Option<Instant>) {
        loop {
            let event = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match events.recv_timeout(remaining) {
                        Ok(event) => event,
                        Err(RecvTimeoutError::Timeout) => {
                            debug!("Run deadline reached");
                            return;
                        }
                        Err(RecvTimeoutError::Disconnected) => return,
                    }
                }
                None => match events.recv() {
                    Ok(event) => event,
                    Err(_) => return,
                },
            };

            let disconnected = event == ChannelEvent::Disconnected;
            self.handle_event(event);
            if disconnected {
                return;
            }
        }
    }

    pub fn state(&self) -> SessionState {
        lock(&self.session).state()
    }

    pub fn settings(&self) -> SessionSettings {
        *lock(&self.session).settings()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        lock(&self.session).snapshot()
    }

    pub fn summary(&self) -> RttSummary {
        lock(&self.session).summary().clone()
    }

    pub fn is_balanced(&self) -> bool {
        lock(&self.session).is_balanced()
    }
}

impl Drop for LatencyMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MockChannel;
    use crate::protocol::{Echo, Probe};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;

    fn settings(interval_ms: u64) -> SessionSettings {
        SessionSettings {
            ping_interval_ms: interval_ms,
            ..SessionSettings::default()
        }
    }

    /// Mock channel that counts sends and remembers the last probe
    fn recording_channel(
        connected: Arc<AtomicBool>,
        sends: Arc<AtomicUsize>,
        last: Arc<Mutex<Option<Probe>>>,
    ) -> MockChannel {
        let mut channel = MockChannel::new();
        channel.expect_connect().returning(|| Ok(()));
        channel.expect_close().returning(|| ());
        channel
            .expect_is_connected()
            .returning(move || connected.load(Ordering::SeqCst));
        channel.expect_send().returning(move |bytes| {
            sends.fetch_add(1, Ordering::SeqCst);
            if let Ok(WireMessage::Probe(probe)) = WireMessage::decode(bytes) {
                *last.lock().unwrap() = Some(probe);
            }
            Ok(())
        });
        channel
    }

    #[test]
    fn test_ping_while_disconnected_is_noop() {
        let mut channel = MockChannel::new();
        channel.expect_is_connected().returning(|| false);
        channel.expect_send().times(0);

        let monitor = LatencyMonitor::new(Arc::new(channel), settings(100)).unwrap();
        assert!(!monitor.send_ping());
        assert_eq!(monitor.snapshot().counters.packets_sent, 0);
    }

    #[test]
    fn test_ping_sends_probe_when_connected() {
        let mut channel = MockChannel::new();
        channel.expect_is_connected().returning(|| true);
        channel
            .expect_send()
            .withf(|bytes: &[u8]| {
                matches!(WireMessage::decode(bytes), Ok(WireMessage::Probe(p)) if p.sequence_number.0 == 0)
            })
            .times(1)
            .returning(|_| Ok(()));
        channel.expect_close().returning(|| ());

        let monitor = LatencyMonitor::new(Arc::new(channel), settings(60_000)).unwrap();
        monitor.handle_event(ChannelEvent::Connected);
        thread::sleep(Duration::from_millis(100));

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.state, SessionState::Connected);
        assert_eq!(snapshot.counters.packets_sent, 1);
        assert_eq!(snapshot.pending, 1);
        monitor.stop();
    }

    #[test]
    fn test_echo_round_trip_through_monitor() {
        let connected = Arc::new(AtomicBool::new(true));
        let sends = Arc::new(AtomicUsize::new(0));
        let last = Arc::new(Mutex::new(None));
        let channel = recording_channel(connected, sends, Arc::clone(&last));

        let monitor = LatencyMonitor::new(Arc::new(channel), settings(60_000)).unwrap();
        monitor.handle_event(ChannelEvent::Connected);
        thread::sleep(Duration::from_millis(100));

        let probe = last.lock().unwrap().expect("probe sent");
        let echo = Echo::for_probe(&probe, probe.client_sent_at, probe.client_sent_at);
        let bytes = WireMessage::from(echo).encode().unwrap();
        monitor.handle_event(ChannelEvent::Message(bytes.clone()));
        monitor.handle_event(ChannelEvent::Message(bytes));

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.counters.packets_received, 1);
        assert_eq!(snapshot.pending, 0);
        assert!(monitor.is_balanced());
        monitor.stop();
    }

    #[test]
    fn test_bad_messages_are_dropped() {
        let channel = recording_channel(
            Arc::new(AtomicBool::new(true)),
            Arc::new(AtomicUsize::new(0)),
            Arc::new(Mutex::new(None)),
        );
        let monitor = LatencyMonitor::new(Arc::new(channel), settings(60_000)).unwrap();
        monitor.handle_event(ChannelEvent::Connected);
        thread::sleep(Duration::from_millis(50));
        let before = monitor.snapshot();

        assert!(monitor.handle_message(b"not json at all").is_none());
        assert!(monitor.handle_message(br#"{"type":"offer","sdp":"..."}"#).is_none());
        assert_eq!(monitor.snapshot().counters, before.counters);
        monitor.stop();
    }

    #[test]
    fn test_disconnect_halts_schedules_and_keeps_metrics() {
        let connected = Arc::new(AtomicBool::new(true));
        let sends = Arc::new(AtomicUsize::new(0));
        let channel = recording_channel(
            Arc::clone(&connected),
            Arc::clone(&sends),
            Arc::new(Mutex::new(None)),
        );

        let monitor = LatencyMonitor::new(Arc::new(channel), settings(10)).unwrap();
        monitor.handle_event(ChannelEvent::Connected);
        thread::sleep(Duration::from_millis(100));
        monitor.handle_event(ChannelEvent::Disconnected);

        let sent_at_disconnect = sends.load(Ordering::SeqCst);
        assert!(sent_at_disconnect >= 2);
        thread::sleep(Duration::from_millis(100));
        assert_eq!(sends.load(Ordering::SeqCst), sent_at_disconnect);

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.state, SessionState::Disconnected);
        assert_eq!(snapshot.pending, 0);
        assert_eq!(snapshot.counters.lost, 0);
        assert_eq!(snapshot.counters.packets_sent as usize, sent_at_disconnect);
        assert!(monitor.is_balanced());
    }

    #[test]
    fn test_set_interval_restarts_single_emitter() {
        let sends = Arc::new(AtomicUsize::new(0));
        let channel = recording_channel(
            Arc::new(AtomicBool::new(true)),
            Arc::clone(&sends),
            Arc::new(Mutex::new(None)),
        );

        let monitor = LatencyMonitor::new(Arc::new(channel), settings(10)).unwrap();
        monitor.handle_event(ChannelEvent::Connected);
        thread::sleep(Duration::from_millis(60));

        monitor.set_interval(60_000).unwrap();
        assert_eq!(monitor.settings().ping_interval_ms, 60_000);
        thread::sleep(Duration::from_millis(50));
        let settled = sends.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(200));
        assert_eq!(sends.load(Ordering::SeqCst), settled);
        monitor.stop();
    }

    #[test]
    fn test_interval_change_during_disconnect_starts_nothing() {
        let mut channel = MockChannel::new();
        channel.expect_is_connected().returning(|| true);
        channel.expect_send().returning(|_| Ok(()));
        channel
            .expect_close()
            .returning(|| thread::sleep(Duration::from_millis(200)));

        let monitor = Arc::new(LatencyMonitor::new(Arc::new(channel), settings(1000)).unwrap());
        monitor.handle_event(ChannelEvent::Connected);

        let changer = {
            let monitor = Arc::clone(&monitor);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                monitor.set_interval(10)
            })
        };
        monitor.disconnect();
        changer.join().unwrap().unwrap();

        assert_eq!(monitor.state(), SessionState::Disconnected);
        assert!(monitor.schedules().is_none());
        assert_eq!(monitor.settings().ping_interval_ms, 10);
    }

    #[test]
    fn test_sweeper_runs_at_floor_and_follows_interval() {
        let channel = recording_channel(
            Arc::new(AtomicBool::new(true)),
            Arc::new(AtomicUsize::new(0)),
            Arc::new(Mutex::new(None)),
        );
        let monitor = LatencyMonitor::new(Arc::new(channel), settings(10)).unwrap();
        assert_eq!(monitor.settings().sweep_interval_ms(), 500);
        monitor.handle_event(ChannelEvent::Connected);

        // Probes expire after 50 ms but the first sweep is due at 500 ms.
        thread::sleep(Duration::from_millis(300));
        let early = monitor.snapshot();
        assert!(early.pending > 5);
        assert_eq!(early.counters.lost, 0);

        thread::sleep(Duration::from_millis(400));
        monitor.set_interval(2000).unwrap();
        let lost_at_restart = monitor.snapshot().counters.lost;
        assert!(lost_at_restart > 0);
        assert_eq!(monitor.settings().sweep_interval_ms(), 2000);

        // Expired probes from before the change wait for the new sweeper.
        thread::sleep(Duration::from_millis(1000));
        assert_eq!(monitor.snapshot().counters.lost, lost_at_restart);

        thread::sleep(Duration::from_millis(1500));
        assert!(monitor.snapshot().counters.lost > lost_at_restart);
        assert!(monitor.is_balanced());
        monitor.stop();
    }

    #[test]
    fn test_set_interval_while_disconnected_only_stores() {
        let mut channel = MockChannel::new();
        channel.expect_is_connected().returning(|| false);
        channel.expect_send().times(0);

        let monitor = LatencyMonitor::new(Arc::new(channel), settings(1000)).unwrap();
        monitor.set_interval(250).unwrap();
        assert_eq!(monitor.settings().ping_interval_ms, 250);
        assert!(monitor.set_interval(0).is_err());
    }

    #[test]
    fn test_run_returns_on_disconnect() {
        let channel = recording_channel(
            Arc::new(AtomicBool::new(true)),
            Arc::new(AtomicUsize::new(0)),
            Arc::new(Mutex::new(None)),
        );
        let monitor = LatencyMonitor::new(Arc::new(channel), settings(60_000)).unwrap();

        let (tx, rx) = std::sync::mpsc::channel();
        tx.send(ChannelEvent::Connected).unwrap();
        tx.send(ChannelEvent::Error("transient".into())).unwrap();
        tx.send(ChannelEvent::Disconnected).unwrap();
        tx.send(ChannelEvent::Connected).unwrap();

        monitor.run(&rx, Some(Instant::now() + Duration::from_secs(5)));
        assert_eq!(monitor.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_run_honours_deadline() {
        let channel = MockChannel::new();
        let monitor = LatencyMonitor::new(Arc::new(channel), settings(1000)).unwrap();
        let (_tx, rx) = std::sync::mpsc::channel();

        let started = Instant::now();
        monitor.run(&rx, Some(started + Duration::from_millis(50)));
        assert!(started.elapsed() >= Duration::from_millis(50));
    }
}
