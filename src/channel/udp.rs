use crate::channel::error::{ChannelError, Result};
use crate::channel::{ChannelEvent, MessageChannel, MAX_MESSAGE_SIZE, READ_POLL_INTERVAL_MS};
use std::io::ErrorKind;
use std::net::{ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

struct Link {
    socket: Arc<UdpSocket>,
    alive: Arc<AtomicBool>,
}

/// UDP channel: every message is one datagram to a fixed peer.
pub struct UdpChannel {
    addr: String,
    events: Sender<ChannelEvent>,
    link: Mutex<Option<Link>>,
}

impl UdpChannel {
    pub fn new(addr: &str, events: Sender<ChannelEvent>) -> Self {
        Self {
            addr: addr.to_string(),
            events,
            link: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Link>> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bind_for(&self) -> Result<UdpSocket> {
        let connect_err = |source| ChannelError::Connect {
            addr: self.addr.clone(),
            source,
        };
        let remote = self
            .addr
            .to_socket_addrs()
            .map_err(connect_err)?
            .next()
            .ok_or_else(|| connect_err(ErrorKind::AddrNotAvailable.into()))?;
        let local = if remote.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };

        let socket = UdpSocket::bind(local)?;
        socket.connect(remote).map_err(connect_err)?;
        socket.set_read_timeout(Some(Duration::from_millis(READ_POLL_INTERVAL_MS)))?;
        Ok(socket)
    }
}

fn read_loop(socket: Arc<UdpSocket>, alive: Arc<AtomicBool>, events: Sender<ChannelEvent>) {
    let mut buf = [0u8; MAX_MESSAGE_SIZE];
    while alive.load(Ordering::Acquire) {
        match socket.recv(&mut buf) {
            Ok(len) => {
                debug!(bytes_received = len, "Datagram received");
                if events.send(ChannelEvent::Message(buf[..len].to_vec())).is_err() {
                    break;
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(e) => {
                // ICMP port unreachable surfaces here as ConnectionRefused; the
                // peer may come back, so the channel stays up.
                debug!(error = %e, "Datagram receive failed");
                if events.send(ChannelEvent::Error(e.to_string())).is_err() {
                    break;
                }
            }
        }
    }
    debug!("UDP reader stopped");
}

impl MessageChannel for UdpChannel {
    fn connect(&self) -> Result<()> {
        let mut link = self.lock();
        if link.is_some() {
            return Ok(());
        }

        debug!(addr = %self.addr, "Connecting UDP channel");
        let socket = Arc::new(self.bind_for()?);
        let alive = Arc::new(AtomicBool::new(true));

        let reader = {
            let socket = Arc::clone(&socket);
            let alive = Arc::clone(&alive);
            let events = self.events.clone();
            move || read_loop(socket, alive, events)
        };
        thread::Builder::new()
            .name("udp-reader".into())
            .spawn(reader)?;

        *link = Some(Link { socket, alive });
        drop(link);

        debug!(addr = %self.addr, "UDP channel connected");
        let _ = self.events.send(ChannelEvent::Connected);
        Ok(())
    }

    fn send(&self, message: &[u8]) -> Result<()> {
        let link = self.lock();
        let link = link.as_ref().ok_or(ChannelError::NotConnected)?;
        let bytes_sent = link.socket.send(message).map_err(|e| {
            warn!(error = %e, "Failed to send datagram");
            ChannelError::Io(e)
        })?;
        debug!(bytes_sent = bytes_sent, "Datagram sent");
        Ok(())
    }

    fn close(&self) {
        let Some(link) = self.lock().take() else {
            return;
        };
        if link.alive.swap(false, Ordering::AcqRel) {
            debug!(addr = %self.addr, "UDP channel closed");
            let _ = self.events.send(ChannelEvent::Disconnected);
        }
    }

    fn is_connected(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|link| link.alive.load(Ordering::Acquire))
    }
}

impl Drop for UdpChannel {
    fn drop(&mut self) {
        if let Some(link) = self.lock().take() {
            link.alive.store(false, Ordering::Release);
        }
    }
}
