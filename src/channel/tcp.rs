use crate::channel::error::{ChannelError, Result};
use crate::channel::frame::{read_frame, Frame};
use crate::channel::{ChannelEvent, MessageChannel, MAX_MESSAGE_SIZE, WRITE_TIMEOUT_MS};
use std::io::{BufReader, ErrorKind, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

struct Link {
    stream: Arc<TcpStream>,
    alive: Arc<AtomicBool>,
}

/// TCP channel carrying newline-delimited messages.
pub struct TcpChannel {
    addr: String,
    events: Sender<ChannelEvent>,
    link: Mutex<Option<Link>>,
    /// Keeps frames from concurrent senders whole
    writing: Mutex<()>,
}

impl TcpChannel {
    pub fn new(addr: &str, events: Sender<ChannelEvent>) -> Self {
        Self {
            addr: addr.to_string(),
            events,
            link: Mutex::new(None),
            writing: Mutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Link>> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Reads frames until EOF or error. Reports `Disconnected` only if the channel
/// was not already closed locally.
fn read_loop(stream: TcpStream, alive: Arc<AtomicBool>, events: Sender<ChannelEvent>) {
    let mut reader = BufReader::new(stream);
    let mut frame = Vec::with_capacity(MAX_MESSAGE_SIZE);

    loop {
        match read_frame(&mut reader, &mut frame) {
            Ok(Frame::Closed) => break,
            Ok(Frame::Complete) => {
                if frame.is_empty() {
                    continue;
                }
                if events.send(ChannelEvent::Message(frame.clone())).is_err() {
                    break;
                }
            }
            Ok(Frame::Oversized) => {
                warn!(limit = MAX_MESSAGE_SIZE, "Dropping oversized TCP frame");
                let error = format!("frame exceeds {} bytes", MAX_MESSAGE_SIZE);
                if events.send(ChannelEvent::Error(error)).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => {
                if alive.load(Ordering::Acquire) {
                    warn!(error = %e, "TCP channel read failed");
                    let _ = events.send(ChannelEvent::Error(e.to_string()));
                }
                break;
            }
        }
    }

    if alive.swap(false, Ordering::AcqRel) {
        debug!("TCP peer closed the connection");
        let _ = events.send(ChannelEvent::Disconnected);
    }
}

impl MessageChannel for TcpChannel {
    fn connect(&self) -> Result<()> {
        let mut link = self.lock();
        if link
            .as_ref()
            .is_some_and(|l| l.alive.load(Ordering::Acquire))
        {
            return Ok(());
        }

        debug!(addr = %self.addr, "Connecting TCP channel");
        let stream = TcpStream::connect(&self.addr).map_err(|source| {
            warn!(addr = %self.addr, error = %source, "Failed to connect");
            ChannelError::Connect {
                addr: self.addr.clone(),
                source,
            }
        })?;
        stream.set_nodelay(true)?;
        stream.set_write_timeout(Some(Duration::from_millis(WRITE_TIMEOUT_MS)))?;

        let alive = Arc::new(AtomicBool::new(true));
        let reader = {
            let stream = stream.try_clone()?;
            let alive = Arc::clone(&alive);
            let events = self.events.clone();
            move || read_loop(stream, alive, events)
        };
        thread::Builder::new()
            .name("tcp-reader".into())
            .spawn(reader)?;

        *link = Some(Link {
            stream: Arc::new(stream),
            alive,
        });
        drop(link);

        debug!(addr = %self.addr, "TCP channel connected");
        let _ = self.events.send(ChannelEvent::Connected);
        Ok(())
    }

    fn send(&self, message: &[u8]) -> Result<()> {
        let stream = self
            .lock()
            .as_ref()
            .filter(|l| l.alive.load(Ordering::Acquire))
            .map(|l| Arc::clone(&l.stream))
            .ok_or(ChannelError::NotConnected)?;

        let mut frame = Vec::with_capacity(message.len() + 1);
        frame.extend_from_slice(message);
        frame.push(b'\n');

        // A timed-out write can leave half a line behind; the peer drops it
        // together with the next frame as one malformed line.
        let _writing = self.writing.lock().unwrap_or_else(PoisonError::into_inner);
        (&*stream).write_all(&frame).map_err(|e| {
            warn!(error = %e, "Failed to send frame");
            ChannelError::Io(e)
        })?;
        debug!(bytes_sent = frame.len(), "Frame sent");
        Ok(())
    }

    fn close(&self) {
        let Some(link) = self.lock().take() else {
            return;
        };
        let was_alive = link.alive.swap(false, Ordering::AcqRel);
        let _ = link.stream.shutdown(Shutdown::Both);
        if was_alive {
            debug!(addr = %self.addr, "TCP channel closed");
            let _ = self.events.send(ChannelEvent::Disconnected);
        }
    }

    fn is_connected(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|link| link.alive.load(Ordering::Acquire))
    }
}

impl Drop for TcpChannel {
    fn drop(&mut self) {
        if let Some(link) = self.lock().take() {
            link.alive.store(false, Ordering::Release);
            let _ = link.stream.shutdown(Shutdown::Both);
        }
    }
}
