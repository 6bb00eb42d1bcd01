//! UDP and TCP echo loops

use crate::channel::{read_frame, Frame, MAX_MESSAGE_SIZE, WRITE_TIMEOUT_MS};
use crate::protocol::{now_ms, ProtocolError};
use crate::server::error::{Result, ServerError};
use crate::server::monitor::ServerCounters;
use crate::server::responder::EchoResponder;
use std::io::{BufReader, ErrorKind, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Runs one inbound message through the responder, logging and counting the
/// outcome. Returns the reply to send, if any.
fn reply_to(responder: &EchoResponder, payload: &[u8], counters: &ServerCounters) -> Option<Vec<u8>> {
    let received_at = now_ms();
    counters.increment_received();

    match responder.respond(payload, received_at) {
        Ok(Some(reply)) => Some(reply),
        Ok(None) => {
            counters.increment_ignored();
            None
        }
        Err(ProtocolError::UnknownType(kind)) => {
            info!(kind = %kind, "Ignoring message of unknown type");
            counters.increment_ignored();
            None
        }
        Err(e) => {
            warn!(error = %e, len = payload.len(), "Dropping malformed message");
            counters.increment_error();
            None
        }
    }
}

fn bind_error(addr: &str) -> impl FnOnce(std::io::Error) -> ServerError + '_ {
    move |source| ServerError::Bind {
        addr: addr.to_string(),
        source,
    }
}

/// Echo server answering one probe per datagram.
pub struct UdpEchoServer {
    socket: UdpSocket,
    responder: EchoResponder,
}

impl UdpEchoServer {
    pub fn bind(addr: &str) -> Result<Self> {
        let socket = UdpSocket::bind(addr).map_err(bind_error(addr))?;
        debug!(addr = addr, "UDP echo socket bound");
        Ok(Self {
            socket,
            responder: EchoResponder::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Serves forever. Per-datagram failures are logged and counted.
    pub fn serve(&self, counters: &ServerCounters) -> Result<()> {
        let mut buf = [0u8; MAX_MESSAGE_SIZE];
        loop {
            let (len, peer) = match self.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    // Includes ICMP errors from clients that went away.
                    counters.increment_error();
                    debug!(error = %e, "Failed to receive datagram");
                    continue;
                }
            };

            let Some(reply) = reply_to(&self.responder, &buf[..len], counters) else {
                continue;
            };
            match self.socket.send_to(&reply, peer) {
                Ok(_) => counters.increment_echoed(),
                Err(e) => {
                    counters.increment_error();
                    error!(error = %e, peer = %peer, "Failed to send echo");
                }
            }
        }
    }
}

/// Echo server speaking newline-delimited messages, one thread per client.
pub struct TcpEchoServer {
    listener: TcpListener,
    responder: EchoResponder,
}

impl TcpEchoServer {
    pub fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(bind_error(addr))?;
        debug!(addr = addr, "TCP echo listener bound");
        Ok(Self {
            listener,
            responder: EchoResponder::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn serve(&self, counters: &ServerCounters) -> Result<()> {
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let peer = stream.peer_addr().ok();
                    info!(peer = ?peer, "New client connected");

                    let counters = counters.clone();
                    let responder = self.responder;
                    thread::spawn(move || {
                        if let Err(e) = serve_connection(stream, &responder, &counters) {
                            counters.increment_error();
                            error!(error = %e, peer = ?peer, "Connection failed");
                        }
                        debug!(peer = ?peer, "Client disconnected");
                    });
                }
                Err(e) => {
                    counters.increment_error();
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
        Ok(())
    }
}

fn serve_connection(
    stream: TcpStream,
    responder: &EchoResponder,
    counters: &ServerCounters,
) -> std::io::Result<()> {
    stream.set_nodelay(true)?;
    stream.set_write_timeout(Some(Duration::from_millis(WRITE_TIMEOUT_MS)))?;
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);
    let mut frame = Vec::with_capacity(MAX_MESSAGE_SIZE);

    loop {
        match read_frame(&mut reader, &mut frame)? {
            Frame::Closed => return Ok(()),
            Frame::Oversized => {
                counters.increment_received();
                counters.increment_error();
                warn!(limit = MAX_MESSAGE_SIZE, "Dropping oversized frame");
            }
            Frame::Complete if frame.is_empty() => {}
            Frame::Complete => {
                if let Some(mut reply) = reply_to(responder, &frame, counters) {
                    reply.push(b'\n');
                    writer.write_all(&reply)?;
                    counters.increment_echoed();
                }
            }
        }
    }
}
