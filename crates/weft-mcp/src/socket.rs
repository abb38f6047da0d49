//! Accept loop, connection threads and client calls shared by the TCP
//! and IPC transports.
//!
//! A server runs one accept thread; each accepted connection gets its own
//! thread, so a request blocked on an empty outbox only ever holds up its
//! own connection. Connection threads read with a timeout of
//! `poll_interval` and check the shutdown flag between reads and between
//! handler polls. On shutdown a request whose response is being written
//! completes; requests still waiting for a message are abandoned and the
//! peer sees the connection close.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info_span, warn};

use weft_core::TimeoutHandler;

use crate::error::McpError;
use crate::framing::{decode_response, encode_response, write_frame, FrameReader};
use crate::handler::RequestHandler;

// ── Stream abstractions ─────────────────────────────────────────

/// A connected byte stream with timeouts.
pub(crate) trait Connection: Read + Write + Send + 'static {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;
    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()>;
    fn shutdown_both(&self) -> io::Result<()>;
}

/// A listening socket in non-blocking mode.
pub(crate) trait Listener: Send + 'static {
    type Conn: Connection;
    /// Accept one connection, with a description of the peer.
    fn accept_conn(&self) -> io::Result<(Self::Conn, String)>;
}

impl Connection for TcpStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        TcpStream::set_nonblocking(self, nonblocking)
    }

    fn shutdown_both(&self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }
}

impl Listener for TcpListener {
    type Conn = TcpStream;

    fn accept_conn(&self) -> io::Result<(TcpStream, String)> {
        let (stream, addr) = self.accept()?;
        stream.set_nodelay(true)?;
        Ok((stream, addr.to_string()))
    }
}

#[cfg(unix)]
mod unix {
    use super::*;
    use std::os::unix::net::{UnixListener, UnixStream};

    impl Connection for UnixStream {
        fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
            UnixStream::set_read_timeout(self, timeout)
        }

        fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
            UnixStream::set_nonblocking(self, nonblocking)
        }

        fn shutdown_both(&self) -> io::Result<()> {
            self.shutdown(Shutdown::Both)
        }
    }

    impl Listener for UnixListener {
        type Conn = UnixStream;

        fn accept_conn(&self) -> io::Result<(UnixStream, String)> {
            let (stream, _) = self.accept()?;
            Ok((stream, "local".to_string()))
        }
    }
}

// ── Server ──────────────────────────────────────────────────────

/// The thread machinery behind a socket server.
pub(crate) struct SocketServer {
    shutdown: Arc<AtomicBool>,
    accept_thread: Option<JoinHandle<()>>,
}

impl SocketServer {
    /// Spawn the accept loop. `listener` must already be non-blocking.
    pub fn start<L: Listener>(
        listener: L,
        handler: Arc<dyn RequestHandler>,
        poll_interval: Duration,
        thread_name: &str,
    ) -> Result<Self, McpError> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let accept_thread = thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || accept_loop(listener, handler, poll_interval, flag))?;
        Ok(Self {
            shutdown,
            accept_thread: Some(accept_thread),
        })
    }

    /// Signal shutdown and join every thread. Idempotent.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.accept_thread.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                warn!("accept thread panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.accept_thread.is_some()
    }
}

fn accept_loop<L: Listener>(
    listener: L,
    handler: Arc<dyn RequestHandler>,
    poll_interval: Duration,
    shutdown: Arc<AtomicBool>,
) {
    let mut connections: Vec<JoinHandle<()>> = Vec::new();

    while !shutdown.load(Ordering::Acquire) {
        match listener.accept_conn() {
            Ok((conn, peer)) => {
                debug!(%peer, "connection accepted");
                let handler = Arc::clone(&handler);
                let flag = Arc::clone(&shutdown);
                let spawned = thread::Builder::new()
                    .name("weft-mcp-conn".into())
                    .spawn(move || serve_connection(conn, &peer, handler.as_ref(), poll_interval, &flag));
                match spawned {
                    Ok(handle) => connections.push(handle),
                    Err(e) => warn!(error = %e, "could not spawn connection thread"),
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                connections.retain(|h| !h.is_finished());
                thread::park_timeout(poll_interval);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                warn!(error = %e, "accept failed");
                thread::park_timeout(poll_interval);
            }
        }
    }

    for handle in connections {
        if handle.join().is_err() {
            warn!("connection thread panicked");
        }
    }
}

fn serve_connection<C: Connection>(
    mut conn: C,
    peer: &str,
    handler: &dyn RequestHandler,
    poll_interval: Duration,
    shutdown: &AtomicBool,
) {
    let span = info_span!("connection", %peer);
    let _guard = span.enter();

    // Accepted sockets may inherit the listener's non-blocking mode.
    if let Err(e) = conn
        .set_nonblocking(false)
        .and_then(|()| conn.set_read_timeout(Some(poll_interval)))
    {
        warn!(error = %e, "could not configure connection");
        return;
    }

    let mut reader = FrameReader::new();
    loop {
        if shutdown.load(Ordering::Acquire) {
            break;
        }
        let request = match reader.poll(&mut conn) {
            Ok(Some(request)) => request,
            Ok(None) => continue,
            Err(McpError::Closed) => {
                debug!("peer closed connection");
                break;
            }
            Err(e) => {
                warn!(error = %e, "bad request");
                break;
            }
        };

        let response = loop {
            if shutdown.load(Ordering::Acquire) {
                debug!("abandoning request on shutdown");
                return;
            }
            match handler.handle_request(&request, Some(poll_interval)) {
                Ok(Some(message)) => break encode_response(Ok(&message)),
                Ok(None) => continue,
                Err(e) => break encode_response(Err(&e.to_string())),
            }
        };

        if let Err(e) = write_frame(&mut conn, &response) {
            debug!(error = %e, "could not send response");
            break;
        }
    }
}

// ── Client ──────────────────────────────────────────────────────

/// Request/response over one connected stream.
pub(crate) struct SocketClient<C: Connection> {
    conn: Option<C>,
}

impl<C: Connection> SocketClient<C> {
    pub fn new(conn: C) -> Self {
        Self { conn: Some(conn) }
    }

    pub fn call(
        &mut self,
        request: &[u8],
        timeout_handler: Option<&mut dyn TimeoutHandler>,
    ) -> Result<Vec<u8>, McpError> {
        let conn = self.conn.as_mut().ok_or(McpError::Closed)?;
        write_frame(conn, request)?;

        let mut reader = FrameReader::new();
        let frame = match timeout_handler {
            None => {
                conn.set_read_timeout(None)?;
                loop {
                    if let Some(frame) = reader.poll(conn)? {
                        break frame;
                    }
                }
            }
            Some(th) => loop {
                let timeout = th.timeout().max(Duration::from_millis(1));
                conn.set_read_timeout(Some(timeout))?;
                if let Some(frame) = reader.poll(conn)? {
                    th.on_receive();
                    break frame;
                }
                if let Err(aborted) = th.on_timeout() {
                    // The response may still arrive; the stream cannot be
                    // reused for another request.
                    self.close()?;
                    return Err(aborted.into());
                }
            },
        };
        decode_response(frame)
    }

    pub fn close(&mut self) -> Result<(), McpError> {
        if let Some(conn) = self.conn.take() {
            match conn.shutdown_both() {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotConnected => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
