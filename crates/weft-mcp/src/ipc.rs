//! Unix-domain socket transport, for instances on the same host.

use std::fs;
use std::io;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use weft_core::{Reference, TimeoutHandler};

use crate::error::McpError;
use crate::handler::RequestHandler;
use crate::socket::{SocketClient, SocketServer};
use crate::transport::{TransportClient, TransportFactory, TransportServer};

const SCHEME: &str = "ipc:";

/// Socket path for `instance` in run `run_id`, under the system temporary
/// directory.
///
/// ASCII alphanumerics are kept and every other byte becomes `_` followed
/// by two hex digits, so `micro[3]` becomes `micro_5b3_5d`. Distinct run
/// ids and instances always give distinct paths.
pub fn ipc_socket_path(run_id: &str, instance: &Reference) -> PathBuf {
    std::env::temp_dir().join(format!(
        "weft-{}-{}.sock",
        escape(run_id),
        escape(&instance.to_string())
    ))
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        if byte.is_ascii_alphanumeric() {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("_{byte:02x}"));
        }
    }
    out
}

fn parse_location(location: &str) -> Option<&Path> {
    let body = location.strip_prefix(SCHEME)?;
    (!body.is_empty()).then(|| Path::new(body))
}

// ── Server ──────────────────────────────────────────────────────

/// Serves a [`RequestHandler`] on a Unix-domain socket.
pub struct IpcServer {
    path: PathBuf,
    inner: SocketServer,
}

impl IpcServer {
    /// Listen on `path`, replacing a stale socket file left by an earlier
    /// run. A socket that still accepts connections is left alone and the
    /// call fails with an [`io::ErrorKind::AddrInUse`] error.
    pub fn start(
        path: impl Into<PathBuf>,
        handler: Arc<dyn RequestHandler>,
        poll_interval: Duration,
    ) -> Result<Self, McpError> {
        if poll_interval.is_zero() {
            return Err(McpError::InvalidConfig {
                reason: "poll_interval must be positive".to_string(),
            });
        }
        let path = path.into();
        if UnixStream::connect(&path).is_ok() {
            return Err(io::Error::new(
                io::ErrorKind::AddrInUse,
                format!("{} is served by another process", path.display()),
            )
            .into());
        }
        match fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "removed stale socket"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        let listener = UnixListener::bind(&path)?;
        listener.set_nonblocking(true)?;
        let inner = SocketServer::start(listener, handler, poll_interval, "weft-ipc-accept")?;
        info!(path = %path.display(), "ipc server started");
        Ok(Self { path, inner })
    }

    /// Listen on the standard path for `instance` in run `run_id`.
    pub fn for_instance(
        run_id: &str,
        instance: &Reference,
        handler: Arc<dyn RequestHandler>,
        poll_interval: Duration,
    ) -> Result<Self, McpError> {
        Self::start(ipc_socket_path(run_id, instance), handler, poll_interval)
    }

    /// The socket file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TransportServer for IpcServer {
    fn location(&self) -> String {
        format!("{SCHEME}{}", self.path.display())
    }

    fn close(&mut self) -> Result<(), McpError> {
        if self.inner.is_running() {
            self.inner.stop();
            match fs::remove_file(&self.path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %self.path.display(), error = %e, "could not remove socket"),
            }
            info!(path = %self.path.display(), "ipc server closed");
        }
        Ok(())
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

// ── Client ──────────────────────────────────────────────────────

/// A client connected to an [`IpcServer`].
pub struct IpcClient {
    inner: SocketClient<UnixStream>,
}

impl IpcClient {
    /// Connect to an `ipc:` location.
    pub fn connect(location: &str) -> Result<Self, McpError> {
        let path = parse_location(location).ok_or_else(|| McpError::InvalidLocation {
            location: location.to_string(),
        })?;
        let stream = UnixStream::connect(path)?;
        debug!(path = %path.display(), "ipc client connected");
        Ok(Self {
            inner: SocketClient::new(stream),
        })
    }
}

impl TransportClient for IpcClient {
    fn call(
        &mut self,
        request: &[u8],
        timeout_handler: Option<&mut dyn TimeoutHandler>,
    ) -> Result<Vec<u8>, McpError> {
        self.inner.call(request, timeout_handler)
    }

    fn close(&mut self) -> Result<(), McpError> {
        self.inner.close()
    }
}

/// Factory for `ipc:` locations whose socket exists on this host.
#[derive(Clone, Copy, Debug, Default)]
pub struct IpcFactory;

impl TransportFactory for IpcFactory {
    fn name(&self) -> &'static str {
        "ipc"
    }

    fn can_connect_to(&self, location: &str) -> bool {
        parse_location(location).is_some_and(Path::exists)
    }

    fn connect(&self, location: &str) -> Result<Box<dyn TransportClient>, McpError> {
        Ok(Box::new(IpcClient::connect(location)?))
    }
}
