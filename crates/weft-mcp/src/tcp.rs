//! TCP transport, for instances on different hosts.

use std::net::{IpAddr, Ipv4Addr, TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use weft_core::TimeoutHandler;

use crate::error::McpError;
use crate::handler::RequestHandler;
use crate::socket::{SocketClient, SocketServer};
use crate::transport::{TransportClient, TransportFactory, TransportServer};

const SCHEME: &str = "tcp:";

// ── TcpServerConfig ─────────────────────────────────────────────

/// Settings for a [`TcpServer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TcpServerConfig {
    /// Address to bind, e.g. `0.0.0.0:0` for any interface and a free port.
    pub bind: String,
    /// Host names or addresses to publish in the location. When empty,
    /// the bound address is published, with an unspecified address
    /// replaced by loopback.
    pub advertise: Vec<String>,
    /// How often idle threads check for shutdown. Bounds how long
    /// [`TcpServer::close`] takes.
    pub poll_interval: Duration,
}

impl Default for TcpServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:0".to_string(),
            advertise: Vec::new(),
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl TcpServerConfig {
    /// Check the settings for consistency.
    pub fn validate(&self) -> Result<(), McpError> {
        if self.bind.is_empty() {
            return Err(McpError::InvalidConfig {
                reason: "bind address is empty".to_string(),
            });
        }
        if self.poll_interval.is_zero() {
            return Err(McpError::InvalidConfig {
                reason: "poll_interval must be positive".to_string(),
            });
        }
        if self.advertise.iter().any(|h| h.is_empty() || h.contains(',')) {
            return Err(McpError::InvalidConfig {
                reason: "advertised hosts must be non-empty and contain no commas".to_string(),
            });
        }
        Ok(())
    }
}

// ── Server ──────────────────────────────────────────────────────

/// Serves a [`RequestHandler`] over TCP.
pub struct TcpServer {
    location: String,
    inner: SocketServer,
}

impl TcpServer {
    /// Bind and start serving `handler`.
    pub fn start(config: &TcpServerConfig, handler: Arc<dyn RequestHandler>) -> Result<Self, McpError> {
        config.validate()?;
        let listener = TcpListener::bind(&config.bind)?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;

        let hosts: Vec<String> = if config.advertise.is_empty() {
            let ip = if addr.ip().is_unspecified() {
                warn!(bind = %config.bind, "bound to all interfaces without advertised hosts; publishing loopback");
                IpAddr::V4(Ipv4Addr::LOCALHOST)
            } else {
                addr.ip()
            };
            vec![match ip {
                IpAddr::V4(v4) => v4.to_string(),
                IpAddr::V6(v6) => format!("[{v6}]"),
            }]
        } else {
            config.advertise.clone()
        };
        let location = format!(
            "{SCHEME}{}",
            hosts
                .iter()
                .map(|h| format!("{h}:{}", addr.port()))
                .collect::<Vec<_>>()
                .join(",")
        );

        let inner = SocketServer::start(listener, handler, config.poll_interval, "weft-tcp-accept")?;
        info!(%location, "tcp server started");
        Ok(Self { location, inner })
    }
}

impl TransportServer for TcpServer {
    fn location(&self) -> String {
        self.location.clone()
    }

    fn close(&mut self) -> Result<(), McpError> {
        if self.inner.is_running() {
            self.inner.stop();
            info!(location = %self.location, "tcp server closed");
        }
        Ok(())
    }
}

impl Drop for TcpServer {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

// ── Client ──────────────────────────────────────────────────────

/// A client connected to a [`TcpServer`].
pub struct TcpClient {
    inner: SocketClient<TcpStream>,
}

impl TcpClient {
    /// Connect to the first reachable address of a `tcp:` location.
    pub fn connect(location: &str) -> Result<Self, McpError> {
        let addrs = parse_location(location).ok_or_else(|| McpError::InvalidLocation {
            location: location.to_string(),
        })?;
        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect(addr) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    debug!(%addr, "tcp client connected");
                    return Ok(Self {
                        inner: SocketClient::new(stream),
                    });
                }
                Err(e) => {
                    debug!(%addr, error = %e, "tcp connect failed");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.map_or_else(
            || McpError::InvalidLocation {
                location: location.to_string(),
            },
            McpError::Io,
        ))
    }
}

impl TransportClient for TcpClient {
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

/// `tcp:h1:p1,h2:p2` → `["h1:p1", "h2:p2"]`.
fn parse_location(location: &str) -> Option<Vec<&str>> {
    let body = location.strip_prefix(SCHEME)?;
    let addrs: Vec<&str> = body.split(',').map(str::trim).collect();
    if addrs.iter().any(|a| a.is_empty() || !a.contains(':')) {
        return None;
    }
    Some(addrs)
}

/// Factory for `tcp:` locations.
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpFactory;

impl TransportFactory for TcpFactory {
    fn name(&self) -> &'static str {
        "tcp"
    }

    fn can_connect_to(&self, location: &str) -> bool {
        parse_location(location).is_some()
    }

    fn connect(&self, location: &str) -> Result<Box<dyn TransportClient>, McpError> {
        Ok(Box::new(TcpClient::connect(location)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_validation() {
        assert!(TcpServerConfig::default().validate().is_ok());
        let bad = TcpServerConfig {
            poll_interval: Duration::ZERO,
            ..TcpServerConfig::default()
        };
        assert!(matches!(bad.validate(), Err(McpError::InvalidConfig { .. })));
        let bad = TcpServerConfig {
            advertise: vec!["a,b".into()],
            ..TcpServerConfig::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn location_parsing() {
        assert_eq!(
            parse_location("tcp:10.0.0.1:9000,node2:9001"),
            Some(vec!["10.0.0.1:9000", "node2:9001"])
        );
        assert_eq!(parse_location("tcp:"), None);
        assert_eq!(parse_location("tcp:nohost"), None);
        assert_eq!(parse_location("direct:3"), None);
    }

    #[test]
    fn advertised_hosts_share_the_bound_port() {
        let config = TcpServerConfig {
            advertise: vec!["node7".into(), "10.1.2.3".into()],
            ..TcpServerConfig::default()
        };
        let mut server = TcpServer::start(&config, Arc::new(crate::PostOffice::new())).unwrap();
        let location = server.location();
        let addrs = parse_location(&location).unwrap();
        assert_eq!(addrs.len(), 2);
        let port = addrs[0].rsplit(':').next().unwrap();
        assert!(addrs[0].starts_with("node7:"));
        assert_eq!(addrs[1], format!("10.1.2.3:{port}"));
        server.close().unwrap();
        server.close().unwrap();
    }

    #[test]
    fn refused_connection_is_an_io_error() {
        // Bind then drop to get a port nobody listens on.
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        assert!(matches!(
            TcpClient::connect(&format!("tcp:127.0.0.1:{port}")),
            Err(McpError::Io(_))
        ));
    }
}
