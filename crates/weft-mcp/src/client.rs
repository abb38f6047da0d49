//! Transport selection and the receiving side of an instance.

use tracing::{debug, info};

use weft_core::{Reference, TimeoutHandler};

use crate::direct::{DirectFactory, DirectRegistry};
use crate::error::McpError;
use crate::tcp::TcpFactory;
use crate::transport::{TransportClient, TransportFactory};

/// The standard factories in preference order: direct, then IPC (Unix
/// only), then TCP.
pub fn default_factories(registry: &DirectRegistry) -> Vec<Box<dyn TransportFactory>> {
    let mut factories: Vec<Box<dyn TransportFactory>> =
        vec![Box::new(DirectFactory::new(registry.clone()))];
    #[cfg(unix)]
    factories.push(Box::new(crate::ipc::IpcFactory));
    factories.push(Box::new(TcpFactory));
    factories
}

/// A connection to one peer, over whichever transport reached it first.
pub struct McpClient {
    location: String,
    transport: &'static str,
    inner: Box<dyn TransportClient>,
}

impl McpClient {
    /// Connect to a peer published at `locations`.
    ///
    /// Factories are tried in order, each against every location it
    /// recognises; the first successful connection wins. There is exactly
    /// one such sweep; on failure every attempt is listed in
    /// [`McpError::ConnectionFailed`].
    pub fn connect(
        factories: &[Box<dyn TransportFactory>],
        locations: &[String],
    ) -> Result<Self, McpError> {
        let mut tried = Vec::new();
        for factory in factories {
            for location in locations {
                if !factory.can_connect_to(location) {
                    continue;
                }
                match factory.connect(location) {
                    Ok(inner) => {
                        info!(%location, transport = factory.name(), "connected to peer");
                        return Ok(Self {
                            location: location.clone(),
                            transport: factory.name(),
                            inner,
                        });
                    }
                    Err(e) => {
                        debug!(%location, transport = factory.name(), error = %e, "connect failed");
                        tried.push(format!("{location}: {e}"));
                    }
                }
            }
        }
        if tried.is_empty() {
            tried.extend(locations.iter().map(|l| format!("{l}: no usable transport")));
        }
        Err(McpError::ConnectionFailed { tried })
    }

    /// The location this client is connected to.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Name of the transport in use, e.g. `"tcp"`.
    pub fn transport(&self) -> &'static str {
        self.transport
    }

    /// Fetch the next message the peer holds for `receiver`.
    pub fn receive(
        &mut self,
        receiver: &Reference,
        timeout_handler: Option<&mut dyn TimeoutHandler>,
    ) -> Result<Vec<u8>, McpError> {
        self.inner
            .call(receiver.to_string().as_bytes(), timeout_handler)
    }

    /// Close the underlying connection. Idempotent.
    pub fn close(&mut self) -> Result<(), McpError> {
        self.inner.close()
    }
}

impl Drop for McpClient {
    fn drop(&mut self) {
        let _ = self.inner.close();
    }
}
