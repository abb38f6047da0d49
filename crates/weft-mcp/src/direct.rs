//! In-process transport: the client calls the server's handler directly.
//!
//! Servers are found through an explicit [`DirectRegistry`] rather than a
//! process global, so independent runs (and tests) in one process do not
//! see each other's servers. Closing a server also cuts off the clients
//! already connected to it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use weft_core::TimeoutHandler;

use crate::error::McpError;
use crate::handler::RequestHandler;
use crate::transport::{TransportClient, TransportFactory, TransportServer};

const SCHEME: &str = "direct:";

// ── DirectRegistry ──────────────────────────────────────────────

/// A published handler and the flag its server sets on close.
#[derive(Clone)]
struct Endpoint {
    handler: Arc<dyn RequestHandler>,
    closed: Arc<AtomicBool>,
}

#[derive(Default)]
struct RegistryState {
    next_id: u64,
    servers: HashMap<u64, Endpoint>,
}

/// Table of in-process servers, shared by cloning.
#[derive(Clone, Default)]
pub struct DirectRegistry {
    inner: Arc<Mutex<RegistryState>>,
}

impl DirectRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, RegistryState>, McpError> {
        self.inner.lock().map_err(|_| McpError::Poisoned)
    }

    fn register(&self, endpoint: Endpoint) -> Result<u64, McpError> {
        let mut state = self.lock()?;
        let id = state.next_id;
        state.next_id += 1;
        state.servers.insert(id, endpoint);
        Ok(id)
    }

    fn unregister(&self, id: u64) -> Result<(), McpError> {
        self.lock()?.servers.remove(&id);
        Ok(())
    }

    fn get(&self, id: u64) -> Result<Endpoint, McpError> {
        self.lock()?
            .servers
            .get(&id)
            .cloned()
            .ok_or(McpError::UnknownServer { id })
    }

    /// Number of servers currently registered.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|s| s.servers.len()).unwrap_or(0)
    }

    /// Whether no servers are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn parse_location(location: &str) -> Option<u64> {
    location.strip_prefix(SCHEME)?.parse().ok()
}

// ── Server ──────────────────────────────────────────────────────

/// A handler published in a [`DirectRegistry`].
pub struct DirectServer {
    registry: DirectRegistry,
    id: u64,
    closed: Arc<AtomicBool>,
}

impl DirectServer {
    /// Publish `handler` in `registry`.
    pub fn start(registry: &DirectRegistry, handler: Arc<dyn RequestHandler>) -> Result<Self, McpError> {
        let closed = Arc::new(AtomicBool::new(false));
        let id = registry.register(Endpoint {
            handler,
            closed: Arc::clone(&closed),
        })?;
        info!(location = %format!("{SCHEME}{id}"), "direct server started");
        Ok(Self {
            registry: registry.clone(),
            id,
            closed,
        })
    }
}

impl TransportServer for DirectServer {
    fn location(&self) -> String {
        format!("{SCHEME}{}", self.id)
    }

    fn close(&mut self) -> Result<(), McpError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.registry.unregister(self.id)?;
            info!(location = %self.location(), "direct server closed");
        }
        Ok(())
    }
}

impl Drop for DirectServer {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

// ── Client ──────────────────────────────────────────────────────

/// A client holding a direct reference to a server's handler.
///
/// Calls fail with [`McpError::Closed`] once either end is closed. A
/// request already inside the handler when the server closes finishes
/// its current wait first.
pub struct DirectClient {
    endpoint: Option<Endpoint>,
}

impl DirectClient {
    /// Connect to a `direct:<id>` location in `registry`.
    pub fn connect(registry: &DirectRegistry, location: &str) -> Result<Self, McpError> {
        let id = parse_location(location).ok_or_else(|| McpError::InvalidLocation {
            location: location.to_string(),
        })?;
        let endpoint = registry.get(id)?;
        debug!(location, "direct client connected");
        Ok(Self {
            endpoint: Some(endpoint),
        })
    }

    fn open_endpoint(&self) -> Result<&Endpoint, McpError> {
        match &self.endpoint {
            Some(endpoint) if !endpoint.closed.load(Ordering::Acquire) => Ok(endpoint),
            _ => Err(McpError::Closed),
        }
    }
}

impl TransportClient for DirectClient {
    fn call(
        &mut self,
        request: &[u8],
        timeout_handler: Option<&mut dyn TimeoutHandler>,
    ) -> Result<Vec<u8>, McpError> {
        let handler = Arc::clone(&self.open_endpoint()?.handler);
        let Some(th) = timeout_handler else {
            return handler
                .handle_request(request, None)?
                .ok_or_else(|| McpError::Protocol {
                    reason: "handler returned no response to a blocking request".to_string(),
                });
        };
        loop {
            if let Some(response) = handler.handle_request(request, Some(th.timeout()))? {
                th.on_receive();
                return Ok(response);
            }
            th.on_timeout()?;
            self.open_endpoint()?;
        }
    }

    fn close(&mut self) -> Result<(), McpError> {
        self.endpoint = None;
        Ok(())
    }
}

/// Factory for `direct:` locations in one registry.
#[derive(Clone)]
pub struct DirectFactory {
    registry: DirectRegistry,
}

impl DirectFactory {
    /// Resolve locations against `registry`.
    pub fn new(registry: DirectRegistry) -> Self {
        Self { registry }
    }
}

impl TransportFactory for DirectFactory {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn can_connect_to(&self, location: &str) -> bool {
        parse_location(location).is_some()
    }

    fn connect(&self, location: &str) -> Result<Box<dyn TransportClient>, McpError> {
        Ok(Box::new(DirectClient::connect(&self.registry, location)?))
    }
}
