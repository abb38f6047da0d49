//! The server-side seam between transports and message storage.

use std::time::Duration;

use crate::error::McpError;

/// Answers requests arriving at a server.
///
/// Servers of every transport forward each request payload here and send
/// back whatever bytes are returned. Implementations must be shareable
/// across the server's connection threads.
pub trait RequestHandler: Send + Sync {
    /// Produce the response to `request`.
    ///
    /// With `timeout`, returns `Ok(None)` if no response became available
    /// in time; the caller may ask again. Without, blocks until a response
    /// exists or the handler is closed.
    fn handle_request(
        &self,
        request: &[u8],
        timeout: Option<Duration>,
    ) -> Result<Option<Vec<u8>>, McpError>;
}
