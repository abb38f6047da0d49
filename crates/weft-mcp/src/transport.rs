//! Transport traits implemented by every backend.

use weft_core::TimeoutHandler;

use crate::error::McpError;

/// A running server that peers can reach at [`location`](Self::location).
pub trait TransportServer: Send {
    /// The location string peers connect to, e.g. `tcp:10.0.0.5:41234`.
    fn location(&self) -> String;

    /// Stop accepting requests, let in-flight requests finish, and release
    /// the underlying channel. Calling it again does nothing.
    fn close(&mut self) -> Result<(), McpError>;
}

/// A connection to one server.
pub trait TransportClient: Send {
    /// Send `request` and wait for the response.
    ///
    /// Without a timeout handler, waits indefinitely. With one, waits
    /// [`TimeoutHandler::timeout`] at a time, calling
    /// [`TimeoutHandler::on_timeout`] after each expiry (which may abort
    /// the call) and [`TimeoutHandler::on_receive`] once the response
    /// arrives.
    fn call(
        &mut self,
        request: &[u8],
        timeout_handler: Option<&mut dyn TimeoutHandler>,
    ) -> Result<Vec<u8>, McpError>;

    /// Release the connection. Calling it again does nothing; later calls
    /// to [`call`](Self::call) fail with [`McpError::Closed`].
    fn close(&mut self) -> Result<(), McpError>;
}

/// Recognises and opens one kind of location.
pub trait TransportFactory: Send + Sync {
    /// Short name for diagnostics, e.g. `"tcp"`.
    fn name(&self) -> &'static str;

    /// Whether `location` is in a format this transport understands and
    /// could plausibly reach from here.
    fn can_connect_to(&self, location: &str) -> bool;

    /// Open a connection to `location`.
    fn connect(&self, location: &str) -> Result<Box<dyn TransportClient>, McpError>;
}
