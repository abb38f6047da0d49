//! The seam between blocking receives and whoever watches them.
//!
//! Transports accept an optional [`TimeoutHandler`] when waiting for a
//! message. The handler decides how long to wait before it is told about a
//! timeout, and may abandon the wait. Deadlock detection plugs in here.

use std::time::Duration;

use crate::error::WaitAborted;

/// Callbacks invoked by a blocking receive.
pub trait TimeoutHandler {
    /// How long to wait before the next call to
    /// [`on_timeout`](TimeoutHandler::on_timeout). May change after each
    /// timeout.
    fn timeout(&self) -> Duration;

    /// Called each time [`timeout`](TimeoutHandler::timeout) elapses without
    /// a message. Returning an error abandons the receive.
    fn on_timeout(&mut self) -> Result<(), WaitAborted>;

    /// Called once when the message arrives.
    fn on_receive(&mut self);
}
