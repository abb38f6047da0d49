//! Transport errors.

use std::io;

use thiserror::Error;
use weft_core::{ReferenceError, WaitAborted};

/// Errors from MCP servers, clients and the post office.
#[derive(Debug, Error)]
pub enum McpError {
    /// The post office, server or client has been closed.
    #[error("transport is closed")]
    Closed,
    /// No factory could connect to any candidate location.
    #[error("could not connect to any of [{}]", .tried.join("; "))]
    ConnectionFailed {
        /// One entry per attempt, `location: reason`.
        tried: Vec<String>,
    },
    /// A location string was not understood by the transport asked to
    /// handle it.
    #[error("invalid location '{location}'")]
    InvalidLocation {
        /// The offending location.
        location: String,
    },
    /// A `direct:` location named a server that is not registered.
    #[error("no direct server with id {id}")]
    UnknownServer {
        /// The server id.
        id: u64,
    },
    /// The request did not name a valid receiver.
    #[error("invalid receiver in request: {0}")]
    InvalidReceiver(#[from] ReferenceError),
    /// The server answered with an error.
    #[error("server error: {message}")]
    Remote {
        /// The server's description.
        message: String,
    },
    /// Malformed framing or response.
    #[error("protocol error: {reason}")]
    Protocol {
        /// What was wrong.
        reason: String,
    },
    /// A frame announced a payload longer than the allowed maximum.
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge {
        /// Announced length.
        len: u64,
        /// The limit.
        max: u64,
    },
    /// The timeout handler abandoned the wait.
    #[error(transparent)]
    Aborted(#[from] WaitAborted),
    /// A server configuration failed validation.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What was wrong.
        reason: String,
    },
    /// A lock was poisoned by a panicking thread.
    #[error("internal lock poisoned")]
    Poisoned,
    /// Socket or filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
