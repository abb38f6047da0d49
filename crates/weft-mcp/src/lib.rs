//! Message transport between Weft instances.
//!
//! Each instance runs a [`PostOffice`] holding the messages it has sent,
//! and serves it over one or more transports. A receiving instance opens
//! an [`McpClient`] to each peer and asks for the next message addressed
//! to one of its ports.
//!
//! Transports, in preference order:
//!
//! - `direct:<id>`: in-process, through an explicit [`DirectRegistry`].
//! - `ipc:<path>`: Unix-domain socket on the same host (Unix only).
//! - `tcp:<host:port>[,<host:port>...]`: network sockets.
//!
//! Socket transports frame each request and response with an 8-byte
//! little-endian length; see [`framing`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod client;
pub mod direct;
pub mod error;
pub mod framing;
pub mod handler;
#[cfg(unix)]
pub mod ipc;
pub mod post_office;
mod socket;
pub mod tcp;
pub mod transport;

pub use client::{default_factories, McpClient};
pub use direct::{DirectClient, DirectFactory, DirectRegistry, DirectServer};
pub use error::McpError;
pub use handler::RequestHandler;
#[cfg(unix)]
pub use ipc::{ipc_socket_path, IpcClient, IpcFactory, IpcServer};
pub use post_office::PostOffice;
pub use tcp::{TcpClient, TcpFactory, TcpServer, TcpServerConfig};
pub use transport::{TransportClient, TransportFactory, TransportServer};
