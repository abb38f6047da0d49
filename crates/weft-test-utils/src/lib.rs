//! Test fixtures and mock types for Weft development.
//!
//! Provides the canonical macro–micro coupling [`Model`], a [`cluster`]
//! builder for synthetic [`Resources`], and a [`RecordingTimeoutHandler`]
//! that logs every callback a blocking receive makes.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use weft_core::{Reference, Resources, TimeoutHandler, WaitAborted};

pub use fixtures::{macro_micro_model, ring_model, MACRO_MICRO_TOML};

/// Parse a reference, panicking on malformed input.
pub fn r(text: &str) -> Reference {
    text.parse()
        .unwrap_or_else(|e| panic!("bad test reference '{text}': {e}"))
}

/// A cluster of nodes, each with cores `0..cores`.
pub fn cluster(nodes: &[(&str, u32)]) -> Resources {
    let mut res = Resources::new();
    for (name, cores) in nodes {
        res.add_cores(name, 0..*cores);
    }
    res
}

/// One callback observed by a [`RecordingTimeoutHandler`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeoutEvent {
    Timeout,
    Receive,
}

/// Timeout handler that records callbacks and aborts after a fixed number
/// of timeouts.
///
/// The event log is shared, so a clone kept by the test can inspect what
/// the code under test did with the handler it was given.
#[derive(Clone)]
pub struct RecordingTimeoutHandler {
    timeout: Duration,
    abort_after: Option<usize>,
    timeouts: usize,
    events: Arc<Mutex<Vec<TimeoutEvent>>>,
}

impl RecordingTimeoutHandler {
    /// Never aborts.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            abort_after: None,
            timeouts: 0,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Aborts on the `n`th timeout (1-based).
    pub fn aborting_after(timeout: Duration, n: usize) -> Self {
        Self {
            abort_after: Some(n),
            ..Self::new(timeout)
        }
    }

    pub fn events(&self) -> Vec<TimeoutEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl TimeoutHandler for RecordingTimeoutHandler {
    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn on_timeout(&mut self) -> Result<(), WaitAborted> {
        self.events.lock().unwrap().push(TimeoutEvent::Timeout);
        self.timeouts += 1;
        match self.abort_after {
            Some(n) if self.timeouts >= n => Err(WaitAborted {
                reason: format!("aborted after {} timeouts", self.timeouts),
            }),
            _ => Ok(()),
        }
    }

    fn on_receive(&mut self) {
        self.events.lock().unwrap().push(TimeoutEvent::Receive);
    }
}
