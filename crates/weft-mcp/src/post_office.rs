//! Per-receiver outboxes shared between an instance and its servers.
//!
//! The sending side of an instance [`deposit`](PostOffice::deposit)s
//! messages addressed to remote receivers; servers hand them out one at a
//! time, FIFO per receiver, when the receiver asks. Each receiver has its
//! own condition variable, so a request for an empty outbox never delays
//! a request for a different receiver.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use tracing::debug;

use weft_core::Reference;

use crate::error::McpError;
use crate::handler::RequestHandler;

struct Outbox {
    messages: VecDeque<Vec<u8>>,
    ready: Arc<Condvar>,
}

impl Outbox {
    fn new() -> Self {
        Self {
            messages: VecDeque::new(),
            ready: Arc::new(Condvar::new()),
        }
    }
}

#[derive(Default)]
struct State {
    outboxes: IndexMap<Reference, Outbox>,
    closed: bool,
}

impl State {
    fn all_drained(&self) -> bool {
        self.outboxes.values().all(|o| o.messages.is_empty())
    }
}

/// Outbound message store, keyed by receiving port reference.
#[derive(Default)]
pub struct PostOffice {
    state: Mutex<State>,
    /// Signalled whenever a message is taken out, for
    /// [`wait_for_receivers`](PostOffice::wait_for_receivers).
    drained: Condvar,
}

impl PostOffice {
    /// An empty, open post office.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, McpError> {
        self.state.lock().map_err(|_| McpError::Poisoned)
    }

    /// Queue `message` for `receiver`.
    pub fn deposit(&self, receiver: Reference, message: Vec<u8>) -> Result<(), McpError> {
        let mut state = self.lock()?;
        if state.closed {
            return Err(McpError::Closed);
        }
        let outbox = state.outboxes.entry(receiver).or_insert_with(Outbox::new);
        outbox.messages.push_back(message);
        outbox.ready.notify_one();
        Ok(())
    }

    /// Take the oldest message for `receiver`.
    ///
    /// Blocks until one is deposited. With `timeout`, gives up after that
    /// long and returns `Ok(None)`. Fails with [`McpError::Closed`] once
    /// the post office is closed, even while blocked.
    pub fn get_message(
        &self,
        receiver: &Reference,
        timeout: Option<Duration>,
    ) -> Result<Option<Vec<u8>>, McpError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.lock()?;
        loop {
            if state.closed {
                return Err(McpError::Closed);
            }
            let outbox = state
                .outboxes
                .entry(receiver.clone())
                .or_insert_with(Outbox::new);
            if let Some(message) = outbox.messages.pop_front() {
                self.drained.notify_all();
                return Ok(Some(message));
            }
            let ready = Arc::clone(&outbox.ready);
            state = match deadline {
                None => ready.wait(state).map_err(|_| McpError::Poisoned)?,
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    ready
                        .wait_timeout(state, deadline - now)
                        .map_err(|_| McpError::Poisoned)?
                        .0
                }
            };
        }
    }

    /// Number of messages waiting for `receiver`.
    pub fn pending(&self, receiver: &Reference) -> Result<usize, McpError> {
        Ok(self
            .lock()?
            .outboxes
            .get(receiver)
            .map_or(0, |o| o.messages.len()))
    }

    /// Block until every outbox is empty or `timeout` passes.
    ///
    /// Returns whether everything was picked up. Instances call this
    /// before shutting down their servers so peers get their last
    /// messages.
    pub fn wait_for_receivers(&self, timeout: Duration) -> Result<bool, McpError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock()?;
        while !state.all_drained() {
            if state.closed {
                return Ok(false);
            }
            let now = Instant::now();
            if now >= deadline {
                debug!("timed out waiting for receivers");
                return Ok(false);
            }
            state = self
                .drained
                .wait_timeout(state, deadline - now)
                .map_err(|_| McpError::Poisoned)?
                .0;
        }
        Ok(true)
    }

    /// Close the post office, waking every blocked caller with
    /// [`McpError::Closed`]. Idempotent.
    pub fn close(&self) -> Result<(), McpError> {
        let mut state = self.lock()?;
        if !state.closed {
            state.closed = true;
            for outbox in state.outboxes.values() {
                outbox.ready.notify_all();
            }
            self.drained.notify_all();
        }
        Ok(())
    }

    /// Whether [`close`](PostOffice::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().map(|s| s.closed).unwrap_or(true)
    }
}

impl RequestHandler for PostOffice {
    /// The request is the receiver reference as UTF-8 text.
    fn handle_request(
        &self,
        request: &[u8],
        timeout: Option<Duration>,
    ) -> Result<Option<Vec<u8>>, McpError> {
        let text = std::str::from_utf8(request).map_err(|_| McpError::Protocol {
            reason: "receiver is not valid UTF-8".to_string(),
        })?;
        let receiver: Reference = text.parse()?;
        self.get_message(&receiver, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn r(text: &str) -> Reference {
        text.parse().unwrap()
    }

    #[test]
    fn fifo_per_receiver() {
        let po = PostOffice::new();
        po.deposit(r("b[0].in"), b"one".to_vec()).unwrap();
        po.deposit(r("b[1].in"), b"other".to_vec()).unwrap();
        po.deposit(r("b[0].in"), b"two".to_vec()).unwrap();

        assert_eq!(po.pending(&r("b[0].in")).unwrap(), 2);
        assert_eq!(po.get_message(&r("b[0].in"), None).unwrap().unwrap(), b"one");
        assert_eq!(po.get_message(&r("b[0].in"), None).unwrap().unwrap(), b"two");
        assert_eq!(po.get_message(&r("b[1].in"), None).unwrap().unwrap(), b"other");
    }

    #[test]
    fn empty_outbox_times_out() {
        let po = PostOffice::new();
        let start = Instant::now();
        let got = po
            .get_message(&r("a.in"), Some(Duration::from_millis(30)))
            .unwrap();
        assert!(got.is_none());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn blocked_receiver_wakes_on_deposit() {
        let po = Arc::new(PostOffice::new());
        let waiter = {
            let po = Arc::clone(&po);
            thread::spawn(move || po.get_message(&r("a.in"), None))
        };
        thread::sleep(Duration::from_millis(20));
        po.deposit(r("a.in"), vec![1, 2, 3]).unwrap();
        assert_eq!(waiter.join().unwrap().unwrap(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn other_receiver_is_not_blocked_by_empty_outbox() {
        let po = Arc::new(PostOffice::new());
        po.deposit(r("b.in"), b"ready".to_vec()).unwrap();
        let stuck = {
            let po = Arc::clone(&po);
            thread::spawn(move || po.get_message(&r("a.in"), None))
        };
        thread::sleep(Duration::from_millis(10));
        assert_eq!(
            po.get_message(&r("b.in"), Some(Duration::from_millis(100)))
                .unwrap()
                .unwrap(),
            b"ready"
        );
        po.close().unwrap();
        assert!(matches!(stuck.join().unwrap(), Err(McpError::Closed)));
    }

    #[test]
    fn close_is_idempotent_and_rejects_deposits() {
        let po = PostOffice::new();
        po.close().unwrap();
        po.close().unwrap();
        assert!(po.is_closed());
        assert!(matches!(
            po.deposit(r("a.in"), vec![]),
            Err(McpError::Closed)
        ));
    }

    #[test]
    fn wait_for_receivers_returns_when_drained() {
        let po = Arc::new(PostOffice::new());
        po.deposit(r("a.in"), vec![0]).unwrap();
        assert!(!po.wait_for_receivers(Duration::from_millis(10)).unwrap());

        let reader = {
            let po = Arc::clone(&po);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                po.get_message(&r("a.in"), None)
            })
        };
        assert!(po.wait_for_receivers(Duration::from_secs(5)).unwrap());
        reader.join().unwrap().unwrap();
    }

    #[test]
    fn request_handler_parses_receiver() {
        let po = PostOffice::new();
        po.deposit(r("micro[3].init_in"), b"state".to_vec()).unwrap();
        let got = po
            .handle_request(b"micro[3].init_in", Some(Duration::from_millis(10)))
            .unwrap();
        assert_eq!(got.as_deref(), Some(&b"state"[..]));
        assert!(matches!(
            po.handle_request(b"3bad", None),
            Err(McpError::InvalidReceiver(_))
        ));
    }
}
