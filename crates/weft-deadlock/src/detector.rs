//! The detector thread and the handles used to feed it.
//!
//! The detector thread owns the [`WaitGraph`] exclusively (moved in via
//! `thread::spawn`). Callers reach it only through an unbounded crossbeam
//! channel of [`Event`]s, processed strictly in order; queries get their
//! answer on a per-query reply channel.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, info, warn};

use weft_core::{Identifier, Reference};

use crate::config::DetectorConfig;
use crate::error::DeadlockError;
use crate::graph::{WaitEdge, WaitGraph};
use crate::handler::ReceiveTimeoutHandler;

/// Called on the detector thread with the members of each newly detected
/// cycle, starting with the instance whose wait closed it.
pub type ShutdownCallback = Box<dyn FnMut(&[Reference]) + Send>;

/// Messages consumed by the detector thread.
#[derive(Debug)]
pub enum Event {
    /// A receive has been blocked past its timeout.
    Waiting(WaitEdge),
    /// That receive has completed.
    WaitingDone(WaitEdge),
    /// Ask whether an instance is part of a waiting cycle.
    IsDeadlocked {
        /// The instance asked about.
        instance: Reference,
        /// Where to send the answer.
        reply: Sender<bool>,
    },
    /// Process everything queued before this, then stop.
    Shutdown,
}

// ── DeadlockDetector ────────────────────────────────────────────

/// Owner of the detector thread.
pub struct DeadlockDetector {
    handle: DeadlockHandle,
    thread: Option<JoinHandle<Result<(), DeadlockError>>>,
}

impl DeadlockDetector {
    /// Validate `config` and start the detector thread.
    pub fn spawn<F>(config: DetectorConfig, on_deadlock: F) -> Result<Self, DeadlockError>
    where
        F: FnMut(&[Reference]) + Send + 'static,
    {
        config.validate()?;
        let (tx, rx) = crossbeam_channel::unbounded();
        let state = DetectorThreadState {
            graph: WaitGraph::new(),
            events: rx,
            on_deadlock: Box::new(on_deadlock),
        };
        let thread = thread::Builder::new()
            .name("weft-deadlock".into())
            .spawn(move || state.run())
            .map_err(|e| DeadlockError::ThreadSpawnFailed {
                reason: e.to_string(),
            })?;
        info!("deadlock detector started");
        Ok(Self {
            handle: DeadlockHandle { tx, config },
            thread: Some(thread),
        })
    }

    /// A handle for reporting waits, cloneable across threads.
    pub fn handle(&self) -> DeadlockHandle {
        self.handle.clone()
    }

    /// Stop the detector after it has processed every event queued so far
    /// and join its thread.
    ///
    /// Returns the invariant violation that halted the detector early, if
    /// there was one.
    pub fn shutdown(mut self) -> Result<(), DeadlockError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<(), DeadlockError> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        // Fails only if the thread already halted; joining still works.
        let _ = self.handle.tx.send(Event::Shutdown);
        let result = thread.join().map_err(|_| DeadlockError::Panicked)?;
        info!("deadlock detector stopped");
        result
    }
}

impl Drop for DeadlockDetector {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

struct DetectorThreadState {
    graph: WaitGraph,
    events: Receiver<Event>,
    on_deadlock: ShutdownCallback,
}

impl DetectorThreadState {
    /// Main loop. Runs until [`Event::Shutdown`], an invariant violation,
    /// or every sender is gone.
    fn run(mut self) -> Result<(), DeadlockError> {
        while let Ok(event) = self.events.recv() {
            match event {
                Event::Waiting(edge) => {
                    debug!(%edge, "waiting");
                    match self.graph.add(edge) {
                        Ok(Some(members)) => {
                            let names: Vec<String> = members.iter().map(|m| m.to_string()).collect();
                            warn!(cycle = %names.join(" -> "), "deadlock detected");
                            (self.on_deadlock)(&members);
                        }
                        Ok(None) => {}
                        Err(violation) => return Err(halt(violation)),
                    }
                }
                Event::WaitingDone(edge) => {
                    debug!(%edge, "waiting done");
                    if let Err(violation) = self.graph.remove(&edge) {
                        return Err(halt(violation));
                    }
                }
                Event::IsDeadlocked { instance, reply } => {
                    // The asker may have given up; nothing to do then.
                    let _ = reply.send(self.graph.is_deadlocked(&instance));
                }
                Event::Shutdown => {
                    debug!(outstanding = self.graph.len(), "shutdown requested");
                    break;
                }
            }
        }
        Ok(())
    }
}

fn halt(violation: DeadlockError) -> DeadlockError {
    error!(%violation, "deadlock detector invariant violated; detector halted");
    violation
}

// ── DeadlockHandle ──────────────────────────────────────────────

/// Sending side of the detector's event queue.
#[derive(Clone, Debug)]
pub struct DeadlockHandle {
    tx: Sender<Event>,
    config: DetectorConfig,
}

impl DeadlockHandle {
    fn send(&self, event: Event) -> Result<(), DeadlockError> {
        self.tx.send(event).map_err(|_| DeadlockError::Stopped)
    }

    /// Report that `waiter` is blocked receiving from `awaited`.
    pub fn put_waiting(
        &self,
        waiter: Reference,
        awaited: Reference,
        port: Identifier,
        slot: Option<usize>,
    ) -> Result<(), DeadlockError> {
        self.send(Event::Waiting(WaitEdge::new(waiter, awaited, port, slot)))
    }

    /// Report that the wait reported by [`put_waiting`](Self::put_waiting)
    /// with the same arguments has ended.
    pub fn put_waiting_done(
        &self,
        waiter: Reference,
        awaited: Reference,
        port: Identifier,
        slot: Option<usize>,
    ) -> Result<(), DeadlockError> {
        self.send(Event::WaitingDone(WaitEdge::new(waiter, awaited, port, slot)))
    }

    /// Whether `instance` is part of a waiting cycle, as of every event
    /// sent through this handle before the call.
    pub fn is_deadlocked(&self, instance: &Reference) -> Result<bool, DeadlockError> {
        let (reply, answer) = crossbeam_channel::bounded(1);
        self.send(Event::IsDeadlocked {
            instance: instance.clone(),
            reply,
        })?;
        answer.recv().map_err(|_| DeadlockError::Stopped)
    }

    /// A timeout handler for one blocking receive of `waiter` from
    /// `awaited`.
    pub fn receive_timeout_handler(
        &self,
        waiter: Reference,
        awaited: Reference,
        port: Identifier,
        slot: Option<usize>,
    ) -> ReceiveTimeoutHandler {
        ReceiveTimeoutHandler::new(self.clone(), WaitEdge::new(waiter, awaited, port, slot))
    }

    /// The configuration the detector was started with.
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }
}
