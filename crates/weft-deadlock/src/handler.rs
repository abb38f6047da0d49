//! Timeout handler connecting a blocking receive to the detector.

use std::time::Duration;

use tracing::{debug, warn};

use weft_core::{TimeoutHandler, WaitAborted};

use crate::detector::DeadlockHandle;
use crate::error::DeadlockError;
use crate::graph::WaitEdge;

/// Reports a long-blocked receive to the detector and aborts it once the
/// receiver turns out to be deadlocked.
///
/// - The timeout starts at the configured `receive_timeout` and grows by
///   `backoff_factor` after each consecutive expiry.
/// - The first expiry reports the wait; later ones ask whether the waiter
///   is in a cycle and abort the receive if so.
/// - Receiving after a reported wait reports the wait as done. Dropping
///   the handler does the same, so a receive that ends in an error does
///   not leave its wait in the graph.
///
/// A detector that has stopped is treated as never finding a deadlock.
pub struct ReceiveTimeoutHandler {
    detector: DeadlockHandle,
    edge: WaitEdge,
    consecutive: u32,
    reported: bool,
}

impl ReceiveTimeoutHandler {
    pub(crate) fn new(detector: DeadlockHandle, edge: WaitEdge) -> Self {
        Self {
            detector,
            edge,
            consecutive: 0,
            reported: false,
        }
    }

    /// The wait this handler reports.
    pub fn edge(&self) -> &WaitEdge {
        &self.edge
    }

    /// Number of expiries since the last receive.
    pub fn consecutive_timeouts(&self) -> u32 {
        self.consecutive
    }

    /// Withdraw a reported wait. No-op if nothing is reported.
    fn withdraw(&mut self) -> Result<(), DeadlockError> {
        if !self.reported {
            return Ok(());
        }
        self.reported = false;
        let e = &self.edge;
        self.detector
            .put_waiting_done(e.waiter.clone(), e.awaited.clone(), e.port.clone(), e.slot)
    }
}

impl TimeoutHandler for ReceiveTimeoutHandler {
    fn timeout(&self) -> Duration {
        self.detector.config().timeout_after(self.consecutive)
    }

    fn on_timeout(&mut self) -> Result<(), WaitAborted> {
        self.consecutive = self.consecutive.saturating_add(1);
        if !self.reported {
            let e = &self.edge;
            match self.detector.put_waiting(
                e.waiter.clone(),
                e.awaited.clone(),
                e.port.clone(),
                e.slot,
            ) {
                Ok(()) => self.reported = true,
                Err(err) => warn!(edge = %self.edge, error = %err, "could not report wait"),
            }
            return Ok(());
        }
        match self.detector.is_deadlocked(&self.edge.waiter) {
            Ok(true) => Err(WaitAborted {
                reason: format!("deadlock detected while {} waited", self.edge),
            }),
            Ok(false) => {
                debug!(edge = %self.edge, timeouts = self.consecutive, "still waiting");
                Ok(())
            }
            Err(err) => {
                debug!(error = %err, "deadlock query failed");
                Ok(())
            }
        }
    }

    fn on_receive(&mut self) {
        if let Err(err) = self.withdraw() {
            warn!(edge = %self.edge, error = %err, "could not report wait done");
        }
        self.consecutive = 0;
    }
}

impl Drop for ReceiveTimeoutHandler {
    fn drop(&mut self) {
        // The detector may already be gone at teardown.
        if let Err(err) = self.withdraw() {
            debug!(edge = %self.edge, error = %err, "abandoned wait not withdrawn");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{DeadlockDetector, DetectorConfig};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use weft_core::{Reference, TimeoutHandler};

    fn r(text: &str) -> Reference {
        text.parse().unwrap()
    }

    fn config() -> DetectorConfig {
        DetectorConfig {
            receive_timeout: Duration::from_millis(100),
            ..DetectorConfig::default()
        }
    }

    #[test]
    fn timeout_escalates_and_resets() {
        let detector = DeadlockDetector::spawn(config(), |_| {}).unwrap();
        let mut th = detector
            .handle()
            .receive_timeout_handler(r("a"), r("b"), "in".parse().unwrap(), None);

        assert_eq!(th.timeout(), Duration::from_millis(100));
        th.on_timeout().unwrap();
        assert_eq!(th.timeout(), Duration::from_millis(150));
        th.on_timeout().unwrap();
        assert_eq!(th.timeout(), Duration::from_millis(225));
        th.on_receive();
        assert_eq!(th.timeout(), Duration::from_millis(100));
        assert_eq!(th.consecutive_timeouts(), 0);
        detector.shutdown().unwrap();
    }

    #[test]
    fn mutual_receives_abort_after_detection() {
        let fired = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&fired);
        let detector = DeadlockDetector::spawn(config(), move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        let h = detector.handle();
        let mut a = h.receive_timeout_handler(r("a"), r("b"), "in".parse().unwrap(), None);
        let mut b = h.receive_timeout_handler(r("b"), r("a"), "in".parse().unwrap(), None);

        // First expiries only report.
        a.on_timeout().unwrap();
        b.on_timeout().unwrap();
        // Second expiries find the cycle.
        assert!(a.on_timeout().is_err());
        assert!(b.on_timeout().is_err());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        detector.shutdown().unwrap();
    }

    #[test]
    fn completed_receive_clears_the_wait() {
        let detector = DeadlockDetector::spawn(config(), |_| {}).unwrap();
        let h = detector.handle();
        let mut a = h.receive_timeout_handler(r("a"), r("b"), "in".parse().unwrap(), Some(1));
        a.on_timeout().unwrap();
        a.on_receive();
        // A second receive may time out and report again without violating
        // the one-wait-per-waiter rule.
        a.on_timeout().unwrap();
        a.on_receive();
        detector.shutdown().unwrap();
    }

    #[test]
    fn abandoned_receive_withdraws_its_wait() {
        let fired = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&fired);
        let detector = DeadlockDetector::spawn(config(), move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        let h = detector.handle();

        // A receive that times out and then fails without a message.
        let mut failed = h.receive_timeout_handler(r("a"), r("b"), "in".parse().unwrap(), None);
        failed.on_timeout().unwrap();
        drop(failed);

        // The next receive of the same waiter reports again and the real
        // cycle with c is still found.
        let mut a = h.receive_timeout_handler(r("a"), r("c"), "in".parse().unwrap(), None);
        let mut c = h.receive_timeout_handler(r("c"), r("a"), "in".parse().unwrap(), None);
        a.on_timeout().unwrap();
        c.on_timeout().unwrap();
        assert!(c.on_timeout().is_err());
        assert_eq!(h.is_deadlocked(&r("a")), Ok(true));
        assert_eq!(h.is_deadlocked(&r("b")), Ok(false));
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        drop(a);
        drop(c);
        detector.shutdown().unwrap();
    }

    #[test]
    fn handler_outliving_the_detector_drops_quietly() {
        let detector = DeadlockDetector::spawn(config(), |_| {}).unwrap();
        let mut a = detector
            .handle()
            .receive_timeout_handler(r("a"), r("b"), "in".parse().unwrap(), None);
        a.on_timeout().unwrap();
        detector.shutdown().unwrap();
        drop(a);
    }
}
