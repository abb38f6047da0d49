//! Checkpoint triggers for Weft instances.
//!
//! Rules describe points on the simulation-time and wallclock-time axes
//! at which an instance should save a snapshot:
//!
//! - [`AtTrigger`], [`RangeTrigger`] and their union [`CombinedTrigger`]
//!   implement [`CheckpointTrigger`].
//! - [`CheckpointConfig`] holds the rules and loads them from TOML.
//! - [`TriggerManager`] tracks, per instance, which points have been
//!   acted upon and which are due.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod clock;
pub mod config;
pub mod error;
pub mod manager;
pub mod trigger;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{AtRule, CheckpointConfig, CheckpointRule, RangeRule};
pub use error::CheckpointError;
pub use manager::{TriggerManager, TriggerState};
pub use trigger::{AtTrigger, CheckpointTrigger, CombinedTrigger, RangeTrigger};
