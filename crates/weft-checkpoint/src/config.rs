//! Checkpoint configuration, loadable from TOML.
//!
//! ```toml
//! at_end = true
//!
//! [[simulation_time]]
//! at = [1, 3, 4.5]
//!
//! [[simulation_time]]
//! start = 0
//! stop = 20
//! every = 1.2
//!
//! [[wallclock_time]]
//! every = 3600
//! ```

use serde::{Deserialize, Serialize};

use crate::error::CheckpointError;

/// Checkpoint at an explicit list of times.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AtRule {
    /// The times, in any order.
    pub at: Vec<f64>,
}

/// Checkpoint at evenly spaced times.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RangeRule {
    /// First point. Unbounded below when absent, with points anchored at 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    /// Points never exceed this. Unbounded above when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<f64>,
    /// Spacing between points.
    pub every: f64,
}

/// One checkpoint rule; the form is recognised by its keys.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CheckpointRule {
    /// An `at = [...]` rule.
    At(AtRule),
    /// A `start`/`stop`/`every` rule.
    Range(RangeRule),
}

impl CheckpointRule {
    /// Shorthand for an [`AtRule`].
    pub fn at(times: impl IntoIterator<Item = f64>) -> Self {
        Self::At(AtRule {
            at: times.into_iter().collect(),
        })
    }

    /// Shorthand for a [`RangeRule`].
    pub fn range(start: Option<f64>, stop: Option<f64>, every: f64) -> Self {
        Self::Range(RangeRule { start, stop, every })
    }

    fn validate(&self, axis: &'static str) -> Result<(), CheckpointError> {
        let invalid = |reason: String| CheckpointError::InvalidRule { axis, reason };
        match self {
            Self::At(rule) => {
                if rule.at.is_empty() {
                    return Err(invalid("`at` must list at least one time".to_string()));
                }
                if let Some(bad) = rule.at.iter().find(|t| !t.is_finite()) {
                    return Err(invalid(format!("`at` contains non-finite time {bad}")));
                }
            }
            Self::Range(rule) => {
                if !rule.every.is_finite() || rule.every <= 0.0 {
                    return Err(invalid(format!(
                        "`every` must be positive and finite, got {}",
                        rule.every
                    )));
                }
                for (name, value) in [("start", rule.start), ("stop", rule.stop)] {
                    if let Some(v) = value.filter(|v| !v.is_finite()) {
                        return Err(invalid(format!("`{name}` must be finite, got {v}")));
                    }
                }
                if let (Some(start), Some(stop)) = (rule.start, rule.stop) {
                    if start > stop {
                        return Err(invalid(format!(
                            "`start` ({start}) is after `stop` ({stop})"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// When an instance should save snapshots.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckpointConfig {
    /// Save a final snapshot when the instance finishes.
    #[serde(default)]
    pub at_end: bool,
    /// Rules on the simulation-time axis.
    #[serde(default)]
    pub simulation_time: Vec<CheckpointRule>,
    /// Rules on elapsed wallclock seconds since the instance started.
    #[serde(default)]
    pub wallclock_time: Vec<CheckpointRule>,
}

impl CheckpointConfig {
    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, CheckpointError> {
        let config: Self = toml::from_str(text).map_err(|e| CheckpointError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check every rule.
    pub fn validate(&self) -> Result<(), CheckpointError> {
        for rule in &self.simulation_time {
            rule.validate("simulation_time")?;
        }
        for rule in &self.wallclock_time {
            rule.validate("wallclock_time")?;
        }
        Ok(())
    }

    /// Whether any checkpoint can ever be requested.
    pub fn is_enabled(&self) -> bool {
        self.at_end || !self.simulation_time.is_empty() || !self.wallclock_time.is_empty()
    }
}
