//! Checkpoint trigger rules.
//!
//! A trigger is a set of points on one time axis. Rules answer two
//! questions about a time `t`: the first point strictly after it, and the
//! last point at or before it.

use crate::config::{AtRule, CheckpointRule, RangeRule};

/// A set of checkpoint points on one time axis.
pub trait CheckpointTrigger: Send + Sync {
    /// Smallest point strictly greater than `t`.
    fn next_checkpoint(&self, t: f64) -> Option<f64>;
    /// Largest point less than or equal to `t`.
    fn previous_checkpoint(&self, t: f64) -> Option<f64>;
}

// ── AtTrigger ───────────────────────────────────────────────────

/// An explicit list of points.
#[derive(Clone, Debug, PartialEq)]
pub struct AtTrigger {
    /// Sorted, without duplicates.
    points: Vec<f64>,
}

impl AtTrigger {
    /// Build from points in any order. NaN values are dropped.
    pub fn new(points: impl IntoIterator<Item = f64>) -> Self {
        let mut points: Vec<f64> = points.into_iter().filter(|p| !p.is_nan()).collect();
        points.sort_by(f64::total_cmp);
        points.dedup();
        Self { points }
    }

    /// The points, in ascending order.
    pub fn points(&self) -> &[f64] {
        &self.points
    }
}

impl From<&AtRule> for AtTrigger {
    fn from(rule: &AtRule) -> Self {
        Self::new(rule.at.iter().copied())
    }
}

impl CheckpointTrigger for AtTrigger {
    fn next_checkpoint(&self, t: f64) -> Option<f64> {
        let i = self.points.partition_point(|&p| p <= t);
        self.points.get(i).copied()
    }

    fn previous_checkpoint(&self, t: f64) -> Option<f64> {
        let i = self.points.partition_point(|&p| p <= t);
        i.checked_sub(1).map(|i| self.points[i])
    }
}

// ── RangeTrigger ────────────────────────────────────────────────

/// Evenly spaced points `start + k * every`.
///
/// Without a start the points extend indefinitely below, anchored at 0.
/// Without a stop they extend indefinitely above; with one, the last point
/// is the largest that does not exceed it.
#[derive(Clone, Debug, PartialEq)]
pub struct RangeTrigger {
    start: Option<f64>,
    every: f64,
    last: Option<f64>,
}

impl RangeTrigger {
    /// Build a range. `every` must be positive and finite, and `start`
    /// must not exceed `stop`; [`CheckpointConfig::validate`] checks this
    /// for loaded configuration.
    ///
    /// [`CheckpointConfig::validate`]: crate::CheckpointConfig::validate
    pub fn new(start: Option<f64>, stop: Option<f64>, every: f64) -> Self {
        let anchor = start.unwrap_or(0.0);
        let last = stop.map(|stop| anchor + ((stop - anchor) / every).floor() * every);
        Self { start, every, last }
    }

    fn anchor(&self) -> f64 {
        self.start.unwrap_or(0.0)
    }

    /// Step `k` along the range.
    fn point(&self, k: f64) -> f64 {
        self.anchor() + k * self.every
    }
}

impl From<&RangeRule> for RangeTrigger {
    fn from(rule: &RangeRule) -> Self {
        Self::new(rule.start, rule.stop, rule.every)
    }
}

impl CheckpointTrigger for RangeTrigger {
    fn next_checkpoint(&self, t: f64) -> Option<f64> {
        if let Some(start) = self.start {
            if t < start {
                return Some(start);
            }
        }
        if self.last.is_some_and(|last| t >= last) {
            return None;
        }
        let k = ((t - self.anchor()) / self.every).floor() + 1.0;
        // The division may round across a point; settle on the exact step.
        let next = if self.point(k - 1.0) > t {
            self.point(k - 1.0)
        } else if self.point(k) <= t {
            self.point(k + 1.0)
        } else {
            self.point(k)
        };
        Some(next)
    }

    fn previous_checkpoint(&self, t: f64) -> Option<f64> {
        if self.start.is_some_and(|start| t < start) {
            return None;
        }
        if let Some(last) = self.last {
            if t >= last {
                return Some(last);
            }
        }
        let k = ((t - self.anchor()) / self.every).floor();
        let previous = if self.point(k + 1.0) <= t {
            self.point(k + 1.0)
        } else if self.point(k) > t {
            self.point(k - 1.0)
        } else {
            self.point(k)
        };
        Some(previous)
    }
}

// ── CombinedTrigger ─────────────────────────────────────────────

/// The union of several triggers.
#[derive(Default)]
pub struct CombinedTrigger {
    triggers: Vec<Box<dyn CheckpointTrigger>>,
}

impl CombinedTrigger {
    /// Combine already built triggers.
    pub fn new(triggers: Vec<Box<dyn CheckpointTrigger>>) -> Self {
        Self { triggers }
    }

    /// Build one trigger per rule and combine them.
    pub fn from_rules(rules: &[CheckpointRule]) -> Self {
        let triggers = rules
            .iter()
            .map(|rule| -> Box<dyn CheckpointTrigger> {
                match rule {
                    CheckpointRule::At(at) => Box::new(AtTrigger::from(at)),
                    CheckpointRule::Range(range) => Box::new(RangeTrigger::from(range)),
                }
            })
            .collect();
        Self { triggers }
    }

    /// Whether no points are defined at all.
    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }
}

impl CheckpointTrigger for CombinedTrigger {
    fn next_checkpoint(&self, t: f64) -> Option<f64> {
        self.triggers
            .iter()
            .filter_map(|trigger| trigger.next_checkpoint(t))
            .min_by(f64::total_cmp)
    }

    fn previous_checkpoint(&self, t: f64) -> Option<f64> {
        self.triggers
            .iter()
            .filter_map(|trigger| trigger.previous_checkpoint(t))
            .max_by(f64::total_cmp)
    }
}
