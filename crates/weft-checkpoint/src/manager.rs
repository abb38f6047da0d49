//! Per-instance tracking of which checkpoints are due.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::{Clock, MonotonicClock};
use crate::config::CheckpointConfig;
use crate::trigger::{CheckpointTrigger, CombinedTrigger};

/// Trigger position recorded with a snapshot, used to resume tracking
/// where it left off.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TriggerState {
    /// Simulation time of the last snapshot, if any was taken.
    pub simulation_time: Option<f64>,
    /// Elapsed wallclock seconds when the last snapshot was taken, or
    /// when the state was captured if none was.
    pub wallclock_time: f64,
}

/// One time axis: its rules and the next point not yet acted upon.
struct Axis {
    name: &'static str,
    trigger: CombinedTrigger,
    /// `None` until the first evaluation on the simulation axis.
    next: Option<f64>,
    last: Option<f64>,
}

impl Axis {
    fn new(name: &'static str, trigger: CombinedTrigger) -> Self {
        Self {
            name,
            trigger,
            next: None,
            last: None,
        }
    }

    /// First point at or after `t`. Points before the first observed
    /// time are not owed.
    fn first_from(&self, t: f64) -> Option<f64> {
        match self.trigger.previous_checkpoint(t) {
            Some(p) if p >= t => Some(p),
            _ => self.trigger.next_checkpoint(t),
        }
    }

    fn due(&self, t: f64) -> Option<String> {
        let next = self.next?;
        (t >= next).then(|| format!("{} >= {next}", self.name))
    }

    fn acted(&mut self, t: f64) {
        self.last = Some(t);
        self.next = self.trigger.next_checkpoint(t);
    }
}

/// Decides, for one instance, when its snapshots are due.
///
/// Each axis keeps the next trigger point not yet acted upon. A snapshot
/// is due once the current time has reached that point on either axis;
/// calling [`update_checkpoints`](Self::update_checkpoints) after saving
/// moves both axes past the current time, so a point that was skipped
/// over fires once rather than once per skipped point.
pub struct TriggerManager<C: Clock = MonotonicClock> {
    at_end: bool,
    sim: Axis,
    wall: Axis,
    sim_started: bool,
    clock: C,
    /// Clock reading that corresponds to `wall_base` elapsed seconds.
    wall_origin: f64,
    wall_base: f64,
    triggers: Vec<String>,
}

impl TriggerManager<MonotonicClock> {
    /// Track `config` against real time, starting now.
    pub fn with_monotonic_clock(config: &CheckpointConfig) -> Self {
        Self::new(config, MonotonicClock::new())
    }
}

impl<C: Clock> TriggerManager<C> {
    /// Track `config`, measuring wallclock time with `clock` from now.
    ///
    /// `config` is assumed valid; see [`CheckpointConfig::validate`].
    pub fn new(config: &CheckpointConfig, clock: C) -> Self {
        let wall_origin = clock.elapsed().as_secs_f64();
        let mut wall = Axis::new("wallclock_time", CombinedTrigger::from_rules(&config.wallclock_time));
        // No wallclock time has passed yet, so elapsed 0 is never owed.
        wall.next = wall.trigger.next_checkpoint(0.0);
        let manager = Self {
            at_end: config.at_end,
            sim: Axis::new(
                "simulation_time",
                CombinedTrigger::from_rules(&config.simulation_time),
            ),
            wall,
            sim_started: false,
            clock,
            wall_origin,
            wall_base: 0.0,
            triggers: Vec::new(),
        };
        debug!(
            at_end = manager.at_end,
            simulation_rules = config.simulation_time.len(),
            wallclock_rules = config.wallclock_time.len(),
            "checkpoint triggers configured"
        );
        manager
    }

    /// Elapsed wallclock seconds since the instance started, including
    /// time before a restore.
    pub fn elapsed_wallclock(&self) -> f64 {
        self.wall_base + (self.clock.elapsed().as_secs_f64() - self.wall_origin)
    }

    /// Whether a snapshot is due at simulation time `t`.
    ///
    /// Reasons for a `true` answer are available from
    /// [`get_triggers`](Self::get_triggers).
    pub fn should_save_snapshot(&mut self, t: f64) -> bool {
        self.triggers.clear();
        self.evaluate(t)
    }

    /// Whether a snapshot is due as the instance leaves its loop.
    ///
    /// An instance that completed normally saves one exactly when
    /// `at_end` is set. Otherwise it is about to run again with new
    /// inputs, and the ordinary rules are checked at `final_sim_time`,
    /// the latest time among those inputs; without it nothing is due.
    pub fn should_save_final_snapshot(
        &mut self,
        completed_normally: bool,
        final_sim_time: Option<f64>,
    ) -> bool {
        self.triggers.clear();
        if completed_normally {
            if self.at_end {
                self.triggers.push("at_end".to_string());
            }
            return self.at_end;
        }
        match final_sim_time {
            Some(t) => self.evaluate(t),
            None => false,
        }
    }

    fn evaluate(&mut self, t: f64) -> bool {
        if !self.sim_started {
            self.sim.next = self.sim.first_from(t);
            self.sim_started = true;
        }
        let wall = self.elapsed_wallclock();
        self.triggers.extend(self.wall.due(wall));
        self.triggers.extend(self.sim.due(t));
        if !self.triggers.is_empty() {
            debug!(t, wall, triggers = ?self.triggers, "checkpoint due");
        }
        !self.triggers.is_empty()
    }

    /// Record that a snapshot was saved at simulation time `t`.
    pub fn update_checkpoints(&mut self, t: f64) {
        let wall = self.elapsed_wallclock();
        self.sim.acted(t);
        self.sim_started = true;
        self.wall.acted(wall);
        debug!(
            t,
            wall,
            next_sim = ?self.sim.next,
            next_wall = ?self.wall.next,
            "checkpoint recorded"
        );
    }

    /// Reasons for the most recent `true` answer. Drains them.
    pub fn get_triggers(&mut self) -> Vec<String> {
        std::mem::take(&mut self.triggers)
    }

    /// Position to store with a snapshot.
    pub fn trigger_state(&self) -> TriggerState {
        TriggerState {
            simulation_time: self.sim.last,
            wallclock_time: self.wall.last.unwrap_or_else(|| self.elapsed_wallclock()),
        }
    }

    /// Continue from a snapshot: elapsed wallclock resumes at the stored
    /// value and only points after the stored times remain due.
    pub fn restore(&mut self, state: TriggerState) {
        self.wall_origin = self.clock.elapsed().as_secs_f64();
        self.wall_base = state.wallclock_time;
        self.wall.acted(state.wallclock_time);
        match state.simulation_time {
            Some(t) => {
                self.sim.acted(t);
                self.sim_started = true;
            }
            None => {
                self.sim.last = None;
                self.sim.next = None;
                self.sim_started = false;
            }
        }
        info!(
            simulation_time = ?state.simulation_time,
            wallclock_time = state.wallclock_time,
            "checkpoint triggers restored"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::CheckpointRule;

    fn sim_config(rules: Vec<CheckpointRule>) -> CheckpointConfig {
        CheckpointConfig {
            simulation_time: rules,
            ..CheckpointConfig::default()
        }
    }

    #[test]
    fn fires_once_per_crossing() {
        let config = sim_config(vec![CheckpointRule::range(Some(0.0), None, 10.0)]);
        let mut m = TriggerManager::new(&config, ManualClock::new());

        assert!(m.should_save_snapshot(0.0));
        assert_eq!(m.get_triggers(), vec!["simulation_time >= 0"]);
        m.update_checkpoints(0.0);

        assert!(!m.should_save_snapshot(5.0));
        assert!(m.get_triggers().is_empty());
        // Jumping over several points fires once.
        assert!(m.should_save_snapshot(35.0));
        m.update_checkpoints(35.0);
        assert!(!m.should_save_snapshot(39.0));
        assert!(m.should_save_snapshot(40.0));
    }

    #[test]
    fn points_before_start_are_not_owed() {
        let config = sim_config(vec![CheckpointRule::at([1.0, 5.0])]);
        let mut m = TriggerManager::new(&config, ManualClock::new());
        assert!(!m.should_save_snapshot(2.0));
        assert!(m.should_save_snapshot(5.0));
    }

    #[test]
    fn unacted_trigger_stays_due() {
        let config = sim_config(vec![CheckpointRule::at([1.0])]);
        let mut m = TriggerManager::new(&config, ManualClock::new());
        assert!(!m.should_save_snapshot(0.0));
        assert!(m.should_save_snapshot(1.5));
        assert!(m.should_save_snapshot(2.0));
        m.update_checkpoints(2.0);
        assert!(!m.should_save_snapshot(3.0));
    }

    #[test]
    fn wallclock_rules_use_the_clock() {
        let clock = ManualClock::new();
        let config = CheckpointConfig {
            wallclock_time: vec![CheckpointRule::range(None, None, 60.0)],
            ..CheckpointConfig::default()
        };
        let mut m = TriggerManager::new(&config, clock.clone());
        assert!(!m.should_save_snapshot(0.0));
        clock.advance_secs(59.0);
        assert!(!m.should_save_snapshot(1.0));
        clock.advance_secs(1.0);
        assert!(m.should_save_snapshot(2.0));
        assert_eq!(m.get_triggers(), vec!["wallclock_time >= 60"]);
    }

    #[test]
    fn fresh_instance_owes_no_wallclock_snapshot() {
        let clock = ManualClock::new();
        let config = CheckpointConfig {
            wallclock_time: vec![
                CheckpointRule::range(None, None, 30.0),
                CheckpointRule::at([0.0, 45.0]),
            ],
            ..CheckpointConfig::default()
        };
        let mut m = TriggerManager::new(&config, clock.clone());
        assert!(!m.should_save_snapshot(0.0));
        assert!(!m.should_save_final_snapshot(false, Some(0.0)));
        clock.advance_secs(30.0);
        assert!(m.should_save_snapshot(0.0));
        assert_eq!(m.get_triggers(), vec!["wallclock_time >= 30"]);
    }

    #[test]
    fn final_snapshot() {
        let config = CheckpointConfig {
            at_end: true,
            simulation_time: vec![CheckpointRule::at([10.0])],
            ..CheckpointConfig::default()
        };
        let mut m = TriggerManager::new(&config, ManualClock::new());
        assert!(!m.should_save_snapshot(0.0));
        assert!(m.should_save_final_snapshot(true, None));
        assert_eq!(m.get_triggers(), vec!["at_end"]);

        assert!(!m.should_save_final_snapshot(false, None));
        assert!(!m.should_save_final_snapshot(false, Some(5.0)));
        assert!(m.should_save_final_snapshot(false, Some(10.0)));
        assert_eq!(m.get_triggers(), vec!["simulation_time >= 10"]);

        let mut quiet = TriggerManager::new(&CheckpointConfig::default(), ManualClock::new());
        assert!(!quiet.should_save_final_snapshot(true, Some(1.0)));
    }

    #[test]
    fn restore_continues_from_state() {
        let clock = ManualClock::new();
        let config = CheckpointConfig {
            simulation_time: vec![CheckpointRule::range(Some(0.0), None, 10.0)],
            wallclock_time: vec![CheckpointRule::range(Some(100.0), None, 100.0)],
            ..CheckpointConfig::default()
        };
        let mut first = TriggerManager::new(&config, clock.clone());
        assert!(first.should_save_snapshot(20.0));
        clock.advance_secs(50.0);
        first.update_checkpoints(20.0);
        let state = first.trigger_state();
        assert_eq!(state.simulation_time, Some(20.0));
        assert_eq!(state.wallclock_time, 50.0);

        let mut resumed = TriggerManager::new(&config, clock.clone());
        resumed.restore(state);
        assert_eq!(resumed.elapsed_wallclock(), 50.0);
        assert!(!resumed.should_save_snapshot(25.0));
        assert!(resumed.should_save_snapshot(30.0));
        clock.advance_secs(50.0);
        assert!(resumed.should_save_snapshot(25.0));
        assert_eq!(resumed.get_triggers(), vec!["wallclock_time >= 100"]);
    }
}
