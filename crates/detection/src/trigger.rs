//! Speed Change Trigger
//!
//! Two-state machine over one vehicle's event sequence. The first event only
//! sets the baseline; every later event is compared against the one before it.

use crate::DetectionError;
use serde::{Deserialize, Serialize};
use telemetry::Event;

/// Speed change (percent of the current speed) above which an event triggers
pub const SPEED_CHANGE_THRESHOLD_PCT: f64 = 75.0;

/// Trigger state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerState {
    AwaitingFirst,
    HaveBaseline,
}

/// Outcome of observing one event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SpeedChange {
    /// First event of the sequence, nothing to compare against
    Baseline,
    /// Change at or below the threshold
    Steady { percentage: f64 },
    /// Change above the threshold
    Sudden { percentage: f64 },
}

impl SpeedChange {
    pub fn is_triggered(&self) -> bool {
        matches!(self, SpeedChange::Sudden { .. })
    }

    pub fn percentage(&self) -> Option<f64> {
        match self {
            SpeedChange::Baseline => None,
            SpeedChange::Steady { percentage } | SpeedChange::Sudden { percentage } => Some(*percentage),
        }
    }
}

/// `100 * |previous - current| / current`
pub fn speed_change_percentage(previous: i32, current: i32) -> Result<f64, DetectionError> {
    if current == 0 {
        return Err(DetectionError::DivisionUndefined { previous });
    }
    let change = (i64::from(previous) - i64::from(current)).abs() as f64;
    Ok(100.0 * change / f64::from(current))
}

/// Sudden speed change detector for a single scan
#[derive(Debug, Clone, Default)]
pub struct SpeedChangeTrigger {
    previous_speed: Option<i32>,
    current_speed: Option<i32>,
}

impl SpeedChangeTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TriggerState {
        match self.current_speed {
            None => TriggerState::AwaitingFirst,
            Some(_) => TriggerState::HaveBaseline,
        }
    }

    pub fn previous_speed(&self) -> Option<i32> {
        self.previous_speed
    }

    pub fn current_speed(&self) -> Option<i32> {
        self.current_speed
    }

    /// Shift in a new speed and evaluate the change.
    ///
    /// The state advances even when the change is undefined, so the next
    /// observation compares against the zero speed.
    pub fn observe(&mut self, speed: i32) -> Result<SpeedChange, DetectionError> {
        self.previous_speed = self.current_speed;
        self.current_speed = Some(speed);

        let Some(previous) = self.previous_speed else {
            return Ok(SpeedChange::Baseline);
        };

        let percentage = speed_change_percentage(previous, speed)?;
        if percentage > SPEED_CHANGE_THRESHOLD_PCT {
            Ok(SpeedChange::Sudden { percentage })
        } else {
            Ok(SpeedChange::Steady { percentage })
        }
    }

    pub fn observe_event(&mut self, event: &Event) -> Result<SpeedChange, DetectionError> {
        self.observe(event.vehicle_speed)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn run(speeds: &[i32]) -> Vec<bool> {
        let mut trigger = SpeedChangeTrigger::new();
        speeds
            .iter()
            .map(|s| trigger.observe(*s).unwrap().is_triggered())
            .collect()
    }

    #[test]
    fn test_first_event_is_baseline() {
        let mut trigger = SpeedChangeTrigger::new();
        assert_eq!(trigger.state(), TriggerState::AwaitingFirst);
        assert_eq!(trigger.observe(250).unwrap(), SpeedChange::Baseline);
        assert_eq!(trigger.state(), TriggerState::HaveBaseline);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        // 100 * 120 / 160 = 75 exactly
        assert_eq!(run(&[40, 40, 160]), vec![false, false, false]);
        // 100 * 130 / 170 ≈ 76.5
        assert_eq!(run(&[40, 40, 170]), vec![false, false, true]);
        // 100 * 90 / 150 = 60
        assert_eq!(run(&[60, 60, 150]), vec![false, false, false]);
    }

    #[test]
    fn test_deceleration_is_relative_to_current_speed() {
        // 100 * 60 / 20 = 300
        assert_eq!(run(&[80, 20]), vec![false, true]);
    }

    #[test]
    fn test_zero_current_speed_is_undefined() {
        let mut trigger = SpeedChangeTrigger::new();
        trigger.observe(50).unwrap();
        assert!(matches!(
            trigger.observe(0),
            Err(DetectionError::DivisionUndefined { previous: 50 })
        ));
        // State still advanced: 0 -> 30 is a 100% change
        assert_eq!(trigger.previous_speed(), Some(50));
        assert_eq!(trigger.current_speed(), Some(0));
        assert_eq!(trigger.observe(30).unwrap(), SpeedChange::Sudden { percentage: 100.0 });
    }

    #[test]
    fn test_reset() {
        let mut trigger = SpeedChangeTrigger::new();
        trigger.observe(10).unwrap();
        trigger.reset();
        assert_eq!(trigger.observe(90).unwrap(), SpeedChange::Baseline);
    }

    proptest! {
        #[test]
        fn prop_trigger_matches_threshold(v1 in 0i32..400, v2 in 1i32..400) {
            let mut trigger = SpeedChangeTrigger::new();
            trigger.observe(v1).unwrap();
            let fired = trigger.observe(v2).unwrap().is_triggered();
            let expected = 100 * (v1 - v2).abs() > 75 * v2;
            prop_assert_eq!(fired, expected);
        }

        #[test]
        fn prop_first_event_never_triggers(v in any::<i32>()) {
            let mut trigger = SpeedChangeTrigger::new();
            prop_assert_eq!(trigger.observe(v).unwrap(), SpeedChange::Baseline);
        }
    }
}
