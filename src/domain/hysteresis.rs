// Hysteresis controller - pure pump state evaluation
use super::actuator::{Command, PumpState};
use super::setpoints::Setpoints;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    LowPressure,
    HighPressure,
}

impl fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionReason::LowPressure => f.write_str("low pressure"),
            TransitionReason::HighPressure => f.write_str("high pressure"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub next: PumpState,
    /// Set only when `next` differs from the input state.
    pub transition: Option<TransitionReason>,
}

impl Evaluation {
    fn hold(state: PumpState) -> Self {
        Self {
            next: state,
            transition: None,
        }
    }

    /// Command that realises this evaluation, if it is a transition.
    pub fn command(&self) -> Option<Command> {
        self.transition?;
        match self.next {
            PumpState::Running => Some(Command::Start),
            PumpState::Stopped => Some(Command::Stop),
            PumpState::Tripped => None,
        }
    }
}

/// Map `(pressure, setpoints, current)` to the next pump state.
///
/// Pressures inside `[low, high]` always hold the current state. `Tripped`
/// is never produced here; it only comes from a device fault report.
pub fn evaluate(pressure: f64, setpoints: &Setpoints, current: PumpState) -> Evaluation {
    match current {
        PumpState::Stopped | PumpState::Tripped if pressure < setpoints.low => Evaluation {
            next: PumpState::Running,
            transition: Some(TransitionReason::LowPressure),
        },
        PumpState::Running if pressure > setpoints.high => Evaluation {
            next: PumpState::Stopped,
            transition: Some(TransitionReason::HighPressure),
        },
        state => Evaluation::hold(state),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SP: Setpoints = Setpoints {
        low: 12.0,
        high: 100.0,
    };

    #[test]
    fn test_low_pressure_starts_stopped_pump() {
        let eval = evaluate(8.0, &SP, PumpState::Stopped);
        assert_eq!(eval.next, PumpState::Running);
        assert_eq!(eval.transition, Some(TransitionReason::LowPressure));
        assert_eq!(eval.command(), Some(Command::Start));
        assert_eq!(eval.transition.unwrap().to_string(), "low pressure");
    }

    #[test]
    fn test_high_pressure_stops_running_pump() {
        let eval = evaluate(101.0, &SP, PumpState::Running);
        assert_eq!(eval.next, PumpState::Stopped);
        assert_eq!(eval.command(), Some(Command::Stop));
    }

    #[test]
    fn test_boundaries_hold_state() {
        for state in [PumpState::Stopped, PumpState::Running, PumpState::Tripped] {
            assert_eq!(evaluate(SP.low, &SP, state), Evaluation::hold(state));
            assert_eq!(evaluate(SP.high, &SP, state), Evaluation::hold(state));
        }
    }

    #[test]
    fn test_redundant_conditions_hold() {
        assert_eq!(evaluate(5.0, &SP, PumpState::Running).transition, None);
        assert_eq!(evaluate(110.0, &SP, PumpState::Stopped).transition, None);
        assert_eq!(evaluate(110.0, &SP, PumpState::Tripped).next, PumpState::Tripped);
    }

    #[test]
    fn test_oscillation_around_low_toggles_once() {
        let mut state = PumpState::Stopped;
        let mut toggles = 0;
        for pressure in [14.0, 11.0, 13.0, 11.0, 13.0, 11.0, 12.0, 13.0] {
            let eval = evaluate(pressure, &SP, state);
            if eval.transition.is_some() {
                toggles += 1;
            }
            state = eval.next;
        }
        assert_eq!(toggles, 1);
        assert_eq!(state, PumpState::Running);
    }

    proptest! {
        #[test]
        fn dead_band_never_changes_state(
            low in 0.0_f64..50.0,
            width in 1.0_f64..50.0,
            frac in 0.0_f64..=1.0,
            running in any::<bool>(),
        ) {
            let sp = Setpoints::new(low, low + width);
            let pressure = (sp.low + (sp.high - sp.low) * frac).clamp(sp.low, sp.high);
            let state = if running { PumpState::Running } else { PumpState::Stopped };
            let eval = evaluate(pressure, &sp, state);
            prop_assert_eq!(eval.next, state);
            prop_assert!(eval.transition.is_none());
        }
    }
}
