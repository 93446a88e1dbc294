// Setpoint domain model
use super::error::ControlError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A pressure transmitter watched by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitoredPoint {
    Pump,
    Flowline,
}

impl MonitoredPoint {
    /// Whether the device holds its own copy of this point's thresholds.
    /// Only the pump start/stop thresholds live on the device.
    pub fn is_remote_synced(&self) -> bool {
        matches!(self, MonitoredPoint::Pump)
    }
}

impl fmt::Display for MonitoredPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitoredPoint::Pump => f.write_str("pump"),
            MonitoredPoint::Flowline => f.write_str("flowline"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Setpoints {
    pub low: f64,
    pub high: f64,
}

impl Setpoints {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Check `0 <= low < high <= max`.
    pub fn validate(&self, max: f64) -> Result<(), ControlError> {
        if !self.low.is_finite() || !self.high.is_finite() {
            return Err(ControlError::InvalidSetpoints(
                "setpoints must be finite numbers".to_string(),
            ));
        }
        if self.low < 0.0 || self.high > max {
            return Err(ControlError::InvalidSetpoints(format!(
                "setpoints {}..{} outside 0..{}",
                self.low, self.high, max
            )));
        }
        if self.low >= self.high {
            return Err(ControlError::InvalidSetpoints(format!(
                "low setpoint {} must be below high setpoint {}",
                self.low, self.high
            )));
        }
        Ok(())
    }
}

/// Where a pressure sits relative to a point's setpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PressureBand {
    Low,
    Normal,
    High,
}

impl PressureBand {
    pub fn classify(pressure: f64, setpoints: &Setpoints) -> Self {
        if pressure < setpoints.low {
            PressureBand::Low
        } else if pressure > setpoints.high {
            PressureBand::High
        } else {
            PressureBand::Normal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_ordered_pair() {
        assert!(Setpoints::new(12.0, 100.0).validate(120.0).is_ok());
        assert!(Setpoints::new(0.0, 120.0).validate(120.0).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_pairs() {
        let max = 120.0;
        for sp in [
            Setpoints::new(50.0, 50.0),
            Setpoints::new(60.0, 40.0),
            Setpoints::new(-1.0, 40.0),
            Setpoints::new(10.0, 121.0),
            Setpoints::new(f64::NAN, 40.0),
        ] {
            assert!(
                matches!(sp.validate(max), Err(ControlError::InvalidSetpoints(_))),
                "{:?} should be rejected",
                sp
            );
        }
    }

    #[test]
    fn test_band_boundaries_are_normal() {
        let sp = Setpoints::new(12.0, 100.0);
        assert_eq!(PressureBand::classify(11.9, &sp), PressureBand::Low);
        assert_eq!(PressureBand::classify(12.0, &sp), PressureBand::Normal);
        assert_eq!(PressureBand::classify(100.0, &sp), PressureBand::Normal);
        assert_eq!(PressureBand::classify(100.1, &sp), PressureBand::High);
    }
}
