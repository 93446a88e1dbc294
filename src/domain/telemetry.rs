// Telemetry data domain models
use super::error::ControlError;
use super::setpoints::Setpoints;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One normalised pressure sample. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub pump_pressure: f64,
    pub flowline_pressure: f64,
}

impl Reading {
    pub fn new(timestamp: DateTime<Utc>, pump_pressure: f64, flowline_pressure: f64) -> Self {
        Self {
            timestamp,
            pump_pressure,
            flowline_pressure,
        }
    }
}

/// Raw device state as returned by the gateway, before normalisation.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    pub pressure: f64,
    pub flowline_pressure: Option<f64>,
    pub pump_running: bool,
    pub pump_tripped: bool,
    pub sov_open: Option<bool>,
    pub thresholds: Setpoints,
}

/// A poll result: the reading plus what the device says about itself.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSnapshot {
    pub reading: Reading,
    pub pump_running: bool,
    pub pump_tripped: bool,
    pub sov_open: Option<bool>,
    pub thresholds: Setpoints,
}

impl DeviceSnapshot {
    /// Clamp pressures into `[0, max_pressure]`. Non-finite values are
    /// treated as a malformed payload.
    pub fn normalize(
        state: DeviceState,
        max_pressure: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, ControlError> {
        let pump = clamp_pressure(state.pressure, max_pressure)?;
        // Devices with a single transmitter report only the pump pressure
        let flowline = clamp_pressure(state.flowline_pressure.unwrap_or(state.pressure), max_pressure)?;

        Ok(Self {
            reading: Reading::new(timestamp, pump, flowline),
            pump_running: state.pump_running,
            pump_tripped: state.pump_tripped,
            sov_open: state.sov_open,
            thresholds: state.thresholds,
        })
    }
}

fn clamp_pressure(value: f64, max_pressure: f64) -> Result<f64, ControlError> {
    if !value.is_finite() {
        return Err(ControlError::Transport(format!(
            "malformed telemetry: pressure {} is not a number",
            value
        )));
    }
    Ok(value.clamp(0.0, max_pressure))
}
