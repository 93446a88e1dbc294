// Control error taxonomy
use super::actuator::{Actuator, Command};
use thiserror::Error;

/// Errors surfaced by the control core. None of them is fatal to the loop.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    /// Poll or command network failure, including non-success responses
    /// and malformed payloads.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid setpoints: {0}")]
    InvalidSetpoints(String),

    /// A command for this actuator is still in flight.
    #[error("{0} is busy: a command is already in flight")]
    ActuatorBusy(Actuator),

    #[error("a telemetry poll is already in flight")]
    PollInFlight,

    /// The pump trip is latched; only `reset` is accepted until it clears.
    #[error("pump is tripped: reset before {0}")]
    PumpTripped(Command),
}

impl ControlError {
    pub fn transport(err: &anyhow::Error) -> Self {
        ControlError::Transport(format!("{:#}", err))
    }
}
