// Actuator domain model - pump, shutoff valve and the commands that drive them
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PumpState {
    Stopped,
    Running,
    Tripped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SovState {
    Closed,
    Open,
}

/// Origin of a state change, used for display and action history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlSource {
    Manual,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Actuator {
    Pump,
    Sov,
}

impl fmt::Display for Actuator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actuator::Pump => f.write_str("pump"),
            Actuator::Sov => f.write_str("sov"),
        }
    }
}

/// Target value of an actuator after a command takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "actuator", content = "state", rename_all = "lowercase")]
pub enum ActuatorTarget {
    Pump(PumpState),
    Sov(SovState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Start,
    Stop,
    /// Clears a latched trip; the pump comes back as stopped.
    Reset,
    Open,
    Close,
}

impl Command {
    pub fn actuator(&self) -> Actuator {
        match self {
            Command::Start | Command::Stop | Command::Reset => Actuator::Pump,
            Command::Open | Command::Close => Actuator::Sov,
        }
    }

    pub fn target(&self) -> ActuatorTarget {
        match self {
            Command::Start => ActuatorTarget::Pump(PumpState::Running),
            Command::Stop | Command::Reset => ActuatorTarget::Pump(PumpState::Stopped),
            Command::Open => ActuatorTarget::Sov(SovState::Open),
            Command::Close => ActuatorTarget::Sov(SovState::Closed),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Stop => "stop",
            Command::Reset => "reset",
            Command::Open => "open",
            Command::Close => "close",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
