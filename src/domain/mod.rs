// Domain layer - Core control models and pure logic
pub mod action_log;
pub mod actuator;
pub mod error;
pub mod history;
pub mod hysteresis;
pub mod setpoints;
pub mod telemetry;
