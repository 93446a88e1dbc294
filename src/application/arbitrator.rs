// Control arbitrator - automatic vs manual control and action history
use crate::application::dispatcher::CommandDispatcher;
use crate::application::events::{ControlEvent, EventBus};
use crate::domain::action_log::{ActionLog, ActionLogEntry};
use crate::domain::actuator::{Actuator, Command, ControlSource, PumpState};
use crate::domain::error::ControlError;
use crate::domain::hysteresis;
use crate::domain::setpoints::Setpoints;
use crate::domain::telemetry::Reading;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

const MANUAL_REASON: &str = "operator command";

pub struct ControlArbitrator {
    dispatcher: Arc<CommandDispatcher>,
    auto_enabled: AtomicBool,
    log: Mutex<ActionLog>,
    events: EventBus,
}

impl ControlArbitrator {
    pub fn new(
        dispatcher: Arc<CommandDispatcher>,
        auto_enabled: bool,
        log_capacity: usize,
        events: EventBus,
    ) -> Self {
        Self {
            dispatcher,
            auto_enabled: AtomicBool::new(auto_enabled),
            log: Mutex::new(ActionLog::new(log_capacity)),
            events,
        }
    }

    pub fn auto_enabled(&self) -> bool {
        self.auto_enabled.load(Ordering::Acquire)
    }

    /// Only future automatic transitions are affected; the pump keeps its state.
    pub fn set_auto_enabled(&self, enabled: bool) {
        if self.auto_enabled.swap(enabled, Ordering::AcqRel) == enabled {
            return;
        }
        tracing::info!(enabled, "automatic control toggled");
        self.events.publish(ControlEvent::AutoModeChanged { enabled });
        let action = if enabled { "auto on" } else { "auto off" };
        self.record(ActionLogEntry::new(action, ControlSource::Manual, MANUAL_REASON));
    }

    pub fn actions(&self) -> Vec<ActionLogEntry> {
        self.lock_log().entries()
    }

    /// Run a new reading through the hysteresis controller and dispatch the
    /// resulting transition, if any. Returns the logged entry on success.
    pub async fn on_reading(&self, reading: &Reading, setpoints: &Setpoints) -> Option<ActionLogEntry> {
        if !self.auto_enabled() {
            return None;
        }

        let current = self.dispatcher.pump_state();
        if current == PumpState::Tripped {
            tracing::debug!("pump trip latched, automatic control holds until reset");
            return None;
        }

        let evaluation = hysteresis::evaluate(reading.pump_pressure, setpoints, current);
        let (reason, command) = match (evaluation.transition, evaluation.command()) {
            (Some(reason), Some(command)) => (reason, command),
            _ => return None,
        };

        // Dropped, not queued: the next reading re-evaluates
        if self.dispatcher.is_in_flight(Actuator::Pump) {
            tracing::debug!(%command, "pump command in flight, dropping automatic transition");
            return None;
        }

        tracing::info!(
            %command,
            pressure = reading.pump_pressure,
            "automatic transition: {}",
            reason
        );
        match self.dispatcher.send(command, ControlSource::Auto).await {
            Ok(_) => {
                let entry = ActionLogEntry::new(command.as_str(), ControlSource::Auto, reason.to_string());
                self.record(entry.clone());
                Some(entry)
            }
            Err(ControlError::ActuatorBusy(_)) => {
                tracing::debug!(%command, "pump became busy, dropping automatic transition");
                None
            }
            Err(e) => {
                tracing::warn!(%command, "automatic command failed: {}", e);
                None
            }
        }
    }

    /// Operator command. Accepted regardless of the auto flag, which it
    /// leaves untouched.
    pub async fn manual(&self, command: Command) -> Result<ActionLogEntry, ControlError> {
        tracing::info!(%command, "manual command received");
        self.dispatcher.send(command, ControlSource::Manual).await?;
        let entry = ActionLogEntry::new(command.as_str(), ControlSource::Manual, MANUAL_REASON);
        self.record(entry.clone());
        Ok(entry)
    }

    /// Append an observational entry (e.g. device-reported faults).
    pub fn record(&self, entry: ActionLogEntry) {
        self.lock_log().record(entry.clone());
        self.events.publish(ControlEvent::ActionLogged { entry });
    }

    fn lock_log(&self) -> std::sync::MutexGuard<'_, ActionLog> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
