// Control events - change notifications for display refresh
use crate::domain::action_log::ActionLogEntry;
use crate::domain::actuator::{Actuator, Command, ControlSource, PumpState, SovState};
use crate::domain::setpoints::{MonitoredPoint, Setpoints};
use crate::domain::telemetry::Reading;
use serde::Serialize;
use tokio::sync::broadcast;

/// Emitted on every state mutation of the controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlEvent {
    ReadingUpdated {
        reading: Reading,
    },
    PumpStateChanged {
        from: PumpState,
        to: PumpState,
        /// `None` when the change was reported by the device.
        source: Option<ControlSource>,
    },
    SovStateChanged {
        from: SovState,
        to: SovState,
        source: Option<ControlSource>,
    },
    SetpointsChanged {
        point: MonitoredPoint,
        setpoints: Setpoints,
    },
    AutoModeChanged {
        enabled: bool,
    },
    ActionLogged {
        entry: ActionLogEntry,
    },
    CommandFailed {
        actuator: Actuator,
        command: Command,
        error: String,
    },
    ThresholdPushFailed {
        error: String,
    },
    PollFailed {
        error: String,
    },
    TelemetryStale {
        stale: bool,
    },
}

impl ControlEvent {
    /// SSE event name
    pub fn kind(&self) -> &'static str {
        match self {
            ControlEvent::ReadingUpdated { .. } => "reading_updated",
            ControlEvent::PumpStateChanged { .. } => "pump_state_changed",
            ControlEvent::SovStateChanged { .. } => "sov_state_changed",
            ControlEvent::SetpointsChanged { .. } => "setpoints_changed",
            ControlEvent::AutoModeChanged { .. } => "auto_mode_changed",
            ControlEvent::ActionLogged { .. } => "action_logged",
            ControlEvent::CommandFailed { .. } => "command_failed",
            ControlEvent::ThresholdPushFailed { .. } => "threshold_push_failed",
            ControlEvent::PollFailed { .. } => "poll_failed",
            ControlEvent::TelemetryStale { .. } => "telemetry_stale",
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ControlEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: ControlEvent) {
        tracing::trace!(kind = event.kind(), "publishing control event");
        // No subscribers is not an error
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControlEvent> {
        self.tx.subscribe()
    }
}
