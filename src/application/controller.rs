// Skid controller - owns the control loop components and exposes the operator surface
use crate::application::arbitrator::ControlArbitrator;
use crate::application::device_gateway::DeviceGateway;
use crate::application::dispatcher::CommandDispatcher;
use crate::application::events::{ControlEvent, EventBus};
use crate::application::poller::{PollerSettings, TelemetryPoller, TelemetrySink};
use crate::application::setpoint_store::{EchoOutcome, SetpointStore};
use crate::domain::action_log::ActionLogEntry;
use crate::domain::actuator::{Command, ControlSource, PumpState, SovState};
use crate::domain::error::ControlError;
use crate::domain::history::HistoryBuffer;
use crate::domain::setpoints::{MonitoredPoint, PressureBand, Setpoints};
use crate::domain::telemetry::{DeviceSnapshot, Reading};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{broadcast, watch};

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub poll_interval: Duration,
    pub stale_after_polls: u32,
    pub history_capacity: usize,
    pub action_log_capacity: usize,
    pub max_pressure: f64,
    pub auto_enabled: bool,
    pub event_capacity: usize,
    pub pump_setpoints: Setpoints,
    pub flowline_setpoints: Setpoints,
}

/// Everything a display needs to render the skid.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerStatus {
    pub reading: Option<Reading>,
    pub pump_state: PumpState,
    pub sov_state: SovState,
    pub last_source: Option<ControlSource>,
    pub pump_setpoints: Setpoints,
    pub flowline_setpoints: Setpoints,
    pub pump_band: Option<PressureBand>,
    pub flowline_band: Option<PressureBand>,
    pub auto_enabled: bool,
    pub telemetry_stale: bool,
    pub consecutive_poll_failures: u32,
}

pub struct SkidController {
    poller: TelemetryPoller,
    dispatcher: Arc<CommandDispatcher>,
    arbitrator: ControlArbitrator,
    setpoints: Mutex<SetpointStore>,
    history: Mutex<HistoryBuffer>,
    events: EventBus,
}

impl SkidController {
    pub fn new(gateway: Arc<dyn DeviceGateway>, settings: ControllerSettings) -> Result<Self, ControlError> {
        let store = SetpointStore::new(
            settings.max_pressure,
            settings.pump_setpoints,
            settings.flowline_setpoints,
        )?;
        let events = EventBus::new(settings.event_capacity);
        let dispatcher = Arc::new(CommandDispatcher::new(gateway.clone(), events.clone()));
        let arbitrator = ControlArbitrator::new(
            dispatcher.clone(),
            settings.auto_enabled,
            settings.action_log_capacity,
            events.clone(),
        );
        let poller = TelemetryPoller::new(
            gateway,
            PollerSettings {
                interval: settings.poll_interval,
                stale_after_polls: settings.stale_after_polls,
                max_pressure: settings.max_pressure,
            },
            events.clone(),
        );

        Ok(Self {
            poller,
            dispatcher,
            arbitrator,
            setpoints: Mutex::new(store),
            history: Mutex::new(HistoryBuffer::new(settings.history_capacity)),
            events,
        })
    }

    /// Drive the control loop until `shutdown` is signalled.
    pub async fn run(self: Arc<Self>, shutdown: watch::Receiver<bool>) {
        let sink: Arc<dyn TelemetrySink> = self.clone();
        self.poller.run(sink, shutdown).await;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControlEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> ControllerStatus {
        let reading = lock(&self.history).latest().cloned();
        let (pump_setpoints, flowline_setpoints) = {
            let store = lock(&self.setpoints);
            (store.get(MonitoredPoint::Pump), store.get(MonitoredPoint::Flowline))
        };
        let states = self.dispatcher.states();

        ControllerStatus {
            pump_band: reading
                .as_ref()
                .map(|r| PressureBand::classify(r.pump_pressure, &pump_setpoints)),
            flowline_band: reading
                .as_ref()
                .map(|r| PressureBand::classify(r.flowline_pressure, &flowline_setpoints)),
            reading,
            pump_state: states.pump,
            sov_state: states.sov,
            last_source: states.last_source,
            pump_setpoints,
            flowline_setpoints,
            auto_enabled: self.arbitrator.auto_enabled(),
            telemetry_stale: self.poller.is_stale(),
            consecutive_poll_failures: self.poller.consecutive_failures(),
        }
    }

    pub fn history(&self) -> Vec<Reading> {
        lock(&self.history).snapshot()
    }

    pub fn actions(&self) -> Vec<ActionLogEntry> {
        self.arbitrator.actions()
    }

    pub fn setpoints(&self, point: MonitoredPoint) -> Setpoints {
        lock(&self.setpoints).get(point)
    }

    pub async fn manual_command(&self, command: Command) -> Result<ActionLogEntry, ControlError> {
        self.arbitrator.manual(command).await
    }

    pub fn set_auto_enabled(&self, enabled: bool) {
        self.arbitrator.set_auto_enabled(enabled);
    }

    /// Validate and store new setpoints, then push them to the device for
    /// remote-synced points. A failed push keeps the local value.
    pub async fn update_setpoints(
        &self,
        point: MonitoredPoint,
        setpoints: Setpoints,
    ) -> Result<(), ControlError> {
        {
            let mut store = lock(&self.setpoints);
            store.update(point, setpoints)?;
            // unconfirmed until the push lands, so a poll echo cannot overwrite it
            store.set_remote_dirty(point, true);
        }
        tracing::info!(%point, low = setpoints.low, high = setpoints.high, "setpoints updated");
        self.events.publish(ControlEvent::SetpointsChanged { point, setpoints });

        if point.is_remote_synced() {
            self.push_thresholds(point, setpoints).await?;
        }
        Ok(())
    }

    async fn push_thresholds(&self, point: MonitoredPoint, setpoints: Setpoints) -> Result<(), ControlError> {
        let result = self.dispatcher.push_thresholds(setpoints).await;
        {
            let mut store = lock(&self.setpoints);
            match &result {
                // a newer local edit may have landed while this push was queued
                Ok(()) if store.get(point) == setpoints => store.set_remote_dirty(point, false),
                Ok(()) => {}
                Err(_) => store.set_remote_dirty(point, true),
            }
        }
        if let Err(e) = &result {
            self.events.publish(ControlEvent::ThresholdPushFailed {
                error: e.to_string(),
            });
        }
        result
    }

    /// Compare the device's threshold echo with the local pump setpoints.
    async fn reconcile_thresholds(&self, echo: Setpoints) {
        let point = MonitoredPoint::Pump;
        let outcome = lock(&self.setpoints).reconcile_echo(point, echo);
        match outcome {
            EchoOutcome::InSync => {}
            EchoOutcome::Repush(local) => {
                tracing::info!("device thresholds diverge from local, re-pushing");
                let _ = self.push_thresholds(point, local).await;
            }
            EchoOutcome::Adopted => {
                tracing::info!(low = echo.low, high = echo.high, "adopting thresholds reported by device");
                self.events.publish(ControlEvent::SetpointsChanged { point, setpoints: echo });
            }
            EchoOutcome::Ignored => {
                tracing::warn!(low = echo.low, high = echo.high, "device reported invalid thresholds, ignoring");
            }
        }
    }

    fn reconcile_device_state(&self, snapshot: &DeviceSnapshot) {
        let was_tripped = self.dispatcher.pump_state() == PumpState::Tripped;
        self.dispatcher
            .reconcile_pump(snapshot.pump_running, snapshot.pump_tripped);
        if !was_tripped && self.dispatcher.pump_state() == PumpState::Tripped {
            self.arbitrator.record(ActionLogEntry::new(
                "trip",
                ControlSource::Auto,
                "device-reported fault",
            ));
        }
        if let Some(open) = snapshot.sov_open {
            self.dispatcher.reconcile_sov(open);
        }
    }
}

#[async_trait]
impl TelemetrySink for SkidController {
    async fn on_snapshot(&self, snapshot: DeviceSnapshot) {
        let reading = snapshot.reading.clone();
        lock(&self.history).push(reading.clone());
        self.events.publish(ControlEvent::ReadingUpdated {
            reading: reading.clone(),
        });

        self.reconcile_device_state(&snapshot);
        self.reconcile_thresholds(snapshot.thresholds).await;

        let pump_setpoints = self.setpoints(MonitoredPoint::Pump);
        self.arbitrator.on_reading(&reading, &pump_setpoints).await;
    }

    async fn on_poll_failure(&self, error: ControlError) {
        // Last known reading stays; the next tick retries
        tracing::debug!("keeping last known reading after poll failure: {}", error);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
