// Actuator command dispatcher - optimistic updates with rollback
use crate::application::device_gateway::DeviceGateway;
use crate::application::events::{ControlEvent, EventBus};
use crate::domain::actuator::{Actuator, ActuatorTarget, Command, ControlSource, PumpState, SovState};
use crate::domain::error::ControlError;
use crate::domain::setpoints::Setpoints;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Local state moved to the commanded value and the device confirmed it.
    Applied,
    /// State already matched; the command was re-sent to resynchronise the device.
    Resynced,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActuatorStates {
    pub pump: PumpState,
    pub sov: SovState,
    pub last_source: Option<ControlSource>,
}

/// Clears its in-flight flag when dropped.
pub struct FlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> FlightGuard<'a> {
    pub fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct CommandDispatcher {
    gateway: Arc<dyn DeviceGateway>,
    states: Mutex<ActuatorStates>,
    pump_in_flight: AtomicBool,
    sov_in_flight: AtomicBool,
    threshold_lock: tokio::sync::Mutex<()>,
    events: EventBus,
}

impl CommandDispatcher {
    pub fn new(gateway: Arc<dyn DeviceGateway>, events: EventBus) -> Self {
        Self {
            gateway,
            states: Mutex::new(ActuatorStates {
                pump: PumpState::Stopped,
                sov: SovState::Closed,
                last_source: None,
            }),
            pump_in_flight: AtomicBool::new(false),
            sov_in_flight: AtomicBool::new(false),
            threshold_lock: tokio::sync::Mutex::new(()),
            events,
        }
    }

    pub fn states(&self) -> ActuatorStates {
        *self.lock_states()
    }

    pub fn pump_state(&self) -> PumpState {
        self.lock_states().pump
    }

    pub fn is_in_flight(&self, actuator: Actuator) -> bool {
        self.flight_flag(actuator).load(Ordering::Acquire)
    }

    /// Send a command to the device.
    ///
    /// The local state is set to the commanded value before the device call
    /// resolves and restored if the call fails. A second command for the same
    /// actuator while one is outstanding is rejected with `ActuatorBusy`, and
    /// a tripped pump accepts nothing but `Reset`.
    pub async fn send(
        &self,
        command: Command,
        source: ControlSource,
    ) -> Result<DispatchOutcome, ControlError> {
        let actuator = command.actuator();
        let _guard = FlightGuard::acquire(self.flight_flag(actuator))
            .ok_or(ControlError::ActuatorBusy(actuator))?;

        if actuator == Actuator::Pump && command != Command::Reset && self.pump_state() == PumpState::Tripped {
            tracing::warn!(%command, ?source, "pump trip latched, rejecting command");
            return Err(ControlError::PumpTripped(command));
        }

        let target = command.target();
        let prior = self.current(actuator);
        let changed = prior != target;
        if changed {
            self.apply(target, Some(source));
        } else {
            tracing::debug!("{} already {:?}, resending {} to resync", actuator, target, command);
        }

        tracing::info!(%command, ?source, "dispatching command");
        let result = match command {
            Command::Start => self.gateway.set_pump(true).await,
            Command::Stop => self.gateway.set_pump(false).await,
            Command::Reset => self.gateway.reset_pump().await,
            Command::Open => self.gateway.set_sov(true).await,
            Command::Close => self.gateway.set_sov(false).await,
        };

        match result {
            Ok(()) => Ok(if changed {
                DispatchOutcome::Applied
            } else {
                DispatchOutcome::Resynced
            }),
            Err(e) => {
                let error = ControlError::transport(&e);
                tracing::warn!(%command, "command failed: {:#}", e);
                if changed {
                    self.rollback(target, prior);
                }
                self.events.publish(ControlEvent::CommandFailed {
                    actuator,
                    command,
                    error: error.to_string(),
                });
                Err(error)
            }
        }
    }

    /// Push start/stop thresholds to the device. Concurrent pushes queue
    /// behind each other rather than being rejected.
    pub async fn push_thresholds(&self, thresholds: Setpoints) -> Result<(), ControlError> {
        let _lock = self.threshold_lock.lock().await;
        tracing::info!(low = thresholds.low, high = thresholds.high, "pushing thresholds to device");
        self.gateway.set_thresholds(thresholds).await.map_err(|e| {
            tracing::warn!("threshold push failed: {:#}", e);
            ControlError::transport(&e)
        })
    }

    /// Fold device-reported pump state into the local view.
    ///
    /// A reported trip always latches `Tripped`. Otherwise the device value is
    /// adopted unless a pump command is in flight or the pump is latched.
    pub fn reconcile_pump(&self, running: bool, tripped: bool) {
        let reported = if tripped {
            PumpState::Tripped
        } else if running {
            PumpState::Running
        } else {
            PumpState::Stopped
        };

        let current = self.pump_state();
        if current == reported {
            return;
        }
        if !tripped && (current == PumpState::Tripped || self.is_in_flight(Actuator::Pump)) {
            return;
        }
        if tripped {
            tracing::warn!("device reported pump trip");
        } else {
            tracing::info!("adopting device pump state {:?} (local {:?})", reported, current);
        }
        self.apply(ActuatorTarget::Pump(reported), None);
    }

    pub fn reconcile_sov(&self, open: bool) {
        let reported = if open { SovState::Open } else { SovState::Closed };
        if self.is_in_flight(Actuator::Sov) || self.lock_states().sov == reported {
            return;
        }
        tracing::info!("adopting device SOV state {:?}", reported);
        self.apply(ActuatorTarget::Sov(reported), None);
    }

    fn current(&self, actuator: Actuator) -> ActuatorTarget {
        let states = self.lock_states();
        match actuator {
            Actuator::Pump => ActuatorTarget::Pump(states.pump),
            Actuator::Sov => ActuatorTarget::Sov(states.sov),
        }
    }

    /// Restore `prior` unless something else moved the state meanwhile.
    fn rollback(&self, optimistic: ActuatorTarget, prior: ActuatorTarget) {
        if self.current(optimistic_actuator(optimistic)) == optimistic {
            tracing::info!("rolling back {:?} to {:?}", optimistic, prior);
            self.apply(prior, None);
        }
    }

    fn apply(&self, target: ActuatorTarget, source: Option<ControlSource>) {
        let event = {
            let mut states = self.lock_states();
            if source.is_some() {
                states.last_source = source;
            }
            match target {
                ActuatorTarget::Pump(to) => {
                    let from = std::mem::replace(&mut states.pump, to);
                    ControlEvent::PumpStateChanged { from, to, source }
                }
                ActuatorTarget::Sov(to) => {
                    let from = std::mem::replace(&mut states.sov, to);
                    ControlEvent::SovStateChanged { from, to, source }
                }
            }
        };
        self.events.publish(event);
    }

    fn flight_flag(&self, actuator: Actuator) -> &AtomicBool {
        match actuator {
            Actuator::Pump => &self.pump_in_flight,
            Actuator::Sov => &self.sov_in_flight,
        }
    }

    fn lock_states(&self) -> std::sync::MutexGuard<'_, ActuatorStates> {
        // State is plain data; a panic elsewhere cannot leave it half-written
        self.states.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn optimistic_actuator(target: ActuatorTarget) -> Actuator {
    match target {
        ActuatorTarget::Pump(_) => Actuator::Pump,
        ActuatorTarget::Sov(_) => Actuator::Sov,
    }
}
