// In-memory device gateway for tests
use crate::application::device_gateway::DeviceGateway;
use crate::domain::setpoints::Setpoints;
use crate::domain::telemetry::DeviceState;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    Pump(bool),
    Sov(bool),
    Reset,
    Thresholds(Setpoints),
}

/// Blocks calls until released, and signals when a call has arrived.
struct Gate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

pub struct FakeDevice {
    state: Mutex<DeviceState>,
    calls: Mutex<Vec<DeviceCall>>,
    fail_commands: AtomicBool,
    fail_polls: AtomicBool,
    command_gate: Mutex<Option<Gate>>,
    poll_gate: Mutex<Option<Gate>>,
}

impl FakeDevice {
    pub fn new(pressure: f64) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(DeviceState {
                pressure,
                flowline_pressure: None,
                pump_running: false,
                pump_tripped: false,
                sov_open: None,
                thresholds: Setpoints::new(12.0, 100.0),
            }),
            calls: Mutex::new(Vec::new()),
            fail_commands: AtomicBool::new(false),
            fail_polls: AtomicBool::new(false),
            command_gate: Mutex::new(None),
            poll_gate: Mutex::new(None),
        })
    }

    pub fn set_pressure(&self, pressure: f64) {
        self.state.lock().unwrap().pressure = pressure;
    }

    pub fn update_state(&self, f: impl FnOnce(&mut DeviceState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn fail_commands(&self, fail: bool) {
        self.fail_commands.store(fail, Ordering::SeqCst);
    }

    pub fn fail_polls(&self, fail: bool) {
        self.fail_polls.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Hold every command until `release` is notified. Returns `(entered, release)`.
    pub fn hold_commands(&self) -> (Arc<Notify>, Arc<Notify>) {
        Self::install_gate(&self.command_gate)
    }

    pub fn hold_polls(&self) -> (Arc<Notify>, Arc<Notify>) {
        Self::install_gate(&self.poll_gate)
    }

    fn install_gate(slot: &Mutex<Option<Gate>>) -> (Arc<Notify>, Arc<Notify>) {
        let gate = Gate {
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        };
        let handles = (gate.entered.clone(), gate.release.clone());
        *slot.lock().unwrap() = Some(gate);
        handles
    }

    async fn pass_gate(slot: &Mutex<Option<Gate>>) {
        let release = {
            let guard = slot.lock().unwrap();
            guard.as_ref().map(|gate| {
                gate.entered.notify_one();
                gate.release.clone()
            })
        };
        if let Some(release) = release {
            release.notified().await;
        }
    }

    async fn command(&self, call: DeviceCall) -> anyhow::Result<()> {
        Self::pass_gate(&self.command_gate).await;
        self.calls.lock().unwrap().push(call.clone());
        if self.fail_commands.load(Ordering::SeqCst) {
            anyhow::bail!("device unreachable");
        }
        let mut state = self.state.lock().unwrap();
        match call {
            DeviceCall::Pump(running) => state.pump_running = running,
            DeviceCall::Sov(open) => state.sov_open = Some(open),
            DeviceCall::Reset => {
                state.pump_tripped = false;
                state.pump_running = false;
            }
            DeviceCall::Thresholds(thresholds) => state.thresholds = thresholds,
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceGateway for FakeDevice {
    async fn fetch_state(&self) -> anyhow::Result<DeviceState> {
        Self::pass_gate(&self.poll_gate).await;
        if self.fail_polls.load(Ordering::SeqCst) {
            anyhow::bail!("connection refused");
        }
        Ok(self.state.lock().unwrap().clone())
    }

    async fn set_pump(&self, running: bool) -> anyhow::Result<()> {
        self.command(DeviceCall::Pump(running)).await
    }

    async fn set_sov(&self, open: bool) -> anyhow::Result<()> {
        self.command(DeviceCall::Sov(open)).await
    }

    async fn reset_pump(&self) -> anyhow::Result<()> {
        self.command(DeviceCall::Reset).await
    }

    async fn set_thresholds(&self, thresholds: Setpoints) -> anyhow::Result<()> {
        self.command(DeviceCall::Thresholds(thresholds)).await
    }
}
