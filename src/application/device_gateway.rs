// Gateway trait for the remote skid device
use crate::domain::setpoints::Setpoints;
use crate::domain::telemetry::DeviceState;
use async_trait::async_trait;

#[async_trait]
pub trait DeviceGateway: Send + Sync {
    /// Fetch the current pressure and device-reported state
    async fn fetch_state(&self) -> anyhow::Result<DeviceState>;

    /// Run (`true`) or stop (`false`) the pump
    async fn set_pump(&self, running: bool) -> anyhow::Result<()>;

    /// Open (`true`) or close (`false`) the shutoff valve
    async fn set_sov(&self, open: bool) -> anyhow::Result<()>;

    /// Clear a latched pump trip
    async fn reset_pump(&self) -> anyhow::Result<()>;

    /// Write start (low) / stop (high) thresholds
    async fn set_thresholds(&self, thresholds: Setpoints) -> anyhow::Result<()>;
}
