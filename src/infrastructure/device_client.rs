// HTTP device client - JSON request/response adapter for the skid controller board
use crate::application::device_gateway::DeviceGateway;
use crate::domain::setpoints::Setpoints;
use crate::domain::telemetry::DeviceState;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpDeviceClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateResponse {
    pressure: f64,
    pump_status: bool,
    start_threshold: f64,
    stop_threshold: f64,
    #[serde(default)]
    flowline_pressure: Option<f64>,
    #[serde(default)]
    pump_tripped: bool,
    #[serde(default)]
    sov_open: Option<bool>,
}

#[derive(Debug, Serialize)]
struct PumpRequest {
    status: bool,
}

#[derive(Debug, Serialize)]
struct SovRequest {
    open: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThresholdsRequest {
    start_threshold: f64,
    stop_threshold: f64,
}

impl From<StateResponse> for DeviceState {
    fn from(response: StateResponse) -> Self {
        DeviceState {
            pressure: response.pressure,
            flowline_pressure: response.flowline_pressure,
            pump_running: response.pump_status,
            pump_tripped: response.pump_tripped,
            sov_open: response.sov_open,
            thresholds: Setpoints::new(response.start_threshold, response.stop_threshold),
        }
    }
}

impl HttpDeviceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build device HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: Option<&T>) -> Result<()> {
        let url = self.url(path);
        tracing::debug!("POST {}", url);

        let mut request = self.client.post(&url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Device rejected POST {} with status {}: {}", path, status, body);
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceGateway for HttpDeviceClient {
    async fn fetch_state(&self) -> Result<DeviceState> {
        let url = self.url("state");
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to send state request to device")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Device state request failed with status {}: {}", status, body);
        }

        let state = response
            .json::<StateResponse>()
            .await
            .context("Failed to parse device state")?;
        Ok(state.into())
    }

    async fn set_pump(&self, running: bool) -> Result<()> {
        self.post("pump", Some(&PumpRequest { status: running })).await
    }

    async fn set_sov(&self, open: bool) -> Result<()> {
        self.post("sov", Some(&SovRequest { open })).await
    }

    async fn reset_pump(&self) -> Result<()> {
        self.post::<()>("reset", None).await
    }

    async fn set_thresholds(&self, thresholds: Setpoints) -> Result<()> {
        let body = ThresholdsRequest {
            start_threshold: thresholds.low,
            stop_threshold: thresholds.high,
        };
        self.post("thresholds", Some(&body)).await
    }
}
