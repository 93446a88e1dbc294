use crate::application::controller::ControllerSettings;
use crate::domain::setpoints::Setpoints;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub device: DeviceSettings,
    pub control: ControlSettings,
    pub setpoints: SetpointSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DeviceSettings {
    pub base_url: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ControlSettings {
    pub poll_interval_ms: u64,
    pub stale_after_polls: u32,
    pub history_capacity: usize,
    pub action_log_capacity: usize,
    pub max_pressure: f64,
    pub auto_enabled: bool,
    pub event_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SetpointSettings {
    pub pump: Setpoints,
    pub flowline: Setpoints,
}

impl AppConfig {
    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            poll_interval: Duration::from_millis(self.control.poll_interval_ms),
            stale_after_polls: self.control.stale_after_polls,
            history_capacity: self.control.history_capacity,
            action_log_capacity: self.control.action_log_capacity,
            max_pressure: self.control.max_pressure,
            auto_enabled: self.control.auto_enabled,
            event_capacity: self.control.event_capacity,
            pump_setpoints: self.setpoints.pump,
            flowline_setpoints: self.setpoints.flowline,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let control = &self.control;
        if control.poll_interval_ms == 0 {
            anyhow::bail!("control.poll_interval_ms must be positive");
        }
        if control.stale_after_polls == 0 {
            anyhow::bail!("control.stale_after_polls must be positive");
        }
        if control.history_capacity == 0 || control.action_log_capacity == 0 || control.event_capacity == 0 {
            anyhow::bail!("control capacities must be positive");
        }
        if !(control.max_pressure.is_finite() && control.max_pressure > 0.0) {
            anyhow::bail!("control.max_pressure must be a positive number");
        }
        self.setpoints.pump.validate(control.max_pressure)?;
        self.setpoints.flowline.validate(control.max_pressure)?;
        Ok(())
    }
}

fn builder() -> anyhow::Result<config::ConfigBuilder<config::builder::DefaultState>> {
    Ok(config::Config::builder()
        .set_default("server.bind", "0.0.0.0:8080")?
        .set_default("device.base_url", "http://127.0.0.1:9000")?
        .set_default("device.timeout_ms", 1500)?
        .set_default("control.poll_interval_ms", 2000)?
        .set_default("control.stale_after_polls", 3)?
        .set_default("control.history_capacity", 40)?
        .set_default("control.action_log_capacity", 50)?
        .set_default("control.max_pressure", 120.0)?
        .set_default("control.auto_enabled", true)?
        .set_default("control.event_capacity", 256)?
        .set_default("setpoints.pump.low", 12.0)?
        .set_default("setpoints.pump.high", 100.0)?
        .set_default("setpoints.flowline.low", 12.0)?
        .set_default("setpoints.flowline.high", 100.0)?)
}

/// Defaults, then `config/controller.*` if present, then `SKID__*` env vars.
pub fn load_app_config() -> anyhow::Result<AppConfig> {
    let settings = builder()?
        .add_source(config::File::with_name("config/controller").required(false))
        .add_source(config::Environment::with_prefix("SKID").separator("__"))
        .build()?;

    let app_config: AppConfig = settings.try_deserialize()?;
    app_config.validate()?;
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> AppConfig {
        builder().unwrap().build().unwrap().try_deserialize().unwrap()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = defaults();
        assert!(config.validate().is_ok());
        assert_eq!(config.control.history_capacity, 40);

        let settings = config.controller_settings();
        assert_eq!(settings.poll_interval, Duration::from_secs(2));
        assert_eq!(settings.pump_setpoints, Setpoints::new(12.0, 100.0));
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let toml = r#"
            [device]
            base_url = "http://skid-7.local"

            [setpoints.pump]
            low = 20.0
            high = 90.0
        "#;
        let config: AppConfig = builder()
            .unwrap()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.device.base_url, "http://skid-7.local");
        assert_eq!(config.setpoints.pump, Setpoints::new(20.0, 90.0));
        assert_eq!(config.setpoints.flowline, Setpoints::new(12.0, 100.0));
    }

    #[test]
    fn test_invalid_default_setpoints_rejected() {
        let mut config = defaults();
        config.setpoints.flowline = Setpoints::new(100.0, 10.0);
        assert!(config.validate().is_err());

        let mut config = defaults();
        config.control.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }
}
