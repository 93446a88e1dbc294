// Telemetry poller - periodic single-flight acquisition of device state
use crate::application::device_gateway::DeviceGateway;
use crate::application::dispatcher::FlightGuard;
use crate::application::events::{ControlEvent, EventBus};
use crate::domain::error::ControlError;
use crate::domain::telemetry::DeviceSnapshot;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Receives the outcome of every poll, in order.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn on_snapshot(&self, snapshot: DeviceSnapshot);

    async fn on_poll_failure(&self, error: ControlError);
}

#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub interval: Duration,
    /// Consecutive failed polls before telemetry is flagged stale
    pub stale_after_polls: u32,
    pub max_pressure: f64,
}

pub struct TelemetryPoller {
    gateway: Arc<dyn DeviceGateway>,
    settings: PollerSettings,
    in_flight: AtomicBool,
    consecutive_failures: AtomicU32,
    stale: AtomicBool,
    events: EventBus,
}

impl TelemetryPoller {
    pub fn new(gateway: Arc<dyn DeviceGateway>, settings: PollerSettings, events: EventBus) -> Self {
        Self {
            gateway,
            settings,
            in_flight: AtomicBool::new(false),
            consecutive_failures: AtomicU32::new(0),
            stale: AtomicBool::new(false),
            events,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Acquire)
    }

    /// Fetch and normalise one snapshot. Fails with `PollInFlight` if another
    /// poll has not finished yet.
    pub async fn poll_once(&self) -> Result<DeviceSnapshot, ControlError> {
        let result = {
            let _guard = FlightGuard::acquire(&self.in_flight).ok_or(ControlError::PollInFlight)?;
            match self.gateway.fetch_state().await {
                Ok(state) => DeviceSnapshot::normalize(state, self.settings.max_pressure, Utc::now()),
                Err(e) => Err(ControlError::transport(&e)),
            }
        };

        match &result {
            Ok(_) => self.record_success(),
            Err(e) => self.record_failure(e),
        }
        result
    }

    /// Poll on a fixed interval until `shutdown` flips to true.
    ///
    /// The wait for the next tick is cancelled by shutdown; a poll already in
    /// flight runs to completion and its result is discarded.
    pub async fn run(&self, sink: Arc<dyn TelemetrySink>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!("telemetry poller started, interval {:?}", self.settings.interval);

        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            let result = self.poll_once().await;
            if *shutdown.borrow() {
                tracing::debug!("controller stopped, discarding poll result");
                break;
            }

            match result {
                Ok(snapshot) => sink.on_snapshot(snapshot).await,
                Err(e) => sink.on_poll_failure(e).await,
            }
        }

        tracing::info!("telemetry poller stopped");
    }

    fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Release);
        if self.stale.swap(false, Ordering::AcqRel) {
            tracing::info!("telemetry recovered");
            self.events.publish(ControlEvent::TelemetryStale { stale: false });
        }
    }

    fn record_failure(&self, error: &ControlError) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::warn!(failures, "telemetry poll failed: {}", error);
        self.events.publish(ControlEvent::PollFailed {
            error: error.to_string(),
        });

        if failures >= self.settings.stale_after_polls && !self.stale.swap(true, Ordering::AcqRel) {
            tracing::warn!("no telemetry for {} polls, flagging stale", failures);
            self.events.publish(ControlEvent::TelemetryStale { stale: true });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::fake_device::FakeDevice;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        snapshots: Mutex<Vec<DeviceSnapshot>>,
        failures: Mutex<Vec<ControlError>>,
    }

    #[async_trait]
    impl TelemetrySink for RecordingSink {
        async fn on_snapshot(&self, snapshot: DeviceSnapshot) {
            self.snapshots.lock().unwrap().push(snapshot);
        }

        async fn on_poll_failure(&self, error: ControlError) {
            self.failures.lock().unwrap().push(error);
        }
    }

    fn poller(device: &Arc<FakeDevice>, interval_ms: u64) -> (Arc<TelemetryPoller>, EventBus) {
        let events = EventBus::new(64);
        let settings = PollerSettings {
            interval: Duration::from_millis(interval_ms),
            stale_after_polls: 3,
            max_pressure: 120.0,
        };
        (
            Arc::new(TelemetryPoller::new(device.clone(), settings, events.clone())),
            events,
        )
    }

    #[tokio::test]
    async fn test_poll_once_normalises_reading() {
        let device = FakeDevice::new(130.0);
        let (poller, _events) = poller(&device, 2000);

        let snapshot = poller.poll_once().await.unwrap();

        assert_eq!(snapshot.reading.pump_pressure, 120.0);
        assert!(!snapshot.pump_running);
    }

    #[tokio::test]
    async fn test_concurrent_poll_rejected() {
        let device = FakeDevice::new(40.0);
        let (entered, release) = device.hold_polls();
        let (poller, _events) = poller(&device, 2000);

        let first = {
            let poller = poller.clone();
            tokio::spawn(async move { poller.poll_once().await })
        };
        entered.notified().await;

        assert_eq!(poller.poll_once().await.unwrap_err(), ControlError::PollInFlight);

        release.notify_one();
        assert!(first.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_abandoned_poll_frees_the_slot() {
        let device = FakeDevice::new(50.0);
        let (_entered, release) = device.hold_polls();
        let (poller, _events) = poller(&device, 1000);

        let abandoned = tokio::time::timeout(Duration::from_millis(20), poller.poll_once()).await;
        assert!(abandoned.is_err());

        release.notify_one();
        assert!(poller.poll_once().await.is_ok());
    }

    #[tokio::test]
    async fn test_stale_after_consecutive_failures_and_recovery() {
        let device = FakeDevice::new(40.0);
        device.fail_polls(true);
        let (poller, events) = poller(&device, 2000);
        let mut rx = events.subscribe();

        for _ in 0..2 {
            assert!(poller.poll_once().await.is_err());
        }
        assert!(!poller.is_stale());
        assert!(poller.poll_once().await.is_err());
        assert!(poller.is_stale());
        assert_eq!(poller.consecutive_failures(), 3);

        device.fail_polls(false);
        poller.poll_once().await.unwrap();
        assert!(!poller.is_stale());
        assert_eq!(poller.consecutive_failures(), 0);

        let mut stale_events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ControlEvent::TelemetryStale { stale } = event {
                stale_events.push(stale);
            }
        }
        assert_eq!(stale_events, vec![true, false]);
    }

    #[tokio::test]
    async fn test_run_forwards_results_and_survives_failures() {
        let device = FakeDevice::new(40.0);
        let (poller, _events) = poller(&device, 10);
        let sink = Arc::new(RecordingSink::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = {
            let poller = poller.clone();
            let sink: Arc<dyn TelemetrySink> = sink.clone();
            tokio::spawn(async move { poller.run(sink, shutdown_rx).await })
        };

        tokio::time::sleep(Duration::from_millis(35)).await;
        device.fail_polls(true);
        tokio::time::sleep(Duration::from_millis(35)).await;
        device.fail_polls(false);
        tokio::time::sleep(Duration::from_millis(35)).await;

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();

        assert!(sink.snapshots.lock().unwrap().len() >= 2);
        assert!(!sink.failures.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_result_discarded_after_shutdown() {
        let device = FakeDevice::new(40.0);
        let (entered, release) = device.hold_polls();
        let (poller, _events) = poller(&device, 10);
        let sink = Arc::new(RecordingSink::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = {
            let poller = poller.clone();
            let sink: Arc<dyn TelemetrySink> = sink.clone();
            tokio::spawn(async move { poller.run(sink, shutdown_rx).await })
        };

        entered.notified().await;
        shutdown_tx.send(true).unwrap();
        release.notify_one();
        task.await.unwrap();

        assert!(sink.snapshots.lock().unwrap().is_empty());
    }
}
