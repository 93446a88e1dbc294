// Setpoint store - validated thresholds per monitored point
use crate::domain::error::ControlError;
use crate::domain::setpoints::{MonitoredPoint, Setpoints};

/// What to do with a threshold echo reported by the device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EchoOutcome {
    /// Device already holds the local values.
    InSync,
    /// Local values are still unconfirmed and differ; push them again.
    Repush(Setpoints),
    /// Device values replaced the local ones.
    Adopted,
    /// Echo failed validation and was dropped.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct SetpointStore {
    max: f64,
    pump: Setpoints,
    flowline: Setpoints,
    /// Local pump thresholds accepted but not yet confirmed on the device
    pump_remote_dirty: bool,
}

impl SetpointStore {
    /// Both defaults must already satisfy `0 <= low < high <= max`.
    pub fn new(max: f64, pump: Setpoints, flowline: Setpoints) -> Result<Self, ControlError> {
        pump.validate(max)?;
        flowline.validate(max)?;
        Ok(Self {
            max,
            pump,
            flowline,
            pump_remote_dirty: false,
        })
    }

    pub fn get(&self, point: MonitoredPoint) -> Setpoints {
        match point {
            MonitoredPoint::Pump => self.pump,
            MonitoredPoint::Flowline => self.flowline,
        }
    }

    /// Validate and store. On error the stored value is unchanged.
    pub fn update(&mut self, point: MonitoredPoint, setpoints: Setpoints) -> Result<(), ControlError> {
        setpoints.validate(self.max)?;
        match point {
            MonitoredPoint::Pump => self.pump = setpoints,
            MonitoredPoint::Flowline => self.flowline = setpoints,
        }
        Ok(())
    }

    pub fn is_remote_dirty(&self, point: MonitoredPoint) -> bool {
        point.is_remote_synced() && self.pump_remote_dirty
    }

    pub fn set_remote_dirty(&mut self, point: MonitoredPoint, dirty: bool) {
        if point.is_remote_synced() {
            self.pump_remote_dirty = dirty;
        }
    }

    /// Fold a device threshold echo into the store. The comparison and the
    /// write happen in one call, so an edit accepted before it is never
    /// replaced by an older echo.
    pub fn reconcile_echo(&mut self, point: MonitoredPoint, echo: Setpoints) -> EchoOutcome {
        let local = self.get(point);
        if echo == local {
            self.set_remote_dirty(point, false);
            return EchoOutcome::InSync;
        }
        if self.is_remote_dirty(point) {
            return EchoOutcome::Repush(local);
        }
        match self.update(point, echo) {
            Ok(()) => EchoOutcome::Adopted,
            Err(_) => EchoOutcome::Ignored,
        }
    }
}
