// Application layer - Control loop services
pub mod arbitrator;
pub mod controller;
pub mod device_gateway;
pub mod dispatcher;
pub mod events;
#[cfg(test)]
pub mod fake_device;
pub mod poller;
pub mod setpoint_store;
