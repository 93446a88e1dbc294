// Presentation layer - Operator HTTP API
pub mod app_state;
pub mod handlers;
