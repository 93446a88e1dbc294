// Application state for HTTP handlers
use crate::application::controller::SkidController;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<SkidController>,
}
