// HTTP request handlers - operator API over the skid controller
use crate::application::controller::{ControllerStatus, SkidController};
use crate::domain::action_log::ActionLogEntry;
use crate::domain::actuator::Command;
use crate::domain::error::ControlError;
use crate::domain::setpoints::{MonitoredPoint, Setpoints};
use crate::domain::telemetry::Reading;
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post, put},
    Json, Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

#[derive(Deserialize)]
pub struct CommandRequest {
    pub command: Command,
}

#[derive(Deserialize)]
pub struct AutoRequest {
    pub enabled: bool,
}

pub struct ApiError(ControlError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ControlError::InvalidSetpoints(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ControlError::ActuatorBusy(_) | ControlError::PollInFlight | ControlError::PumpTripped(_) => {
                StatusCode::CONFLICT
            }
            ControlError::Transport(_) => StatusCode::BAD_GATEWAY,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl From<ControlError> for ApiError {
    fn from(err: ControlError) -> Self {
        ApiError(err)
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/status", get(status))
        .route("/history", get(history))
        .route("/actions", get(actions))
        .route("/commands", post(send_command))
        .route("/setpoints/:point", put(update_setpoints))
        .route("/auto", put(set_auto))
        .route("/events", get(events))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<ControllerStatus> {
    Json(state.controller.status())
}

/// Recent readings, oldest first
pub async fn history(State(state): State<Arc<AppState>>) -> Json<Vec<Reading>> {
    Json(state.controller.history())
}

/// Action log, most recent first
pub async fn actions(State(state): State<Arc<AppState>>) -> Json<Vec<ActionLogEntry>> {
    Json(state.controller.actions())
}

pub async fn send_command(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<ActionLogEntry>, ApiError> {
    let entry = detached(state.controller.clone(), move |controller| async move {
        controller.manual_command(request.command).await
    })
    .await?;
    Ok(Json(entry))
}

pub async fn update_setpoints(
    Path(point): Path<MonitoredPoint>,
    State(state): State<Arc<AppState>>,
    Json(setpoints): Json<Setpoints>,
) -> Result<Json<Setpoints>, ApiError> {
    detached(state.controller.clone(), move |controller| async move {
        controller.update_setpoints(point, setpoints).await
    })
    .await?;
    Ok(Json(state.controller.setpoints(point)))
}

pub async fn set_auto(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AutoRequest>,
) -> Json<ControllerStatus> {
    state.controller.set_auto_enabled(request.enabled);
    Json(state.controller.status())
}

/// Server-sent stream of control events
pub async fn events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.controller.subscribe();
    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => match Event::default().event(event.kind()).json_data(&event) {
                    Ok(sse_event) => yield Ok(sse_event),
                    Err(e) => tracing::warn!("failed to encode control event: {}", e),
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Run a controller operation on its own task so a dropped request cannot
/// abandon a command between its optimistic update and its outcome.
async fn detached<T, F, Fut>(controller: Arc<SkidController>, op: F) -> Result<T, ControlError>
where
    T: Send + 'static,
    F: FnOnce(Arc<SkidController>) -> Fut,
    Fut: Future<Output = Result<T, ControlError>> + Send + 'static,
{
    match tokio::spawn(op(controller)).await {
        Ok(result) => result,
        Err(e) => Err(ControlError::Transport(format!("command task failed: {}", e))),
    }
}
