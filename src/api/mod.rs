//! # Intake API
//!
//! Axum router for the three intake routes. A gateway owns transport
//! security and authentication and mounts this router; every handler
//! answers with a status code and a JSON body.
//!
//! - `POST /api/v1/notifications/send` → `202 {requestId}`
//! - `POST /api/v1/notifications/schedule` → `202 {requestId}`
//! - `GET /api/v1/notifications/{request_id}/status` → per-channel statuses

pub mod handlers;
pub mod state;
pub mod types;

use crate::constants::api_paths;
use crate::orchestration::NotificationEngine;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

pub use handlers::{ApiError, ApiResult};
pub use state::AppState;
pub use types::{
    AcceptedResponse, ScheduleNotificationBody, SendNotificationBody, StatusResponse,
};

/// Intake routes bound to one engine
pub fn router(engine: Arc<NotificationEngine>) -> Router {
    Router::new()
        .route(api_paths::SEND, post(handlers::send_notification))
        .route(api_paths::SCHEDULE, post(handlers::schedule_notification))
        .route(api_paths::STATUS, get(handlers::get_status))
        .with_state(AppState::new(engine))
}
