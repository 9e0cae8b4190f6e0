//! # Intake Handlers
//!
//! Axum handlers for the intake routes. Validation failures are `400`
//! carrying the validation kind as the error code, unknown requests are
//! `404`, and collaborator outages are `503`.

use super::state::AppState;
use super::types::{
    AcceptedResponse, ScheduleNotificationBody, SendNotificationBody, StatusResponse,
};
use crate::error::{NotificationError, ValidationError};
use crate::models::RawNotificationRequest;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error};

/// Intake API errors with HTTP status code mappings
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(ValidationError),

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Invalid request: {message}")]
    BadRequest { message: String },

    #[error("Service temporarily unavailable: {message}")]
    ServiceUnavailable { message: String },

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.kind.as_str(),
            Self::NotFound { .. } => "NOT_FOUND",
            Self::BadRequest { .. } => "BAD_REQUEST",
            Self::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Validation(e) => e.message.clone(),
            other => other.to_string(),
        };
        let body = Json(json!({
            "error": {
                "code": self.error_code(),
                "message": message
            }
        }));
        (self.status_code(), body).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err)
    }
}

impl From<NotificationError> for ApiError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::Validation(e) => ApiError::Validation(e),
            NotificationError::RequestNotFound(id) => ApiError::not_found(format!("request {id}")),
            NotificationError::TaskNotFound(id) => ApiError::not_found(format!("task {id}")),
            NotificationError::Store(e) => ApiError::ServiceUnavailable {
                message: e.to_string(),
            },
            NotificationError::LedgerWriteFailure(message) => {
                ApiError::ServiceUnavailable { message }
            }
            other => {
                error!(error = %other, "Unhandled error at the intake boundary");
                ApiError::Internal
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(format!("malformed JSON body: {}", rejection.body_text()))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// `POST /api/v1/notifications/send`
pub async fn send_notification(
    State(state): State<AppState>,
    payload: Result<Json<SendNotificationBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AcceptedResponse>)> {
    let Json(body) = payload?;
    accept(&state, RawNotificationRequest::from(body)).await
}

/// `POST /api/v1/notifications/schedule`
pub async fn schedule_notification(
    State(state): State<AppState>,
    payload: Result<Json<ScheduleNotificationBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AcceptedResponse>)> {
    let Json(body) = payload?;
    accept(&state, body.into_raw()?).await
}

/// `GET /api/v1/notifications/{request_id}/status`
pub async fn get_status(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    debug!(request_id = %request_id, "Status query");
    let channels = state.engine.status(&request_id).await?;
    Ok(Json(StatusResponse {
        request_id,
        channels,
    }))
}

async fn accept(
    state: &AppState,
    raw: RawNotificationRequest,
) -> ApiResult<(StatusCode, Json<AcceptedResponse>)> {
    let receipt = state.engine.submit(raw).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            request_id: receipt.request_id,
        }),
    ))
}
