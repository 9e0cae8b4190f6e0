//! Request and response bodies of the intake routes.

use crate::error::ValidationError;
use crate::models::{ChannelStatus, RawNotificationRequest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Body of `POST /send`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SendNotificationBody {
    pub tenant_id: Option<String>,
    pub recipients: Vec<String>,
    pub channels: Vec<String>,
    pub template_name: Option<String>,
    pub language: Option<String>,
    pub variables: BTreeMap<String, String>,
    pub client_request_id: Option<String>,
}

impl From<SendNotificationBody> for RawNotificationRequest {
    fn from(body: SendNotificationBody) -> Self {
        RawNotificationRequest {
            request_id: body.client_request_id,
            tenant_id: body.tenant_id,
            recipients: body.recipients,
            channels: body.channels,
            template_name: body.template_name,
            language: body.language,
            variables: body.variables,
            scheduled_time: None,
        }
    }
}

/// Body of `POST /schedule`: the send body plus an ISO-8601 `scheduledTime`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleNotificationBody {
    #[serde(flatten)]
    pub notification: SendNotificationBody,
    #[serde(default)]
    pub scheduled_time: Option<String>,
}

impl ScheduleNotificationBody {
    /// Parse the schedule time; it is mandatory on this route
    pub fn into_raw(self) -> Result<RawNotificationRequest, ValidationError> {
        let text = self
            .scheduled_time
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| ValidationError::missing_field("scheduledTime"))?;
        let scheduled_time = DateTime::parse_from_rfc3339(text)
            .map_err(|e| ValidationError::invalid_field("scheduledTime", e))?
            .with_timezone(&Utc);

        let mut raw = RawNotificationRequest::from(self.notification);
        raw.scheduled_time = Some(scheduled_time);
        Ok(raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedResponse {
    pub request_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub request_id: String,
    pub channels: Vec<ChannelStatus>,
}
