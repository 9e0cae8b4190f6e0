use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification of a provider call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Delivered,
    TransientFailure,
    PermanentFailure,
}

impl OutcomeKind {
    /// Severity used when combining per-recipient outcomes
    pub fn severity(&self) -> u8 {
        match self {
            Self::Delivered => 0,
            Self::TransientFailure => 1,
            Self::PermanentFailure => 2,
        }
    }
}

/// What a provider reports for one recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOutcome {
    pub kind: OutcomeKind,
    pub provider_reference: Option<String>,
    pub error: Option<String>,
}

impl DeliveryOutcome {
    pub fn delivered(provider_reference: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::Delivered,
            provider_reference: Some(provider_reference.into()),
            error: None,
        }
    }

    pub fn transient(error: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::TransientFailure,
            provider_reference: None,
            error: Some(error.into()),
        }
    }

    pub fn permanent(error: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::PermanentFailure,
            provider_reference: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientResult {
    pub recipient: String,
    pub outcome: DeliveryOutcome,
}

/// One dispatch of a task to its provider, covering every recipient still owed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAttempt {
    pub attempt_number: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: OutcomeKind,
    pub results: Vec<RecipientResult>,
}

impl DeliveryAttempt {
    /// First error reported by a failing recipient
    pub fn first_error(&self) -> Option<String> {
        self.results
            .iter()
            .filter(|result| result.outcome.kind == self.outcome)
            .find_map(|result| {
                result
                    .outcome
                    .error
                    .as_ref()
                    .map(|error| format!("{}: {error}", result.recipient))
            })
    }
}
