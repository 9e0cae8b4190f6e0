//! # Delivery Error Classification
//!
//! Turns provider outcomes and pre-dispatch failures into handling decisions.
//!
//! ## Overview
//!
//! Two inputs are classified:
//!
//! - the per-recipient results of an attempt, folded into a single
//!   [`OutcomeKind`] where the most severe result wins
//!   (permanent over transient over delivered);
//! - errors raised before any provider call (missing configuration,
//!   suspended tenant, render failures, store outages, rate limiting),
//!   mapped to an [`ErrorDisposition`].
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │ Attempt results │────▶│ ErrorClassifier │────▶│ OutcomeKind     │
//! │ or error        │     │ Strategy        │     │ / Disposition   │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```

use crate::error::NotificationError;
use crate::models::{DeadLetterReason, OutcomeKind, RecipientResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a pre-dispatch error is handled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorDisposition {
    /// Counts as a transient failure of the attempt
    Retry,
    /// Put the task back without consuming an attempt
    Defer(Duration),
    /// Terminal; record and fail the task
    DeadLetter(DeadLetterReason),
}

/// Trait for error classification strategies
pub trait ErrorClassifier: Send + Sync {
    /// Fold per-recipient results into the outcome of the whole attempt
    fn classify_attempt(&self, results: &[RecipientResult]) -> OutcomeKind;

    /// Decide what to do with an error raised outside the provider call
    fn classify_error(&self, error: &NotificationError) -> ErrorDisposition;

    /// Get the classifier name for identification
    fn classifier_name(&self) -> &'static str;
}

/// Configuration for error classification behavior
#[derive(Debug, Clone)]
pub struct ErrorClassifierConfig {
    /// Delay applied when a collaborator is temporarily unavailable
    pub defer_delay: Duration,
}

impl Default for ErrorClassifierConfig {
    fn default() -> Self {
        Self {
            defer_delay: Duration::from_secs(1),
        }
    }
}

/// Standard error classifier
#[derive(Debug, Clone, Default)]
pub struct StandardErrorClassifier {
    config: ErrorClassifierConfig,
}

impl StandardErrorClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ErrorClassifierConfig) -> Self {
        Self { config }
    }
}

impl ErrorClassifier for StandardErrorClassifier {
    fn classify_attempt(&self, results: &[RecipientResult]) -> OutcomeKind {
        results
            .iter()
            .map(|result| result.outcome.kind)
            .max_by_key(OutcomeKind::severity)
            .unwrap_or(OutcomeKind::Delivered)
    }

    fn classify_error(&self, error: &NotificationError) -> ErrorDisposition {
        match error {
            NotificationError::ConfigNotFound { .. } => {
                ErrorDisposition::DeadLetter(DeadLetterReason::ConfigNotFound)
            }
            NotificationError::TenantSuspended { .. } => {
                ErrorDisposition::DeadLetter(DeadLetterReason::TenantSuspended)
            }
            NotificationError::TemplateRender(_) => {
                ErrorDisposition::DeadLetter(DeadLetterReason::TemplateRender)
            }
            NotificationError::ProviderNotRegistered(_) => {
                ErrorDisposition::DeadLetter(DeadLetterReason::ProviderMissing)
            }
            NotificationError::PermanentDelivery(_) => {
                ErrorDisposition::DeadLetter(DeadLetterReason::PermanentFailure)
            }
            NotificationError::TransientDelivery(_) => ErrorDisposition::Retry,
            NotificationError::RateLimitExceeded { retry_after, .. } => {
                ErrorDisposition::Defer(*retry_after)
            }
            NotificationError::Store(_)
            | NotificationError::LedgerWriteFailure(_)
            | NotificationError::DeadLetterWriteFailure(_) => {
                ErrorDisposition::Defer(self.config.defer_delay)
            }
            // Anything else indicates a bug or a corrupted task; park it for inspection
            _ => ErrorDisposition::DeadLetter(DeadLetterReason::PermanentFailure),
        }
    }

    fn classifier_name(&self) -> &'static str {
        "StandardErrorClassifier"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ChannelKind;
    use crate::error::{StoreError, TemplateRenderError};
    use crate::models::DeliveryOutcome;

    fn result(recipient: &str, outcome: DeliveryOutcome) -> RecipientResult {
        RecipientResult {
            recipient: recipient.to_string(),
            outcome,
        }
    }

    #[test]
    fn test_worst_recipient_outcome_wins() {
        let classifier = StandardErrorClassifier::new();

        let all_delivered = vec![
            result("a", DeliveryOutcome::delivered("1")),
            result("b", DeliveryOutcome::delivered("2")),
        ];
        assert_eq!(classifier.classify_attempt(&all_delivered), OutcomeKind::Delivered);

        let one_transient = vec![
            result("a", DeliveryOutcome::delivered("1")),
            result("b", DeliveryOutcome::transient("503")),
        ];
        assert_eq!(
            classifier.classify_attempt(&one_transient),
            OutcomeKind::TransientFailure
        );

        let mixed = vec![
            result("a", DeliveryOutcome::transient("503")),
            result("b", DeliveryOutcome::permanent("invalid number")),
        ];
        assert_eq!(classifier.classify_attempt(&mixed), OutcomeKind::PermanentFailure);
    }

    #[test]
    fn test_pre_dispatch_errors_dead_letter() {
        let classifier = StandardErrorClassifier::new();

        let missing = NotificationError::ConfigNotFound {
            tenant_id: "acme".to_string(),
            channel: ChannelKind::Push,
        };
        assert_eq!(
            classifier.classify_error(&missing),
            ErrorDisposition::DeadLetter(DeadLetterReason::ConfigNotFound)
        );

        let render = NotificationError::TemplateRender(TemplateRenderError::MissingVariable {
            template: "welcome".to_string(),
            missing: vec!["firstName".to_string()],
        });
        assert_eq!(
            classifier.classify_error(&render),
            ErrorDisposition::DeadLetter(DeadLetterReason::TemplateRender)
        );
    }

    #[test]
    fn test_outages_and_rate_limits_defer() {
        let classifier = StandardErrorClassifier::with_config(ErrorClassifierConfig {
            defer_delay: Duration::from_millis(250),
        });

        let outage = NotificationError::Store(StoreError::Unavailable("db down".to_string()));
        assert_eq!(
            classifier.classify_error(&outage),
            ErrorDisposition::Defer(Duration::from_millis(250))
        );

        let limited = NotificationError::RateLimitExceeded {
            tenant_id: "acme".to_string(),
            channel: ChannelKind::Sms,
            retry_after: Duration::from_millis(900),
        };
        assert_eq!(
            classifier.classify_error(&limited),
            ErrorDisposition::Defer(Duration::from_millis(900))
        );
    }
}
