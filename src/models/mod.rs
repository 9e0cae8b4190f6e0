pub mod channel_config;
pub mod dead_letter;
pub mod delivery_attempt;
pub mod delivery_task;
pub mod notification_log;
pub mod notification_request;
pub mod template;
pub mod tenant;

// Re-export core models for easy access
pub use channel_config::{ChannelConfig, RateLimit};
pub use dead_letter::{DeadLetterReason, DeadLetterRecord};
pub use delivery_attempt::{DeliveryAttempt, DeliveryOutcome, OutcomeKind, RecipientResult};
pub use delivery_task::{DeliveryTask, IdempotencyKey, PendingResolution};
pub use notification_log::{ChannelStatus, NotificationLog};
pub use notification_request::{NotificationRequest, RawNotificationRequest};
pub use template::{RenderedContent, Template, TemplateKey};
pub use tenant::{Tenant, TenantStatus};
