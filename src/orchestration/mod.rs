//! # Orchestration Engine
//!
//! Drives every notification from intake to a terminal status.
//!
//! ## Architecture
//!
//! ```text
//! submit ─▶ RequestValidator ─▶ NotificationRouter ─┬─▶ DeliveryQueue(PUSH)  ─▶ workers
//!                                                   ├─▶ DeliveryQueue(EMAIL) ─▶ workers
//!                                                   └─▶ DeliveryQueue(SMS)   ─▶ workers
//!
//! worker: TenantConfigResolver ─▶ RateLimiter ─▶ TemplateRenderer ─▶ ChannelProvider
//!         ─▶ ErrorClassifier ─▶ RetryScheduler ─┬─▶ SENT
//!                                               ├─▶ RETRY_SCHEDULED (re-queued)
//!                                               └─▶ DeadLetterHandler ─▶ FAILED
//! ```
//!
//! Every transition is appended to the [`StatusLedger`] before it is stored
//! on the task, and status queries are answered from the ledger alone.
//!
//! ## Core Components
//!
//! - **RequestValidator**: synchronous shape checks plus tenant existence
//! - **TenantConfigResolver**: TTL-cached tenant and channel configuration
//! - **TemplateRenderer**: deterministic placeholder substitution with language fallback
//! - **NotificationRouter**: one task per channel under an atomic idempotency index
//! - **DeliveryQueue**: per-channel ready-time queue with single-owner claims
//! - **DispatchWorker**: claim, render, deliver, classify
//! - **RetryScheduler**: exponential backoff with jitter and an attempt ceiling
//! - **DeadLetterHandler**: durable record first, FAILED second
//! - **NotificationEngine**: builder-wired facade with worker lifecycle

pub mod backoff_calculator;
pub mod dead_letter_handler;
pub mod delivery_queue;
pub mod dispatch_worker;
pub mod error_classifier;
pub mod notification_engine;
pub mod notification_router;
pub mod rate_limiter;
pub mod request_validator;
pub mod retry_scheduler;
pub mod status_ledger;
pub mod template_renderer;
pub mod tenant_config_resolver;

pub use backoff_calculator::{
    BackoffCalculator, BackoffCalculatorConfig, BackoffResult, BackoffType,
};
pub use dead_letter_handler::DeadLetterHandler;
pub use delivery_queue::{ClaimedTask, DeliveryQueue, DeliveryQueues, QueueStats};
pub use dispatch_worker::{spawn_worker_pool, DispatchContext, DispatchWorker};
pub use error_classifier::{
    ErrorClassifier, ErrorClassifierConfig, ErrorDisposition, StandardErrorClassifier,
};
pub use notification_engine::{
    CancelOutcome, NotificationEngine, NotificationEngineBuilder, SubmissionReceipt,
};
pub use notification_router::{NotificationRouter, RouteOutcome, RoutedTask, RoutingReport};
pub use rate_limiter::RateLimiter;
pub use request_validator::{validate_shape, RequestValidator};
pub use retry_scheduler::{RetryScheduler, SchedulingDecision};
pub use status_ledger::StatusLedger;
pub use template_renderer::{render_template, substitute, TemplateRenderer};
pub use tenant_config_resolver::TenantConfigResolver;
