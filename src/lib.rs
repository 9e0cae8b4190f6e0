#![allow(clippy::doc_markdown)] // Allow technical terms like SHA-256, RFC3339 in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Notification Core
//!
//! Multi-tenant notification orchestration: routing, rendering, dispatch,
//! retry with backoff, dead-lettering and an auditable status trail.
//!
//! ## Overview
//!
//! A request names a tenant, one or more channels (push, email, SMS), a
//! template and its variables. The engine validates it, creates one delivery
//! task per channel under a deterministic idempotency key, and hands each
//! task to that channel's worker pool. Workers resolve the tenant's channel
//! configuration, render the template, call the channel provider and
//! classify the result. Transient failures are retried with exponential
//! backoff up to an attempt ceiling; anything that can never be delivered
//! is dead-lettered with its full attempt history.
//!
//! Every status change is appended to the status ledger before it is
//! visible anywhere else, and status queries are answered from the ledger.
//!
//! ## Module Organization
//!
//! - [`api`] - Axum router for the intake routes
//! - [`config`] - Layered configuration loading and validation
//! - [`constants`] - Channel kinds, status groups and route names
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup and operation loggers
//! - [`models`] - Tenants, templates, requests, tasks, attempts and ledger entries
//! - [`orchestration`] - Router, queues, workers, scheduler, dead letters and the engine
//! - [`registry`] - Channel providers keyed by channel kind
//! - [`state_machine`] - Delivery status lattice and transitions
//! - [`store`] - Storage collaborator traits with in-memory implementations
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use notification_core::config::ConfigManager;
//! use notification_core::models::RawNotificationRequest;
//! use notification_core::NotificationEngine;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! notification_core::logging::init_structured_logging(&manager.config().logging);
//!
//! let engine = NotificationEngine::builder()
//!     .with_config_manager(&manager)
//!     .with_logging_providers()
//!     .build()?;
//! engine.start()?;
//!
//! let receipt = engine
//!     .submit(
//!         RawNotificationRequest::new("acme", "welcome")
//!             .with_recipient("ada@example.com")
//!             .with_channel("EMAIL")
//!             .with_channel("SMS")
//!             .with_variable("firstName", "Ada"),
//!     )
//!     .await?;
//!
//! for channel in engine.status(&receipt.request_id).await? {
//!     println!("{} is {}", channel.channel, channel.status);
//! }
//! engine.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and integration tests
//! cargo bench --features benchmarks
//! ```

pub mod api;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod registry;
pub mod state_machine;
pub mod store;

pub use config::{ConfigManager, NotificationConfig};
pub use constants::{status_groups, system, ChannelKind};
pub use error::{
    NotificationError, Result, StoreError, TemplateRenderError, ValidationError,
    ValidationErrorKind,
};
pub use models::{
    ChannelConfig, ChannelStatus, DeadLetterReason, DeadLetterRecord, DeliveryOutcome,
    DeliveryTask, NotificationRequest, RawNotificationRequest, Template, TemplateKey, Tenant,
};
pub use orchestration::{CancelOutcome, NotificationEngine, SubmissionReceipt};
pub use registry::{ChannelProvider, LoggingProvider, ProviderRegistry};
pub use state_machine::DeliveryStatus;
