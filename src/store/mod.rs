//! # Storage Collaborators
//!
//! Traits for the durable stores the orchestration core depends on, each
//! with an in-memory implementation used by the engine by default and by
//! the test suite. Durable backends implement the same traits.

pub mod config_store;
pub mod dead_letter_sink;
pub mod ledger_store;
pub mod task_repository;

pub use config_store::{ConfigurationStore, InMemoryConfigurationStore};
pub use dead_letter_sink::{DeadLetterSink, InMemoryDeadLetterSink};
pub use ledger_store::{InMemoryLedgerStore, LedgerStore};
pub use task_repository::{InMemoryTaskRepository, TaskRepository};

use crate::error::StoreError;

pub type StoreResult<T> = Result<T, StoreError>;
