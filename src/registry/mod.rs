//! # Provider Registry
//!
//! Maps each channel kind to the single provider that delivers it.
//!
//! ## Overview
//!
//! Providers implement [`ChannelProvider`]. The registry is assembled once
//! while the engine is built and is read-only afterwards, so workers share
//! it through an `Arc` without locking.
//!
//! ```text
//! ProviderRegistry
//! ├── PUSH  -> Arc<dyn ChannelProvider>
//! ├── EMAIL -> Arc<dyn ChannelProvider>
//! └── SMS   -> Arc<dyn ChannelProvider>
//! ```

pub mod channel_provider;
pub mod provider_registry;

pub use channel_provider::{ChannelProvider, LoggingProvider};
pub use provider_registry::{ProviderRegistry, RegistryStats};
