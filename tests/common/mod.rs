//! Shared helpers for the integration suites
//!
//! - [`mocks`]: scriptable provider and stores that can be switched off
//! - [`fixtures`]: a seeded tenant, test configuration and engine wiring
//! - [`strategies`]: proptest strategies

#![allow(dead_code)]

pub mod fixtures;
pub mod mocks;
pub mod strategies;
