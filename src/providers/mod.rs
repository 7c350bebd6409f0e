//! Identity provider implementations.
//!
//! Providers are conditionally compiled based on feature flags.

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "azure")]
pub mod azure;
