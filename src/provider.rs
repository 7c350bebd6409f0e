//! Identity provider trait: the token acquisition primitives.
//!
//! Retrievers decide *which* credential to build and whether it works; an
//! [`IdentityProvider`] knows *how* to build one. Concrete providers live
//! under [`providers`](crate::providers).

use crate::{CredentialRequest, Result, TokenSource};
use async_trait::async_trait;
use std::sync::Arc;

/// Builds token sources from credential requests.
///
/// # Implementations
///
/// - [`MockIdentityProvider`](crate::providers::mock::MockIdentityProvider):
///   in-memory, with error injection and call recording (feature `mock`)
/// - [`AzureIdentityProvider`](crate::providers::azure::AzureIdentityProvider):
///   backed by the `azure_identity` SDK and the `az` CLI (feature `azure`)
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Provider name, for logs and error messages.
    fn name(&self) -> &str;

    /// Builds a token source for `request`.
    ///
    /// Building should not contact the identity endpoint; retrievers prove
    /// the source usable by requesting a token afterwards. Interactive
    /// credential kinds may prompt here.
    ///
    /// # Errors
    ///
    /// - [`AuthError::NotSupported`](crate::AuthError::NotSupported): the
    ///   provider cannot build this credential kind
    async fn create(&self, request: &CredentialRequest) -> Result<Arc<dyn TokenSource>>;
}
