//! Credential retriever trait definition.
//!
//! This module defines the [`CredentialRetriever`] trait that every
//! authentication method implements. The variants live under
//! [`retrievers`](crate::retrievers) and are composed by
//! [`ChainedCredentialRetriever`](crate::ChainedCredentialRetriever).

use crate::{
    AuthError, AuthMethod, AzureCredentialWrapper, CredentialRequest, IdentityProvider, Result,
};
use async_trait::async_trait;

/// One authentication method.
///
/// Implementations own only the configuration slice they need. Each call to
/// [`retrieve`](Self::retrieve) is independent and may be repeated; no
/// shared state is mutated.
///
/// # Example
///
/// ```no_run
/// use azauth::providers::mock::MockIdentityProvider;
/// use azauth::retrievers::AzureCliRetriever;
/// use azauth::{AzureEnvironment, CredentialRetriever};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> azauth::Result<()> {
///     let provider = Arc::new(MockIdentityProvider::new());
///     let retriever = AzureCliRetriever::new(None, AzureEnvironment::Azure, provider);
///
///     let credential = retriever.retrieve().await?;
///     println!("resolved via {}", credential.method());
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait CredentialRetriever: Send + Sync {
    /// The method this retriever implements.
    fn method(&self) -> AuthMethod;

    /// Resolves a credential and proves it usable.
    ///
    /// # Errors
    ///
    /// - [`AuthError::LoginFailed`]: the attempt failed; a chain moves on
    /// - [`AuthError::NotApplicable`]: the method does not apply here; a
    ///   chain moves on without recording a failure
    /// - [`AuthError::EnvironmentMismatch`]: fatal; a chain stops
    async fn retrieve(&self) -> Result<AzureCredentialWrapper>;
}

/// Builds a token source and fetches one management-scope token with it.
///
/// This turns "credential object constructed" into "credential proven
/// usable", so a malformed secret fails here instead of deep inside a later
/// deployment step.
pub(crate) async fn acquire_validated(
    method: AuthMethod,
    provider: &dyn IdentityProvider,
    request: CredentialRequest,
) -> Result<AzureCredentialWrapper> {
    let source = provider
        .create(&request)
        .await
        .map_err(|e| AuthError::login_failed(method, e))?;

    let scope = request.environment.management_scope();
    source
        .get_token(&[scope.as_str()])
        .await
        .map_err(|e| AuthError::login_failed(method, e))?;

    tracing::debug!(
        %method,
        provider = provider.name(),
        environment = %request.environment,
        "credential validated against management scope"
    );

    Ok(AzureCredentialWrapper::new(method, source, request))
}
