//! Managed identity retriever.

use crate::retriever::acquire_validated;
use crate::{
    AuthMethod, AzureCredentialWrapper, AzureEnvironment, CredentialRequest, CredentialRetriever,
    CredentialSpec, IdentityProvider, Result,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Authenticates as the managed identity of the hosting Azure resource.
///
/// Without a client id the system-assigned identity is used. Outside Azure
/// the identity endpoint is absent and the attempt fails fast; callers must
/// not retry this method.
pub struct ManagedIdentityRetriever {
    client: Option<String>,
    environment: AzureEnvironment,
    provider: Arc<dyn IdentityProvider>,
}

impl ManagedIdentityRetriever {
    /// Creates a retriever; `client` selects a user-assigned identity.
    pub fn new(
        client: Option<String>,
        environment: AzureEnvironment,
        provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            client,
            environment,
            provider,
        }
    }
}

#[async_trait]
impl CredentialRetriever for ManagedIdentityRetriever {
    fn method(&self) -> AuthMethod {
        AuthMethod::ManagedIdentity
    }

    async fn retrieve(&self) -> Result<AzureCredentialWrapper> {
        tracing::debug!(
            client = self.client.as_deref().unwrap_or("system-assigned"),
            "authenticating managed identity"
        );

        // The identity endpoint is link-local; proxies never apply.
        let request = CredentialRequest::new(
            CredentialSpec::ManagedIdentity {
                client: self.client.clone(),
            },
            self.environment,
        );
        acquire_validated(self.method(), self.provider.as_ref(), request).await
    }
}
