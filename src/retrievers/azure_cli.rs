//! Azure CLI session retriever.

use crate::retriever::acquire_validated;
use crate::{
    AuthMethod, AzureCredentialWrapper, AzureEnvironment, CredentialRequest, CredentialRetriever,
    CredentialSpec, IdentityProvider, ProxyConfig, Result,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Reuses the login session of the Azure CLI (`az login`).
pub struct AzureCliRetriever {
    tenant: Option<String>,
    environment: AzureEnvironment,
    proxy: Option<ProxyConfig>,
    provider: Arc<dyn IdentityProvider>,
}

impl AzureCliRetriever {
    /// Creates a retriever; `tenant` selects a tenant other than the CLI default.
    pub fn new(
        tenant: Option<String>,
        environment: AzureEnvironment,
        provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            tenant,
            environment,
            proxy: None,
            provider,
        }
    }

    /// Sets the proxy passed to the CLI.
    pub fn with_proxy(mut self, proxy: Option<ProxyConfig>) -> Self {
        self.proxy = proxy;
        self
    }
}

#[async_trait]
impl CredentialRetriever for AzureCliRetriever {
    fn method(&self) -> AuthMethod {
        AuthMethod::AzureCli
    }

    async fn retrieve(&self) -> Result<AzureCredentialWrapper> {
        tracing::debug!(
            tenant = self.tenant.as_deref().unwrap_or("default"),
            "using Azure CLI session"
        );

        let request = CredentialRequest::new(
            CredentialSpec::AzureCli {
                tenant: self.tenant.clone(),
            },
            self.environment,
        )
        .with_proxy(self.proxy.clone());
        acquire_validated(self.method(), self.provider.as_ref(), request).await
    }
}
