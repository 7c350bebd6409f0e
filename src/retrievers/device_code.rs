//! Interactive device code retriever.

use crate::retriever::acquire_validated;
use crate::{
    AuthMethod, AzureCredentialWrapper, AzureEnvironment, CredentialRequest, CredentialRetriever,
    CredentialSpec, IdentityProvider, ProxyConfig, Result, TokenClient,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Runs the interactive device code flow through the identity provider.
///
/// The prompt is a side effect the user sees, so automatic chains only
/// include this method when interaction is allowed, and always last.
pub struct DeviceCodeRetriever {
    tenant: Option<String>,
    client: TokenClient,
    environment: AzureEnvironment,
    proxy: Option<ProxyConfig>,
    provider: Arc<dyn IdentityProvider>,
}

impl DeviceCodeRetriever {
    /// Creates a retriever using the developer public client.
    pub fn new(
        tenant: Option<String>,
        environment: AzureEnvironment,
        provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            tenant,
            client: TokenClient::Developer,
            environment,
            proxy: None,
            provider,
        }
    }

    /// Sets the proxy for the flow.
    pub fn with_proxy(mut self, proxy: Option<ProxyConfig>) -> Self {
        self.proxy = proxy;
        self
    }
}

#[async_trait]
impl CredentialRetriever for DeviceCodeRetriever {
    fn method(&self) -> AuthMethod {
        AuthMethod::DeviceCode
    }

    async fn retrieve(&self) -> Result<AzureCredentialWrapper> {
        tracing::info!("starting interactive device code login");

        let request = CredentialRequest::new(
            CredentialSpec::DeviceCode {
                tenant: self.tenant.clone(),
                client: self.client,
            },
            self.environment,
        )
        .with_proxy(self.proxy.clone());
        acquire_validated(self.method(), self.provider.as_ref(), request).await
    }
}
