//! Refresh token retriever.

use crate::retriever::acquire_validated;
use crate::{
    AuthMethod, AzureCredentialWrapper, AzureEnvironment, CredentialRequest, CredentialRetriever,
    CredentialSpec, IdentityProvider, ProxyConfig, Result, TokenClient,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Exchanges a refresh token obtained by an external interactive login.
///
/// The token is redeemed by the public client it was issued to; without a
/// tenant it is redeemed against the `organizations` authority.
pub struct RefreshTokenRetriever {
    tenant: Option<String>,
    client: TokenClient,
    refresh_token: String,
    environment: AzureEnvironment,
    proxy: Option<ProxyConfig>,
    provider: Arc<dyn IdentityProvider>,
}

impl RefreshTokenRetriever {
    /// Creates a retriever for `refresh_token` issued to `client`.
    pub fn new(
        refresh_token: impl Into<String>,
        client: TokenClient,
        environment: AzureEnvironment,
        provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            tenant: None,
            client,
            refresh_token: refresh_token.into(),
            environment,
            proxy: None,
            provider,
        }
    }

    /// Redeems against a specific tenant.
    pub fn with_tenant(mut self, tenant: Option<String>) -> Self {
        self.tenant = tenant;
        self
    }

    /// Sets the proxy for the token exchange.
    pub fn with_proxy(mut self, proxy: Option<ProxyConfig>) -> Self {
        self.proxy = proxy;
        self
    }
}

#[async_trait]
impl CredentialRetriever for RefreshTokenRetriever {
    fn method(&self) -> AuthMethod {
        AuthMethod::RefreshToken
    }

    async fn retrieve(&self) -> Result<AzureCredentialWrapper> {
        tracing::debug!(
            client_id = self.client.client_id(),
            tenant = self.tenant.as_deref().unwrap_or("organizations"),
            "redeeming refresh token"
        );

        let request = CredentialRequest::new(
            CredentialSpec::RefreshToken {
                tenant: self.tenant.clone(),
                client: self.client,
                refresh_token: self.refresh_token.clone(),
            },
            self.environment,
        )
        .with_proxy(self.proxy.clone());
        acquire_validated(self.method(), self.provider.as_ref(), request).await
    }
}
