//! Service principal retriever (client secret or certificate).

use crate::retriever::acquire_validated;
use crate::validation::validate;
use crate::{
    AuthConfiguration, AuthError, AuthMethod, AzureCredentialWrapper, AzureEnvironment,
    CredentialRequest, CredentialRetriever, CredentialSpec, IdentityProvider, ProxyConfig, Result,
};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;

/// Authenticates a service principal with a secret or a certificate.
///
/// When both are configured the certificate is used (validation reports
/// this as a warning).
pub struct ServicePrincipalRetriever {
    tenant: String,
    client: String,
    secret: Option<String>,
    certificate: Option<PathBuf>,
    certificate_password: Option<String>,
    environment: AzureEnvironment,
    proxy: Option<ProxyConfig>,
    provider: Arc<dyn IdentityProvider>,
}

impl ServicePrincipalRetriever {
    /// Creates a retriever from the service principal slice of `config`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if tenant, client, or both secret
    /// and certificate are missing.
    pub fn new(
        config: &AuthConfiguration,
        environment: AzureEnvironment,
        provider: Arc<dyn IdentityProvider>,
    ) -> Result<Self> {
        let (Some(tenant), Some(client), true) = (
            config.tenant(),
            config.client(),
            config.requests_service_principal(),
        ) else {
            let problems = validate(config).into_iter().filter(|p| p.is_error()).collect();
            return Err(AuthError::Configuration(problems));
        };

        if config.key().is_some() && config.certificate().is_some() {
            tracing::warn!(
                client,
                "both a client secret and a certificate are configured; using the certificate"
            );
        }

        Ok(Self {
            tenant: tenant.to_string(),
            client: client.to_string(),
            secret: config.key().map(str::to_string),
            certificate: config.certificate().map(PathBuf::from),
            certificate_password: config.certificate_password().map(str::to_string),
            environment,
            proxy: config.proxy(),
            provider,
        })
    }

    async fn spec(&self) -> Result<CredentialSpec> {
        if let Some(path) = &self.certificate {
            let certificate = fs::read(path).await.map_err(|e| {
                AuthError::login_reason(
                    AuthMethod::ServicePrincipal,
                    format!("cannot read certificate {}: {}", path.display(), e),
                )
            })?;
            return Ok(CredentialSpec::ClientCertificate {
                tenant: self.tenant.clone(),
                client: self.client.clone(),
                certificate,
                password: self.certificate_password.clone(),
            });
        }

        match &self.secret {
            Some(secret) => Ok(CredentialSpec::ClientSecret {
                tenant: self.tenant.clone(),
                client: self.client.clone(),
                secret: secret.clone(),
            }),
            None => Err(AuthError::login_reason(
                AuthMethod::ServicePrincipal,
                "neither a client secret nor a certificate is configured",
            )),
        }
    }
}

#[async_trait]
impl CredentialRetriever for ServicePrincipalRetriever {
    fn method(&self) -> AuthMethod {
        AuthMethod::ServicePrincipal
    }

    async fn retrieve(&self) -> Result<AzureCredentialWrapper> {
        let spec = self.spec().await?;
        tracing::debug!(
            tenant = %self.tenant,
            client = %self.client,
            kind = spec.kind(),
            "authenticating service principal"
        );

        let request =
            CredentialRequest::new(spec, self.environment).with_proxy(self.proxy.clone());
        acquire_validated(self.method(), self.provider.as_ref(), request).await
    }
}
