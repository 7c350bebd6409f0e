//! Identity provider backed by the `azure_identity` SDK and the `az` CLI.
//!
//! | Credential kind | Source |
//! |-----------------|--------|
//! | `client_secret` | [`azure_identity::ClientSecretCredential`] |
//! | `client_certificate` | `azure_identity::ClientCertificateCredential` (feature `azure-certificate`, PKCS#12 only) |
//! | `managed_identity` | [`azure_identity::VirtualMachineManagedIdentityCredential`] |
//! | `azure_cli` | [`AzureCliTokenSource`] |
//!
//! Other credential kinds are reported as [`AuthError::NotSupported`] so
//! applications can plug a provider of their own for them.

use crate::cli::AzureCliTokenSource;
use crate::*;
use async_trait::async_trait;
use azure_core::auth::TokenCredential;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Identity provider using the Azure SDK for Rust.
///
/// # Example
///
/// ```no_run
/// use azauth::providers::azure::AzureIdentityProvider;
/// use azauth::{resolve, AuthConfiguration};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> azauth::Result<()> {
///     let config = AuthConfiguration::from_env();
///     let credential = resolve(&config, &[], Arc::new(AzureIdentityProvider::new())).await?;
///     let token = credential.management_token().await?;
///     println!("token expires at {}", token.expires_on);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct AzureIdentityProvider;

impl AzureIdentityProvider {
    /// Creates the provider.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl IdentityProvider for AzureIdentityProvider {
    fn name(&self) -> &str {
        "azure_identity"
    }

    async fn create(&self, request: &CredentialRequest) -> Result<Arc<dyn TokenSource>> {
        match &request.spec {
            CredentialSpec::ClientSecret {
                tenant,
                client,
                secret,
            } => {
                warn_unused_proxy(request);
                let authority = authority_url(request)?;
                let credential = azure_identity::ClientSecretCredential::new(
                    azure_core::new_http_client(),
                    authority,
                    tenant.clone(),
                    client.clone(),
                    secret.clone(),
                );
                Ok(Arc::new(SdkTokenSource {
                    name: "client_secret",
                    credential: Arc::new(credential),
                }))
            }
            #[cfg(feature = "azure-certificate")]
            CredentialSpec::ClientCertificate {
                tenant,
                client,
                certificate,
                password,
            } => {
                use base64::Engine;

                if certificate.starts_with(b"-----BEGIN") {
                    return Err(AuthError::NotSupported(
                        "PEM certificates with the azure_identity provider; convert to PKCS#12"
                            .to_string(),
                    ));
                }
                warn_unused_proxy(request);
                let encoded = base64::engine::general_purpose::STANDARD.encode(certificate);
                let credential = azure_identity::ClientCertificateCredential::new(
                    tenant.clone(),
                    client.clone(),
                    encoded,
                    password.clone().unwrap_or_default(),
                    token_options(request)?,
                )
                .map_err(|e| AuthError::Other(anyhow::anyhow!("{}", e)))?;
                Ok(Arc::new(SdkTokenSource {
                    name: "client_certificate",
                    credential: Arc::new(credential),
                }))
            }
            CredentialSpec::ManagedIdentity { client } => {
                let id = match client {
                    Some(client) => azure_identity::ImdsId::ClientId(client.clone()),
                    None => azure_identity::ImdsId::SystemAssigned,
                };
                let credential = azure_identity::VirtualMachineManagedIdentityCredential::new(
                    id,
                    token_options(request)?,
                );
                Ok(Arc::new(SdkTokenSource {
                    name: "managed_identity",
                    credential: Arc::new(credential),
                }))
            }
            CredentialSpec::AzureCli { tenant } => Ok(Arc::new(
                AzureCliTokenSource::new()
                    .with_tenant(tenant.clone())
                    .with_proxy(request.proxy.as_ref().map(ProxyConfig::url)),
            )),
            other => Err(AuthError::NotSupported(format!(
                "{} credentials with the azure_identity provider",
                other.kind()
            ))),
        }
    }
}

fn authority_url(request: &CredentialRequest) -> Result<azure_core::Url> {
    azure_core::Url::parse(request.environment.authority_host())
        .map_err(|e| AuthError::Other(anyhow::anyhow!("invalid authority host: {}", e)))
}

fn token_options(request: &CredentialRequest) -> Result<azure_identity::TokenCredentialOptions> {
    let mut options = azure_identity::TokenCredentialOptions::default();
    options.set_authority_host(authority_url(request)?.to_string());
    Ok(options)
}

fn warn_unused_proxy(request: &CredentialRequest) {
    if request.proxy.is_some() {
        tracing::debug!("proxy settings are not applied to SDK credentials");
    }
}

/// Adapts an SDK [`TokenCredential`] to [`TokenSource`].
pub struct SdkTokenSource {
    name: &'static str,
    credential: Arc<dyn TokenCredential>,
}

#[async_trait]
impl TokenSource for SdkTokenSource {
    fn name(&self) -> &str {
        self.name
    }

    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken> {
        let token = self
            .credential
            .get_token(scopes)
            .await
            .map_err(|e| AuthError::Other(anyhow::anyhow!("{}", e)))?;

        let expires_on = DateTime::<Utc>::from_timestamp(token.expires_on.unix_timestamp(), 0)
            .unwrap_or_else(Utc::now);
        Ok(AccessToken::new(token.token.secret(), expires_on))
    }
}
