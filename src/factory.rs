//! Chain construction and the resolution entry point.

use crate::retrievers::{
    AzureCliRetriever, DeviceCodeRetriever, ManagedIdentityRetriever, RefreshTokenRetriever,
    SecretFileRetriever, ServicePrincipalRetriever,
};
use crate::secret_file::SecretFileStore;
use crate::validation::{validate, validate_connection};
use crate::{
    AuthConfiguration, AuthError, AuthMethod, AzureCredentialWrapper, ChainedCredentialRetriever,
    CredentialRetriever, IdentityProvider, Result,
};
use std::sync::Arc;

/// Builds a [`ChainedCredentialRetriever`] from configuration.
///
/// Without preferred methods the chain follows
/// [`AuthMethod::default_order`] and only includes methods whose inputs are
/// present; the device code flow is only added when
/// [`allow_interactive`](AuthConfiguration::allow_interactive) is set.
/// Preferred methods are used in the given order, duplicates removed.
///
/// The same configuration always yields the same order.
pub struct ChainBuilder<'a> {
    config: &'a AuthConfiguration,
    provider: Arc<dyn IdentityProvider>,
    preferred: Vec<AuthMethod>,
    secret_file: Option<SecretFileStore>,
}

impl<'a> ChainBuilder<'a> {
    /// Creates a builder using the automatic order.
    pub fn new(config: &'a AuthConfiguration, provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            config,
            provider,
            preferred: Vec::new(),
            secret_file: None,
        }
    }

    /// Restricts the chain to `methods`, in order. An empty slice keeps the
    /// automatic order.
    pub fn preferred(mut self, methods: &[AuthMethod]) -> Self {
        self.preferred.clear();
        for method in methods {
            if !self.preferred.contains(method) {
                self.preferred.push(*method);
            }
        }
        self
    }

    /// Reads the legacy secret file from `store` instead of the default location.
    pub fn secret_file(mut self, store: SecretFileStore) -> Self {
        self.secret_file = Some(store);
        self
    }

    /// Builds the chain.
    ///
    /// # Errors
    ///
    /// - [`AuthError::UnknownEnvironment`]: the configured environment is not a known cloud
    /// - [`AuthError::Configuration`]: a service principal was explicitly
    ///   requested but the configuration is incomplete
    pub fn build(self) -> Result<ChainedCredentialRetriever> {
        let requested = self.config.requested_environment()?;
        let environment = requested.unwrap_or_default();
        let explicit = !self.preferred.is_empty();
        let methods: &[AuthMethod] = if explicit {
            &self.preferred
        } else {
            AuthMethod::default_order()
        };

        let config = self.config;
        let provider = &self.provider;
        let mut chain = ChainedCredentialRetriever::default();

        for method in methods {
            if !explicit && method.is_interactive() && !config.allow_interactive {
                tracing::debug!(%method, "interactive methods not allowed; skipping");
                continue;
            }
            let retriever: Box<dyn CredentialRetriever> = match method {
                AuthMethod::ServicePrincipal => {
                    if !explicit && !config.has_complete_service_principal() {
                        continue;
                    }
                    Box::new(ServicePrincipalRetriever::new(
                        config,
                        environment,
                        provider.clone(),
                    )?)
                }
                AuthMethod::SecretFile => {
                    let Some(store) = self.secret_file.clone().or_else(SecretFileStore::from_env)
                    else {
                        tracing::debug!("no home directory; skipping secret file");
                        continue;
                    };
                    Box::new(
                        SecretFileRetriever::new(store, requested, provider.clone())
                            .with_proxy(config.proxy()),
                    )
                }
                AuthMethod::AzureCli => Box::new(
                    AzureCliRetriever::new(
                        config.tenant().map(str::to_string),
                        environment,
                        provider.clone(),
                    )
                    .with_proxy(config.proxy()),
                ),
                AuthMethod::RefreshToken => {
                    let Some(token) = config.refresh_token() else {
                        tracing::debug!("no refresh token configured; skipping refresh token");
                        continue;
                    };
                    Box::new(
                        RefreshTokenRetriever::new(
                            token,
                            config.refresh_token_client,
                            environment,
                            provider.clone(),
                        )
                        .with_tenant(config.tenant().map(str::to_string))
                        .with_proxy(config.proxy()),
                    )
                }
                AuthMethod::ManagedIdentity => {
                    // A client id next to a secret belongs to the service principal.
                    let client = if config.requests_service_principal() {
                        None
                    } else {
                        config.client().map(str::to_string)
                    };
                    Box::new(ManagedIdentityRetriever::new(
                        client,
                        environment,
                        provider.clone(),
                    ))
                }
                AuthMethod::DeviceCode => Box::new(
                    DeviceCodeRetriever::new(
                        config.tenant().map(str::to_string),
                        environment,
                        provider.clone(),
                    )
                    .with_proxy(config.proxy()),
                ),
            };
            chain.push(retriever);
        }

        tracing::debug!(methods = ?chain.methods(), %environment, "built credential chain");
        Ok(chain)
    }
}

/// Builds a chain for `config` trying `preferred` methods (automatic order
/// when empty).
pub fn build_chain(
    config: &AuthConfiguration,
    preferred: &[AuthMethod],
    provider: Arc<dyn IdentityProvider>,
) -> Result<ChainedCredentialRetriever> {
    ChainBuilder::new(config, provider).preferred(preferred).build()
}

/// Validates `config`, builds the chain and resolves a credential.
///
/// Validation runs before any I/O and reports every problem at once. The
/// full rule set applies when service principal material is present or the
/// method is explicitly preferred; otherwise only the environment and proxy
/// rules apply.
///
/// # Errors
///
/// - [`AuthError::Configuration`]: validation found errors
/// - [`AuthError::NoRetrievers`]: no method applies to this configuration
/// - [`AuthError::EnvironmentMismatch`]: fatal cloud conflict
/// - [`AuthError::Aggregate`]: every method failed
///
/// # Example
///
/// ```no_run
/// use azauth::providers::mock::MockIdentityProvider;
/// use azauth::{resolve, AuthConfiguration, AuthMethod};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> azauth::Result<()> {
///     let config = AuthConfiguration::new()
///         .with_tenant("t1")
///         .with_client("c1")
///         .with_key("s1");
///
///     let credential = resolve(
///         &config,
///         &[AuthMethod::ServicePrincipal],
///         Arc::new(MockIdentityProvider::new()),
///     )
///     .await?;
///     assert_eq!(credential.tenant_id(), Some("t1"));
///     Ok(())
/// }
/// ```
pub async fn resolve(
    config: &AuthConfiguration,
    preferred: &[AuthMethod],
    provider: Arc<dyn IdentityProvider>,
) -> Result<AzureCredentialWrapper> {
    check_configuration(config, preferred)?;
    build_chain(config, preferred, provider)?.retrieve().await
}

fn check_configuration(config: &AuthConfiguration, preferred: &[AuthMethod]) -> Result<()> {
    let problems = if config.requests_service_principal()
        || preferred.contains(&AuthMethod::ServicePrincipal)
    {
        validate(config)
    } else {
        validate_connection(config)
    };

    let (errors, warnings): (Vec<_>, Vec<_>) = problems.into_iter().partition(|p| p.is_error());
    for warning in &warnings {
        tracing::warn!(problem = %warning, "authentication configuration warning");
    }
    if !errors.is_empty() {
        return Err(AuthError::Configuration(errors));
    }
    Ok(())
}
