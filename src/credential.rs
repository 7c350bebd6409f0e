//! Token sources and the resolved credential wrapper.
//!
//! A [`TokenSource`] is the opaque "give me a bearer token for scope X"
//! capability every downstream Azure call consumes. An
//! [`AzureCredentialWrapper`] binds one to the method that produced it, the
//! cloud it targets, and the recipe ([`CredentialRequest`]) it was built
//! from, so tenant-scoped copies can be derived later.

use crate::{AuthError, AuthMethod, AzureEnvironment, ProxyConfig, Result, TokenClient};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::Arc;

/// A bearer token and its expiry.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    /// The bearer token
    pub token: String,
    /// When the token stops being accepted
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    /// Creates a token.
    pub fn new(token: impl Into<String>, expires_on: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_on,
        }
    }

    /// Returns true if the token has expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_on
    }

    /// Returns true if the token expires within `window`.
    pub fn expires_within(&self, window: Duration) -> bool {
        Utc::now() + window >= self.expires_on
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// Produces bearer tokens for requested scopes.
///
/// Implementations must be `Send + Sync`; one source is shared by every
/// concurrent deployment task that uses the credential.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Short identifier of the source kind (e.g. "client_secret").
    fn name(&self) -> &str;

    /// Acquires a token for `scopes`.
    ///
    /// May perform network I/O or spawn a CLI process.
    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken>;
}

/// A token source that always returns the same pre-acquired token.
///
/// ```
/// use azauth::{AccessToken, StaticTokenSource, TokenSource};
/// use chrono::{Duration, Utc};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> azauth::Result<()> {
/// let source = StaticTokenSource::new(AccessToken::new("abc", Utc::now() + Duration::hours(1)));
/// let token = source.get_token(&["https://management.azure.com/.default"]).await?;
/// assert_eq!(token.token, "abc");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct StaticTokenSource {
    token: AccessToken,
}

impl StaticTokenSource {
    /// Wraps a token.
    pub fn new(token: AccessToken) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn get_token(&self, _scopes: &[&str]) -> Result<AccessToken> {
        if self.token.is_expired() {
            return Err(AuthError::Other(anyhow::anyhow!(
                "static token expired at {}",
                self.token.expires_on
            )));
        }
        Ok(self.token.clone())
    }
}

/// The recipe a token source is built from.
///
/// Carries the secret material, so its `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSpec {
    /// Service principal with a client secret
    ClientSecret {
        tenant: String,
        client: String,
        secret: String,
    },
    /// Service principal with a certificate (PEM or PKCS#12 bytes)
    ClientCertificate {
        tenant: String,
        client: String,
        certificate: Vec<u8>,
        password: Option<String>,
    },
    /// Managed identity; `client` selects a user-assigned identity
    ManagedIdentity { client: Option<String> },
    /// Refresh token redeemed by a known public client
    RefreshToken {
        tenant: Option<String>,
        client: TokenClient,
        refresh_token: String,
    },
    /// Existing Azure CLI login
    AzureCli { tenant: Option<String> },
    /// Interactive device code flow
    DeviceCode {
        tenant: Option<String>,
        client: TokenClient,
    },
}

impl CredentialSpec {
    /// Short identifier of the credential kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ClientSecret { .. } => "client_secret",
            Self::ClientCertificate { .. } => "client_certificate",
            Self::ManagedIdentity { .. } => "managed_identity",
            Self::RefreshToken { .. } => "refresh_token",
            Self::AzureCli { .. } => "azure_cli",
            Self::DeviceCode { .. } => "device_code",
        }
    }

    /// Tenant the credential is bound to, if any.
    pub fn tenant(&self) -> Option<&str> {
        match self {
            Self::ClientSecret { tenant, .. } | Self::ClientCertificate { tenant, .. } => {
                Some(tenant.as_str())
            }
            Self::RefreshToken { tenant, .. }
            | Self::AzureCli { tenant }
            | Self::DeviceCode { tenant, .. } => tenant.as_deref(),
            Self::ManagedIdentity { .. } => None,
        }
    }

    /// Same identity, issued by another tenant's authority.
    ///
    /// Managed identities cannot switch tenants and are returned unchanged.
    pub fn with_tenant(&self, tenant_id: &str) -> Self {
        let mut spec = self.clone();
        match &mut spec {
            Self::ClientSecret { tenant, .. } | Self::ClientCertificate { tenant, .. } => {
                *tenant = tenant_id.to_string();
            }
            Self::RefreshToken { tenant, .. }
            | Self::AzureCli { tenant }
            | Self::DeviceCode { tenant, .. } => {
                *tenant = Some(tenant_id.to_string());
            }
            Self::ManagedIdentity { .. } => {}
        }
        spec
    }
}

impl fmt::Debug for CredentialSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientSecret { tenant, client, .. } => f
                .debug_struct("ClientSecret")
                .field("tenant", tenant)
                .field("client", client)
                .field("secret", &"<redacted>")
                .finish(),
            Self::ClientCertificate {
                tenant,
                client,
                certificate,
                ..
            } => f
                .debug_struct("ClientCertificate")
                .field("tenant", tenant)
                .field("client", client)
                .field("certificate_len", &certificate.len())
                .finish_non_exhaustive(),
            Self::ManagedIdentity { client } => f
                .debug_struct("ManagedIdentity")
                .field("client", client)
                .finish(),
            Self::RefreshToken { tenant, client, .. } => f
                .debug_struct("RefreshToken")
                .field("tenant", tenant)
                .field("client", client)
                .field("refresh_token", &"<redacted>")
                .finish(),
            Self::AzureCli { tenant } => f.debug_struct("AzureCli").field("tenant", tenant).finish(),
            Self::DeviceCode { tenant, client } => f
                .debug_struct("DeviceCode")
                .field("tenant", tenant)
                .field("client", client)
                .finish(),
        }
    }
}

/// Everything an [`IdentityProvider`](crate::IdentityProvider) needs to build
/// a token source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRequest {
    /// What kind of credential, with its material
    pub spec: CredentialSpec,
    /// Target cloud
    pub environment: AzureEnvironment,
    /// Proxy for identity calls
    pub proxy: Option<ProxyConfig>,
}

impl CredentialRequest {
    /// Creates a request without a proxy.
    pub fn new(spec: CredentialSpec, environment: AzureEnvironment) -> Self {
        Self {
            spec,
            environment,
            proxy: None,
        }
    }

    /// Sets the proxy.
    pub fn with_proxy(mut self, proxy: Option<ProxyConfig>) -> Self {
        self.proxy = proxy;
        self
    }

    /// The same request against another tenant.
    pub fn with_tenant(&self, tenant_id: &str) -> Self {
        Self {
            spec: self.spec.with_tenant(tenant_id),
            environment: self.environment,
            proxy: self.proxy.clone(),
        }
    }
}

/// A resolved, validated credential.
///
/// Created once per successful resolution and never mutated; tenant-scoped
/// copies are derived with [`with_tenant`](Self::with_tenant).
#[derive(Clone)]
pub struct AzureCredentialWrapper {
    method: AuthMethod,
    token_source: Arc<dyn TokenSource>,
    environment: AzureEnvironment,
    tenant_id: Option<String>,
    request: CredentialRequest,
}

impl AzureCredentialWrapper {
    /// Wraps a token source built from `request`.
    ///
    /// The tenant id is taken from the request when the credential is
    /// inherently tenant-bound (e.g. a service principal).
    pub fn new(
        method: AuthMethod,
        token_source: Arc<dyn TokenSource>,
        request: CredentialRequest,
    ) -> Self {
        Self {
            method,
            token_source,
            environment: request.environment,
            tenant_id: request.spec.tenant().map(str::to_string),
            request,
        }
    }

    /// Method that produced this credential.
    pub fn method(&self) -> AuthMethod {
        self.method
    }

    /// The token capability.
    pub fn token_source(&self) -> &Arc<dyn TokenSource> {
        &self.token_source
    }

    /// Cloud this credential is bound to.
    pub fn environment(&self) -> AzureEnvironment {
        self.environment
    }

    /// Tenant this credential is bound to, if any.
    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    /// Recipe the token source was built from.
    pub fn request(&self) -> &CredentialRequest {
        &self.request
    }

    /// Acquires a token for `scopes`.
    pub async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken> {
        self.token_source.get_token(scopes).await
    }

    /// Acquires a token for the environment's Resource Manager scope.
    pub async fn management_token(&self) -> Result<AccessToken> {
        let scope = self.environment.management_scope();
        self.token_source.get_token(&[scope.as_str()]).await
    }

    /// Derives a copy bound to `tenant_id` using an already-built source.
    pub fn with_tenant(&self, tenant_id: &str, token_source: Arc<dyn TokenSource>) -> Self {
        Self {
            method: self.method,
            token_source,
            environment: self.environment,
            tenant_id: Some(tenant_id.to_string()),
            request: self.request.with_tenant(tenant_id),
        }
    }
}

impl fmt::Debug for AzureCredentialWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureCredentialWrapper")
            .field("method", &self.method)
            .field("token_source", &self.token_source.name())
            .field("environment", &self.environment)
            .field("tenant_id", &self.tenant_id)
            .finish()
    }
}
