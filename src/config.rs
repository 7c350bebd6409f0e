//! Configuration types for credential resolution.

use crate::{AzureEnvironment, Result};
use serde::{Deserialize, Deserializer};
use std::fmt;

/// Well-known public client id of the Azure CLI, used for developer logins.
pub const DEVELOPER_CLIENT_ID: &str = "04b07795-8ddb-461a-bbee-02f9e1bf7b46";

/// Well-known public client id of the VS Code Azure Account extension.
pub const EDITOR_CLIENT_ID: &str = "aebc6443-996d-45c2-90f0-388ff96faa56";

/// Authentication method identifier.
///
/// Each variant corresponds to one [`CredentialRetriever`](crate::CredentialRetriever)
/// implementation under [`retrievers`](crate::retrievers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Client id plus secret or certificate
    ServicePrincipal,
    /// Identity assigned to Azure-hosted compute
    ManagedIdentity,
    /// Legacy `azure-secret.json` written by an external login tool
    SecretFile,
    /// Refresh token obtained by an external interactive login
    RefreshToken,
    /// Existing Azure CLI login session
    AzureCli,
    /// Interactive device code flow
    DeviceCode,
}

impl AuthMethod {
    /// Order used when the caller expresses no preference.
    ///
    /// Explicit configuration comes first, interactive prompting last.
    pub fn default_order() -> &'static [AuthMethod] {
        &[
            Self::ServicePrincipal,
            Self::SecretFile,
            Self::AzureCli,
            Self::RefreshToken,
            Self::ManagedIdentity,
            Self::DeviceCode,
        ]
    }

    /// Returns true for methods that prompt the user.
    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::DeviceCode)
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServicePrincipal => write!(f, "service_principal"),
            Self::ManagedIdentity => write!(f, "managed_identity"),
            Self::SecretFile => write!(f, "secret_file"),
            Self::RefreshToken => write!(f, "refresh_token"),
            Self::AzureCli => write!(f, "azure_cli"),
            Self::DeviceCode => write!(f, "device_code"),
        }
    }
}

/// Public client a refresh token was issued to.
///
/// A refresh token can only be redeemed by the client it was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenClient {
    /// Azure CLI / generic developer client
    #[default]
    Developer,
    /// Editor/IDE extension client
    Editor,
}

impl TokenClient {
    /// The OAuth client id for this client.
    pub fn client_id(&self) -> &'static str {
        match self {
            Self::Developer => DEVELOPER_CLIENT_ID,
            Self::Editor => EDITOR_CLIENT_ID,
        }
    }
}

/// HTTP proxy used for identity and management calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Proxy host name
    pub host: String,
    /// Proxy port
    pub port: u16,
}

impl ProxyConfig {
    /// Proxy URL in `http://host:port` form.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// One authentication attempt's configuration.
///
/// Built by the caller (or deserialized from the camelCase shape configuration
/// loaders produce), validated with [`validate`](crate::validation::validate),
/// then treated as immutable.
///
/// ```
/// use azauth::AuthConfiguration;
///
/// let config = AuthConfiguration::new()
///     .with_tenant("t1")
///     .with_client("c1")
///     .with_key("s1")
///     .with_proxy("proxy.internal", "3128");
///
/// assert_eq!(config.tenant(), Some("t1"));
/// assert_eq!(config.proxy().unwrap().port, 3128);
/// ```
#[derive(Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthConfiguration {
    /// Tenant (directory) id
    pub tenant: Option<String>,

    /// Client (application) id
    pub client: Option<String>,

    /// Client secret
    pub key: Option<String>,

    /// Path to a PEM or PKCS#12 certificate
    pub certificate: Option<String>,

    /// Password protecting the certificate
    pub certificate_password: Option<String>,

    /// Cloud environment name
    pub environment: Option<String>,

    /// Id of the external secret store entry this configuration came from
    pub server_id: Option<String>,

    /// HTTP proxy host
    pub http_proxy_host: Option<String>,

    /// HTTP proxy port, kept as text so bad input can be reported
    #[serde(deserialize_with = "string_or_number")]
    pub http_proxy_port: Option<String>,

    /// Refresh token obtained by an external login tool
    pub refresh_token: Option<String>,

    /// Client the refresh token was issued to
    pub refresh_token_client: TokenClient,

    /// Allow interactive methods during automatic resolution
    pub allow_interactive: bool,
}

impl AuthConfiguration {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from the conventional `AZURE_*` variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            tenant: lookup("AZURE_TENANT_ID"),
            client: lookup("AZURE_CLIENT_ID"),
            key: lookup("AZURE_CLIENT_SECRET"),
            certificate: lookup("AZURE_CLIENT_CERTIFICATE_PATH"),
            certificate_password: lookup("AZURE_CLIENT_CERTIFICATE_PASSWORD"),
            environment: lookup("AZURE_ENVIRONMENT"),
            ..Default::default()
        }
    }

    /// Sets the tenant id.
    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    /// Sets the client id.
    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = Some(client.into());
        self
    }

    /// Sets the client secret.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the certificate path.
    pub fn with_certificate(mut self, path: impl Into<String>) -> Self {
        self.certificate = Some(path.into());
        self
    }

    /// Sets the certificate password.
    pub fn with_certificate_password(mut self, password: impl Into<String>) -> Self {
        self.certificate_password = Some(password.into());
        self
    }

    /// Sets the cloud environment name.
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Records the secret store entry this configuration was read from.
    pub fn with_server_id(mut self, server_id: impl Into<String>) -> Self {
        self.server_id = Some(server_id.into());
        self
    }

    /// Sets the HTTP proxy.
    pub fn with_proxy(mut self, host: impl Into<String>, port: impl Into<String>) -> Self {
        self.http_proxy_host = Some(host.into());
        self.http_proxy_port = Some(port.into());
        self
    }

    /// Sets a refresh token and the client it was issued to.
    pub fn with_refresh_token(mut self, token: impl Into<String>, client: TokenClient) -> Self {
        self.refresh_token = Some(token.into());
        self.refresh_token_client = client;
        self
    }

    /// Allows or forbids interactive methods in automatic resolution.
    pub fn with_interactive(mut self, allow: bool) -> Self {
        self.allow_interactive = allow;
        self
    }

    /// Tenant id, if set and not blank.
    pub fn tenant(&self) -> Option<&str> {
        non_blank(&self.tenant)
    }

    /// Client id, if set and not blank.
    pub fn client(&self) -> Option<&str> {
        non_blank(&self.client)
    }

    /// Client secret, if set and not blank.
    pub fn key(&self) -> Option<&str> {
        non_blank(&self.key)
    }

    /// Certificate path, if set and not blank.
    pub fn certificate(&self) -> Option<&str> {
        non_blank(&self.certificate)
    }

    /// Certificate password, if set and not blank.
    pub fn certificate_password(&self) -> Option<&str> {
        non_blank(&self.certificate_password)
    }

    /// Refresh token, if set and not blank.
    pub fn refresh_token(&self) -> Option<&str> {
        non_blank(&self.refresh_token)
    }

    /// Server id, if set and not blank.
    pub fn server_id(&self) -> Option<&str> {
        non_blank(&self.server_id)
    }

    /// Returns true if secret material for a service principal is present.
    pub fn requests_service_principal(&self) -> bool {
        self.key().is_some() || self.certificate().is_some()
    }

    /// Returns true if tenant, client and a secret or certificate are all present.
    pub fn has_complete_service_principal(&self) -> bool {
        self.tenant().is_some() && self.client().is_some() && self.requests_service_principal()
    }

    /// Parses the explicitly requested environment.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnknownEnvironment`](crate::AuthError::UnknownEnvironment)
    /// if the name is not a known cloud.
    pub fn requested_environment(&self) -> Result<Option<AzureEnvironment>> {
        non_blank(&self.environment)
            .map(str::parse::<AzureEnvironment>)
            .transpose()
    }

    /// Parses the proxy settings; `None` unless both host and a valid port are set.
    pub fn proxy(&self) -> Option<ProxyConfig> {
        let host = non_blank(&self.http_proxy_host)?;
        let port = non_blank(&self.http_proxy_port)?.parse::<u16>().ok()?;
        if port == 0 {
            return None;
        }
        Some(ProxyConfig {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Debug for AuthConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfiguration")
            .field("tenant", &self.tenant)
            .field("client", &self.client)
            .field("key", &redacted(&self.key))
            .field("certificate", &self.certificate)
            .field("certificate_password", &redacted(&self.certificate_password))
            .field("environment", &self.environment)
            .field("server_id", &self.server_id)
            .field("http_proxy_host", &self.http_proxy_host)
            .field("http_proxy_port", &self.http_proxy_port)
            .field("refresh_token", &redacted(&self.refresh_token))
            .field("refresh_token_client", &self.refresh_token_client)
            .field("allow_interactive", &self.allow_interactive)
            .finish()
    }
}

/// Returns the trimmed value when it is present and not blank.
pub(crate) fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn redacted(value: &Option<String>) -> Option<&'static str> {
    value.as_ref().map(|_| "<redacted>")
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    }))
}
