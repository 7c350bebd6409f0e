//! Mock identity provider and management client for testing.
//!
//! Both keep everything in memory, record what they were asked for, and
//! support error injection to simulate failure conditions.

use crate::manager::{ManagementClient, Subscription};
use crate::*;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Mock identity provider.
///
/// Every token source it builds returns `mock-<kind>-<tenant>` tokens valid
/// for one hour (`common` when the request has no tenant).
///
/// # Example
///
/// ```
/// use azauth::providers::mock::MockIdentityProvider;
/// use azauth::retrievers::ManagedIdentityRetriever;
/// use azauth::{AzureEnvironment, CredentialRetriever};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() {
///     let provider = Arc::new(
///         MockIdentityProvider::new().fail_token("managed_identity", "no IMDS endpoint"),
///     );
///     let retriever = ManagedIdentityRetriever::new(None, AzureEnvironment::Azure, provider.clone());
///
///     assert!(retriever.retrieve().await.is_err());
///     assert_eq!(provider.create_count(), 1);
/// }
/// ```
#[derive(Default)]
pub struct MockIdentityProvider {
    create_errors: HashMap<String, String>,
    token_errors: HashMap<String, String>,
    delay: Option<std::time::Duration>,
    requests: Mutex<Vec<CredentialRequest>>,
    token_calls: Arc<AtomicUsize>,
}

impl MockIdentityProvider {
    /// Creates a provider that succeeds for every credential kind.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `create` fail for credential `kind` (see [`CredentialSpec::kind`]).
    pub fn fail_create(mut self, kind: &str, reason: impl Into<String>) -> Self {
        self.create_errors.insert(kind.to_string(), reason.into());
        self
    }

    /// Makes token acquisition fail for sources of credential `kind`.
    pub fn fail_token(mut self, kind: &str, reason: impl Into<String>) -> Self {
        self.token_errors.insert(kind.to_string(), reason.into());
        self
    }

    /// Delays every `create` call, to exercise concurrency and cancellation.
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received by `create`, in call order.
    pub fn requests(&self) -> Vec<CredentialRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of `create` calls.
    pub fn create_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of `get_token` calls across every source built so far.
    pub fn token_count(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn create(&self, request: &CredentialRequest) -> Result<Arc<dyn TokenSource>> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let kind = request.spec.kind();
        if let Some(reason) = self.create_errors.get(kind) {
            return Err(AuthError::Other(anyhow::anyhow!("{}", reason)));
        }

        Ok(Arc::new(MockTokenSource {
            kind,
            token: format!(
                "mock-{}-{}",
                kind,
                request.spec.tenant().unwrap_or("common")
            ),
            error: self.token_errors.get(kind).cloned(),
            calls: self.token_calls.clone(),
        }))
    }
}

/// Token source built by [`MockIdentityProvider`].
pub struct MockTokenSource {
    kind: &'static str,
    token: String,
    error: Option<String>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl TokenSource for MockTokenSource {
    fn name(&self) -> &str {
        self.kind
    }

    async fn get_token(&self, _scopes: &[&str]) -> Result<AccessToken> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ref reason) = self.error {
            return Err(AuthError::Other(anyhow::anyhow!("{}", reason)));
        }
        Ok(AccessToken::new(
            self.token.clone(),
            Utc::now() + Duration::hours(1),
        ))
    }
}

/// Mock management client.
///
/// Tenants and subscriptions are fixtures; token sources passed in are
/// exercised once per call so a broken credential surfaces as an error.
#[derive(Default)]
pub struct MockManagementClient {
    tenants: Vec<String>,
    subscriptions: HashMap<String, Vec<Subscription>>,
    failing_tenants: HashSet<String>,

    /// Error message to return from `list_tenants()`
    pub tenant_error: Option<String>,

    tenant_calls: AtomicUsize,
    subscription_calls: AtomicUsize,
}

impl MockManagementClient {
    /// Creates a client with no tenants.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tenant with its subscriptions.
    pub fn with_tenant(
        mut self,
        tenant_id: impl Into<String>,
        subscriptions: &[(&str, &str)],
    ) -> Self {
        let tenant_id = tenant_id.into();
        let subscriptions = subscriptions
            .iter()
            .map(|(id, name)| Subscription::new(*id, *name, tenant_id.clone()))
            .collect();
        self.tenants.push(tenant_id.clone());
        self.subscriptions.insert(tenant_id, subscriptions);
        self
    }

    /// Makes subscription listing fail for `tenant_id`.
    pub fn fail_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.failing_tenants.insert(tenant_id.into());
        self
    }

    /// Number of `list_tenants` calls.
    pub fn tenant_calls(&self) -> usize {
        self.tenant_calls.load(Ordering::SeqCst)
    }

    /// Number of `list_subscriptions` calls.
    pub fn subscription_calls(&self) -> usize {
        self.subscription_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ManagementClient for MockManagementClient {
    async fn list_tenants(
        &self,
        token_source: &dyn TokenSource,
        environment: AzureEnvironment,
    ) -> Result<Vec<String>> {
        self.tenant_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ref reason) = self.tenant_error {
            return Err(AuthError::Other(anyhow::anyhow!("{}", reason)));
        }

        let scope = environment.management_scope();
        token_source.get_token(&[scope.as_str()]).await?;
        Ok(self.tenants.clone())
    }

    async fn list_subscriptions(
        &self,
        token_source: &dyn TokenSource,
        environment: AzureEnvironment,
        tenant_id: &str,
    ) -> Result<Vec<Subscription>> {
        self.subscription_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_tenants.contains(tenant_id) {
            return Err(AuthError::Other(anyhow::anyhow!(
                "AuthorizationFailed for tenant {}",
                tenant_id
            )));
        }

        let scope = environment.management_scope();
        token_source.get_token(&[scope.as_str()]).await?;
        Ok(self
            .subscriptions
            .get(tenant_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(tenant: Option<&str>) -> CredentialRequest {
        CredentialRequest::new(
            CredentialSpec::AzureCli {
                tenant: tenant.map(str::to_string),
            },
            AzureEnvironment::Azure,
        )
    }

    #[tokio::test]
    async fn test_mock_tokens_name_kind_and_tenant() {
        let provider = MockIdentityProvider::new();

        let source = provider.create(&request(Some("t1"))).await.unwrap();
        assert_eq!(source.name(), "azure_cli");
        assert_eq!(source.get_token(&["scope"]).await.unwrap().token, "mock-azure_cli-t1");

        let source = provider.create(&request(None)).await.unwrap();
        assert_eq!(
            source.get_token(&["scope"]).await.unwrap().token,
            "mock-azure_cli-common"
        );

        assert_eq!(provider.create_count(), 2);
        assert_eq!(provider.token_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_error_injection() {
        let provider = MockIdentityProvider::new()
            .fail_create("client_secret", "bad tenant")
            .fail_token("azure_cli", "not logged in");

        let secret = CredentialRequest::new(
            CredentialSpec::ClientSecret {
                tenant: "t".to_string(),
                client: "c".to_string(),
                secret: "s".to_string(),
            },
            AzureEnvironment::Azure,
        );
        assert!(provider.create(&secret).await.is_err());

        let source = provider.create(&request(None)).await.unwrap();
        let err = source.get_token(&["scope"]).await.unwrap_err();
        assert!(err.to_string().contains("not logged in"));
    }

    #[tokio::test]
    async fn test_mock_management_client() {
        let provider = MockIdentityProvider::new();
        let source = provider.create(&request(None)).await.unwrap();
        let client = MockManagementClient::new()
            .with_tenant("t1", &[("s1", "Dev")])
            .fail_tenant("t2");

        let tenants = client
            .list_tenants(source.as_ref(), AzureEnvironment::Azure)
            .await
            .unwrap();
        assert_eq!(tenants, vec!["t1".to_string()]);

        let subscriptions = client
            .list_subscriptions(source.as_ref(), AzureEnvironment::Azure, "t1")
            .await
            .unwrap();
        assert_eq!(subscriptions[0].display_name, "Dev");

        assert!(client
            .list_subscriptions(source.as_ref(), AzureEnvironment::Azure, "t2")
            .await
            .is_err());
        assert_eq!(client.subscription_calls(), 2);
    }
}
