//! Tenant and subscription enumeration on top of a resolved credential.
//!
//! A [`TokenCredentialManager`] wraps the root [`AzureCredentialWrapper`] for
//! one session. It lists tenants and subscriptions through a
//! [`ManagementClient`] and derives tenant-scoped token sources through the
//! [`IdentityProvider`] that built the root credential.
//!
//! Every lookup is populated at most once, successes and failures alike.
//! Concurrent callers asking for the same entry wait for a single in-flight
//! population. A population whose future is dropped (for example by
//! `tokio::time::timeout`) leaves its entry empty, so the next caller starts
//! over.

use crate::{
    AuthError, AzureCredentialWrapper, AzureEnvironment, IdentityProvider, Result, TokenSource,
};
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;

/// An Azure subscription visible to the credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    /// Subscription id
    #[serde(alias = "subscriptionId")]
    pub id: String,
    /// Human readable name
    pub display_name: String,
    /// Tenant the subscription belongs to
    pub tenant_id: String,
    /// Lifecycle state (e.g. "Enabled")
    #[serde(default)]
    pub state: Option<String>,
}

impl Subscription {
    /// Creates an enabled subscription.
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            tenant_id: tenant_id.into(),
            state: Some("Enabled".to_string()),
        }
    }
}

/// Resource Manager calls needed for enumeration.
#[async_trait]
pub trait ManagementClient: Send + Sync {
    /// Lists the tenant ids the token source's identity can access.
    async fn list_tenants(
        &self,
        token_source: &dyn TokenSource,
        environment: AzureEnvironment,
    ) -> Result<Vec<String>>;

    /// Lists the subscriptions of `tenant_id` using a source issued by that tenant.
    async fn list_subscriptions(
        &self,
        token_source: &dyn TokenSource,
        environment: AzureEnvironment,
        tenant_id: &str,
    ) -> Result<Vec<Subscription>>;
}

type Shared<T> = std::result::Result<T, Arc<AuthError>>;
type TenantCell = Arc<OnceCell<Shared<Arc<dyn TokenSource>>>>;

/// Session-scoped cache of tenants, subscriptions and tenant credentials.
///
/// Failures are cached and returned as [`AuthError::Cached`], so every
/// caller observes the same error without a second remote call.
///
/// # Example
///
/// ```no_run
/// use azauth::providers::mock::{MockIdentityProvider, MockManagementClient};
/// use azauth::{resolve, AuthConfiguration, TokenCredentialManager};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> azauth::Result<()> {
///     let provider = Arc::new(MockIdentityProvider::new());
///     let root = resolve(&AuthConfiguration::new(), &[], provider.clone()).await?;
///
///     let management = Arc::new(MockManagementClient::new().with_tenant("t1", &[("s1", "Dev")]));
///     let manager = TokenCredentialManager::new(root, provider, management);
///
///     for subscription in manager.list_subscriptions().await? {
///         println!("{} ({})", subscription.display_name, subscription.tenant_id);
///     }
///     Ok(())
/// }
/// ```
pub struct TokenCredentialManager {
    root: AzureCredentialWrapper,
    provider: Arc<dyn IdentityProvider>,
    management: Arc<dyn ManagementClient>,
    tenants: OnceCell<Shared<Vec<String>>>,
    tenant_sources: Mutex<HashMap<String, TenantCell>>,
    subscriptions: OnceCell<Shared<Vec<Subscription>>>,
}

impl TokenCredentialManager {
    /// Wraps a resolved root credential.
    pub fn new(
        root: AzureCredentialWrapper,
        provider: Arc<dyn IdentityProvider>,
        management: Arc<dyn ManagementClient>,
    ) -> Self {
        Self {
            root,
            provider,
            management,
            tenants: OnceCell::new(),
            tenant_sources: Mutex::new(HashMap::new()),
            subscriptions: OnceCell::new(),
        }
    }

    /// The credential this manager was created from.
    pub fn root(&self) -> &AzureCredentialWrapper {
        &self.root
    }

    /// Tenants visible to the root credential.
    ///
    /// The listing is made with the root credential as resolved, not with a
    /// tenant-agnostic `common` authority. A credential bound to one tenant,
    /// such as a service principal, only sees the tenants that tenant's
    /// token is allowed to enumerate (usually just itself).
    pub async fn list_tenants(&self) -> Result<Vec<String>> {
        let result = self
            .tenants
            .get_or_init(|| async {
                tracing::debug!(method = %self.root.method(), "listing tenants");
                self.management
                    .list_tenants(self.root.token_source().as_ref(), self.root.environment())
                    .await
                    .map_err(share)
            })
            .await;
        from_shared(result)
    }

    /// Token source issued by `tenant_id`.
    ///
    /// Reuses the root source when the root credential is already bound to
    /// that tenant; otherwise derives one from the root recipe once per
    /// tenant. Different tenants never wait on each other.
    pub async fn credential_for_tenant(&self, tenant_id: &str) -> Result<Arc<dyn TokenSource>> {
        if self.root.tenant_id() == Some(tenant_id) {
            return Ok(self.root.token_source().clone());
        }

        let cell = self
            .tenant_sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(tenant_id.to_string())
            .or_default()
            .clone();

        let result = cell
            .get_or_init(|| async {
                tracing::debug!(
                    tenant = tenant_id,
                    method = %self.root.method(),
                    "deriving tenant credential"
                );
                let request = self.root.request().with_tenant(tenant_id);
                self.provider.create(&request).await.map_err(share)
            })
            .await;
        from_shared(result)
    }

    /// Root credential re-bound to `tenant_id`.
    pub async fn wrapper_for_tenant(&self, tenant_id: &str) -> Result<AzureCredentialWrapper> {
        let source = self.credential_for_tenant(tenant_id).await?;
        Ok(self.root.with_tenant(tenant_id, source))
    }

    /// Subscriptions across every visible tenant, de-duplicated by id
    /// (ignoring ASCII case). The first tenant listing an id wins.
    ///
    /// Tenants whose credential or listing fails are logged and skipped.
    pub async fn list_subscriptions(&self) -> Result<Vec<Subscription>> {
        let result = self
            .subscriptions
            .get_or_init(|| async {
                let tenants = self.list_tenants().await.map_err(share)?;
                let environment = self.root.environment();

                let listings = join_all(tenants.iter().map(|tenant| async move {
                    let source = self.credential_for_tenant(tenant).await?;
                    self.management
                        .list_subscriptions(source.as_ref(), environment, tenant)
                        .await
                }))
                .await;

                let mut seen = HashSet::new();
                let mut subscriptions = Vec::new();
                for (tenant, listing) in tenants.iter().zip(listings) {
                    match listing {
                        Ok(list) => {
                            for subscription in list {
                                if seen.insert(subscription_key(&subscription.id)) {
                                    subscriptions.push(subscription);
                                }
                            }
                        }
                        Err(e) => {
                            tracing::warn!(
                                tenant = %tenant,
                                error = %e,
                                "skipping tenant; cannot list subscriptions"
                            );
                        }
                    }
                }
                Ok::<_, Arc<AuthError>>(subscriptions)
            })
            .await;
        from_shared(result)
    }

    /// Looks up one subscription by id, ignoring ASCII case.
    pub async fn subscription(&self, id: &str) -> Result<Option<Subscription>> {
        let key = subscription_key(id);
        Ok(self
            .list_subscriptions()
            .await?
            .into_iter()
            .find(|s| subscription_key(&s.id) == key))
    }
}

// Subscription ids are GUIDs; ARM does not preserve their case consistently.
fn subscription_key(id: &str) -> String {
    id.to_ascii_lowercase()
}

fn share(err: AuthError) -> Arc<AuthError> {
    match err {
        AuthError::Cached(inner) => inner,
        other => Arc::new(other),
    }
}

fn from_shared<T: Clone>(result: &Shared<T>) -> Result<T> {
    result.clone().map_err(AuthError::Cached)
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::providers::mock::{MockIdentityProvider, MockManagementClient};
    use crate::{
        AccessToken, AuthMethod, CredentialRequest, CredentialSpec, StaticTokenSource,
    };
    use chrono::{Duration, Utc};
    use std::time::Duration as StdDuration;

    fn root() -> AzureCredentialWrapper {
        let request = CredentialRequest::new(
            CredentialSpec::ClientSecret {
                tenant: "t1".to_string(),
                client: "c1".to_string(),
                secret: "s1".to_string(),
            },
            AzureEnvironment::Azure,
        );
        let source = Arc::new(StaticTokenSource::new(AccessToken::new(
            "root",
            Utc::now() + Duration::hours(1),
        )));
        AzureCredentialWrapper::new(AuthMethod::ServicePrincipal, source, request)
    }

    fn manager(
        provider: Arc<MockIdentityProvider>,
        management: Arc<MockManagementClient>,
    ) -> TokenCredentialManager {
        TokenCredentialManager::new(root(), provider, management)
    }

    #[tokio::test]
    async fn test_list_tenants_is_memoized() {
        let management = Arc::new(
            MockManagementClient::new()
                .with_tenant("t1", &[])
                .with_tenant("t2", &[]),
        );
        let manager = manager(Arc::new(MockIdentityProvider::new()), management.clone());

        assert_eq!(manager.list_tenants().await.unwrap(), vec!["t1", "t2"]);
        assert_eq!(manager.list_tenants().await.unwrap(), vec!["t1", "t2"]);
        assert_eq!(management.tenant_calls(), 1);
    }

    #[tokio::test]
    async fn test_tenant_failure_is_cached() {
        let mut management = MockManagementClient::new();
        management.tenant_error = Some("AuthorizationFailed".to_string());
        let management = Arc::new(management);
        let manager = manager(Arc::new(MockIdentityProvider::new()), management.clone());

        let first = manager.list_tenants().await.unwrap_err();
        let second = manager.list_tenants().await.unwrap_err();

        assert!(matches!(second, AuthError::Cached(_)));
        assert_eq!(first.to_string(), second.to_string());
        assert_eq!(management.tenant_calls(), 1);

        assert!(manager.list_subscriptions().await.is_err());
        assert_eq!(management.tenant_calls(), 1);
    }

    #[tokio::test]
    async fn test_root_tenant_reuses_root_source() {
        let provider = Arc::new(MockIdentityProvider::new());
        let manager = manager(provider.clone(), Arc::new(MockManagementClient::new()));

        let source = manager.credential_for_tenant("t1").await.unwrap();
        assert_eq!(source.get_token(&["scope"]).await.unwrap().token, "root");
        assert_eq!(provider.create_count(), 0);
    }

    #[tokio::test]
    async fn test_derived_tenant_credential() {
        let provider = Arc::new(MockIdentityProvider::new());
        let manager = manager(provider.clone(), Arc::new(MockManagementClient::new()));

        let wrapper = manager.wrapper_for_tenant("t2").await.unwrap();
        assert_eq!(wrapper.tenant_id(), Some("t2"));
        assert_eq!(wrapper.method(), AuthMethod::ServicePrincipal);
        assert_eq!(
            wrapper.management_token().await.unwrap().token,
            "mock-client_secret-t2"
        );

        manager.credential_for_tenant("t2").await.unwrap();
        assert_eq!(provider.create_count(), 1);
        assert_eq!(provider.requests()[0].spec.tenant(), Some("t2"));
        assert_eq!(manager.root().tenant_id(), Some("t1"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_derivation_is_single_flight() {
        let provider =
            Arc::new(MockIdentityProvider::new().with_delay(StdDuration::from_millis(50)));
        let manager = Arc::new(manager(provider.clone(), Arc::new(MockManagementClient::new())));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.credential_for_tenant("t2").await.is_ok() })
            })
            .collect();

        for task in join_all(tasks).await {
            assert!(task.unwrap());
        }
        assert_eq!(provider.create_count(), 1);
    }

    #[tokio::test]
    async fn test_derivation_failure_is_cached() {
        let provider = Arc::new(MockIdentityProvider::new().fail_create("client_secret", "AADSTS90002"));
        let manager = manager(provider.clone(), Arc::new(MockManagementClient::new()));

        assert!(manager.credential_for_tenant("t2").await.is_err());
        let err = match manager.credential_for_tenant("t2").await {
            Err(e) => e,
            Ok(_) => panic!("cached failure should be returned again"),
        };
        assert!(matches!(err, AuthError::Cached(_)));
        assert!(err.to_string().contains("AADSTS90002"));
        assert_eq!(provider.create_count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_derivation_leaves_cache_empty() {
        let provider =
            Arc::new(MockIdentityProvider::new().with_delay(StdDuration::from_millis(100)));
        let manager = manager(provider.clone(), Arc::new(MockManagementClient::new()));

        let cancelled = tokio::time::timeout(
            StdDuration::from_millis(10),
            manager.credential_for_tenant("t2"),
        )
        .await;
        assert!(cancelled.is_err());

        manager.credential_for_tenant("t2").await.unwrap();
        assert_eq!(provider.create_count(), 2);
    }

    #[tokio::test]
    async fn test_list_subscriptions_skips_failing_tenants_and_dedupes() {
        let provider = Arc::new(MockIdentityProvider::new());
        let management = Arc::new(
            MockManagementClient::new()
                .with_tenant("t1", &[("s1", "Dev"), ("s2", "Shared")])
                .with_tenant("t2", &[("s2", "Shared"), ("s3", "Prod")])
                .with_tenant("t3", &[("s4", "Hidden")])
                .fail_tenant("t3"),
        );
        let manager = manager(provider.clone(), management.clone());

        let ids: Vec<_> = manager
            .list_subscriptions()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["s1", "s2", "s3"]);

        manager.list_subscriptions().await.unwrap();
        assert_eq!(management.subscription_calls(), 3);
        assert_eq!(management.tenant_calls(), 1);

        let prod = manager.subscription("S3").await.unwrap().unwrap();
        assert_eq!(prod.tenant_id, "t2");
        assert!(manager.subscription("s4").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_subscription_ids_ignore_case() {
        let management = Arc::new(
            MockManagementClient::new()
                .with_tenant("t1", &[("AB12-CD", "Dev")])
                .with_tenant("t2", &[("ab12-cd", "Dev again"), ("ef34", "Prod")]),
        );
        let manager = manager(Arc::new(MockIdentityProvider::new()), management);

        let subscriptions = manager.list_subscriptions().await.unwrap();
        assert_eq!(subscriptions.len(), 2);
        assert_eq!(subscriptions[0].id, "AB12-CD");
        assert_eq!(subscriptions[0].tenant_id, "t1");

        let found = manager.subscription("Ab12-Cd").await.unwrap().unwrap();
        assert_eq!(found.display_name, "Dev");
        assert!(manager.subscription("EF34").await.unwrap().is_some());
    }

    #[test]
    fn test_subscription_deserialize() {
        let subscription: Subscription = serde_json::from_str(
            r#"{"subscriptionId": "s1", "displayName": "Dev", "tenantId": "t1", "state": "Enabled"}"#,
        )
        .unwrap();
        assert_eq!(subscription, Subscription::new("s1", "Dev", "t1"));
    }
}
