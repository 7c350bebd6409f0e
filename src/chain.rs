//! Ordered chain of credential retrievers.

use crate::error::AggregateLoginError;
use crate::{AuthError, AuthMethod, AzureCredentialWrapper, CredentialRetriever, Result};

/// Tries retrievers in order and returns the first credential that works.
///
/// Retrievers run strictly one after another; the chain never starts a
/// later method while an earlier one is in flight, so interactive methods
/// never prompt unless everything before them failed.
///
/// # Example
///
/// ```no_run
/// use azauth::providers::mock::MockIdentityProvider;
/// use azauth::retrievers::{AzureCliRetriever, ManagedIdentityRetriever};
/// use azauth::{AzureEnvironment, ChainedCredentialRetriever};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> azauth::Result<()> {
///     let provider = Arc::new(MockIdentityProvider::new());
///     let chain = ChainedCredentialRetriever::default()
///         .with(AzureCliRetriever::new(None, AzureEnvironment::Azure, provider.clone()))
///         .with(ManagedIdentityRetriever::new(None, AzureEnvironment::Azure, provider));
///
///     let credential = chain.retrieve().await?;
///     println!("authenticated via {}", credential.method());
///     Ok(())
/// }
/// ```
#[derive(Default)]
pub struct ChainedCredentialRetriever {
    retrievers: Vec<Box<dyn CredentialRetriever>>,
}

impl ChainedCredentialRetriever {
    /// Creates a chain from retrievers in priority order.
    pub fn new(retrievers: Vec<Box<dyn CredentialRetriever>>) -> Self {
        Self { retrievers }
    }

    /// Appends a retriever.
    pub fn with<R: CredentialRetriever + 'static>(mut self, retriever: R) -> Self {
        self.retrievers.push(Box::new(retriever));
        self
    }

    /// Appends an already boxed retriever.
    pub fn push(&mut self, retriever: Box<dyn CredentialRetriever>) {
        self.retrievers.push(retriever);
    }

    /// Configured methods, in the order they will be tried.
    pub fn methods(&self) -> Vec<AuthMethod> {
        self.retrievers.iter().map(|r| r.method()).collect()
    }

    /// Number of retrievers.
    pub fn len(&self) -> usize {
        self.retrievers.len()
    }

    /// Returns true if the chain has no retrievers.
    pub fn is_empty(&self) -> bool {
        self.retrievers.is_empty()
    }

    /// Resolves a credential.
    ///
    /// # Errors
    ///
    /// - [`AuthError::NoRetrievers`]: the chain is empty
    /// - [`AuthError::EnvironmentMismatch`]: a retriever found a credential
    ///   bound to another cloud; later retrievers are not tried
    /// - [`AuthError::Aggregate`]: every retriever failed or did not apply
    pub async fn retrieve(&self) -> Result<AzureCredentialWrapper> {
        if self.retrievers.is_empty() {
            return Err(AuthError::NoRetrievers);
        }

        let mut aggregate = AggregateLoginError::default();

        for retriever in &self.retrievers {
            let method = retriever.method();
            tracing::debug!(%method, "trying authentication method");

            match retriever.retrieve().await {
                Ok(credential) => {
                    tracing::info!(
                        %method,
                        environment = %credential.environment(),
                        tenant = credential.tenant_id().unwrap_or(""),
                        "authenticated"
                    );
                    return Ok(credential);
                }
                Err(AuthError::NotApplicable { reason, .. }) => {
                    tracing::debug!(%method, %reason, "authentication method not applicable");
                    aggregate.skip(method, reason);
                }
                Err(e) if e.is_fatal() => {
                    tracing::debug!(%method, error = %e, "stopping credential chain");
                    return Err(e);
                }
                Err(e) => {
                    tracing::debug!(%method, error = %e, "authentication method failed");
                    aggregate.push(method, e);
                }
            }
        }

        Err(aggregate.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        AccessToken, AzureEnvironment, CredentialRequest, CredentialSpec, StaticTokenSource,
    };
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    enum Outcome {
        Succeed,
        Fail(&'static str),
        Skip,
        Mismatch,
    }

    struct Scripted {
        method: AuthMethod,
        outcome: Outcome,
        calls: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn new(method: AuthMethod, outcome: Outcome) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    method,
                    outcome,
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl CredentialRetriever for Scripted {
        fn method(&self) -> AuthMethod {
            self.method
        }

        async fn retrieve(&self) -> Result<AzureCredentialWrapper> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outcome {
                Outcome::Succeed => {
                    let source = Arc::new(StaticTokenSource::new(AccessToken::new(
                        self.method.to_string(),
                        Utc::now() + Duration::hours(1),
                    )));
                    let request = CredentialRequest::new(
                        CredentialSpec::AzureCli { tenant: None },
                        AzureEnvironment::Azure,
                    );
                    Ok(AzureCredentialWrapper::new(self.method, source, request))
                }
                Outcome::Fail(reason) => Err(AuthError::login_reason(self.method, reason)),
                Outcome::Skip => Err(AuthError::NotApplicable {
                    method: self.method,
                    reason: "nothing here".to_string(),
                }),
                Outcome::Mismatch => Err(AuthError::EnvironmentMismatch {
                    requested: AzureEnvironment::Azure,
                    found: AzureEnvironment::AzureChina,
                    origin: "azure-secret.json".to_string(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn test_empty_chain() {
        let chain = ChainedCredentialRetriever::default();
        assert!(chain.is_empty());
        assert!(matches!(chain.retrieve().await, Err(AuthError::NoRetrievers)));
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let (first, first_calls) = Scripted::new(AuthMethod::ServicePrincipal, Outcome::Fail("bad"));
        let (second, second_calls) = Scripted::new(AuthMethod::AzureCli, Outcome::Succeed);
        let (third, third_calls) = Scripted::new(AuthMethod::ManagedIdentity, Outcome::Succeed);
        let chain = ChainedCredentialRetriever::default()
            .with(first)
            .with(second)
            .with(third);

        let credential = chain.retrieve().await.unwrap();
        assert_eq!(credential.method(), AuthMethod::AzureCli);
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
        assert_eq!(third_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exhaustion_keeps_attempt_order() {
        let (a, _) = Scripted::new(AuthMethod::ServicePrincipal, Outcome::Fail("expired certificate"));
        let (b, _) = Scripted::new(AuthMethod::AzureCli, Outcome::Fail("not logged in"));
        let (c, _) = Scripted::new(AuthMethod::ManagedIdentity, Outcome::Fail("no endpoint"));
        let chain = ChainedCredentialRetriever::new(vec![Box::new(a), Box::new(b), Box::new(c)]);

        match chain.retrieve().await {
            Err(AuthError::Aggregate(aggregate)) => {
                assert_eq!(aggregate.len(), 3);
                assert_eq!(
                    aggregate.methods(),
                    vec![
                        AuthMethod::ServicePrincipal,
                        AuthMethod::AzureCli,
                        AuthMethod::ManagedIdentity
                    ]
                );
                assert!(aggregate.to_string().contains("expired certificate"));
            }
            other => panic!("expected aggregate error, got {:?}", other.map(|c| c.method())),
        }
    }

    #[tokio::test]
    async fn test_not_applicable_is_skipped() {
        let (skip, _) = Scripted::new(AuthMethod::SecretFile, Outcome::Skip);
        let (fail, _) = Scripted::new(AuthMethod::AzureCli, Outcome::Fail("not logged in"));
        let chain = ChainedCredentialRetriever::default().with(skip).with(fail);

        match chain.retrieve().await {
            Err(AuthError::Aggregate(aggregate)) => {
                assert_eq!(aggregate.methods(), vec![AuthMethod::AzureCli]);
                assert_eq!(aggregate.skipped().len(), 1);
                assert_eq!(aggregate.skipped()[0].0, AuthMethod::SecretFile);
            }
            _ => panic!("expected aggregate error"),
        }
    }

    #[tokio::test]
    async fn test_environment_mismatch_stops_chain() {
        let (mismatch, _) = Scripted::new(AuthMethod::SecretFile, Outcome::Mismatch);
        let (after, after_calls) = Scripted::new(AuthMethod::AzureCli, Outcome::Succeed);
        let chain = ChainedCredentialRetriever::default().with(mismatch).with(after);

        let err = chain.retrieve().await.unwrap_err();
        assert!(matches!(err, AuthError::EnvironmentMismatch { .. }));
        assert_eq!(after_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_methods_in_order() {
        let (a, _) = Scripted::new(AuthMethod::RefreshToken, Outcome::Succeed);
        let (b, _) = Scripted::new(AuthMethod::DeviceCode, Outcome::Succeed);
        let mut chain = ChainedCredentialRetriever::default().with(a);
        chain.push(Box::new(b));

        assert_eq!(chain.len(), 2);
        assert_eq!(
            chain.methods(),
            vec![AuthMethod::RefreshToken, AuthMethod::DeviceCode]
        );
    }
}
