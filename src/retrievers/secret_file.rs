//! Legacy secret file retriever.

use crate::retriever::acquire_validated;
use crate::secret_file::SecretFileStore;
use crate::{
    AuthError, AuthMethod, AzureCredentialWrapper, AzureEnvironment, CredentialRequest,
    CredentialRetriever, CredentialSpec, IdentityProvider, ProxyConfig, Result, TokenClient,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Redeems the refresh token stored in `azure-secret.json`.
///
/// A missing or empty file makes this method not applicable. A file bound
/// to a different cloud than the one explicitly requested is a fatal
/// [`AuthError::EnvironmentMismatch`].
pub struct SecretFileRetriever {
    store: SecretFileStore,
    requested: Option<AzureEnvironment>,
    proxy: Option<ProxyConfig>,
    provider: Arc<dyn IdentityProvider>,
}

impl SecretFileRetriever {
    /// Creates a retriever reading from `store`.
    ///
    /// `requested` is the explicitly configured environment, if any; without
    /// one the file's own environment is used.
    pub fn new(
        store: SecretFileStore,
        requested: Option<AzureEnvironment>,
        provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            store,
            requested,
            proxy: None,
            provider,
        }
    }

    /// Sets the proxy for the token exchange.
    pub fn with_proxy(mut self, proxy: Option<ProxyConfig>) -> Self {
        self.proxy = proxy;
        self
    }
}

#[async_trait]
impl CredentialRetriever for SecretFileRetriever {
    fn method(&self) -> AuthMethod {
        AuthMethod::SecretFile
    }

    async fn retrieve(&self) -> Result<AzureCredentialWrapper> {
        let method = self.method();
        let path = self.store.path().display().to_string();

        let file = match self.store.load().await {
            Ok(Some(file)) => file,
            Ok(None) => {
                return Err(AuthError::NotApplicable {
                    method,
                    reason: format!("{} is missing or empty", path),
                })
            }
            Err(e) => {
                return Err(AuthError::login_reason(
                    method,
                    format!("cannot read {}: {}", path, e),
                ))
            }
        };

        let found = file
            .environment()
            .map_err(|e| AuthError::login_failed(method, e))?;
        if let Some(requested) = self.requested {
            if requested != found {
                return Err(AuthError::EnvironmentMismatch {
                    requested,
                    found,
                    origin: path,
                });
            }
        }

        let refresh_token = file
            .refresh_token()
            .ok_or_else(|| AuthError::login_reason(method, format!("{} has no refresh token", path)))?;

        tracing::debug!(
            path = %path,
            environment = %found,
            default_subscription = file.default_subscription.as_deref().unwrap_or(""),
            "using legacy secret file"
        );

        let request = CredentialRequest::new(
            CredentialSpec::RefreshToken {
                tenant: None,
                client: TokenClient::Developer,
                refresh_token: refresh_token.to_string(),
            },
            found,
        )
        .with_proxy(self.proxy.clone());
        acquire_validated(method, self.provider.as_ref(), request).await
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::providers::mock::MockIdentityProvider;
    use crate::secret_file::SECRET_FILE_NAME;
    use tempfile::{tempdir, TempDir};

    fn write_file(contents: &str) -> (TempDir, SecretFileStore) {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SECRET_FILE_NAME);
        std::fs::write(&path, contents).unwrap();
        (dir, SecretFileStore::new(path))
    }

    #[tokio::test]
    async fn test_missing_file_not_applicable() {
        let dir = tempdir().unwrap();
        let store = SecretFileStore::new(dir.path().join(SECRET_FILE_NAME));
        let provider = Arc::new(MockIdentityProvider::new());
        let retriever = SecretFileRetriever::new(store, None, provider.clone());

        let err = retriever.retrieve().await.unwrap_err();
        assert!(matches!(err, AuthError::NotApplicable { method: AuthMethod::SecretFile, .. }));
        assert_eq!(provider.create_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_file_not_applicable() {
        let (_dir, store) = write_file("");
        let retriever = SecretFileRetriever::new(store, None, Arc::new(MockIdentityProvider::new()));

        let err = retriever.retrieve().await.unwrap_err();
        assert!(matches!(err, AuthError::NotApplicable { .. }));
    }

    #[tokio::test]
    async fn test_environment_mismatch() {
        let (_dir, store) = write_file(r#"{"refreshToken": "rt", "environment": "AZURE_CHINA"}"#);
        let provider = Arc::new(MockIdentityProvider::new());
        let retriever =
            SecretFileRetriever::new(store, Some(AzureEnvironment::Azure), provider.clone());

        let err = retriever.retrieve().await.unwrap_err();
        match err {
            AuthError::EnvironmentMismatch {
                requested, found, ..
            } => {
                assert_eq!(requested, AzureEnvironment::Azure);
                assert_eq!(found, AzureEnvironment::AzureChina);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(provider.create_count(), 0);
    }

    #[tokio::test]
    async fn test_redeems_refresh_token_in_file_environment() {
        let (_dir, store) = write_file(r#"{"refreshToken": "rt", "environment": "AZURE_CHINA"}"#);
        let provider = Arc::new(MockIdentityProvider::new());
        let retriever = SecretFileRetriever::new(store, None, provider.clone());

        let credential = retriever.retrieve().await.unwrap();
        assert_eq!(credential.method(), AuthMethod::SecretFile);
        assert_eq!(credential.environment(), AzureEnvironment::AzureChina);
        assert_eq!(
            provider.requests()[0].spec,
            CredentialSpec::RefreshToken {
                tenant: None,
                client: TokenClient::Developer,
                refresh_token: "rt".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_file_without_refresh_token() {
        let (_dir, store) = write_file(r#"{"accessToken": "at"}"#);
        let retriever = SecretFileRetriever::new(store, None, Arc::new(MockIdentityProvider::new()));

        let err = retriever.retrieve().await.unwrap_err();
        assert!(matches!(err, AuthError::LoginFailed { .. }));
    }

    #[tokio::test]
    async fn test_malformed_file_is_a_login_failure() {
        let (_dir, store) = write_file("not json");
        let retriever = SecretFileRetriever::new(store, None, Arc::new(MockIdentityProvider::new()));

        let err = retriever.retrieve().await.unwrap_err();
        assert!(matches!(err, AuthError::LoginFailed { .. }));
    }
}
