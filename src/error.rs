//! Error types for credential resolution.

use crate::validation::Problem;
use crate::{AuthMethod, AzureEnvironment};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Result type alias using [`AuthError`].
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur while resolving or using credentials.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Structurally invalid configuration, caught before any I/O.
    #[error("invalid authentication configuration: {}", join_problems(.0))]
    Configuration(Vec<Problem>),

    /// A chain was built without any retrievers.
    #[error("no credential retrievers configured")]
    NoRetrievers,

    /// One retriever's attempt failed.
    #[error("{method}: login failed: {reason}")]
    LoginFailed {
        /// Method that was attempted
        method: AuthMethod,
        /// Why it failed
        reason: String,
    },

    /// The method does not apply to this machine (e.g. no secret file).
    #[error("{method}: not applicable: {reason}")]
    NotApplicable {
        /// Method that was skipped
        method: AuthMethod,
        /// Why it does not apply
        reason: String,
    },

    /// Every retriever in a chain failed.
    #[error(transparent)]
    Aggregate(#[from] AggregateLoginError),

    /// The requested cloud conflicts with the one a credential is bound to.
    #[error("environment mismatch: requested {requested} but {origin} is bound to {found}")]
    EnvironmentMismatch {
        /// Explicitly requested environment
        requested: AzureEnvironment,
        /// Environment recorded by the credential source
        found: AzureEnvironment,
        /// Where `found` came from
        origin: String,
    },

    /// Environment name is not a known cloud.
    #[error("unknown cloud environment: {0}")]
    UnknownEnvironment(String),

    /// The identity provider cannot build this kind of credential.
    #[error("operation not supported by provider: {0}")]
    NotSupported(String),

    /// A previously cached failure, returned again without a new attempt.
    #[error("{0}")]
    Cached(Arc<AuthError>),

    /// Required CLI tool is not installed.
    #[error("{0} is not installed or not on PATH")]
    NotInstalled(String),

    /// Command execution failed.
    #[error("command execution failed: {0}")]
    CommandFailed(String),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error (catch-all).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AuthError {
    /// Wraps an error as a login failure of `method`.
    ///
    /// Errors that already are a login failure, a skip, or an environment
    /// mismatch are passed through unchanged so reasons are not nested.
    ///
    /// # Example
    ///
    /// ```
    /// use azauth::{AuthError, AuthMethod};
    ///
    /// let err = AuthError::login_failed(
    ///     AuthMethod::ManagedIdentity,
    ///     AuthError::CommandFailed("endpoint unreachable".to_string()),
    /// );
    ///
    /// assert_eq!(
    ///     err.to_string(),
    ///     "managed_identity: login failed: command execution failed: endpoint unreachable"
    /// );
    /// ```
    pub fn login_failed(method: AuthMethod, err: impl Into<AuthError>) -> Self {
        match err.into() {
            e @ (Self::LoginFailed { .. }
            | Self::NotApplicable { .. }
            | Self::EnvironmentMismatch { .. }) => e,
            e => Self::LoginFailed {
                method,
                reason: e.to_string(),
            },
        }
    }

    /// Creates a login failure from a plain reason.
    pub fn login_reason(method: AuthMethod, reason: impl Into<String>) -> Self {
        Self::LoginFailed {
            method,
            reason: reason.into(),
        }
    }

    /// Returns the underlying error, looking through cached failures.
    pub fn root(&self) -> &AuthError {
        match self {
            Self::Cached(inner) => inner.root(),
            other => other,
        }
    }

    /// Returns true for errors that must stop a chain immediately.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.root(),
            Self::EnvironmentMismatch { .. } | Self::Configuration(_)
        )
    }
}

/// Failure of every retriever in a chain.
///
/// Holds each attempted method with its error, in attempted order, plus the
/// methods that were skipped as not applicable.
#[derive(Debug, Default)]
pub struct AggregateLoginError {
    attempts: Vec<(AuthMethod, AuthError)>,
    skipped: Vec<(AuthMethod, String)>,
}

impl AggregateLoginError {
    /// Records a failed attempt.
    pub fn push(&mut self, method: AuthMethod, err: AuthError) {
        self.attempts.push((method, err));
    }

    /// Records a method that did not apply.
    pub fn skip(&mut self, method: AuthMethod, reason: impl Into<String>) {
        self.skipped.push((method, reason.into()));
    }

    /// Failed attempts, in attempted order.
    pub fn attempts(&self) -> &[(AuthMethod, AuthError)] {
        &self.attempts
    }

    /// Methods skipped as not applicable.
    pub fn skipped(&self) -> &[(AuthMethod, String)] {
        &self.skipped
    }

    /// Attempted methods, in order.
    pub fn methods(&self) -> Vec<AuthMethod> {
        self.attempts.iter().map(|(method, _)| *method).collect()
    }

    /// Number of failed attempts.
    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    /// Returns true if nothing was attempted.
    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }
}

impl fmt::Display for AggregateLoginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "all authentication methods failed")?;
        for (i, (method, err)) in self.attempts.iter().enumerate() {
            write!(f, "\n  {}. {}: {}", i + 1, method, err.root())?;
        }
        for (method, reason) in &self.skipped {
            write!(f, "\n  skipped {}: {}", method, reason)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateLoginError {}

fn join_problems(problems: &[Problem]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
