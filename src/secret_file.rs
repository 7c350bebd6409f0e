//! Read-only adapter for the legacy `azure-secret.json` file.
//!
//! An external login tool writes this file; nothing in this crate writes it.
//! The schema is kept narrow and isolated here so the legacy path can be
//! removed by deleting this module and its retriever.

use crate::{AzureEnvironment, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;

/// File name of the legacy secret file.
pub const SECRET_FILE_NAME: &str = "azure-secret.json";

/// Environment variable overriding the Azure configuration directory.
pub const CONFIG_DIR_ENV: &str = "AZURE_CONFIG_DIR";

/// Contents of `azure-secret.json`.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecretFile {
    /// Token type, normally "Bearer"
    pub access_token_type: Option<String>,
    /// OpenID id token
    pub id_token: Option<String>,
    /// Last access token
    pub access_token: Option<String>,
    /// Refresh token redeemable by the developer client
    pub refresh_token: Option<String>,
    /// Whether the refresh token is valid for any resource
    pub is_multiple_resource_refresh_token: bool,
    /// Subscription selected at login time
    pub default_subscription: Option<String>,
    /// Cloud name the login happened against
    pub environment: Option<String>,
}

impl SecretFile {
    /// Cloud recorded in the file; the public cloud when absent.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnknownEnvironment`](crate::AuthError::UnknownEnvironment)
    /// for an unrecognized name.
    pub fn environment(&self) -> Result<AzureEnvironment> {
        match self.environment.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.parse(),
            _ => Ok(AzureEnvironment::default()),
        }
    }

    /// Refresh token, if present and not blank.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

impl fmt::Debug for SecretFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretFile")
            .field("access_token_type", &self.access_token_type)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field(
                "is_multiple_resource_refresh_token",
                &self.is_multiple_resource_refresh_token,
            )
            .field("default_subscription", &self.default_subscription)
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

/// Locates and loads the secret file.
///
/// # Example
///
/// ```no_run
/// use azauth::secret_file::SecretFileStore;
///
/// #[tokio::main]
/// async fn main() -> azauth::Result<()> {
///     if let Some(store) = SecretFileStore::from_env() {
///         match store.load().await? {
///             Some(file) => println!("logged in to {}", file.environment()?),
///             None => println!("no secret file at {}", store.path().display()),
///         }
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SecretFileStore {
    path: PathBuf,
}

impl SecretFileStore {
    /// Uses an explicit file path.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Uses `$AZURE_CONFIG_DIR/azure-secret.json`, or
    /// `$HOME/.azure/azure-secret.json` when the variable is unset.
    ///
    /// Returns `None` if neither location can be determined.
    pub fn from_env() -> Option<Self> {
        resolve_path(std::env::var(CONFIG_DIR_ENV).ok(), dirs::home_dir()).map(Self::new)
    }

    /// The file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the secret file.
    ///
    /// Returns `Ok(None)` if the file does not exist or is empty; presence
    /// with non-zero length is the only applicability signal.
    ///
    /// # Errors
    ///
    /// Returns an error for unexpected I/O failures or malformed JSON.
    pub async fn load(&self) -> Result<Option<SecretFile>> {
        let data = match fs::read(&self.path).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if data.is_empty() {
            return Ok(None);
        }

        Ok(Some(serde_json::from_slice(&data)?))
    }
}

/// Resolves the secret file location from the config dir override and home.
pub fn resolve_path(config_dir: Option<String>, home: Option<PathBuf>) -> Option<PathBuf> {
    match config_dir.filter(|d| !d.trim().is_empty()) {
        Some(dir) => Some(PathBuf::from(dir).join(SECRET_FILE_NAME)),
        None => home.map(|h| h.join(".azure").join(SECRET_FILE_NAME)),
    }
}
