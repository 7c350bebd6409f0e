//! azauth - Prioritized Azure credential resolution.
//!
//! azauth turns whatever authentication material is available on a machine
//! (a service principal secret or certificate, an Azure CLI login, a managed
//! identity, a refresh token or a legacy `azure-secret.json`) into one
//! validated credential that downstream deployment code can use without
//! knowing where it came from.
//!
//! # Features
//!
//! - **Fail-fast validation**: every configuration problem reported at once, before any I/O
//! - **Ordered fallback**: methods tried one at a time, first success wins
//! - **Aggregated errors**: when everything fails, every reason in attempted order
//! - **Proven credentials**: each method fetches a management token before it is accepted
//! - **Session caching**: tenants, subscriptions and tenant credentials looked up once
//! - **Pluggable primitives**: token acquisition behind the [`IdentityProvider`] trait
//!
//! # Quick Start
//!
//! ```no_run
//! use azauth::providers::mock::{MockIdentityProvider, MockManagementClient};
//! use azauth::{resolve, AuthConfiguration, AuthMethod, TokenCredentialManager};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> azauth::Result<()> {
//!     let config = AuthConfiguration::new()
//!         .with_tenant("t1")
//!         .with_client("c1")
//!         .with_key("s1");
//!
//!     // Validate, build the chain, resolve
//!     let provider = Arc::new(MockIdentityProvider::new());
//!     let credential = resolve(&config, &[AuthMethod::ServicePrincipal], provider.clone()).await?;
//!     println!("resolved via {}", credential.method());
//!
//!     // Enumerate what the credential can see
//!     let management = Arc::new(MockManagementClient::new().with_tenant("t1", &[("s1", "Dev")]));
//!     let manager = TokenCredentialManager::new(credential, provider, management);
//!     for subscription in manager.list_subscriptions().await? {
//!         println!("{}", subscription.display_name);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Authentication Methods
//!
//! | Method | Inputs | Notes |
//! |--------|--------|-------|
//! | `service_principal` | tenant, client, key or certificate | Certificate wins when both are set |
//! | `secret_file` | `azure-secret.json` | Skipped when the file is missing or empty |
//! | `azure_cli` | `az login` session | |
//! | `refresh_token` | refresh token, issuing client | |
//! | `managed_identity` | optional client id | Only works on Azure compute |
//! | `device_code` | none | Interactive; opt-in for automatic chains |
//!
//! # Feature Flags
//!
//! | Feature | Provides |
//! |---------|----------|
//! | `mock` (default) | In-memory identity provider and management client |
//! | `azure` | `azure_identity`-backed identity provider |
//! | `azure-certificate` | PKCS#12 certificates through `azure_identity` (links openssl) |
//! | `full` | `mock` and `azure` |

pub mod chain;
pub mod cli;
pub mod config;
pub mod credential;
pub mod environment;
pub mod error;
pub mod factory;
pub mod manager;
pub mod provider;
pub mod providers;
pub mod retriever;
pub mod retrievers;
pub mod secret_file;
pub mod validation;

pub use chain::ChainedCredentialRetriever;
pub use config::{AuthConfiguration, AuthMethod, ProxyConfig, TokenClient};
pub use credential::{
    AccessToken, AzureCredentialWrapper, CredentialRequest, CredentialSpec, StaticTokenSource,
    TokenSource,
};
pub use environment::AzureEnvironment;
pub use error::{AggregateLoginError, AuthError, Result};
pub use factory::{build_chain, resolve, ChainBuilder};
pub use manager::{ManagementClient, Subscription, TokenCredentialManager};
pub use provider::IdentityProvider;
pub use retriever::CredentialRetriever;
pub use validation::{validate, Problem, Severity};
