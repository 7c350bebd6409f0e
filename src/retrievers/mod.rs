//! Credential retriever implementations.
//!
//! One module per [`AuthMethod`](crate::AuthMethod). Every variant is
//! statically known; [`factory`](crate::factory) decides which ones to chain.

mod azure_cli;
mod device_code;
mod managed_identity;
mod refresh_token;
mod secret_file;
mod service_principal;

pub use azure_cli::AzureCliRetriever;
pub use device_code::DeviceCodeRetriever;
pub use managed_identity::ManagedIdentityRetriever;
pub use refresh_token::RefreshTokenRetriever;
pub use secret_file::SecretFileRetriever;
pub use service_principal::ServicePrincipalRetriever;
