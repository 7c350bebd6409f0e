//! Basic usage example with the mock identity provider.

use azauth::providers::mock::{MockIdentityProvider, MockManagementClient};
use azauth::{resolve, validate, AuthConfiguration, AuthMethod, TokenCredentialManager};
use std::sync::Arc;

#[tokio::main]
async fn main() -> azauth::Result<()> {
    // Validation reports every problem at once
    let broken = AuthConfiguration::new()
        .with_key("s1")
        .with_environment("AzureMarsCloud");
    println!("Problems in a broken configuration:");
    for problem in validate(&broken) {
        println!("  - [{:?}] {}", problem.severity, problem);
    }

    // The service principal secret is rejected, so the chain falls back to the CLI
    let config = AuthConfiguration::new()
        .with_tenant("t1")
        .with_client("c1")
        .with_key("expired-secret");
    let provider = Arc::new(
        MockIdentityProvider::new().fail_token("client_secret", "AADSTS7000222: secret expired"),
    );
    let credential = resolve(
        &config,
        &[AuthMethod::ServicePrincipal, AuthMethod::AzureCli],
        provider.clone(),
    )
    .await?;
    println!("\nResolved via {}", credential.method());

    let token = credential.management_token().await?;
    println!("Management token expires at {}", token.expires_on);

    // Enumerate tenants and subscriptions
    let management = Arc::new(
        MockManagementClient::new()
            .with_tenant("t1", &[("s1", "Development"), ("s2", "Shared")])
            .with_tenant("t2", &[("s2", "Shared"), ("s3", "Production")]),
    );
    let manager = TokenCredentialManager::new(credential, provider, management);

    let tenants = manager.list_tenants().await?;
    println!("\nTenants ({}):", tenants.len());
    for tenant in &tenants {
        println!("  - {}", tenant);
    }

    let subscriptions = manager.list_subscriptions().await?;
    println!("\nSubscriptions ({}):", subscriptions.len());
    for subscription in &subscriptions {
        println!(
            "  - {} {} (tenant {})",
            subscription.id, subscription.display_name, subscription.tenant_id
        );
    }

    // Credentials for other tenants are derived once and reused
    let production = manager.wrapper_for_tenant("t2").await?;
    let token = production.management_token().await?;
    println!("\nToken for tenant t2: {}", token.token);

    println!("\n✓ Example completed successfully!");

    Ok(())
}
