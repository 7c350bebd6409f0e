//! Azure CLI integration.
//!
//! Runs `az` as a subprocess and turns its `account get-access-token`
//! output into [`AccessToken`]s.

use crate::{AccessToken, AuthError, Result, TokenSource};
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use std::process::Stdio;
use tokio::process::Command;

/// Executes a command and returns stdout as a string.
///
/// # Arguments
///
/// - `program`: Command to execute (e.g., "az")
/// - `args`: Command arguments
/// - `env`: Extra environment variables (e.g., proxy settings)
///
/// # Errors
///
/// - [`AuthError::NotInstalled`]: the program is not on `PATH`
/// - [`AuthError::CommandFailed`]: non-zero exit code or non UTF-8 output
pub async fn run_command(program: &str, args: &[&str], env: &[(&str, &str)]) -> Result<String> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    for (key, value) in env {
        cmd.env(key, value);
    }

    let output = cmd.output().await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AuthError::NotInstalled(program.to_string())
        } else {
            AuthError::Io(e)
        }
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AuthError::CommandFailed(format!(
            "{} failed with exit code {}: {}",
            program,
            output.status.code().unwrap_or(-1),
            stderr.trim()
        )));
    }

    String::from_utf8(output.stdout).map_err(|e| {
        AuthError::CommandFailed(format!("invalid UTF-8 in {} output: {}", program, e))
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    expires_on: Option<String>,
    #[serde(rename = "expires_on")]
    expires_on_unix: Option<i64>,
}

/// Parses the JSON printed by `az account get-access-token`.
///
/// Newer CLIs print `expires_on` as unix seconds; older ones only print
/// `expiresOn` in local time.
///
/// ```
/// let token = azauth::cli::parse_cli_token(
///     r#"{"accessToken": "abc", "expires_on": 1700000000, "tokenType": "Bearer"}"#,
/// )
/// .unwrap();
/// assert_eq!(token.token, "abc");
/// assert_eq!(token.expires_on.timestamp(), 1700000000);
/// ```
pub fn parse_cli_token(json: &str) -> Result<AccessToken> {
    let raw: CliToken = serde_json::from_str(json)?;

    let expires_on = match (raw.expires_on_unix, raw.expires_on.as_deref()) {
        (Some(secs), _) => DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| {
            AuthError::CommandFailed(format!("az returned an invalid expiry: {}", secs))
        })?,
        (None, Some(local)) => parse_local_time(local)?,
        (None, None) => {
            return Err(AuthError::CommandFailed(
                "az returned a token without an expiry".to_string(),
            ))
        }
    };

    Ok(AccessToken::new(raw.access_token, expires_on))
}

fn parse_local_time(value: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value.trim(), "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|e| AuthError::CommandFailed(format!("invalid expiresOn {:?}: {}", value, e)))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| AuthError::CommandFailed(format!("invalid local time {:?}", value)))
}

/// Token source backed by the Azure CLI login session.
///
/// Every call spawns `az`; callers that need many tokens should cache them.
#[derive(Debug, Clone)]
pub struct AzureCliTokenSource {
    program: String,
    tenant: Option<String>,
    proxy: Option<String>,
}

impl AzureCliTokenSource {
    /// Uses `az` from `PATH` and its default tenant.
    pub fn new() -> Self {
        Self {
            program: "az".to_string(),
            tenant: None,
            proxy: None,
        }
    }

    /// Requests tokens from a specific tenant.
    pub fn with_tenant(mut self, tenant: Option<String>) -> Self {
        self.tenant = tenant;
        self
    }

    /// Runs the CLI behind an HTTPS proxy (`HTTPS_PROXY`).
    pub fn with_proxy(mut self, proxy_url: Option<String>) -> Self {
        self.proxy = proxy_url;
        self
    }

    /// Uses another executable, e.g. a wrapper script.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn args<'a>(&'a self, scope: &'a str) -> Vec<&'a str> {
        let mut args = vec![
            "account",
            "get-access-token",
            "--output",
            "json",
            "--scope",
            scope,
        ];
        if let Some(tenant) = &self.tenant {
            args.push("--tenant");
            args.push(tenant);
        }
        args
    }
}

impl Default for AzureCliTokenSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenSource for AzureCliTokenSource {
    fn name(&self) -> &str {
        "azure_cli"
    }

    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken> {
        let scope = scopes.first().copied().ok_or_else(|| {
            AuthError::Other(anyhow::anyhow!("at least one scope is required"))
        })?;

        let env: Vec<(&str, &str)> = self
            .proxy
            .as_deref()
            .map(|url| vec![("HTTPS_PROXY", url)])
            .unwrap_or_default();

        tracing::debug!(
            scope,
            tenant = self.tenant.as_deref().unwrap_or("default"),
            "requesting token from Azure CLI"
        );
        let output = run_command(&self.program, &self.args(scope), &env).await?;
        parse_cli_token(&output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_command_success() {
        let output = run_command("echo", &["hello"], &[]).await.unwrap();
        assert_eq!(output.trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_command_not_found() {
        let result = run_command("nonexistent-command-12345", &[], &[]).await;
        assert!(matches!(result, Err(AuthError::NotInstalled(_))));
    }

    #[tokio::test]
    async fn test_run_command_failure() {
        let result = run_command("false", &[], &[]).await;
        assert!(matches!(result, Err(AuthError::CommandFailed(_))));
    }

    #[tokio::test]
    async fn test_run_command_with_env() {
        let output = run_command("printenv", &["TEST_VAR"], &[("TEST_VAR", "test-value")])
            .await
            .unwrap();
        assert_eq!(output.trim(), "test-value");
    }

    #[test]
    fn test_parse_prefers_unix_expiry() {
        let token = parse_cli_token(
            r#"{
                "accessToken": "abc",
                "expiresOn": "2000-01-01 00:00:00.000000",
                "expires_on": 1700000000,
                "subscription": "s1",
                "tenant": "t1",
                "tokenType": "Bearer"
            }"#,
        )
        .unwrap();
        assert_eq!(token.expires_on.timestamp(), 1700000000);
    }

    #[test]
    fn test_parse_local_expiry() {
        let token =
            parse_cli_token(r#"{"accessToken": "abc", "expiresOn": "2030-06-01 12:30:00.123456"}"#)
                .unwrap();
        let expected = Local
            .from_local_datetime(
                &NaiveDateTime::parse_from_str("2030-06-01 12:30:00.123456", "%Y-%m-%d %H:%M:%S%.f")
                    .unwrap(),
            )
            .earliest()
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(token.expires_on, expected);
    }

    #[test]
    fn test_parse_rejects_missing_expiry() {
        assert!(parse_cli_token(r#"{"accessToken": "abc"}"#).is_err());
        assert!(parse_cli_token("ERROR: Please run 'az login'").is_err());
    }

    #[test]
    fn test_cli_args() {
        let source = AzureCliTokenSource::new().with_tenant(Some("t1".to_string()));
        assert_eq!(
            source.args("https://management.azure.com/.default"),
            vec![
                "account",
                "get-access-token",
                "--output",
                "json",
                "--scope",
                "https://management.azure.com/.default",
                "--tenant",
                "t1"
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_cli() {
        let source = AzureCliTokenSource::new().with_program("nonexistent-az-12345");
        let err = source.get_token(&["scope"]).await.unwrap_err();
        assert!(matches!(err, AuthError::NotInstalled(_)));
    }
}
