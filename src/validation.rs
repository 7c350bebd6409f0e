//! Pre-flight checks on [`AuthConfiguration`].
//!
//! Validation never fails: it returns every [`Problem`] it finds, in a fixed
//! rule order, so all issues can be reported together and error output stays
//! reproducible.

use crate::config::non_blank;
use crate::{AuthConfiguration, AzureEnvironment};
use std::fmt;

/// Lowest valid proxy port.
const MIN_PORT: u32 = 1;

/// Highest valid proxy port.
const MAX_PORT: u32 = 65535;

/// How serious a [`Problem`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Resolution must not proceed
    Error,
    /// Tolerated, but likely a mistake
    Warning,
}

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    /// Offending field, or `None` for cross-field problems
    pub field: Option<&'static str>,
    /// Offending value (never secret material)
    pub value: Option<String>,
    /// Human-readable description
    pub message: String,
    /// Error or warning
    pub severity: Severity,
}

impl Problem {
    fn error(field: Option<&'static str>, value: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            field,
            value: value.map(str::to_string),
            message: message.into(),
            severity: Severity::Error,
        }
    }

    fn warning(field: Option<&'static str>, message: impl Into<String>) -> Self {
        Self {
            field,
            value: None,
            message: message.into(),
            severity: Severity::Warning,
        }
    }

    /// Returns true for [`Severity::Error`].
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.field, &self.value) {
            (Some(field), Some(value)) => write!(f, "{} ({:?}): {}", field, value, self.message),
            (Some(field), None) => write!(f, "{}: {}", field, self.message),
            (None, _) => write!(f, "{}", self.message),
        }
    }
}

/// Validates a configuration for service principal authentication.
///
/// Rules, in order:
/// 1. blank `tenant`
/// 2. blank `client`
/// 3. neither `key` nor `certificate`
/// 4. both `key` and `certificate` (warning; the certificate wins)
/// 5. unknown `environment`
/// 6. only one of proxy host and port
/// 7. proxy port not a number in `[1, 65535]`
///
/// # Example
///
/// ```
/// use azauth::AuthConfiguration;
/// use azauth::validation::{validate, Severity};
///
/// let config = AuthConfiguration::new().with_tenant("t1").with_client("c1");
/// let problems = validate(&config);
///
/// assert_eq!(problems.len(), 1);
/// assert_eq!(problems[0].field, Some("key"));
/// assert_eq!(problems[0].severity, Severity::Error);
/// ```
pub fn validate(config: &AuthConfiguration) -> Vec<Problem> {
    let mut problems = Vec::new();
    check_identity(config, &mut problems);
    check_secret(config, &mut problems);
    check_connection(config, &mut problems);
    problems
}

/// Runs only the environment and proxy rules (5-7).
///
/// Used when the configuration does not ask for a service principal, so a
/// setup relying on the CLI or a managed identity is not rejected for a
/// missing tenant or secret.
pub fn validate_connection(config: &AuthConfiguration) -> Vec<Problem> {
    let mut problems = Vec::new();
    check_connection(config, &mut problems);
    problems
}

/// Returns true if any problem is an error.
pub fn has_errors(problems: &[Problem]) -> bool {
    problems.iter().any(Problem::is_error)
}

fn check_identity(config: &AuthConfiguration, problems: &mut Vec<Problem>) {
    if config.tenant().is_none() {
        problems.push(Problem::error(Some("tenant"), None, "tenant id is required"));
    }
    if config.client().is_none() {
        problems.push(Problem::error(Some("client"), None, "client id is required"));
    }
}

fn check_secret(config: &AuthConfiguration, problems: &mut Vec<Problem>) {
    match (config.key(), config.certificate()) {
        (None, None) => problems.push(Problem::error(
            Some("key"),
            None,
            "cannot find either a client secret or a certificate",
        )),
        (Some(_), Some(_)) => problems.push(Problem::warning(
            None,
            "it is illegal to specify both a client secret and a certificate; the certificate will be used",
        )),
        _ => {}
    }
}

fn check_connection(config: &AuthConfiguration, problems: &mut Vec<Problem>) {
    if let Some(environment) = non_blank(&config.environment) {
        if !AzureEnvironment::is_known(environment) {
            let known: Vec<&str> = AzureEnvironment::ALL.iter().map(|e| e.name()).collect();
            problems.push(Problem::error(
                Some("environment"),
                Some(environment),
                format!("unknown environment, expected one of {}", known.join(", ")),
            ));
        }
    }

    let port = match (
        non_blank(&config.http_proxy_host),
        non_blank(&config.http_proxy_port),
    ) {
        (Some(_), Some(port)) => port,
        (None, None) => return,
        _ => {
            // The port itself is only checked once the pair is complete.
            problems.push(Problem::error(
                None,
                None,
                "http proxy host and port must be specified together",
            ));
            return;
        }
    };

    match port.parse::<u32>() {
        Err(_) => problems.push(Problem::error(
            Some("http_proxy_port"),
            Some(port),
            "proxy port is not a number",
        )),
        Ok(n) if !(MIN_PORT..=MAX_PORT).contains(&n) => problems.push(Problem::error(
            Some("http_proxy_port"),
            Some(port),
            format!("proxy port must be between {} and {}", MIN_PORT, MAX_PORT),
        )),
        Ok(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_principal() -> AuthConfiguration {
        AuthConfiguration::new()
            .with_tenant("t1")
            .with_client("c1")
            .with_key("s1")
    }

    fn errors(problems: &[Problem]) -> Vec<&Problem> {
        problems.iter().filter(|p| p.is_error()).collect()
    }

    #[test]
    fn test_valid_configuration() {
        assert!(validate(&service_principal()).is_empty());
        assert!(validate(&service_principal().with_environment("AZURE_CHINA")).is_empty());
        assert!(validate(&service_principal().with_proxy("proxy", "8080")).is_empty());
    }

    #[test]
    fn test_rule_order_is_stable() {
        let config = AuthConfiguration::new()
            .with_environment("nowhere")
            .with_proxy("proxy", "99999");
        let fields: Vec<_> = validate(&config).iter().map(|p| p.field).collect();

        assert_eq!(
            fields,
            vec![
                Some("tenant"),
                Some("client"),
                Some("key"),
                Some("environment"),
                Some("http_proxy_port"),
            ]
        );
        assert_eq!(validate(&config), validate(&config));
    }

    #[test]
    fn test_missing_key_and_certificate() {
        let configs = vec![
            AuthConfiguration::new().with_tenant("t").with_client("c"),
            AuthConfiguration::new().with_tenant("t").with_client("c").with_key(" "),
            AuthConfiguration::new(),
        ];

        for config in configs {
            let problems = validate(&config);
            let key_errors: Vec<_> = problems
                .iter()
                .filter(|p| p.field == Some("key") && p.is_error())
                .collect();
            assert_eq!(key_errors.len(), 1, "{:?}", config);
            assert!(key_errors[0].message.contains("cannot find either"));
        }
    }

    #[test]
    fn test_both_key_and_certificate_is_a_warning() {
        let config = service_principal().with_certificate("/certs/sp.pem");
        let problems = validate(&config);

        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].severity, Severity::Warning);
        assert!(problems[0].message.contains("illegal to specify both"));
        assert!(!has_errors(&problems));
    }

    #[test]
    fn test_unknown_environment() {
        let problems = validate(&service_principal().with_environment("AZURE_MOON"));
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].field, Some("environment"));
        assert_eq!(problems[0].value.as_deref(), Some("AZURE_MOON"));
    }

    #[test]
    fn test_incomplete_proxy_pair() {
        let mut only_host = service_principal();
        only_host.http_proxy_host = Some("proxy".to_string());
        assert_eq!(errors(&validate(&only_host)).len(), 1);

        let mut only_port = service_principal();
        only_port.http_proxy_port = Some("8080".to_string());
        assert_eq!(errors(&validate(&only_port)).len(), 1);
    }

    #[test]
    fn test_lone_invalid_port_is_one_error() {
        for port in ["99999", "0", "http"] {
            let mut only_port = service_principal();
            only_port.http_proxy_port = Some(port.to_string());

            let results = validate(&only_port);
            let problems = errors(&results);
            assert_eq!(problems.len(), 1, "port {}", port);
            assert_eq!(problems[0].field, None);
            assert!(problems[0].message.contains("together"));
        }

        let mut only_host = service_principal();
        only_host.http_proxy_host = Some("proxy".to_string());
        only_host.http_proxy_port = Some(" ".to_string());
        assert_eq!(errors(&validate(&only_host)).len(), 1);
    }

    #[test]
    fn test_proxy_port_boundaries() {
        for port in ["0", "65536"] {
            let problems = validate(&service_principal().with_proxy("proxy", port));
            assert_eq!(errors(&problems).len(), 1, "port {}", port);
            assert_eq!(problems[0].field, Some("http_proxy_port"));
        }
        for port in ["1", "65535"] {
            assert!(validate(&service_principal().with_proxy("proxy", port)).is_empty());
        }
    }

    #[test]
    fn test_non_numeric_port() {
        let problems = validate(&service_principal().with_proxy("proxy", "http"));
        assert_eq!(problems.len(), 1);
        assert!(problems[0].message.contains("not a number"));
    }

    #[test]
    fn test_connection_rules_only() {
        assert!(validate_connection(&AuthConfiguration::new()).is_empty());

        let problems = validate_connection(&AuthConfiguration::new().with_environment("x"));
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].field, Some("environment"));
    }

    #[test]
    fn test_secret_value_never_reported() {
        let config = AuthConfiguration::new().with_key("hunter2").with_certificate("/c.pem");
        for problem in validate(&config) {
            assert!(!problem.to_string().contains("hunter2"));
        }
    }
}
