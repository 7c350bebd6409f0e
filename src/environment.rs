//! Known Azure cloud environments.
//!
//! The set is fixed: a configuration naming any other cloud is rejected by
//! validation rather than resolved against a guessed endpoint.

use crate::{AuthError, Result};
use std::str::FromStr;

/// An Azure cloud environment.
///
/// Each environment carries the Active Directory authority used to mint
/// tokens and the Resource Manager endpoint those tokens are scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AzureEnvironment {
    /// Azure public cloud
    #[default]
    Azure,
    /// Azure operated by 21Vianet
    AzureChina,
    /// Azure Germany
    AzureGermany,
    /// Azure US Government
    AzureUsGovernment,
}

impl AzureEnvironment {
    /// Every known environment, in display order.
    pub const ALL: [AzureEnvironment; 4] = [
        Self::Azure,
        Self::AzureChina,
        Self::AzureGermany,
        Self::AzureUsGovernment,
    ];

    /// Canonical configuration name (e.g. `AZURE_CHINA`).
    pub fn name(&self) -> &'static str {
        match self {
            Self::Azure => "AZURE",
            Self::AzureChina => "AZURE_CHINA",
            Self::AzureGermany => "AZURE_GERMANY",
            Self::AzureUsGovernment => "AZURE_US_GOVERNMENT",
        }
    }

    /// Cloud name as reported by the Azure CLI (`az cloud show`).
    pub fn cli_name(&self) -> &'static str {
        match self {
            Self::Azure => "AzureCloud",
            Self::AzureChina => "AzureChinaCloud",
            Self::AzureGermany => "AzureGermanCloud",
            Self::AzureUsGovernment => "AzureUSGovernment",
        }
    }

    /// Active Directory authority host, with trailing slash.
    pub fn authority_host(&self) -> &'static str {
        match self {
            Self::Azure => "https://login.microsoftonline.com/",
            Self::AzureChina => "https://login.chinacloudapi.cn/",
            Self::AzureGermany => "https://login.microsoftonline.de/",
            Self::AzureUsGovernment => "https://login.microsoftonline.us/",
        }
    }

    /// Resource Manager endpoint, with trailing slash.
    pub fn resource_manager_endpoint(&self) -> &'static str {
        match self {
            Self::Azure => "https://management.azure.com/",
            Self::AzureChina => "https://management.chinacloudapi.cn/",
            Self::AzureGermany => "https://management.microsoftazure.de/",
            Self::AzureUsGovernment => "https://management.usgovcloudapi.net/",
        }
    }

    /// Scope requested when proving a credential usable against this cloud.
    ///
    /// ```
    /// use azauth::AzureEnvironment;
    ///
    /// assert_eq!(
    ///     AzureEnvironment::Azure.management_scope(),
    ///     "https://management.azure.com/.default"
    /// );
    /// ```
    pub fn management_scope(&self) -> String {
        format!("{}.default", self.resource_manager_endpoint())
    }

    /// Returns true if `name` parses as a known environment.
    pub fn is_known(name: &str) -> bool {
        name.parse::<Self>().is_ok()
    }
}

impl std::fmt::Display for AzureEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for AzureEnvironment {
    type Err = AuthError;

    /// Accepts the canonical names and the Azure CLI cloud names, ignoring
    /// case, underscores, hyphens and spaces.
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_ascii_uppercase();

        match normalized.as_str() {
            "AZURE" | "AZURECLOUD" | "AZUREPUBLICCLOUD" => Ok(Self::Azure),
            "AZURECHINA" | "AZURECHINACLOUD" => Ok(Self::AzureChina),
            "AZUREGERMANY" | "AZUREGERMANCLOUD" | "AZUREGERMANYCLOUD" => Ok(Self::AzureGermany),
            "AZUREUSGOVERNMENT" | "AZUREUSGOVERNMENTCLOUD" | "AZUREUSGOV" => {
                Ok(Self::AzureUsGovernment)
            }
            _ => Err(AuthError::UnknownEnvironment(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical_names() {
        for env in AzureEnvironment::ALL {
            assert_eq!(env.name().parse::<AzureEnvironment>().unwrap(), env);
        }
    }

    #[test]
    fn test_parse_cli_names() {
        for env in AzureEnvironment::ALL {
            assert_eq!(env.cli_name().parse::<AzureEnvironment>().unwrap(), env);
        }
    }

    #[test]
    fn test_parse_is_lenient_about_case_and_separators() {
        assert_eq!(
            "azure-china".parse::<AzureEnvironment>().unwrap(),
            AzureEnvironment::AzureChina
        );
        assert_eq!(
            "Azure_US_Government".parse::<AzureEnvironment>().unwrap(),
            AzureEnvironment::AzureUsGovernment
        );
    }

    #[test]
    fn test_unknown_environment() {
        let err = "AZURE_MARS".parse::<AzureEnvironment>().unwrap_err();
        assert!(matches!(err, AuthError::UnknownEnvironment(ref name) if name == "AZURE_MARS"));
        assert!(!AzureEnvironment::is_known("AZURE_MARS"));
        assert!(!AzureEnvironment::is_known(""));
    }

    #[test]
    fn test_endpoints() {
        let env = AzureEnvironment::AzureChina;
        assert_eq!(env.authority_host(), "https://login.chinacloudapi.cn/");
        assert_eq!(
            env.management_scope(),
            "https://management.chinacloudapi.cn/.default"
        );
        assert_eq!(AzureEnvironment::default(), AzureEnvironment::Azure);
    }
}
