use std::fmt;
use std::str::FromStr;

use url::Url;

// Known cloud endpoints. Names follow the classic Azure SDK environment names.
const PUBLIC_CLOUD_NAME: &str = "AzurePublicCloud";
const PUBLIC_CLOUD_ACTIVE_DIRECTORY: &str = "https://login.microsoftonline.com/";
const PUBLIC_CLOUD_RESOURCE_MANAGER: &str = "https://management.azure.com/";

const CHINA_CLOUD_NAME: &str = "AzureChinaCloud";
const CHINA_CLOUD_ACTIVE_DIRECTORY: &str = "https://login.chinacloudapi.cn/";
const CHINA_CLOUD_RESOURCE_MANAGER: &str = "https://management.chinacloudapi.cn/";

const US_GOVERNMENT_CLOUD_NAME: &str = "AzureUSGovernmentCloud";
const US_GOVERNMENT_CLOUD_ACTIVE_DIRECTORY: &str = "https://login.microsoftonline.us/";
const US_GOVERNMENT_CLOUD_RESOURCE_MANAGER: &str = "https://management.usgovcloudapi.net/";

const GERMAN_CLOUD_NAME: &str = "AzureGermanCloud";
const GERMAN_CLOUD_ACTIVE_DIRECTORY: &str = "https://login.microsoftonline.de/";
const GERMAN_CLOUD_RESOURCE_MANAGER: &str = "https://management.microsoftazure.de/";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum EnvironmentError {
    #[error("autorest/azure: There is no cloud environment matching the name \"{0}\"")]
    Unknown(String),
}

/// Azure cloud the tool talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AzureEnvironment {
    PublicCloud,
    ChinaCloud,
    USGovernmentCloud,
    GermanCloud,
}

impl FromStr for AzureEnvironment {
    type Err = EnvironmentError;

    /// Names are matched case-insensitively, so `AZUREPUBLICCLOUD` and
    /// `AzurePublicCloud` are the same environment.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_uppercase().as_str() {
            "AZUREPUBLICCLOUD" => Ok(Self::PublicCloud),
            "AZURECHINACLOUD" => Ok(Self::ChinaCloud),
            "AZUREUSGOVERNMENTCLOUD" => Ok(Self::USGovernmentCloud),
            "AZUREGERMANCLOUD" => Ok(Self::GermanCloud),
            _ => Err(EnvironmentError::Unknown(name.to_string())),
        }
    }
}

impl fmt::Display for AzureEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl AzureEnvironment {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PublicCloud => PUBLIC_CLOUD_NAME,
            Self::ChinaCloud => CHINA_CLOUD_NAME,
            Self::USGovernmentCloud => US_GOVERNMENT_CLOUD_NAME,
            Self::GermanCloud => GERMAN_CLOUD_NAME,
        }
    }

    /// Entra ID authority host, tenant-specific paths are appended to it.
    pub fn active_directory_endpoint(&self) -> Url {
        let endpoint = match self {
            Self::PublicCloud => PUBLIC_CLOUD_ACTIVE_DIRECTORY,
            Self::ChinaCloud => CHINA_CLOUD_ACTIVE_DIRECTORY,
            Self::USGovernmentCloud => US_GOVERNMENT_CLOUD_ACTIVE_DIRECTORY,
            Self::GermanCloud => GERMAN_CLOUD_ACTIVE_DIRECTORY,
        };
        Url::parse(endpoint).expect("known active directory endpoint is a valid url")
    }

    pub fn resource_manager_endpoint(&self) -> Url {
        Url::parse(self.token_audience()).expect("known resource manager endpoint is a valid url")
    }

    /// Audience (`resource`) requested for Resource Manager tokens.
    pub fn token_audience(&self) -> &'static str {
        match self {
            Self::PublicCloud => PUBLIC_CLOUD_RESOURCE_MANAGER,
            Self::ChinaCloud => CHINA_CLOUD_RESOURCE_MANAGER,
            Self::USGovernmentCloud => US_GOVERNMENT_CLOUD_RESOURCE_MANAGER,
            Self::GermanCloud => GERMAN_CLOUD_RESOURCE_MANAGER,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("AZUREPUBLICCLOUD", AzureEnvironment::PublicCloud)]
    #[case("AzurePublicCloud", AzureEnvironment::PublicCloud)]
    #[case("azurechinacloud", AzureEnvironment::ChinaCloud)]
    #[case("AzureUSGovernmentCloud", AzureEnvironment::USGovernmentCloud)]
    #[case(" AzureGermanCloud ", AzureEnvironment::GermanCloud)]
    fn parses_known_names(#[case] name: &str, #[case] expected: AzureEnvironment) {
        assert_eq!(name.parse::<AzureEnvironment>().unwrap(), expected);
    }

    #[test]
    fn rejects_unknown_names() {
        assert_eq!(
            "AzureMoonCloud".parse::<AzureEnvironment>(),
            Err(EnvironmentError::Unknown("AzureMoonCloud".to_string()))
        );
    }

    #[rstest]
    #[case(
        AzureEnvironment::PublicCloud,
        PUBLIC_CLOUD_ACTIVE_DIRECTORY,
        PUBLIC_CLOUD_RESOURCE_MANAGER
    )]
    #[case(
        AzureEnvironment::ChinaCloud,
        CHINA_CLOUD_ACTIVE_DIRECTORY,
        CHINA_CLOUD_RESOURCE_MANAGER
    )]
    #[case(
        AzureEnvironment::USGovernmentCloud,
        US_GOVERNMENT_CLOUD_ACTIVE_DIRECTORY,
        US_GOVERNMENT_CLOUD_RESOURCE_MANAGER
    )]
    #[case(
        AzureEnvironment::GermanCloud,
        GERMAN_CLOUD_ACTIVE_DIRECTORY,
        GERMAN_CLOUD_RESOURCE_MANAGER
    )]
    fn endpoints(
        #[case] env: AzureEnvironment,
        #[case] expected_active_directory: &str,
        #[case] expected_resource_manager: &str,
    ) {
        assert_eq!(
            env.active_directory_endpoint().as_str(),
            expected_active_directory
        );
        assert_eq!(
            env.resource_manager_endpoint().as_str(),
            expected_resource_manager
        );
    }

    #[test]
    fn display_uses_canonical_name() {
        let env: AzureEnvironment = "AZUREPUBLICCLOUD".parse().unwrap();
        assert_eq!(env.to_string(), "AzurePublicCloud");
    }
}
