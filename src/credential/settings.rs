use std::env;
use std::path::PathBuf;

use crate::environment::AzureEnvironment;
use crate::token_retriever::credential::ClientSecret;
use crate::{ClientID, TenantID};

pub const AZURE_TENANT_ID: &str = "AZURE_TENANT_ID";
pub const AZURE_CLIENT_ID: &str = "AZURE_CLIENT_ID";
pub const AZURE_CLIENT_SECRET: &str = "AZURE_CLIENT_SECRET";
pub const AZURE_CLIENT_CERTIFICATE_PATH: &str = "AZURE_CLIENT_CERTIFICATE_PATH";
pub const AZURE_CERTIFICATE_PATH: &str = "AZURE_CERTIFICATE_PATH";
pub const AZURE_CERTIFICATE_PASSWORD: &str = "AZURE_CERTIFICATE_PASSWORD";
pub const AZURE_USERNAME: &str = "AZURE_USERNAME";
pub const AZURE_PASSWORD: &str = "AZURE_PASSWORD";
pub const AZURE_FEDERATED_TOKEN_FILE: &str = "AZURE_FEDERATED_TOKEN_FILE";
pub const IDENTITY_ENDPOINT: &str = "IDENTITY_ENDPOINT";
pub const IDENTITY_HEADER: &str = "IDENTITY_HEADER";
pub const AZURE_POD_IDENTITY_AUTHORITY_HOST: &str = "AZURE_POD_IDENTITY_AUTHORITY_HOST";
pub const AZURE_AD_RESOURCE: &str = "AZURE_AD_RESOURCE";

/// Credential related settings read from the environment. Empty variables count as unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvironmentSettings {
    pub tenant_id: Option<TenantID>,
    pub client_id: Option<ClientID>,
    pub client_secret: Option<ClientSecret>,
    /// PEM bundle, `AZURE_CLIENT_CERTIFICATE_PATH`.
    pub certificate_path: Option<PathBuf>,
    /// PKCS#12 bundle of the older autorest configuration, `AZURE_CERTIFICATE_PATH` (unlocked by
    /// `AZURE_CERTIFICATE_PASSWORD`). Only kept to reject it with a clear message.
    pub pkcs12_certificate_path: Option<PathBuf>,
    pub username: Option<String>,
    pub password: Option<ClientSecret>,
    pub federated_token_file: Option<PathBuf>,
    pub identity_endpoint: Option<String>,
    pub identity_header: Option<String>,
    pub imds_host: Option<String>,
    pub resource: Option<String>,
}

/// Federated identity settings (AKS workload identity and similar).
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadIdentitySettings {
    pub tenant_id: TenantID,
    pub client_id: ClientID,
    pub token_file: PathBuf,
}

impl EnvironmentSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the settings using `lookup` to read each variable.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Self {
            tenant_id: var(AZURE_TENANT_ID),
            client_id: var(AZURE_CLIENT_ID),
            client_secret: var(AZURE_CLIENT_SECRET).map(ClientSecret::from),
            certificate_path: var(AZURE_CLIENT_CERTIFICATE_PATH).map(PathBuf::from),
            pkcs12_certificate_path: var(AZURE_CERTIFICATE_PATH).map(PathBuf::from),
            username: var(AZURE_USERNAME),
            password: var(AZURE_PASSWORD).map(ClientSecret::from),
            federated_token_file: var(AZURE_FEDERATED_TOKEN_FILE).map(PathBuf::from),
            identity_endpoint: var(IDENTITY_ENDPOINT),
            identity_header: var(IDENTITY_HEADER),
            imds_host: var(AZURE_POD_IDENTITY_AUTHORITY_HOST),
            resource: var(AZURE_AD_RESOURCE),
        }
    }

    /// Audience requested for management tokens, `AZURE_AD_RESOURCE` overrides the cloud default.
    pub fn audience(&self, environment: &AzureEnvironment) -> String {
        self.resource
            .clone()
            .unwrap_or_else(|| environment.token_audience().to_string())
    }

    pub fn workload_identity(&self) -> Option<WorkloadIdentitySettings> {
        Some(WorkloadIdentitySettings {
            tenant_id: self.tenant_id.clone()?,
            client_id: self.client_id.clone()?,
            token_file: self.federated_token_file.clone()?,
        })
    }
}
