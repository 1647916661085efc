//! Service principal introspection, used only to tell the operator which identity is in use.
pub mod claims;

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::TokenRetriever;
use crate::credential::settings::EnvironmentSettings;
use crate::credential::{AuthMethod, CredentialError, EnvironmentTokenRetriever};
use crate::environment::AzureEnvironment;
use crate::http_client::HttpClient;
use crate::token::Token;
use claims::{UnverifiedClaims, decode_unverified};

/// Where the advisory identity information comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    /// Claims of a managed or workload identity token.
    ManagedIdentityToken,
    /// `AZURE_CLIENT_ID` / `AZURE_TENANT_ID`.
    EnvironmentVariables,
}

/// Advisory service principal details. Every field is optional.
#[derive(Debug, Clone, PartialEq)]
pub struct ServicePrincipalInfo {
    source: IdentitySource,
    object_id: Option<String>,
    app_id: Option<String>,
    client_id: Option<String>,
    tenant_id: Option<String>,
}

impl ServicePrincipalInfo {
    pub fn from_claims(claims: &UnverifiedClaims) -> Self {
        Self {
            source: IdentitySource::ManagedIdentityToken,
            object_id: claims.object_id().map(str::to_string),
            app_id: claims.app_id().map(str::to_string),
            client_id: None,
            tenant_id: claims.tenant_id().map(str::to_string),
        }
    }

    /// Claims of `token`. A token that cannot be decoded yields no fields.
    pub fn from_token(token: &Token) -> Self {
        let claims = decode_unverified(token.access_token()).unwrap_or_else(|err| {
            debug!("ignoring undecodable managed identity token: {err}");
            UnverifiedClaims::default()
        });
        Self::from_claims(&claims)
    }

    pub fn from_environment(settings: &EnvironmentSettings) -> Self {
        Self {
            source: IdentitySource::EnvironmentVariables,
            object_id: None,
            app_id: None,
            client_id: settings.client_id.clone(),
            tenant_id: settings.tenant_id.clone(),
        }
    }

    pub fn source(&self) -> IdentitySource {
        self.source
    }

    /// Detected fields, keyed by their log field name.
    pub fn fields(&self) -> BTreeMap<&'static str, &str> {
        [
            ("objectid", self.object_id.as_deref()),
            ("appid", self.app_id.as_deref()),
            ("clientid", self.client_id.as_deref()),
            ("tenantid", self.tenant_id.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    pub fn log(&self) {
        let objectid = self.object_id.as_deref();
        let appid = self.app_id.as_deref();
        let clientid = self.client_id.as_deref();
        let tenantid = self.tenant_id.as_deref();

        match self.source {
            IdentitySource::ManagedIdentityToken => {
                info!(objectid, appid, tenantid, "found MSI ServicePrincipal in auth token")
            }
            IdentitySource::EnvironmentVariables if self.is_empty() => {
                info!("unable to detect ServicePrincipal")
            }
            IdentitySource::EnvironmentVariables => {
                info!(clientid, tenantid, "using ServicePrincipal in ENV vars")
            }
        }
    }
}

/// Finds out which service principal the process runs as.
///
/// A managed or workload identity, when present, is asked for a fresh token whose claims are
/// reported; failing to get that token is an error. Otherwise the identifiers found in the
/// environment variables are reported, possibly none.
pub fn inspect<C, P>(
    settings: &EnvironmentSettings,
    environment: &AzureEnvironment,
    http_client: C,
    probe_client: &P,
) -> Result<ServicePrincipalInfo, CredentialError>
where
    C: HttpClient,
    P: HttpClient,
{
    match crate::credential::detect_managed_identity(settings, probe_client) {
        Some(method) => inspect_managed_identity(method, settings, environment, http_client),
        None => Ok(ServicePrincipalInfo::from_environment(settings)),
    }
}

fn inspect_managed_identity<C: HttpClient>(
    method: AuthMethod,
    settings: &EnvironmentSettings,
    environment: &AzureEnvironment,
    http_client: C,
) -> Result<ServicePrincipalInfo, CredentialError> {
    debug!(method = ?method, "managed identity detected");
    let audience = settings.audience(environment);
    let retriever = EnvironmentTokenRetriever::new(method, environment, &audience, http_client)?;
    let token = retriever.retrieve()?;

    Ok(ServicePrincipalInfo::from_token(&token))
}
