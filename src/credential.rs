//! Environment driven credential chain.
//!
//! The chain mirrors what the Azure SDKs call "environment credential" followed by workload and
//! managed identity: the first method whose settings are complete is used, and the resulting
//! [`Authorizer`] holds the single token obtained for the whole run.
pub mod settings;

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info};

use crate::assertion::certificate::{CertificateError, CertificateSigner};
use crate::authenticator::HttpAuthenticator;
use crate::environment::AzureEnvironment;
use crate::http_client::HttpClient;
use crate::managed_identity::{self, ManagedIdentityRetriever, ManagedIdentitySource};
use crate::token::Token;
use crate::token_retriever::credential::ClientSecret;
use crate::token_retriever::{EntraTokenRetriever, default_scope};
use crate::{ClientID, TenantID, TokenRetriever, TokenRetrieverError};
use settings::EnvironmentSettings;

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error(
        "no Azure credential found in environment (tried client secret, client certificate, username/password, workload identity and managed identity)"
    )]
    NoCredential,
    #[error("invalid credential setting: `{0}`")]
    InvalidSetting(String),
    #[error(
        "AZURE_CERTIFICATE_PATH `{0}` points to a PKCS#12 bundle, which is not supported: convert it to PEM (certificate and private key) and set AZURE_CLIENT_CERTIFICATE_PATH"
    )]
    Pkcs12Certificate(String),
    #[error("loading client certificate: `{0}`")]
    Certificate(#[from] CertificateError),
    #[error("acquiring access token: `{0}`")]
    Token(#[from] TokenRetrieverError),
    #[error("access token already expired at {0}")]
    ExpiredToken(DateTime<Utc>),
}

/// Authentication method selected from the environment.
#[derive(Clone, PartialEq)]
pub enum AuthMethod {
    ClientSecret {
        tenant_id: TenantID,
        client_id: ClientID,
        secret: ClientSecret,
    },
    ClientCertificate {
        tenant_id: TenantID,
        client_id: ClientID,
        path: PathBuf,
    },
    UsernamePassword {
        tenant_id: TenantID,
        client_id: ClientID,
        username: String,
        password: ClientSecret,
    },
    WorkloadIdentity {
        tenant_id: TenantID,
        client_id: ClientID,
        token_file: PathBuf,
    },
    ManagedIdentity {
        source: ManagedIdentitySource,
        client_id: Option<ClientID>,
    },
}

impl AuthMethod {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ClientSecret { .. } => "ClientSecret",
            Self::ClientCertificate { .. } => "ClientCertificate",
            Self::UsernamePassword { .. } => "UsernamePassword",
            Self::WorkloadIdentity { .. } => "WorkloadIdentity",
            Self::ManagedIdentity { .. } => "ManagedIdentity",
        }
    }
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ManagedIdentity { source, client_id } => f
                .debug_struct("ManagedIdentity")
                .field("source", source)
                .field("client_id", client_id)
                .finish(),
            other => write!(f, "{}: redacted", other.name()),
        }
    }
}

/// Picks the first complete method, in order: client secret, client certificate,
/// username/password, workload identity, managed identity.
///
/// Only the last step performs I/O (the IMDS probe through `probe_client`). A PKCS#12 certificate
/// in the certificate position is an error.
pub fn select_auth_method<P: HttpClient>(
    settings: &EnvironmentSettings,
    probe_client: &P,
) -> Result<Option<AuthMethod>, CredentialError> {
    if let (Some(tenant_id), Some(client_id)) = (&settings.tenant_id, &settings.client_id) {
        if let Some(secret) = &settings.client_secret {
            return Ok(Some(AuthMethod::ClientSecret {
                tenant_id: tenant_id.to_owned(),
                client_id: client_id.to_owned(),
                secret: secret.to_owned(),
            }));
        }
        if let Some(path) = &settings.certificate_path {
            return Ok(Some(AuthMethod::ClientCertificate {
                tenant_id: tenant_id.to_owned(),
                client_id: client_id.to_owned(),
                path: path.to_owned(),
            }));
        }
        if let Some(path) = &settings.pkcs12_certificate_path {
            return Err(CredentialError::Pkcs12Certificate(path.display().to_string()));
        }
        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            return Ok(Some(AuthMethod::UsernamePassword {
                tenant_id: tenant_id.to_owned(),
                client_id: client_id.to_owned(),
                username: username.to_owned(),
                password: password.to_owned(),
            }));
        }
    }

    Ok(detect_managed_identity(settings, probe_client))
}

/// Workload or managed identity available to this process, if any.
pub fn detect_managed_identity<P: HttpClient>(
    settings: &EnvironmentSettings,
    probe_client: &P,
) -> Option<AuthMethod> {
    if let Some(workload) = settings.workload_identity() {
        return Some(AuthMethod::WorkloadIdentity {
            tenant_id: workload.tenant_id,
            client_id: workload.client_id,
            token_file: workload.token_file,
        });
    }

    managed_identity::detect(settings, probe_client).map(|source| AuthMethod::ManagedIdentity {
        source,
        client_id: settings.client_id.clone(),
    })
}

/// Token retriever for any [`AuthMethod`], statically dispatched.
pub enum EnvironmentTokenRetriever<C: HttpClient> {
    Entra(EntraTokenRetriever<HttpAuthenticator<C>, CertificateSigner>),
    ManagedIdentity(ManagedIdentityRetriever<C>),
}

impl<C: HttpClient> fmt::Debug for EnvironmentTokenRetriever<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entra(_) => f.debug_tuple("Entra").finish(),
            Self::ManagedIdentity(retriever) => {
                f.debug_tuple("ManagedIdentity").field(retriever).finish()
            }
        }
    }
}

impl<C: HttpClient> TokenRetriever for EnvironmentTokenRetriever<C> {
    fn retrieve(&self) -> Result<Token, TokenRetrieverError> {
        match self {
            Self::Entra(retriever) => retriever.retrieve(),
            Self::ManagedIdentity(retriever) => retriever.retrieve(),
        }
    }
}

impl<C: HttpClient> EnvironmentTokenRetriever<C> {
    /// Creates the retriever for `method`, requesting tokens for `audience` in `environment`.
    pub fn new(
        method: AuthMethod,
        environment: &AzureEnvironment,
        audience: &str,
        http_client: C,
    ) -> Result<Self, CredentialError> {
        let scope = default_scope(audience);
        let authority = environment.active_directory_endpoint();
        let authenticator = |tenant_id: &str, http_client: C| {
            HttpAuthenticator::<C>::token_endpoint(&authority, tenant_id)
                .map(|url| HttpAuthenticator::new(http_client, url))
                .map_err(|e| CredentialError::InvalidSetting(e.to_string()))
        };

        let retriever = match method {
            AuthMethod::ClientSecret {
                tenant_id,
                client_id,
                secret,
            } => Self::Entra(EntraTokenRetriever::new_with_secret(
                client_id,
                scope,
                authenticator(&tenant_id, http_client)?,
                secret,
            )),
            AuthMethod::ClientCertificate {
                tenant_id,
                client_id,
                path,
            } => {
                let signer = CertificateSigner::from_file(&path)?;
                debug!(thumbprint = signer.thumbprint(), "loaded client certificate");
                let authenticator = authenticator(&tenant_id, http_client)?;
                let aud = HttpAuthenticator::<C>::token_endpoint(&authority, &tenant_id)
                    .map_err(|e| CredentialError::InvalidSetting(e.to_string()))?
                    .to_string();
                Self::Entra(EntraTokenRetriever::new_with_assertion_signer(
                    client_id,
                    scope,
                    authenticator,
                    aud,
                    signer,
                ))
            }
            AuthMethod::UsernamePassword {
                tenant_id,
                client_id,
                username,
                password,
            } => Self::Entra(EntraTokenRetriever::new_with_password(
                client_id,
                scope,
                authenticator(&tenant_id, http_client)?,
                username,
                password,
            )),
            AuthMethod::WorkloadIdentity {
                tenant_id,
                client_id,
                token_file,
            } => Self::Entra(EntraTokenRetriever::new_with_federated_token(
                client_id,
                scope,
                authenticator(&tenant_id, http_client)?,
                token_file,
            )),
            AuthMethod::ManagedIdentity { source, client_id } => {
                Self::ManagedIdentity(ManagedIdentityRetriever::new(
                    http_client,
                    source,
                    audience.to_string(),
                    client_id,
                ))
            }
        };

        Ok(retriever)
    }
}

/// Capability to authorize Resource Manager calls: one token, acquired once, never refreshed.
#[derive(Debug, Clone)]
pub struct Authorizer {
    method: &'static str,
    token: Token,
}

impl Authorizer {
    /// Resolves the credential chain and acquires the token.
    pub fn from_environment<C, P>(
        settings: &EnvironmentSettings,
        environment: &AzureEnvironment,
        http_client: C,
        probe_client: &P,
    ) -> Result<Self, CredentialError>
    where
        C: HttpClient,
        P: HttpClient,
    {
        let method =
            select_auth_method(settings, probe_client)?.ok_or(CredentialError::NoCredential)?;
        let name = method.name();
        info!(method = name, "using {name} credential from environment");

        let audience = settings.audience(environment);
        let retriever =
            EnvironmentTokenRetriever::new(method, environment, &audience, http_client)?;

        Self::from_retriever(name, &retriever)
    }

    pub fn from_retriever<R: TokenRetriever>(
        method: &'static str,
        retriever: &R,
    ) -> Result<Self, CredentialError> {
        let token = retriever.retrieve()?;
        // Never refreshed, so it has to be valid when acquired.
        if token.is_expired() {
            return Err(CredentialError::ExpiredToken(token.expires_at()));
        }
        debug!(method, expires_at = %token.expires_at(), "access token acquired");
        Ok(Self { method, token })
    }

    pub fn method(&self) -> &'static str {
        self.method
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    /// `Authorization` header value for authorized requests.
    pub fn authorization_header(&self) -> String {
        self.token.authorization_header()
    }
}
