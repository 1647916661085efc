use std::fmt;
use std::path::PathBuf;

use chrono::Utc;

use crate::TokenRetrieverError;
use crate::assertion::{ASSERTION_LIFETIME, AssertionClaims, AssertionSigner};
use crate::authenticator::AuthCredential;

/// Secret value that never shows up in debug output.
#[derive(Clone, PartialEq)]
pub struct ClientSecret(String);

impl<S: AsRef<str>> From<S> for ClientSecret {
    fn from(secret: S) -> Self {
        ClientSecret(secret.as_ref().to_string())
    }
}

impl ClientSecret {
    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientSecret: redacted")
    }
}

/// What an application presents to Entra ID to prove its identity.
pub enum ClientCredential<S: AssertionSigner> {
    Secret(ClientSecret),
    /// Assertion signed locally. `aud` is the token endpoint the assertion is sent to.
    Certificate { aud: String, signer: S },
    /// Projected service account token of a federated (workload) identity.
    FederatedToken(PathBuf),
    Password {
        username: String,
        password: ClientSecret,
    },
}

impl<S: AssertionSigner> fmt::Debug for ClientCredential<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Secret(_) => write!(f, "ClientSecret"),
            Self::Certificate { aud, .. } => {
                f.debug_struct("Certificate").field("aud", aud).finish()
            }
            Self::FederatedToken(path) => f.debug_tuple("FederatedToken").field(path).finish(),
            Self::Password { username, .. } => {
                f.debug_struct("Password").field("username", username).finish()
            }
        }
    }
}

impl<S: AssertionSigner> ClientCredential<S> {
    pub(super) fn build_request_auth_credential(
        &self,
        client_id: &str,
    ) -> Result<AuthCredential, TokenRetrieverError> {
        match self {
            Self::Secret(secret) => Ok(AuthCredential::ClientSecret {
                client_secret: secret.to_owned(),
            }),
            Self::Certificate { aud, signer } => {
                let claims = AssertionClaims::new(client_id, aud, Utc::now(), ASSERTION_LIFETIME)?;
                let assertion = signer.sign(claims)?;

                Ok(AuthCredential::ClientAssertion {
                    client_assertion: assertion.as_str().into(),
                })
            }
            Self::FederatedToken(path) => {
                // The file is rotated by the platform, read it on every request.
                let assertion = std::fs::read_to_string(path)?;
                Ok(AuthCredential::ClientAssertion {
                    client_assertion: assertion.trim().to_string(),
                })
            }
            Self::Password { username, password } => Ok(AuthCredential::Password {
                username: username.to_owned(),
                password: password.to_owned(),
            }),
        }
    }
}
