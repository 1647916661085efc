use crate::assertion::AssertionSigner;
use crate::authenticator::{Authenticator, TokenRequest};
use crate::token::Token;
use crate::{ClientID, TokenRetriever, TokenRetrieverError};

use credential::{ClientCredential, ClientSecret};
use std::path::PathBuf;
use tracing::debug;

pub mod credential;

/// Scope requesting every permission granted on `audience` (`{audience}/.default`).
pub fn default_scope(audience: &str) -> String {
    format!("{}/.default", audience.trim_end_matches('/'))
}

/// Retrieves tokens from Entra ID for an application (service principal or federated identity).
///
/// Every call performs a new request, tokens are not cached.
#[derive(Debug)]
pub struct EntraTokenRetriever<A, S>
where
    A: Authenticator,
    S: AssertionSigner,
{
    client_id: ClientID,
    scope: String,
    credential: ClientCredential<S>,
    authenticator: A,
}

impl<A, S> TokenRetriever for EntraTokenRetriever<A, S>
where
    A: Authenticator,
    S: AssertionSigner,
{
    fn retrieve(&self) -> Result<Token, TokenRetrieverError> {
        let credential = self
            .credential
            .build_request_auth_credential(&self.client_id)?;

        let request = TokenRequest {
            client_id: self.client_id.to_owned(),
            scope: self.scope.to_owned(),
            credential,
        };

        let response = self.authenticator.authenticate(request)?;
        debug!(client_id = %self.client_id, "access token retrieved from Entra ID");

        Token::try_from(response)
    }
}

impl<A, S> EntraTokenRetriever<A, S>
where
    A: Authenticator,
    S: AssertionSigner,
{
    pub fn new(
        client_id: ClientID,
        scope: String,
        credential: ClientCredential<S>,
        authenticator: A,
    ) -> Self {
        Self {
            client_id,
            scope,
            credential,
            authenticator,
        }
    }

    /// Authenticates with a client secret.
    pub fn new_with_secret(
        client_id: ClientID,
        scope: String,
        authenticator: A,
        secret: ClientSecret,
    ) -> Self {
        Self::new(
            client_id,
            scope,
            ClientCredential::Secret(secret),
            authenticator,
        )
    }

    /// Authenticates with an assertion signed by `signer`, whose audience is `aud`.
    pub fn new_with_assertion_signer(
        client_id: ClientID,
        scope: String,
        authenticator: A,
        aud: String,
        signer: S,
    ) -> Self {
        Self::new(
            client_id,
            scope,
            ClientCredential::Certificate { aud, signer },
            authenticator,
        )
    }

    /// Authenticates with the federated token stored at `token_file`.
    pub fn new_with_federated_token(
        client_id: ClientID,
        scope: String,
        authenticator: A,
        token_file: PathBuf,
    ) -> Self {
        Self::new(
            client_id,
            scope,
            ClientCredential::FederatedToken(token_file),
            authenticator,
        )
    }

    /// Authenticates a user with the resource owner password flow.
    pub fn new_with_password(
        client_id: ClientID,
        scope: String,
        authenticator: A,
        username: String,
        password: ClientSecret,
    ) -> Self {
        Self::new(
            client_id,
            scope,
            ClientCredential::Password { username, password },
            authenticator,
        )
    }
}
