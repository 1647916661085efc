use http::header::CONTENT_TYPE;
use serde::Deserialize;
use thiserror::Error;
use url::{Url, form_urlencoded};

use crate::ClientID;
use crate::http_client::HttpClient;
use crate::token::TokenResponse;
use crate::token_retriever::credential::ClientSecret;

const CLIENT_ASSERTION_TYPE_JWT_BEARER: &str =
    "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

#[derive(Error, Debug)]
pub enum AuthenticateError {
    #[error("unable to build request: `{0}`")]
    RequestError(String),
    #[error("unable to deserialize token: `{0}`")]
    DeserializeError(String),
    #[error("identity server error: Status code: `{0}`, Reason: `{1}`")]
    HttpResponseError(u16, String),
    #[error("http transport error: `{0}`")]
    HttpTransportError(String),
}

pub trait Authenticator {
    fn authenticate(&self, req: TokenRequest) -> Result<TokenResponse, AuthenticateError>;
}

/// Obtains access tokens from the Entra ID v2 token endpoint of one tenant.
pub struct HttpAuthenticator<C> {
    http_client: C,
    /// `{authority}/{tenant}/oauth2/v2.0/token`
    url: Url,
}

impl<C> HttpAuthenticator<C> {
    pub fn new(http_client: C, url: Url) -> Self {
        Self { http_client, url }
    }

    /// Builds the token endpoint of `tenant_id` below the given authority host.
    pub fn token_endpoint(authority: &Url, tenant_id: &str) -> Result<Url, AuthenticateError> {
        authority
            .join(&format!("{tenant_id}/oauth2/v2.0/token"))
            .map_err(|e| AuthenticateError::RequestError(format!("invalid token endpoint: {e}")))
    }
}

impl<C> Authenticator for HttpAuthenticator<C>
where
    C: HttpClient,
{
    /// Executes a form encoded POST request against the token endpoint.
    fn authenticate(&self, req: TokenRequest) -> Result<TokenResponse, AuthenticateError> {
        let request = http::Request::builder()
            .method("POST")
            .uri(self.url.as_str())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(req.form_body().into_bytes())
            .map_err(|e| AuthenticateError::RequestError(e.to_string()))?;

        let response = self
            .http_client
            .send(request)
            .map_err(|e| AuthenticateError::HttpTransportError(e.to_string()))?;

        let body: String = String::from_utf8(response.body().clone()).map_err(|e| {
            AuthenticateError::DeserializeError(format!("invalid utf8 response: {}", e))
        })?;

        if !response.status().is_success() {
            return Err(AuthenticateError::HttpResponseError(
                response.status().as_u16(),
                describe_error(&body),
            ));
        }

        serde_json::from_str(body.as_str())
            .map_err(|e| AuthenticateError::DeserializeError(e.to_string()))
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    error_description: String,
}

/// Entra ID errors come as JSON, keep the raw body for anything else.
fn describe_error(body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(err) if err.error_description.is_empty() => err.error,
        Ok(err) => format!("{}: {}", err.error, err.error_description),
        Err(_) => body.to_string(),
    }
}

/// Credential presented to the token endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthCredential {
    ClientSecret { client_secret: ClientSecret },
    ClientAssertion { client_assertion: String },
    Password { username: String, password: ClientSecret },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenRequest {
    pub client_id: ClientID,
    pub scope: String,
    pub credential: AuthCredential,
}

impl TokenRequest {
    pub(crate) fn form_body(&self) -> String {
        let mut form = form_urlencoded::Serializer::new(String::new());
        form.append_pair("client_id", &self.client_id)
            .append_pair("scope", &self.scope);

        match &self.credential {
            AuthCredential::ClientSecret { client_secret } => {
                form.append_pair("grant_type", "client_credentials")
                    .append_pair("client_secret", client_secret.expose());
            }
            AuthCredential::ClientAssertion { client_assertion } => {
                form.append_pair("grant_type", "client_credentials")
                    .append_pair("client_assertion_type", CLIENT_ASSERTION_TYPE_JWT_BEARER)
                    .append_pair("client_assertion", client_assertion);
            }
            AuthCredential::Password { username, password } => {
                form.append_pair("grant_type", "password")
                    .append_pair("username", username)
                    .append_pair("password", password.expose());
            }
        }

        form.finish()
    }
}
