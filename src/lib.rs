pub mod assertion;
pub mod authenticator;
pub mod credential;
pub mod environment;
pub mod http;
pub mod http_client;
pub mod identity;
pub mod logging;
pub mod managed_identity;
pub mod parameters;
pub mod report;
pub mod resource_manager;
pub mod session;
pub mod signal;
pub mod token;
pub mod token_retriever;

use crate::token::Token;
use thiserror::Error;

pub type ClientID = String;
pub type TenantID = String;

#[derive(Error, Debug)]
pub enum TokenRetrieverError {
    #[error("retrieving token: `{0}`")]
    TokenRetrieverError(String),
    #[error("signing client assertion: `{0}`")]
    AssertionError(#[from] assertion::AssertionError),
    #[error("fetching access token: `{0}`")]
    AuthenticatorError(#[from] authenticator::AuthenticateError),
    #[error("reading federated token file: `{0}`")]
    FederatedTokenError(#[from] std::io::Error),
}

/// The TokenRetriever is responsible for retrieving an authorization token.
pub trait TokenRetriever {
    fn retrieve(&self) -> Result<Token, TokenRetrieverError>;
}
