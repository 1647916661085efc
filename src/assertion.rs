//! Client assertions: short-lived JWTs an application signs with its certificate key and presents
//! to Entra ID in place of a client secret.
pub mod certificate;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Lifetime of a signed assertion. It is consumed right away by the token request.
pub const ASSERTION_LIFETIME: TimeDelta = TimeDelta::seconds(600);

#[derive(Error, Debug)]
pub enum AssertionError {
    #[error("unable to sign assertion: `{0}`")]
    Signing(String),
    #[error("timestamp out of range: `{0}`")]
    Timestamp(DateTime<Utc>),
}

/// Claims of a client assertion.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct AssertionClaims {
    /// Client ID.
    pub(crate) iss: String,
    /// Client ID.
    pub(crate) sub: String,
    /// Token endpoint of the tenant.
    pub(crate) aud: String,
    /// Unique per assertion, Entra ID rejects replays.
    pub(crate) jti: Uuid,
    pub(crate) nbf: u64,
    pub(crate) exp: u64,
}

impl AssertionClaims {
    /// Claims valid from `issued_at` for `lifetime`.
    pub fn new(
        client_id: &str,
        aud: &str,
        issued_at: DateTime<Utc>,
        lifetime: TimeDelta,
    ) -> Result<Self, AssertionError> {
        Ok(Self {
            iss: client_id.to_string(),
            sub: client_id.to_string(),
            aud: aud.to_string(),
            jti: Uuid::now_v7(),
            nbf: unix_timestamp(issued_at)?,
            exp: unix_timestamp(issued_at + lifetime)?,
        })
    }
}

fn unix_timestamp(at: DateTime<Utc>) -> Result<u64, AssertionError> {
    u64::try_from(at.timestamp()).map_err(|_| AssertionError::Timestamp(at))
}

/// Compact serialization of a signed assertion.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedAssertion(pub(crate) String);

impl SignedAssertion {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait AssertionSigner {
    fn sign(&self, claims: AssertionClaims) -> Result<SignedAssertion, AssertionError>;
}
