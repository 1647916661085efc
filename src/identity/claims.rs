//! Display-only view of the claims carried by a bearer token.
//!
//! The signature of the token is NOT verified here. Nothing in this module can be used to make an
//! authorization decision: [`UnverifiedClaims`] only exposes string values meant to be logged.
use std::collections::HashMap;

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClaimsError {
    #[error("decoding token payload: `{0}`")]
    Decode(#[from] jsonwebtoken::errors::Error),
}

/// Advisory identity claims of a token whose signature was not checked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnverifiedClaims {
    object_id: Option<String>,
    app_id: Option<String>,
    tenant_id: Option<String>,
}

impl UnverifiedClaims {
    /// `oid` claim.
    pub fn object_id(&self) -> Option<&str> {
        self.object_id.as_deref()
    }

    /// `appid` claim.
    pub fn app_id(&self) -> Option<&str> {
        self.app_id.as_deref()
    }

    /// `tid` claim.
    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }
}

/// Reads `oid`, `appid` and `tid` from the payload of `token`.
///
/// Claims that are absent or not strings are left empty.
pub fn decode_unverified(token: &str) -> Result<UnverifiedClaims, ClaimsError> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.insecure_disable_signature_validation();
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;

    let data = jsonwebtoken::decode::<HashMap<String, Value>>(
        token,
        &DecodingKey::from_secret(&[]),
        &validation,
    )?;

    let string_claim = |name: &str| {
        data.claims
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    Ok(UnverifiedClaims {
        object_id: string_claim("oid"),
        app_id: string_claim("appid"),
        tenant_id: string_claim("tid"),
    })
}
