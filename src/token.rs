use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::TokenRetrieverError;

pub type AccessToken = String;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum TokenType {
    Bearer,
}

#[derive(Clone, PartialEq)]
pub struct Token {
    expires_at: DateTime<Utc>,
    access_token: AccessToken,
    token_type: TokenType,
}

impl TryFrom<&str> for TokenType {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "Bearer" | "bearer" => Ok(TokenType::Bearer),
            _ => Err(format!("Invalid token type: {value}")),
        }
    }
}

impl Token {
    pub fn new(
        access_token: AccessToken,
        token_type: TokenType,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Token {
            access_token,
            token_type,
            expires_at,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.lt(&Utc::now())
    }

    pub fn access_token(&self) -> &AccessToken {
        &self.access_token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Value for the `Authorization` header of authorized requests.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::Bearer => write!(f, "Bearer"),
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("token_type", &self.token_type)
            .field("access_token", &"<hidden>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Token endpoint response body.
///
/// Entra ID reports `expires_in` as a number, the managed identity endpoints report it (and
/// `expires_on`) as strings, so both representations are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: AccessToken,
    pub token_type: String,
    /// The lifetime in seconds of the access token.
    #[serde(default, deserialize_with = "number_or_string")]
    pub expires_in: Option<u64>,
    /// Expiration as seconds since the unix epoch.
    #[serde(default, deserialize_with = "number_or_string")]
    pub expires_on: Option<u64>,
}

fn number_or_string<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        String(String),
    }

    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => Ok(Some(n)),
        Some(NumberOrString::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

impl TryFrom<TokenResponse> for Token {
    type Error = TokenRetrieverError;

    fn try_from(response: TokenResponse) -> Result<Self, Self::Error> {
        let token_type = TokenType::try_from(response.token_type.as_str())
            .map_err(TokenRetrieverError::TokenRetrieverError)?;

        let expires_at = match (response.expires_in, response.expires_on) {
            (Some(expires_in), _) => {
                let time_delta = TimeDelta::from_std(Duration::from_secs(expires_in))
                    .map_err(|e| TokenRetrieverError::TokenRetrieverError(e.to_string()))?;
                Utc::now().checked_add_signed(time_delta).ok_or_else(|| {
                    TokenRetrieverError::TokenRetrieverError(
                        "Failed to calculate expiration time".to_string(),
                    )
                })?
            }
            (None, Some(expires_on)) => i64::try_from(expires_on)
                .ok()
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
                .ok_or_else(|| {
                    TokenRetrieverError::TokenRetrieverError(format!(
                        "invalid expires_on timestamp: {expires_on}"
                    ))
                })?,
            (None, None) => {
                return Err(TokenRetrieverError::TokenRetrieverError(
                    "token response carries no expiration".to_string(),
                ));
            }
        };

        Ok(Token::new(response.access_token, token_type, expires_at))
    }
}

#[cfg(test)]
mod test {
    use assert_matches::assert_matches;
    use chrono::{Duration, Utc};

    use super::*;

    #[test]
    fn token_is_expired() {
        let past = Utc::now() - Duration::milliseconds(10);
        let token = Token::new(AccessToken::from("some-token"), TokenType::Bearer, past);
        assert!(token.is_expired())
    }

    #[test]
    fn token_is_not_expired() {
        let future = Utc::now() + Duration::seconds(10);
        let token = Token::new(AccessToken::from("some-token"), TokenType::Bearer, future);
        assert!(!token.is_expired())
    }

    #[test]
    fn debug_output_hides_access_token() {
        let token = Token::new("secret-value".into(), TokenType::Bearer, Utc::now());
        assert!(!format!("{token:?}").contains("secret-value"));
        assert_eq!(token.authorization_header(), "Bearer secret-value");
    }

    #[test]
    fn entra_response_with_numeric_expiry() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"token_type":"Bearer","expires_in":3599,"ext_expires_in":3599,"access_token":"abc"}"#,
        )
        .unwrap();
        let token = Token::try_from(response).unwrap();

        assert_eq!(token.access_token(), "abc");
        assert!(token.expires_at() > Utc::now() + Duration::seconds(3500));
    }

    #[test]
    fn managed_identity_response_with_string_expiry() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"abc","expires_in":"86399","expires_on":"1700000000","resource":"https://management.azure.com/","token_type":"Bearer"}"#,
        )
        .unwrap();

        assert_eq!(response.expires_in, Some(86399));
        assert_eq!(response.expires_on, Some(1_700_000_000));
    }

    #[test]
    fn app_service_response_with_only_expires_on() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"abc","expires_on":"1700000000","token_type":"Bearer"}"#,
        )
        .unwrap();
        let token = Token::try_from(response).unwrap();

        assert_eq!(token.expires_at().timestamp(), 1_700_000_000);
    }

    #[test]
    fn token_retrieval_response_incorrect_time() {
        let response = TokenResponse {
            access_token: "some-token".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: Some(u64::MAX),
            expires_on: None,
        };
        let err = Token::try_from(response).unwrap_err();

        assert_matches!(
            err,
            TokenRetrieverError::TokenRetrieverError(e) if e == "Source duration value is out of range for the target type"
        );
    }

    #[test]
    fn response_without_expiry_is_rejected() {
        let response = TokenResponse {
            access_token: "some-token".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: None,
            expires_on: None,
        };

        assert!(Token::try_from(response).is_err());
    }

    #[test]
    fn unknown_token_type_is_rejected() {
        let response = TokenResponse {
            access_token: "some-token".to_string(),
            token_type: "pop".to_string(),
            expires_in: Some(10),
            expires_on: None,
        };

        assert_matches!(
            Token::try_from(response),
            Err(TokenRetrieverError::TokenRetrieverError(e)) if e == "Invalid token type: pop"
        );
    }
}
