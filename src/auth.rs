//! Token validation and channel identity.
//!
//! Tokens are issued elsewhere; this module only verifies them and turns the
//! subject claim into a numeric user id. A validated WebSocket connection gets
//! a [`Principal`] bound to it for its whole lifetime, and plain HTTP requests
//! resolve to an [`Audience`].

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ChatError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id, stringified by the issuer.
    pub sub: String,
    /// Expiration, seconds since the epoch.
    pub exp: usize,
}

/// Verifies session tokens minted by the external auth service.
#[derive(Clone)]
pub struct TokenValidator {
    key: DecodingKey,
}

impl TokenValidator {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Decode and verify a token, returning the user id from its subject.
    pub fn validate(&self, token: &str) -> Result<i64, ChatError> {
        let data =
            jsonwebtoken::decode::<Claims>(token, &self.key, &Validation::new(Algorithm::HS256))
                .map_err(|e| ChatError::InvalidToken(e.to_string()))?;

        data.claims
            .sub
            .parse::<i64>()
            .map_err(|_| ChatError::InvalidToken("non-numeric subject".to_string()))
    }
}

/// Identity bound to a real-time channel at connect time. Built once from the
/// validated token and carried with the connection; never re-derived from
/// client-supplied fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub session_id: String,
}

/// Caller identity on read paths that tolerate missing credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Anonymous,
    Identified(i64),
}

impl Audience {
    /// The user id, or `Unauthenticated` when there is none.
    pub fn user_id(self) -> Result<i64, ChatError> {
        match self {
            Audience::Identified(user_id) => Ok(user_id),
            Audience::Anonymous => Err(ChatError::Unauthenticated),
        }
    }
}

/// Pull a bearer token out of the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

impl<S> FromRequestParts<S> for Audience
where
    TokenValidator: axum::extract::FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ChatError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        use axum::extract::FromRef;

        let Some(token) = bearer_token(&parts.headers) else {
            return Ok(Audience::Anonymous);
        };

        let validator = TokenValidator::from_ref(state);
        let user_id = validator.validate(token)?;
        Ok(Audience::Identified(user_id))
    }
}

#[cfg(test)]
pub(crate) fn issue_token(user_id: i64, secret: &str) -> String {
    use jsonwebtoken::{EncodingKey, Header, encode};

    let claims = Claims {
        sub: user_id.to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_and_extracts_user_id() {
        let validator = TokenValidator::new("secret");
        let token = issue_token(42, "secret");
        assert_eq!(validator.validate(&token).unwrap(), 42);
    }

    #[test]
    fn rejects_wrong_secret() {
        let validator = TokenValidator::new("secret");
        let token = issue_token(42, "other");
        assert!(matches!(
            validator.validate(&token),
            Err(ChatError::InvalidToken(_))
        ));
    }

    #[test]
    fn rejects_non_numeric_subject() {
        use jsonwebtoken::{EncodingKey, Header, encode};

        let claims = Claims {
            sub: "nobody".to_string(),
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        let validator = TokenValidator::new("secret");
        assert!(matches!(
            validator.validate(&token),
            Err(ChatError::InvalidToken(_))
        ));
    }

    #[test]
    fn anonymous_audience_has_no_user() {
        assert!(Audience::Anonymous.user_id().is_err());
        assert_eq!(Audience::Identified(7).user_id().unwrap(), 7);
    }
}
