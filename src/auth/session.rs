// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sealdrop Contributors

//! Session token issuing and verification.
//!
//! Sign-in (and the OAuth bridge) hand out an HS256 JWT carrying the user
//! id as `sub`; the extractors verify it against the configured secret.
//! External identity providers are never contacted here. OAuth
//! verification happens in the upstream identity collaborator before the
//! bridge endpoint is called.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::AuthError;

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Session token lifetime: 24 hours.
pub const TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// Claims carried by a session token.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
}

/// Authenticated user information extracted from a session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Canonical user ID (`sub` claim)
    pub user_id: String,
}

/// Issue a session token for a user.
pub fn issue_token(user_id: &str, secret: &str) -> Result<String, AuthError> {
    let now = Utc::now().timestamp();
    let claims = SessionClaims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + TOKEN_TTL_SECS,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::InternalError(e.to_string()))
}

/// Verify a session token and extract the user.
pub fn verify_token(token: &str, secret: &str) -> Result<AuthenticatedUser, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = CLOCK_SKEW_LEEWAY;

    let token_data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        _ => AuthError::MalformedToken,
    })?;

    Ok(AuthenticatedUser {
        user_id: token_data.claims.sub,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn issued_token_verifies() {
        let token = issue_token("user_123", SECRET).unwrap();
        let user = verify_token(&token, SECRET).unwrap();
        assert_eq!(user.user_id, "user_123");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_token("user_123", SECRET).unwrap();
        let err = verify_token(&token, "other-secret").unwrap_err();
        assert!(matches!(err, AuthError::InvalidSignature));
    }

    #[test]
    fn garbage_token_is_malformed() {
        let err = verify_token("not.a.jwt", SECRET).unwrap_err();
        assert!(matches!(err, AuthError::MalformedToken));
    }

    #[test]
    fn expired_token_is_rejected() {
        let past = Utc::now().timestamp() - 2 * TOKEN_TTL_SECS;
        let claims = SessionClaims {
            sub: "user_123".to_string(),
            iat: past,
            exp: past + TOKEN_TTL_SECS,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        let err = verify_token(&token, SECRET).unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired));
    }
}
