// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sealdrop Contributors

//! Axum extractors for authenticated users.
//!
//! Use the `Auth` extractor in handlers to require a session:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```
//!
//! `OptionalAuth` is for endpoints that serve both anonymous and
//! authenticated callers (e.g. upload).

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::{session, AuthenticatedUser, AuthError};
use crate::state::AppState;

/// Extractor that requires a valid session token.
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthHeader)?;

        let user = session::verify_token(token, &state.sessions.secret)?;
        Ok(Auth(user))
    }
}

/// Optional authentication extractor.
///
/// Returns `None` when no valid session is present, instead of rejecting:
/// anonymous uploads and downloads go through here.
pub struct OptionalAuth(pub Option<AuthenticatedUser>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match Auth::from_request_parts(parts, state).await {
            Ok(Auth(user)) => Ok(OptionalAuth(Some(user))),
            Err(_) => Ok(OptionalAuth(None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;
    use axum::http::Request;

    #[tokio::test]
    async fn auth_extractor_requires_auth_header() {
        let (state, _dir) = test_state();
        let mut parts = Request::builder()
            .uri("/test")
            .body(())
            .unwrap()
            .into_parts()
            .0;

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingAuthHeader)));
    }

    #[tokio::test]
    async fn auth_extractor_rejects_non_bearer_scheme() {
        let (state, _dir) = test_state();
        let mut parts = Request::builder()
            .uri("/test")
            .header("Authorization", "Basic dXNlcjpwYXNz")
            .body(())
            .unwrap()
            .into_parts()
            .0;

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidAuthHeader)));
    }

    #[tokio::test]
    async fn auth_extractor_accepts_valid_token() {
        let (state, _dir) = test_state();
        let token = session::issue_token("user_123", &state.sessions.secret).unwrap();
        let mut parts = Request::builder()
            .uri("/test")
            .header("Authorization", format!("Bearer {token}"))
            .body(())
            .unwrap()
            .into_parts()
            .0;

        let result = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(result.0.user_id, "user_123");
    }

    #[tokio::test]
    async fn optional_auth_returns_none_without_token() {
        let (state, _dir) = test_state();
        let mut parts = Request::builder()
            .uri("/test")
            .body(())
            .unwrap()
            .into_parts()
            .0;

        let result = OptionalAuth::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert!(result.0.is_none());
    }

    #[tokio::test]
    async fn optional_auth_returns_user_with_token() {
        let (state, _dir) = test_state();
        let token = session::issue_token("user_456", &state.sessions.secret).unwrap();
        let mut parts = Request::builder()
            .uri("/test")
            .header("Authorization", format!("Bearer {token}"))
            .body(())
            .unwrap()
            .into_parts()
            .0;

        let result = OptionalAuth::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(result.0.unwrap().user_id, "user_456");
    }
}
