// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sealdrop Contributors

//! Account endpoints: email/password sign-up and sign-in, the OAuth
//! bridging callback, and the current-user view.
//!
//! OAuth token verification happens in the external identity collaborator;
//! the bridge endpoint only upserts an already-verified identity.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::{password, session, Auth},
    error::ApiError,
    state::AppState,
    storage::StoredUser,
};

/// Minimum accepted password length.
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SignupRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserView {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SignupResponse {
    pub user: UserView,
    pub message: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SigninRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub token: String,
    pub user: UserView,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OauthBridgeRequest {
    pub email: Option<String>,
    pub name: Option<String>,
    pub provider: Option<String>,
}

/// Current-user response.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub email: String,
    pub storage_used: u64,
    pub storage_limit: u64,
}

fn user_view(user: &StoredUser) -> UserView {
    UserView {
        id: user.user_id.clone(),
        name: user.name.clone(),
        email: user.email.clone(),
    }
}

fn new_account(state: &AppState, email: String, name: Option<String>) -> StoredUser {
    StoredUser {
        user_id: Uuid::new_v4().to_string(),
        email,
        name,
        password_hash: None,
        provider: None,
        storage_used: 0,
        storage_limit: state.policy.default_storage_limit,
        retention_days: state.policy.default_retention_days,
        created_at: Utc::now(),
    }
}

/// Create an account with email and password.
#[utoipa::path(
    post,
    path = "/api/auth/signup",
    tag = "Auth",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = SignupResponse),
        (status = 400, description = "Invalid input or duplicate email"),
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), ApiError> {
    let (Some(email), Some(pass)) = (request.email, request.password) else {
        return Err(ApiError::bad_request("Email and password are required"));
    };
    if email.is_empty() || pass.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }
    if pass.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(
            "Password must be at least 6 characters",
        ));
    }

    if state.db.get_user_by_email(&email)?.is_some() {
        return Err(ApiError::bad_request("User already exists"));
    }

    let hash = password::hash_password(&pass)
        .map_err(|e| ApiError::internal(format!("Something went wrong: {e}")))?;

    let mut user = new_account(&state, email, request.name);
    user.password_hash = Some(hash);
    state.db.create_user(&user)?;

    tracing::info!(user_id = %user.user_id, "account created");

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            user: user_view(&user),
            message: "User created successfully".to_string(),
        }),
    ))
}

/// Sign in with email and password, returning a session token.
#[utoipa::path(
    post,
    path = "/api/auth/signin",
    tag = "Auth",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Session issued", body = SessionResponse),
        (status = 400, description = "Missing credentials"),
        (status = 401, description = "Invalid credentials"),
    )
)]
pub async fn signin(
    State(state): State<AppState>,
    Json(request): Json<SigninRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let (Some(email), Some(pass)) = (request.email, request.password) else {
        return Err(ApiError::bad_request("Email and password are required"));
    };

    // One generic rejection for unknown email, OAuth-only account, and
    // wrong password alike.
    let invalid = || ApiError::unauthorized("Invalid email or password");

    let user = state.db.get_user_by_email(&email)?.ok_or_else(invalid)?;
    let hash = user.password_hash.as_deref().ok_or_else(invalid)?;
    if !password::verify_password(&pass, hash) {
        return Err(invalid());
    }

    let token = session::issue_token(&user.user_id, &state.sessions.secret)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(Json(SessionResponse {
        token,
        user: user_view(&user),
    }))
}

/// Bridge an externally-verified OAuth identity into a local account.
#[utoipa::path(
    post,
    path = "/api/auth/oauth",
    tag = "Auth",
    request_body = OauthBridgeRequest,
    responses(
        (status = 200, description = "Session issued", body = SessionResponse),
        (status = 400, description = "Missing email or provider"),
    )
)]
pub async fn oauth_bridge(
    State(state): State<AppState>,
    Json(request): Json<OauthBridgeRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let (Some(email), Some(provider)) = (request.email, request.provider) else {
        return Err(ApiError::bad_request("Email and provider are required"));
    };
    if email.is_empty() || provider.is_empty() {
        return Err(ApiError::bad_request("Email and provider are required"));
    }

    let user = match state.db.get_user_by_email(&email)? {
        Some(existing) => existing,
        None => {
            let mut user = new_account(&state, email, request.name);
            user.provider = Some(provider);
            state.db.create_user(&user)?;
            tracing::info!(user_id = %user.user_id, "account bridged from oauth provider");
            user
        }
    };

    let token = session::issue_token(&user.user_id, &state.sessions.secret)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(Json(SessionResponse {
        token,
        user: user_view(&user),
    }))
}

/// Get the current authenticated user's account and storage usage.
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "Auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Current user", body = MeResponse),
        (status = 401, description = "Unauthenticated"),
    )
)]
pub async fn me(
    State(state): State<AppState>,
    Auth(user): Auth,
) -> Result<Json<MeResponse>, ApiError> {
    let account = state
        .db
        .get_user(&user.user_id)?
        .ok_or_else(|| ApiError::unauthorized("Unknown user"))?;

    Ok(Json(MeResponse {
        id: account.user_id,
        name: account.name,
        email: account.email,
        storage_used: account.storage_used,
        storage_limit: account.storage_limit,
    }))
}
