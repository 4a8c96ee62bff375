// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sealdrop Contributors

//! Upload endpoints: direct multipart upload and completion of
//! pre-registered pending transfers.
//!
//! Uploads are buffered fully in memory (bounded by the configured body
//! limit), encrypted in one call, and written in one call. The per-file
//! key is persisted only for authenticated owners; anonymous uploaders get
//! it embedded in the returned download link and the server keeps no copy.

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::{Auth, AuthenticatedUser, OptionalAuth},
    crypto::{self, TransferKey},
    error::ApiError,
    state::AppState,
    storage::{StoredTransfer, TransferDbError, TransferStatus},
};

/// Fallback MIME type when the client does not declare one.
const OCTET_STREAM: &str = "application/octet-stream";

/// Upload response returned to the client.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub file_id: String,
    pub file_name: String,
    pub file_size: u64,
    pub download_link: String,
    pub expires_at: DateTime<Utc>,
    /// Present only for authenticated uploaders; anonymous links embed it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<String>,
}

/// A fully buffered multipart file field.
pub(crate) struct IncomingFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Pull the `file` field out of a multipart body.
async fn read_file_field(mut multipart: Multipart) -> Result<IncomingFile, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::bad_request("Invalid multipart body"))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let name = field
            .file_name()
            .filter(|n| !n.is_empty())
            .unwrap_or("upload.bin")
            .to_string();
        let content_type = field
            .content_type()
            .unwrap_or(OCTET_STREAM)
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|_| ApiError::bad_request("Failed to read uploaded file"))?
            .to_vec();

        return Ok(IncomingFile {
            name,
            content_type,
            bytes,
        });
    }

    Err(ApiError::bad_request("No file uploaded"))
}

/// Upload a file.
///
/// Anonymous uploads are accepted; authenticated uploads count against the
/// owner's storage quota and keep the key server-side.
#[utoipa::path(
    post,
    path = "/api/upload",
    tag = "Upload",
    responses(
        (status = 200, description = "File stored", body = UploadResponse),
        (status = 400, description = "Missing or oversized file"),
        (status = 500, description = "Storage failure"),
    )
)]
pub async fn upload(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let file = read_file_field(multipart).await?;
    let response = store_new_transfer(&state, user.as_ref(), file)?;
    Ok(Json(response))
}

/// Complete a pre-registered pending transfer with its file content.
#[utoipa::path(
    post,
    path = "/api/upload/{id}",
    tag = "Upload",
    params(("id" = String, Path, description = "Pending transfer identifier")),
    responses(
        (status = 200, description = "Transfer completed", body = UploadResponse),
        (status = 400, description = "Missing file or transfer not pending"),
        (status = 401, description = "Unauthenticated"),
        (status = 404, description = "Unknown transfer"),
    )
)]
pub async fn complete_upload(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(transfer_id): Path<String>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let file = read_file_field(multipart).await?;
    let response = complete_pending_transfer(&state, &user, &transfer_id, file)?;
    Ok(Json(response))
}

/// Store a brand-new transfer: reserve quota, encrypt, write blob, insert
/// the record. Extracted from the handler so tests can drive it without
/// constructing multipart bodies.
pub(crate) fn store_new_transfer(
    state: &AppState,
    user: Option<&AuthenticatedUser>,
    file: IncomingFile,
) -> Result<UploadResponse, ApiError> {
    let file_size = file.bytes.len() as u64;
    if file_size > state.policy.max_upload_bytes {
        return Err(ApiError::bad_request("File exceeds the maximum upload size"));
    }

    // Authenticated uploads reserve quota up front; every failure path
    // below has to give the reservation back.
    let mut retention_days = state.policy.default_retention_days;
    if let Some(user) = user {
        let account = state
            .db
            .get_user(&user.user_id)?
            .ok_or_else(|| ApiError::unauthorized("Unknown user"))?;
        retention_days = account.retention_days;

        state.db.try_reserve_storage(&user.user_id, file_size)?;
    }

    let release_on_failure = |state: &AppState| {
        if let Some(user) = user {
            if let Err(e) = state.db.release_storage(&user.user_id, file_size) {
                tracing::warn!(user_id = %user.user_id, error = %e, "failed to release quota");
            }
        }
    };

    let transfer_id = Uuid::new_v4().to_string();
    let key = TransferKey::generate();
    let key_hex = key.to_hex();

    let envelope = crypto::encrypt(&file.bytes, &key).map_err(|e| {
        release_on_failure(state);
        tracing::error!(error = %e, "encryption failed");
        ApiError::internal("Upload failed")
    })?;

    state.blobs.write(&transfer_id, &envelope).map_err(|e| {
        release_on_failure(state);
        tracing::error!(transfer_id = %transfer_id, error = %e, "blob write failed");
        ApiError::internal("Upload failed")
    })?;

    let now = Utc::now();
    let download_link = match user {
        Some(_) => state.policy.download_link(&transfer_id, None),
        None => state.policy.download_link(&transfer_id, Some(&key_hex)),
    };
    let transfer = StoredTransfer {
        id: transfer_id.clone(),
        user_id: user.map(|u| u.user_id.clone()),
        file_name: file.name,
        file_size,
        file_type: file.content_type,
        upload_date: now,
        expires_at: now + Duration::days(i64::from(retention_days)),
        download_count: 0,
        last_download_at: None,
        encryption_key: user.map(|_| key_hex.clone()),
        download_link: download_link.clone(),
        status: TransferStatus::Active,
    };

    if let Err(e) = state.db.insert_transfer(&transfer) {
        release_on_failure(state);
        if let Err(remove_err) = state.blobs.remove(&transfer_id) {
            tracing::warn!(transfer_id = %transfer_id, error = %remove_err, "orphan blob cleanup failed");
        }
        tracing::error!(transfer_id = %transfer_id, error = %e, "transfer insert failed");
        return Err(ApiError::internal("Upload failed"));
    }

    tracing::info!(
        transfer_id = %transfer.id,
        file_size,
        authenticated = user.is_some(),
        "transfer stored"
    );

    Ok(UploadResponse {
        success: true,
        file_id: transfer.id,
        file_name: transfer.file_name,
        file_size,
        download_link,
        expires_at: transfer.expires_at,
        encryption_key: user.map(|_| key_hex),
    })
}

/// Attach file content to a pending transfer created via
/// `POST /api/transfers`.
pub(crate) fn complete_pending_transfer(
    state: &AppState,
    user: &AuthenticatedUser,
    transfer_id: &str,
    file: IncomingFile,
) -> Result<UploadResponse, ApiError> {
    let pending = state
        .db
        .get_transfer(transfer_id)?
        .ok_or_else(|| ApiError::not_found("Transfer not found"))?;

    // Pending transfers are only visible to their owner.
    if pending.user_id.as_deref() != Some(user.user_id.as_str()) {
        return Err(ApiError::not_found("Transfer not found"));
    }
    if pending.status != TransferStatus::Pending {
        return Err(ApiError::bad_request("Transfer is not pending"));
    }

    let file_size = file.bytes.len() as u64;
    if file_size > state.policy.max_upload_bytes {
        return Err(ApiError::bad_request("File exceeds the maximum upload size"));
    }

    state.db.try_reserve_storage(&user.user_id, file_size)?;

    let key = TransferKey::generate();
    let key_hex = key.to_hex();

    let envelope = crypto::encrypt(&file.bytes, &key).map_err(|e| {
        let _ = state.db.release_storage(&user.user_id, file_size);
        tracing::error!(error = %e, "encryption failed");
        ApiError::internal("Upload failed")
    })?;

    state.blobs.write(transfer_id, &envelope).map_err(|e| {
        let _ = state.db.release_storage(&user.user_id, file_size);
        tracing::error!(transfer_id = %transfer_id, error = %e, "blob write failed");
        ApiError::internal("Upload failed")
    })?;

    let activated = match state.db.activate_transfer(
        transfer_id,
        &file.name,
        file_size,
        &file.content_type,
        Some(key_hex.clone()),
    ) {
        Ok(transfer) => transfer,
        Err(TransferDbError::AlreadyExists(_)) => {
            // Lost a completion race; the winner owns the blob now.
            let _ = state.db.release_storage(&user.user_id, file_size);
            return Err(ApiError::bad_request("Transfer is not pending"));
        }
        Err(e) => {
            let _ = state.db.release_storage(&user.user_id, file_size);
            return Err(e.into());
        }
    };

    tracing::info!(transfer_id = %transfer_id, file_size, "pending transfer completed");

    Ok(UploadResponse {
        success: true,
        file_id: activated.id,
        file_name: activated.file_name,
        file_size,
        download_link: state.policy.download_link(transfer_id, None),
        expires_at: activated.expires_at,
        encryption_key: Some(key_hex),
    })
}

/// Shared fixtures for handler tests (download and transfers tests reuse
/// the upload path to seed state).
#[cfg(test)]
pub(crate) mod tests_helpers {
    use super::*;
    use crate::storage::StoredUser;

    pub(crate) fn incoming(name: &str, bytes: &[u8]) -> IncomingFile {
        IncomingFile {
            name: name.to_string(),
            content_type: "text/plain".to_string(),
            bytes: bytes.to_vec(),
        }
    }

    pub(crate) fn seed_user(
        state: &AppState,
        user_id: &str,
        storage_limit: u64,
    ) -> AuthenticatedUser {
        state
            .db
            .create_user(&StoredUser {
                user_id: user_id.to_string(),
                email: format!("{user_id}@example.com"),
                name: None,
                password_hash: None,
                provider: None,
                storage_used: 0,
                storage_limit,
                retention_days: 7,
                created_at: Utc::now(),
            })
            .unwrap();
        AuthenticatedUser {
            user_id: user_id.to_string(),
        }
    }

    pub(crate) fn anonymous_upload(state: &AppState, name: &str, bytes: &[u8]) -> UploadResponse {
        store_new_transfer(state, None, incoming(name, bytes)).unwrap()
    }

    pub(crate) fn authenticated_upload(
        state: &AppState,
        user: &AuthenticatedUser,
        name: &str,
        bytes: &[u8],
    ) -> UploadResponse {
        store_new_transfer(state, Some(user), incoming(name, bytes)).unwrap()
    }
}
