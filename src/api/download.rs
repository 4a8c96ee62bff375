// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sealdrop Contributors

//! Download endpoints: decrypt-and-stream plus owner-initiated deletion.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    crypto::{self, TransferKey},
    error::ApiError,
    state::AppState,
    storage::{StorageError, TransferStatus},
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct DownloadQuery {
    /// Hex-encoded decryption key; falls back to the owner-persisted key.
    pub key: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

/// Download a transfer: look up, check expiry, count the download, read
/// the blob, decrypt, and stream with the original filename and type.
#[utoipa::path(
    get,
    path = "/api/download/{id}",
    tag = "Download",
    params(
        ("id" = String, Path, description = "Transfer identifier"),
        DownloadQuery,
    ),
    responses(
        (status = 200, description = "Decrypted file bytes"),
        (status = 400, description = "Missing or invalid decryption key"),
        (status = 404, description = "Unknown transfer or missing blob"),
        (status = 410, description = "Transfer expired"),
        (status = 500, description = "Decryption failure"),
    )
)]
pub async fn download(
    State(state): State<AppState>,
    Path(transfer_id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let transfer = state
        .db
        .get_transfer(&transfer_id)?
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    if transfer.is_expired_at(chrono::Utc::now()) {
        return Err(ApiError::gone("File has expired"));
    }

    let transfer = state.db.record_download(&transfer_id)?;

    let key_hex = query
        .key
        .or_else(|| transfer.encryption_key.clone())
        .ok_or_else(|| ApiError::bad_request("Decryption key required"))?;
    let key = TransferKey::from_hex(&key_hex)
        .map_err(|_| ApiError::bad_request("Invalid decryption key"))?;

    let envelope = state.blobs.read(&transfer_id).map_err(|e| match e {
        StorageError::NotFound(_) => ApiError::not_found("File not found"),
        other => other.into(),
    })?;

    let plaintext = crypto::decrypt(&envelope, &key).map_err(|e| {
        tracing::warn!(transfer_id = %transfer_id, error = %e, "decryption failed");
        ApiError::internal("File could not be decrypted")
    })?;

    let content_type = if transfer.file_type.is_empty() {
        "application/octet-stream"
    } else {
        transfer.file_type.as_str()
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", transfer.file_name),
        )
        .header(header::CONTENT_LENGTH, plaintext.len())
        .body(Body::from(plaintext))
        .map_err(|_| ApiError::internal("Download failed"))
}

/// Delete a transfer: remove the record, free the owner's quota, and
/// best-effort remove the blob.
#[utoipa::path(
    delete,
    path = "/api/download/{id}",
    tag = "Download",
    params(("id" = String, Path, description = "Transfer identifier")),
    responses(
        (status = 200, description = "Transfer deleted", body = DeleteResponse),
        (status = 404, description = "Unknown transfer"),
    )
)]
pub async fn delete(
    State(state): State<AppState>,
    Path(transfer_id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let removed = state
        .db
        .delete_transfer(&transfer_id)?
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    if removed.status == TransferStatus::Active {
        if let Some(user_id) = &removed.user_id {
            if let Err(e) = state.db.release_storage(user_id, removed.file_size) {
                tracing::warn!(user_id = %user_id, error = %e, "failed to release quota");
            }
        }
    }

    if let Err(e) = state.blobs.remove(&transfer_id) {
        tracing::warn!(transfer_id = %transfer_id, error = %e, "blob removal failed");
    }

    tracing::info!(transfer_id = %transfer_id, "transfer deleted");

    Ok(Json(DeleteResponse {
        success: true,
        message: "File deleted successfully".to_string(),
    }))
}
