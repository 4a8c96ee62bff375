// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sealdrop Contributors

//! Transfer listing, aggregate stats, and pre-registration of pending
//! transfers for the two-phase upload flow.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    auth::Auth,
    error::ApiError,
    state::AppState,
    storage::{StoredTransfer, TransferStatus},
};

const DEFAULT_PAGE: u64 = 1;
const DEFAULT_LIMIT: u64 = 10;

#[derive(Debug, Deserialize, IntoParams)]
pub struct PageQuery {
    /// 1-based page number (default 1).
    pub page: Option<u64>,
    /// Page size (default 10).
    pub limit: Option<u64>,
}

/// Transfer metadata as exposed to the owner. Never includes the
/// encryption key.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferSummary {
    pub id: String,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub upload_date: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub download_count: u64,
    pub status: TransferStatus,
    pub download_link: String,
}

impl From<StoredTransfer> for TransferSummary {
    fn from(transfer: StoredTransfer) -> Self {
        Self {
            id: transfer.id,
            file_name: transfer.file_name,
            file_size: transfer.file_size,
            file_type: transfer.file_type,
            upload_date: transfer.upload_date,
            expires_at: transfer.expires_at,
            download_count: transfer.download_count,
            status: transfer.status,
            download_link: transfer.download_link,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferStats {
    pub total_transfers: u64,
    pub active_transfers: u64,
    pub storage_used: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListTransfersResponse {
    pub transfers: Vec<TransferSummary>,
    pub pagination: Pagination,
    pub stats: TransferStats,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransferRequest {
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    /// Days until expiry (default 7).
    pub expires_in_days: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransferResponse {
    pub success: bool,
    pub transfer_id: String,
    pub upload_url: String,
}

/// List the caller's transfers, newest-first, with pagination metadata and
/// aggregate storage stats.
#[utoipa::path(
    get,
    path = "/api/transfers",
    tag = "Transfers",
    params(PageQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Page of transfers", body = ListTransfersResponse),
        (status = 400, description = "Non-positive page or limit"),
        (status = 401, description = "Unauthenticated"),
    )
)]
pub async fn list_transfers(
    State(state): State<AppState>,
    Auth(user): Auth,
    Query(query): Query<PageQuery>,
) -> Result<Json<ListTransfersResponse>, ApiError> {
    let page = query.page.unwrap_or(DEFAULT_PAGE);
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if page == 0 || limit == 0 {
        return Err(ApiError::bad_request("page and limit must be positive"));
    }

    let offset = (page - 1) * limit;
    let records = state.db.list_page(&user.user_id, offset, limit)?;
    let stats = state.db.user_transfer_stats(&user.user_id)?;

    let total = stats.total_transfers;
    Ok(Json(ListTransfersResponse {
        transfers: records.into_iter().map(TransferSummary::from).collect(),
        pagination: Pagination {
            page,
            limit,
            total,
            total_pages: total.div_ceil(limit),
        },
        stats: TransferStats {
            total_transfers: stats.total_transfers,
            active_transfers: stats.active_transfers,
            storage_used: stats.storage_used,
        },
    }))
}

/// Pre-register a pending transfer; the file itself arrives later via
/// `POST /api/upload/{id}`.
#[utoipa::path(
    post,
    path = "/api/transfers",
    tag = "Transfers",
    request_body = CreateTransferRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Pending transfer created", body = CreateTransferResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthenticated"),
    )
)]
pub async fn create_transfer(
    State(state): State<AppState>,
    Auth(user): Auth,
    Json(request): Json<CreateTransferRequest>,
) -> Result<Json<CreateTransferResponse>, ApiError> {
    if request.file_name.is_empty() {
        return Err(ApiError::bad_request("fileName is required"));
    }
    let expires_in_days = request
        .expires_in_days
        .unwrap_or(state.policy.default_retention_days);
    if expires_in_days == 0 {
        return Err(ApiError::bad_request("expiresInDays must be positive"));
    }

    let transfer_id = Uuid::new_v4().to_string();
    let now = Utc::now();
    let transfer = StoredTransfer {
        id: transfer_id.clone(),
        user_id: Some(user.user_id.clone()),
        file_name: request.file_name,
        file_size: request.file_size,
        file_type: request.file_type,
        upload_date: now,
        expires_at: now + Duration::days(i64::from(expires_in_days)),
        download_count: 0,
        last_download_at: None,
        encryption_key: None,
        download_link: state.policy.download_link(&transfer_id, None),
        status: TransferStatus::Pending,
    };
    state.db.insert_transfer(&transfer)?;

    tracing::info!(transfer_id = %transfer_id, user_id = %user.user_id, "pending transfer registered");

    Ok(Json(CreateTransferResponse {
        success: true,
        transfer_id: transfer_id.clone(),
        upload_url: format!("/api/upload/{transfer_id}"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::upload::tests_helpers::{authenticated_upload, seed_user};
    use crate::state::test_support::test_state;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn listing_pages_newest_first_with_stats() {
        let (state, _dir) = test_state();
        let user = seed_user(&state, "u-1", 10_000);

        for i in 0..3 {
            authenticated_upload(&state, &user, &format!("f{i}.txt"), &[0u8; 10]);
            // Distinct upload timestamps for a deterministic order.
            std::thread::sleep(std::time::Duration::from_millis(5));
        }

        let Json(response) = list_transfers(
            State(state.clone()),
            Auth(user.clone()),
            Query(PageQuery {
                page: None,
                limit: Some(2),
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.transfers.len(), 2);
        assert_eq!(response.transfers[0].file_name, "f2.txt");
        assert_eq!(response.transfers[1].file_name, "f1.txt");
        assert_eq!(response.pagination.total, 3);
        assert_eq!(response.pagination.total_pages, 2);
        assert_eq!(response.stats.total_transfers, 3);
        assert_eq!(response.stats.active_transfers, 3);
        assert_eq!(response.stats.storage_used, 30);

        let Json(page2) = list_transfers(
            State(state),
            Auth(user),
            Query(PageQuery {
                page: Some(2),
                limit: Some(2),
            }),
        )
        .await
        .unwrap();
        assert_eq!(page2.transfers.len(), 1);
        assert_eq!(page2.transfers[0].file_name, "f0.txt");
    }

    #[tokio::test]
    async fn listing_rejects_non_positive_paging() {
        let (state, _dir) = test_state();
        let user = seed_user(&state, "u-1", 1000);

        let err = list_transfers(
            State(state),
            Auth(user),
            Query(PageQuery {
                page: Some(0),
                limit: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn listing_never_exposes_encryption_keys() {
        let (state, _dir) = test_state();
        let user = seed_user(&state, "u-1", 1000);
        authenticated_upload(&state, &user, "secret.txt", b"data");

        let Json(response) = list_transfers(
            State(state),
            Auth(user),
            Query(PageQuery {
                page: None,
                limit: None,
            }),
        )
        .await
        .unwrap();

        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("encryptionKey"));
        assert!(!json.contains("encryption_key"));
    }

    #[tokio::test]
    async fn create_transfer_registers_pending_record() {
        let (state, _dir) = test_state();
        let user = seed_user(&state, "u-1", 1000);

        let Json(response) = create_transfer(
            State(state.clone()),
            Auth(user),
            Json(CreateTransferRequest {
                file_name: "planned.bin".to_string(),
                file_size: 123,
                file_type: "application/octet-stream".to_string(),
                expires_in_days: Some(3),
            }),
        )
        .await
        .unwrap();

        assert!(response.success);
        assert_eq!(
            response.upload_url,
            format!("/api/upload/{}", response.transfer_id)
        );

        let stored = state.db.get_transfer(&response.transfer_id).unwrap().unwrap();
        assert_eq!(stored.status, TransferStatus::Pending);
        assert_eq!((stored.expires_at - stored.upload_date).num_days(), 3);
        assert!(stored.expires_at > stored.upload_date);
    }

    #[tokio::test]
    async fn create_transfer_rejects_zero_expiry() {
        let (state, _dir) = test_state();
        let user = seed_user(&state, "u-1", 1000);

        let err = create_transfer(
            State(state),
            Auth(user),
            Json(CreateTransferRequest {
                file_name: "planned.bin".to_string(),
                file_size: 1,
                file_type: "text/plain".to_string(),
                expires_in_days: Some(0),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
