// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sealdrop Contributors

//! Persistent record types for transfers and user accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Transfer lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    /// Pre-registered, no blob uploaded yet
    Pending,
    /// Blob present and downloadable until expiry
    Active,
    /// Past expiry; the blob may already be reclaimed
    Expired,
}

impl Default for TransferStatus {
    fn default() -> Self {
        Self::Active
    }
}

/// One uploaded file and its lifecycle metadata.
///
/// The encryption key is persisted only for authenticated owners; anonymous
/// transfers carry the key in the shareable link instead and the server
/// keeps no copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTransfer {
    /// Unique transfer identifier (UUID)
    pub id: String,
    /// Owning user, None for anonymous transfers
    pub user_id: Option<String>,
    /// Original client filename
    pub file_name: String,
    /// Size in bytes
    pub file_size: u64,
    /// MIME type as reported by the client
    pub file_type: String,
    /// When the transfer was created
    pub upload_date: DateTime<Utc>,
    /// When the transfer stops being downloadable
    pub expires_at: DateTime<Utc>,
    /// Successful downloads so far; only ever increases
    pub download_count: u64,
    /// Timestamp of the most recent download
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_download_at: Option<DateTime<Utc>>,
    /// Hex-encoded per-file key, present only for authenticated owners
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<String>,
    /// Derived shareable link (embeds the key for anonymous transfers)
    pub download_link: String,
    /// Current lifecycle status
    pub status: TransferStatus,
}

impl StoredTransfer {
    /// Whether the transfer is past its expiry instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// A user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredUser {
    /// Unique user identifier (UUID)
    pub user_id: String,
    /// Unique email address
    pub email: String,
    /// Display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Argon2id PHC hash; None for OAuth-only accounts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    /// OAuth provider tag; None for credentials accounts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Bytes currently reserved by active transfers
    pub storage_used: u64,
    /// Quota ceiling in bytes
    pub storage_limit: u64,
    /// Retention in days applied to this account's uploads
    pub retention_days: u32,
    /// When the account was created
    pub created_at: DateTime<Utc>,
}
