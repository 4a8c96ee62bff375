// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sealdrop Contributors

//! Embedded transfer database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `transfers`: transfer_id → serialized StoredTransfer
//! - `user_transfer_index`: composite key (user_id|!timestamp|transfer_id) → ()
//! - `users`: user_id → serialized StoredUser
//! - `user_email_index`: lowercase email → user_id
//!
//! Quota accounting lives here too: reservation is a single write
//! transaction that checks `storage_used + requested <= storage_limit` and
//! increments in the same commit, so two concurrent uploads cannot both
//! pass the check.

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::records::{StoredTransfer, StoredUser, TransferStatus};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: transfer_id → serialized StoredTransfer (JSON bytes).
const TRANSFERS: TableDefinition<&str, &[u8]> = TableDefinition::new("transfers");

/// Index: composite key → unit.
/// Key format: `user_id|!timestamp_be|transfer_id` for newest-first scans.
const USER_TRANSFER_INDEX: TableDefinition<&[u8], ()> =
    TableDefinition::new("user_transfer_index");

/// Accounts table: user_id → serialized StoredUser (JSON bytes).
const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Uniqueness index: lowercase email → user_id.
const USER_EMAIL_INDEX: TableDefinition<&str, &str> = TableDefinition::new("user_email_index");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TransferDbError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("storage quota exceeded: {used} + {requested} > {limit}")]
    QuotaExceeded {
        used: u64,
        limit: u64,
        requested: u64,
    },
}

pub type TransferDbResult<T> = Result<T, TransferDbError>;

// =============================================================================
// Index Key Helpers
// =============================================================================

/// Build a composite key for the user_transfer_index table.
///
/// Format: `user_id | inverted_millis_be_bytes | transfer_id`
///
/// The inverted millisecond timestamp ensures newest-first ordering when
/// scanning forward.
fn make_index_key(user_id: &str, timestamp: i64, transfer_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(user_id.len() + 1 + 8 + 1 + transfer_id.len());
    key.extend_from_slice(user_id.as_bytes());
    key.push(b'|');
    key.extend_from_slice(&(!timestamp as u64).to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(transfer_id.as_bytes());
    key
}

/// Build a prefix key for range scanning all transfers of a user.
fn make_prefix(user_id: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(user_id.len() + 1);
    prefix.extend_from_slice(user_id.as_bytes());
    prefix.push(b'|');
    prefix
}

/// Build the upper bound for a range scan (prefix with all 0xFF bytes appended).
fn make_prefix_end(user_id: &str) -> Vec<u8> {
    let mut end = Vec::with_capacity(user_id.len() + 1 + 20);
    end.extend_from_slice(user_id.as_bytes());
    end.push(b'|');
    end.extend_from_slice(&[0xFF; 20]);
    end
}

/// Extract the transfer_id portion from a composite index key.
fn extract_transfer_id_from_key(key: &[u8]) -> Option<String> {
    let mut pipe_count = 0;
    for (i, &b) in key.iter().enumerate() {
        if b == b'|' {
            pipe_count += 1;
            if pipe_count == 2 {
                return String::from_utf8(key[i + 1..].to_vec()).ok();
            }
        }
    }
    None
}

// =============================================================================
// Aggregates
// =============================================================================

/// Per-user aggregate over the transfer records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserTransferStats {
    /// All transfers owned by the user, any status.
    pub total_transfers: u64,
    /// Transfers currently in `active` status.
    pub active_transfers: u64,
    /// Sum of `file_size` over active transfers.
    pub storage_used: u64,
}

// =============================================================================
// TransferDatabase
// =============================================================================

/// Embedded ACID store for transfer and user records.
pub struct TransferDatabase {
    db: Database,
}

impl TransferDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> TransferDbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(TRANSFERS)?;
            let _ = write_txn.open_table(USER_TRANSFER_INDEX)?;
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USER_EMAIL_INDEX)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Check that the database accepts read transactions.
    pub fn health_check(&self) -> TransferDbResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(TRANSFERS)?;
        Ok(())
    }

    // =========================================================================
    // Transfer CRUD
    // =========================================================================

    /// Insert a new transfer record and its owner index entry.
    pub fn insert_transfer(&self, transfer: &StoredTransfer) -> TransferDbResult<()> {
        let json = serde_json::to_vec(transfer)?;
        let timestamp = transfer.upload_date.timestamp_millis();

        let write_txn = self.db.begin_write()?;
        {
            let mut transfers = write_txn.open_table(TRANSFERS)?;
            transfers.insert(transfer.id.as_str(), json.as_slice())?;

            if let Some(user_id) = &transfer.user_id {
                let mut index = write_txn.open_table(USER_TRANSFER_INDEX)?;
                let key = make_index_key(user_id, timestamp, &transfer.id);
                index.insert(key.as_slice(), ())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Look up a single transfer by id.
    pub fn get_transfer(&self, transfer_id: &str) -> TransferDbResult<Option<StoredTransfer>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TRANSFERS)?;
        match table.get(transfer_id)? {
            Some(value) => {
                let transfer: StoredTransfer = serde_json::from_slice(value.value())?;
                Ok(Some(transfer))
            }
            None => Ok(None),
        }
    }

    /// Remove a transfer record and its index entry.
    ///
    /// Returns the removed record, or None if the id was unknown.
    pub fn delete_transfer(&self, transfer_id: &str) -> TransferDbResult<Option<StoredTransfer>> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut transfers = write_txn.open_table(TRANSFERS)?;
            let existing_bytes = match transfers.remove(transfer_id)? {
                Some(guard) => guard.value().to_vec(),
                None => return Ok(None),
            };
            let transfer: StoredTransfer = serde_json::from_slice(&existing_bytes)?;

            if let Some(user_id) = &transfer.user_id {
                let mut index = write_txn.open_table(USER_TRANSFER_INDEX)?;
                let key =
                    make_index_key(user_id, transfer.upload_date.timestamp_millis(), &transfer.id);
                index.remove(key.as_slice())?;
            }
            transfer
        };
        write_txn.commit()?;
        Ok(Some(removed))
    }

    /// Atomically bump the download counter and stamp the download time.
    ///
    /// Returns the updated record.
    pub fn record_download(&self, transfer_id: &str) -> TransferDbResult<StoredTransfer> {
        let write_txn = self.db.begin_write()?;
        let updated = {
            let mut table = write_txn.open_table(TRANSFERS)?;

            let existing_bytes = {
                let existing = table
                    .get(transfer_id)?
                    .ok_or_else(|| TransferDbError::NotFound(format!("Transfer {transfer_id}")))?;
                existing.value().to_vec()
            };

            let mut transfer: StoredTransfer = serde_json::from_slice(&existing_bytes)?;
            transfer.download_count += 1;
            transfer.last_download_at = Some(Utc::now());

            let json = serde_json::to_vec(&transfer)?;
            table.insert(transfer_id, json.as_slice())?;
            transfer
        };
        write_txn.commit()?;
        Ok(updated)
    }

    /// Flip a pending transfer to active once its blob has been uploaded.
    ///
    /// Overwrites the pre-registered file metadata with the actual upload
    /// and stores the (owner-persisted) encryption key. Fails if the record
    /// is not pending, so a transfer cannot be completed twice.
    pub fn activate_transfer(
        &self,
        transfer_id: &str,
        file_name: &str,
        file_size: u64,
        file_type: &str,
        encryption_key: Option<String>,
    ) -> TransferDbResult<StoredTransfer> {
        let write_txn = self.db.begin_write()?;
        let updated = {
            let mut table = write_txn.open_table(TRANSFERS)?;

            let existing_bytes = {
                let existing = table
                    .get(transfer_id)?
                    .ok_or_else(|| TransferDbError::NotFound(format!("Transfer {transfer_id}")))?;
                existing.value().to_vec()
            };

            let mut transfer: StoredTransfer = serde_json::from_slice(&existing_bytes)?;
            if transfer.status != TransferStatus::Pending {
                return Err(TransferDbError::AlreadyExists(format!(
                    "Transfer {transfer_id} is not pending"
                )));
            }

            transfer.file_name = file_name.to_string();
            transfer.file_size = file_size;
            transfer.file_type = file_type.to_string();
            transfer.encryption_key = encryption_key;
            transfer.status = TransferStatus::Active;

            let json = serde_json::to_vec(&transfer)?;
            table.insert(transfer_id, json.as_slice())?;
            transfer
        };
        write_txn.commit()?;
        Ok(updated)
    }

    // =========================================================================
    // Listing & Aggregates
    // =========================================================================

    /// One page of a user's transfers, newest-first, offset-based.
    pub fn list_page(
        &self,
        user_id: &str,
        offset: u64,
        limit: u64,
    ) -> TransferDbResult<Vec<StoredTransfer>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(USER_TRANSFER_INDEX)?;
        let transfers = read_txn.open_table(TRANSFERS)?;

        let prefix = make_prefix(user_id);
        let prefix_end = make_prefix_end(user_id);

        let mut page = Vec::with_capacity(limit as usize);
        let mut position = 0u64;

        for entry in index.range(prefix.as_slice()..prefix_end.as_slice())? {
            let entry = entry?;
            if position >= offset {
                if let Some(transfer_id) = extract_transfer_id_from_key(entry.0.value()) {
                    if let Some(value) = transfers.get(transfer_id.as_str())? {
                        let transfer: StoredTransfer = serde_json::from_slice(value.value())?;
                        page.push(transfer);
                    }
                }
                if page.len() as u64 >= limit {
                    break;
                }
            }
            position += 1;
        }

        Ok(page)
    }

    /// Aggregate counts and active byte usage for a user.
    pub fn user_transfer_stats(&self, user_id: &str) -> TransferDbResult<UserTransferStats> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(USER_TRANSFER_INDEX)?;
        let transfers = read_txn.open_table(TRANSFERS)?;

        let prefix = make_prefix(user_id);
        let prefix_end = make_prefix_end(user_id);

        let mut stats = UserTransferStats::default();
        for entry in index.range(prefix.as_slice()..prefix_end.as_slice())? {
            let entry = entry?;
            let Some(transfer_id) = extract_transfer_id_from_key(entry.0.value()) else {
                continue;
            };
            let Some(value) = transfers.get(transfer_id.as_str())? else {
                continue;
            };
            let transfer: StoredTransfer = serde_json::from_slice(value.value())?;

            stats.total_transfers += 1;
            if transfer.status == TransferStatus::Active {
                stats.active_transfers += 1;
                stats.storage_used += transfer.file_size;
            }
        }
        Ok(stats)
    }

    // =========================================================================
    // Expiry
    // =========================================================================

    /// All active transfers whose expiry instant is in the past.
    pub fn expired_active(&self, now: DateTime<Utc>) -> TransferDbResult<Vec<StoredTransfer>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TRANSFERS)?;

        let mut expired = Vec::new();
        for entry in table.iter()? {
            let entry = entry?;
            let transfer: StoredTransfer = serde_json::from_slice(entry.1.value())?;
            if transfer.status == TransferStatus::Active && transfer.is_expired_at(now) {
                expired.push(transfer);
            }
        }
        Ok(expired)
    }

    /// Atomically expire a transfer and give its bytes back to the owner.
    ///
    /// Status flips to expired and the owner's `storage_used` is reduced in
    /// the same transaction. Returns None when the record is missing or no
    /// longer active (another sweep already claimed it). Blob removal is the
    /// caller's follow-up.
    pub fn expire_and_reclaim(
        &self,
        transfer_id: &str,
    ) -> TransferDbResult<Option<StoredTransfer>> {
        let write_txn = self.db.begin_write()?;
        let expired = {
            let mut transfers = write_txn.open_table(TRANSFERS)?;

            let existing_bytes = match transfers.get(transfer_id)? {
                Some(guard) => guard.value().to_vec(),
                None => return Ok(None),
            };

            let mut transfer: StoredTransfer = serde_json::from_slice(&existing_bytes)?;
            if transfer.status != TransferStatus::Active {
                return Ok(None);
            }
            transfer.status = TransferStatus::Expired;

            let json = serde_json::to_vec(&transfer)?;
            transfers.insert(transfer_id, json.as_slice())?;

            if let Some(user_id) = &transfer.user_id {
                let mut users = write_txn.open_table(USERS)?;
                let user_bytes = match users.get(user_id.as_str())? {
                    Some(guard) => Some(guard.value().to_vec()),
                    None => None,
                };
                if let Some(bytes) = user_bytes {
                    let mut user: StoredUser = serde_json::from_slice(&bytes)?;
                    user.storage_used = user.storage_used.saturating_sub(transfer.file_size);
                    let user_json = serde_json::to_vec(&user)?;
                    users.insert(user_id.as_str(), user_json.as_slice())?;
                }
            }
            transfer
        };
        write_txn.commit()?;
        Ok(Some(expired))
    }

    // =========================================================================
    // Users & Quota
    // =========================================================================

    /// Create a user, enforcing email uniqueness in the same transaction.
    pub fn create_user(&self, user: &StoredUser) -> TransferDbResult<()> {
        let json = serde_json::to_vec(user)?;
        let email_key = user.email.to_lowercase();

        let write_txn = self.db.begin_write()?;
        {
            let mut emails = write_txn.open_table(USER_EMAIL_INDEX)?;
            if emails.get(email_key.as_str())?.is_some() {
                return Err(TransferDbError::AlreadyExists(
                    "User already exists".to_string(),
                ));
            }
            emails.insert(email_key.as_str(), user.user_id.as_str())?;

            let mut users = write_txn.open_table(USERS)?;
            users.insert(user.user_id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Look up a user by id.
    pub fn get_user(&self, user_id: &str) -> TransferDbResult<Option<StoredUser>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        match table.get(user_id)? {
            Some(value) => {
                let user: StoredUser = serde_json::from_slice(value.value())?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    /// Look up a user by email (case-insensitive).
    pub fn get_user_by_email(&self, email: &str) -> TransferDbResult<Option<StoredUser>> {
        let email_key = email.to_lowercase();
        let read_txn = self.db.begin_read()?;
        let emails = read_txn.open_table(USER_EMAIL_INDEX)?;
        let user_id = match emails.get(email_key.as_str())? {
            Some(v) => v.value().to_string(),
            None => return Ok(None),
        };
        drop(emails);

        let users = read_txn.open_table(USERS)?;
        match users.get(user_id.as_str())? {
            Some(value) => {
                let user: StoredUser = serde_json::from_slice(value.value())?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    /// Reserve quota for an upload: check and increment in one transaction.
    ///
    /// Fails with [`TransferDbError::QuotaExceeded`] when the reservation
    /// would push `storage_used` past `storage_limit`.
    pub fn try_reserve_storage(&self, user_id: &str, requested: u64) -> TransferDbResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut users = write_txn.open_table(USERS)?;

            let existing_bytes = {
                let existing = users
                    .get(user_id)?
                    .ok_or_else(|| TransferDbError::NotFound(format!("User {user_id}")))?;
                existing.value().to_vec()
            };

            let mut user: StoredUser = serde_json::from_slice(&existing_bytes)?;
            let new_used = user.storage_used.saturating_add(requested);
            if new_used > user.storage_limit {
                return Err(TransferDbError::QuotaExceeded {
                    used: user.storage_used,
                    limit: user.storage_limit,
                    requested,
                });
            }
            user.storage_used = new_used;

            let json = serde_json::to_vec(&user)?;
            users.insert(user_id, json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Return previously reserved bytes to a user's quota.
    ///
    /// Tolerates a missing user (the account may have been removed).
    pub fn release_storage(&self, user_id: &str, bytes: u64) -> TransferDbResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut users = write_txn.open_table(USERS)?;

            let existing_bytes = match users.get(user_id)? {
                Some(guard) => guard.value().to_vec(),
                None => return Ok(()),
            };

            let mut user: StoredUser = serde_json::from_slice(&existing_bytes)?;
            user.storage_used = user.storage_used.saturating_sub(bytes);

            let json = serde_json::to_vec(&user)?;
            users.insert(user_id, json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn temp_db() -> (TransferDatabase, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = TransferDatabase::open(&dir.path().join("test.redb")).unwrap();
        (db, dir)
    }

    fn sample_transfer(id: &str, user_id: Option<&str>) -> StoredTransfer {
        StoredTransfer {
            id: id.to_string(),
            user_id: user_id.map(str::to_string),
            file_name: format!("{id}.bin"),
            file_size: 100,
            file_type: "application/octet-stream".to_string(),
            upload_date: Utc::now(),
            expires_at: Utc::now() + Duration::days(7),
            download_count: 0,
            last_download_at: None,
            encryption_key: None,
            download_link: format!("/api/download/{id}"),
            status: TransferStatus::Active,
        }
    }

    fn sample_user(id: &str, email: &str) -> StoredUser {
        StoredUser {
            user_id: id.to_string(),
            email: email.to_string(),
            name: Some("Test User".to_string()),
            password_hash: None,
            provider: None,
            storage_used: 0,
            storage_limit: 1000,
            retention_days: 7,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn insert_and_get_transfer() {
        let (db, _dir) = temp_db();
        let transfer = sample_transfer("t-1", Some("u-1"));
        db.insert_transfer(&transfer).unwrap();

        let retrieved = db.get_transfer("t-1").unwrap().unwrap();
        assert_eq!(retrieved.id, "t-1");
        assert_eq!(retrieved.file_size, 100);
        assert!(db.get_transfer("missing").unwrap().is_none());
    }

    #[test]
    fn record_download_is_monotonic() {
        let (db, _dir) = temp_db();
        db.insert_transfer(&sample_transfer("t-1", None)).unwrap();

        for expected in 1..=3u64 {
            let updated = db.record_download("t-1").unwrap();
            assert_eq!(updated.download_count, expected);
            assert!(updated.last_download_at.is_some());
        }
    }

    #[test]
    fn record_download_unknown_id_errors() {
        let (db, _dir) = temp_db();
        assert!(matches!(
            db.record_download("missing"),
            Err(TransferDbError::NotFound(_))
        ));
    }

    #[test]
    fn list_page_is_newest_first_with_offsets() {
        let (db, _dir) = temp_db();
        for i in 0..5i64 {
            let mut transfer = sample_transfer(&format!("t-{i}"), Some("u-1"));
            transfer.upload_date = Utc::now() - Duration::seconds(100 - i);
            db.insert_transfer(&transfer).unwrap();
        }
        // A foreign transfer must not appear.
        db.insert_transfer(&sample_transfer("other", Some("u-2")))
            .unwrap();

        let page1 = db.list_page("u-1", 0, 2).unwrap();
        assert_eq!(
            page1.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
            vec!["t-4", "t-3"]
        );

        let page2 = db.list_page("u-1", 2, 2).unwrap();
        assert_eq!(
            page2.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
            vec!["t-2", "t-1"]
        );

        let page3 = db.list_page("u-1", 4, 2).unwrap();
        assert_eq!(page3.len(), 1);
        assert_eq!(page3[0].id, "t-0");
    }

    #[test]
    fn stats_count_only_active_bytes() {
        let (db, _dir) = temp_db();
        let mut active = sample_transfer("t-a", Some("u-1"));
        active.file_size = 60;
        db.insert_transfer(&active).unwrap();

        let mut expired = sample_transfer("t-e", Some("u-1"));
        expired.file_size = 40;
        expired.status = TransferStatus::Expired;
        db.insert_transfer(&expired).unwrap();

        let stats = db.user_transfer_stats("u-1").unwrap();
        assert_eq!(stats.total_transfers, 2);
        assert_eq!(stats.active_transfers, 1);
        assert_eq!(stats.storage_used, 60);
    }

    #[test]
    fn delete_transfer_removes_record_and_index() {
        let (db, _dir) = temp_db();
        db.insert_transfer(&sample_transfer("t-1", Some("u-1"))).unwrap();

        let removed = db.delete_transfer("t-1").unwrap().unwrap();
        assert_eq!(removed.id, "t-1");
        assert!(db.get_transfer("t-1").unwrap().is_none());
        assert!(db.list_page("u-1", 0, 10).unwrap().is_empty());

        assert!(db.delete_transfer("t-1").unwrap().is_none());
    }

    #[test]
    fn activate_flips_pending_to_active_once() {
        let (db, _dir) = temp_db();
        let mut pending = sample_transfer("t-p", Some("u-1"));
        pending.status = TransferStatus::Pending;
        pending.file_size = 0;
        db.insert_transfer(&pending).unwrap();

        let activated = db
            .activate_transfer("t-p", "actual.bin", 42, "text/plain", Some("aa".into()))
            .unwrap();
        assert_eq!(activated.status, TransferStatus::Active);
        assert_eq!(activated.file_size, 42);
        assert_eq!(activated.file_name, "actual.bin");

        // Second completion is rejected.
        assert!(matches!(
            db.activate_transfer("t-p", "again.bin", 1, "text/plain", None),
            Err(TransferDbError::AlreadyExists(_))
        ));
    }

    #[test]
    fn create_user_enforces_unique_email() {
        let (db, _dir) = temp_db();
        db.create_user(&sample_user("u-1", "a@example.com")).unwrap();

        // Same email, different case.
        let err = db
            .create_user(&sample_user("u-2", "A@Example.com"))
            .unwrap_err();
        assert!(matches!(err, TransferDbError::AlreadyExists(_)));

        let by_email = db.get_user_by_email("A@EXAMPLE.COM").unwrap().unwrap();
        assert_eq!(by_email.user_id, "u-1");
    }

    #[test]
    fn quota_reservation_checks_and_increments_atomically() {
        let (db, _dir) = temp_db();
        db.create_user(&sample_user("u-1", "a@example.com")).unwrap();

        db.try_reserve_storage("u-1", 600).unwrap();
        db.try_reserve_storage("u-1", 400).unwrap();

        // 1000 of 1000 used: one more byte must fail.
        let err = db.try_reserve_storage("u-1", 1).unwrap_err();
        assert!(matches!(
            err,
            TransferDbError::QuotaExceeded {
                used: 1000,
                limit: 1000,
                requested: 1
            }
        ));

        db.release_storage("u-1", 400).unwrap();
        db.try_reserve_storage("u-1", 400).unwrap();
    }

    #[test]
    fn release_storage_tolerates_missing_user() {
        let (db, _dir) = temp_db();
        db.release_storage("ghost", 100).unwrap();
    }

    #[test]
    fn expire_and_reclaim_returns_quota() {
        let (db, _dir) = temp_db();
        db.create_user(&sample_user("u-1", "a@example.com")).unwrap();
        db.try_reserve_storage("u-1", 100).unwrap();

        let mut transfer = sample_transfer("t-1", Some("u-1"));
        transfer.expires_at = Utc::now() - Duration::hours(1);
        db.insert_transfer(&transfer).unwrap();

        let due = db.expired_active(Utc::now()).unwrap();
        assert_eq!(due.len(), 1);

        let expired = db.expire_and_reclaim("t-1").unwrap().unwrap();
        assert_eq!(expired.status, TransferStatus::Expired);
        assert_eq!(db.get_user("u-1").unwrap().unwrap().storage_used, 0);

        // Already expired: second reclaim is a no-op.
        assert!(db.expire_and_reclaim("t-1").unwrap().is_none());
        assert!(db.expired_active(Utc::now()).unwrap().is_empty());
    }

    #[test]
    fn anonymous_transfers_are_not_indexed() {
        let (db, _dir) = temp_db();
        db.insert_transfer(&sample_transfer("t-anon", None)).unwrap();
        assert!(db.get_transfer("t-anon").unwrap().is_some());

        let stats = db.user_transfer_stats("t-anon").unwrap();
        assert_eq!(stats.total_transfers, 0);
    }
}
