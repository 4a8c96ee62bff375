// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sealdrop Contributors

//! # Persistent Storage Module
//!
//! Two stores live under the data directory:
//!
//! - the embedded redb database (`transfers.redb`) holding transfer and
//!   user records plus the listing and email indexes, and
//! - the blob directory (`blobs/`) holding one encrypted envelope per
//!   transfer id.
//!
//! ## Storage Layout
//!
//! ```text
//! {DATA_DIR}/
//!   transfers.redb
//!   blobs/
//!     {transfer_id}.enc
//! ```
//!
//! Invariant: an `active` transfer always has its blob on disk; expiring a
//! transfer reclaims the owner's quota and removes the blob.

pub mod blobs;
pub mod database;
pub mod paths;
pub mod records;

pub use blobs::{BlobStore, StorageError, StorageResult};
pub use database::{TransferDatabase, TransferDbError, TransferDbResult, UserTransferStats};
pub use paths::StoragePaths;
pub use records::{StoredTransfer, StoredUser, TransferStatus};
