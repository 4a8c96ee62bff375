// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sealdrop Contributors

//! Path constants and utilities for the on-disk storage layout.

use std::path::{Path, PathBuf};

use crate::config::DEFAULT_DATA_DIR;

/// Storage path utilities for the data directory.
///
/// ```text
/// {root}/
///   transfers.redb    # embedded database (transfers, users, indexes)
///   blobs/
///     {transfer_id}.enc   # encrypted envelope per transfer
/// ```
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all persistent data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the embedded database file.
    pub fn database(&self) -> PathBuf {
        self.root.join("transfers.redb")
    }

    /// Directory containing all encrypted blobs.
    pub fn blobs_dir(&self) -> PathBuf {
        self.root.join("blobs")
    }

    /// Path to the encrypted blob for a transfer.
    pub fn blob(&self, transfer_id: &str) -> PathBuf {
        self.blobs_dir().join(format!("{transfer_id}.enc"))
    }
}
