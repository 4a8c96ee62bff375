// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sealdrop Contributors

//! Filesystem blob store for encrypted envelopes.
//!
//! One `{transfer_id}.enc` file per transfer, written whole (uploads are
//! buffered in memory before encryption, so there is no streaming path).
//! The store never inspects the envelope contents; sealing and opening
//! happen in [`crate::crypto`].

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};

use super::StoragePaths;

/// Error type for blob store operations.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error during file operations
    Io(io::Error),
    /// Blob not found for the given transfer id
    NotFound(String),
    /// Store not initialized
    NotInitialized,
    /// Self-test read back different bytes than written
    IntegrityViolation(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "I/O error: {e}"),
            StorageError::NotFound(id) => write!(f, "Blob not found: {id}"),
            StorageError::NotInitialized => write!(f, "Blob store not initialized"),
            StorageError::IntegrityViolation(msg) => write!(f, "Integrity violation: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        StorageError::Io(e)
    }
}

/// Result type for blob store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Filesystem store holding one encrypted object per transfer id.
#[derive(Debug, Clone)]
pub struct BlobStore {
    paths: StoragePaths,
    initialized: bool,
}

impl BlobStore {
    /// Create a new BlobStore.
    ///
    /// Does NOT create the directory structure. Call `initialize()` first.
    pub fn new(paths: StoragePaths) -> Self {
        Self {
            paths,
            initialized: false,
        }
    }

    /// Get the storage paths.
    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Create the blob directory structure. Idempotent.
    pub fn initialize(&mut self) -> StorageResult<()> {
        fs::create_dir_all(self.paths.blobs_dir())?;
        self.initialized = true;
        Ok(())
    }

    /// Check that the blob directory is writable and reads back what was
    /// written. Used by the readiness probe.
    pub fn health_check(&self) -> StorageResult<()> {
        if !self.initialized {
            return Err(StorageError::NotInitialized);
        }

        let test_file = self.paths.blobs_dir().join(".health_check");
        let test_data = b"health_check_data";

        fs::write(&test_file, test_data)?;
        let read_data = fs::read(&test_file)?;
        fs::remove_file(&test_file)?;

        if read_data != test_data {
            return Err(StorageError::IntegrityViolation(
                "Health check data mismatch".to_string(),
            ));
        }

        Ok(())
    }

    /// Write the encrypted envelope for a transfer, replacing any previous
    /// content.
    pub fn write(&self, transfer_id: &str, envelope: &[u8]) -> StorageResult<()> {
        if !self.initialized {
            return Err(StorageError::NotInitialized);
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.paths.blob(transfer_id))?;
        file.write_all(envelope)?;
        file.flush()?;
        Ok(())
    }

    /// Read the encrypted envelope for a transfer.
    pub fn read(&self, transfer_id: &str) -> StorageResult<Vec<u8>> {
        if !self.initialized {
            return Err(StorageError::NotInitialized);
        }

        let mut file = match File::open(self.paths.blob(transfer_id)) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(transfer_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let mut envelope = Vec::new();
        file.read_to_end(&mut envelope)?;
        Ok(envelope)
    }

    /// Check if a blob exists.
    pub fn exists(&self, transfer_id: &str) -> bool {
        self.paths.blob(transfer_id).is_file()
    }

    /// Remove the blob for a transfer.
    ///
    /// A missing blob is not an error: deletion is best-effort cleanup and
    /// expired transfers may already have been reclaimed.
    pub fn remove(&self, transfer_id: &str) -> StorageResult<()> {
        if !self.initialized {
            return Err(StorageError::NotInitialized);
        }

        match fs::remove_file(self.paths.blob(transfer_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
