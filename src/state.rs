// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sealdrop Contributors

use std::sync::Arc;

use crate::config;
use crate::storage::{BlobStore, TransferDatabase};

/// Session token configuration.
#[derive(Clone)]
pub struct SessionConfig {
    /// HS256 signing secret for session tokens.
    pub secret: String,
}

/// Upload and retention policy knobs, loaded from the environment.
#[derive(Debug, Clone)]
pub struct TransferPolicy {
    /// Upload size ceiling in bytes; larger files are rejected with 400.
    pub max_upload_bytes: u64,
    /// Retention for anonymous uploads and the default account plan, days.
    pub default_retention_days: u32,
    /// Storage quota assigned to new accounts, bytes.
    pub default_storage_limit: u64,
    /// Prefix for generated download links ("" = relative).
    pub public_base_url: String,
}

impl Default for TransferPolicy {
    fn default() -> Self {
        Self {
            max_upload_bytes: config::DEFAULT_MAX_UPLOAD_BYTES,
            default_retention_days: config::DEFAULT_RETENTION_DAYS,
            default_storage_limit: config::DEFAULT_STORAGE_LIMIT_BYTES,
            public_base_url: String::new(),
        }
    }
}

impl TransferPolicy {
    /// Shareable link for a transfer; anonymous links carry the key.
    pub fn download_link(&self, transfer_id: &str, key_hex: Option<&str>) -> String {
        match key_hex {
            Some(key) => format!(
                "{}/api/download/{transfer_id}?key={key}",
                self.public_base_url
            ),
            None => format!("{}/api/download/{transfer_id}", self.public_base_url),
        }
    }
}

/// Shared application state, passed explicitly to every handler.
///
/// All handles are constructed once at startup and cloned per request;
/// no module-level singletons.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<TransferDatabase>,
    pub blobs: Arc<BlobStore>,
    pub sessions: SessionConfig,
    pub policy: TransferPolicy,
}

impl AppState {
    pub fn new(db: TransferDatabase, blobs: BlobStore, sessions: SessionConfig) -> Self {
        Self {
            db: Arc::new(db),
            blobs: Arc::new(blobs),
            sessions,
            policy: TransferPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: TransferPolicy) -> Self {
        self.policy = policy;
        self
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_links_embed_key_only_when_given() {
        let policy = TransferPolicy::default();
        assert_eq!(policy.download_link("t-1", None), "/api/download/t-1");
        assert_eq!(
            policy.download_link("t-1", Some("deadbeef")),
            "/api/download/t-1?key=deadbeef"
        );

        let prefixed = TransferPolicy {
            public_base_url: "https://drop.example.com".to_string(),
            ..TransferPolicy::default()
        };
        assert_eq!(
            prefixed.download_link("t-1", None),
            "https://drop.example.com/api/download/t-1"
        );
    }
}
