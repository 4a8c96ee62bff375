// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sealdrop Contributors

//! # Expiry Sweeper
//!
//! Background task that periodically expires overdue transfers. Each sweep:
//!
//! 1. Selects all active transfers with `expires_at` in the past.
//! 2. For each, runs the atomic expire-and-reclaim database operation
//!    (status → expired, owner quota decremented in the same transaction).
//! 3. Removes the encrypted blob, so expired ciphertext never accumulates
//!    on disk. Blob removal is best-effort and logged.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::storage::{BlobStore, TransferDatabase};

/// Default interval between sweeps.
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Background sweeper that expires overdue transfers and reclaims storage.
pub struct ExpirySweeper {
    db: Arc<TransferDatabase>,
    blobs: Arc<BlobStore>,
    interval: Duration,
}

impl ExpirySweeper {
    /// Create a new sweeper over the given stores.
    pub fn new(db: Arc<TransferDatabase>, blobs: Arc<BlobStore>) -> Self {
        Self {
            db,
            blobs,
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    /// Override the sweep interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run the sweep loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Expiry sweeper starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Expiry sweeper shutting down");
                return;
            }

            self.sweep_step();

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Expiry sweeper shutting down");
                    return;
                }
            }
        }
    }

    /// Execute one sweep: expire every overdue active transfer.
    ///
    /// Returns the number of transfers expired (used by tests).
    pub fn sweep_step(&self) -> usize {
        let now = chrono::Utc::now();
        let due = match self.db.expired_active(now) {
            Ok(due) => due,
            Err(e) => {
                warn!(error = %e, "Expiry sweep: failed to list overdue transfers");
                return 0;
            }
        };

        if due.is_empty() {
            return 0;
        }

        info!(count = due.len(), "Expiry sweep: expiring overdue transfers");

        let mut expired = 0;
        for transfer in &due {
            match self.db.expire_and_reclaim(&transfer.id) {
                Ok(Some(record)) => {
                    expired += 1;
                    if let Err(e) = self.blobs.remove(&record.id) {
                        warn!(
                            transfer_id = %record.id,
                            error = %e,
                            "Expiry sweep: blob removal failed"
                        );
                    }
                    info!(
                        transfer_id = %record.id,
                        file_size = record.file_size,
                        "Expiry sweep: transfer expired"
                    );
                }
                // Another sweep (or a delete) got there first.
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        transfer_id = %transfer.id,
                        error = %e,
                        "Expiry sweep: failed to expire transfer"
                    );
                }
            }
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;
    use crate::storage::{StoredTransfer, StoredUser, TransferStatus};
    use chrono::{Duration as ChronoDuration, Utc};

    fn overdue_transfer(id: &str, user_id: Option<&str>, file_size: u64) -> StoredTransfer {
        let now = Utc::now();
        StoredTransfer {
            id: id.to_string(),
            user_id: user_id.map(str::to_string),
            file_name: format!("{id}.bin"),
            file_size,
            file_type: "application/octet-stream".to_string(),
            upload_date: now - ChronoDuration::days(8),
            expires_at: now - ChronoDuration::days(1),
            download_count: 0,
            last_download_at: None,
            encryption_key: None,
            download_link: format!("/api/download/{id}"),
            status: TransferStatus::Active,
        }
    }

    #[test]
    fn sweep_expires_reclaims_and_removes_blob() {
        let (state, _dir) = test_state();
        state
            .db
            .create_user(&StoredUser {
                user_id: "u-1".to_string(),
                email: "a@example.com".to_string(),
                name: None,
                password_hash: None,
                provider: None,
                storage_used: 100,
                storage_limit: 1000,
                retention_days: 7,
                created_at: Utc::now(),
            })
            .unwrap();

        state
            .db
            .insert_transfer(&overdue_transfer("t-1", Some("u-1"), 100))
            .unwrap();
        state.blobs.write("t-1", b"ciphertext").unwrap();

        // A live transfer must survive the sweep.
        let mut live = overdue_transfer("t-live", None, 10);
        live.expires_at = Utc::now() + ChronoDuration::days(1);
        state.db.insert_transfer(&live).unwrap();
        state.blobs.write("t-live", b"ciphertext").unwrap();

        let sweeper = ExpirySweeper::new(state.db.clone(), state.blobs.clone());
        assert_eq!(sweeper.sweep_step(), 1);

        let expired = state.db.get_transfer("t-1").unwrap().unwrap();
        assert_eq!(expired.status, TransferStatus::Expired);
        assert!(!state.blobs.exists("t-1"));
        assert_eq!(state.db.get_user("u-1").unwrap().unwrap().storage_used, 0);

        assert!(state.blobs.exists("t-live"));
        assert_eq!(
            state.db.get_transfer("t-live").unwrap().unwrap().status,
            TransferStatus::Active
        );

        // Nothing left to do on the next pass.
        assert_eq!(sweeper.sweep_step(), 0);
    }

    #[test]
    fn sweep_tolerates_missing_blob() {
        let (state, _dir) = test_state();
        state
            .db
            .insert_transfer(&overdue_transfer("t-1", None, 10))
            .unwrap();
        // No blob written.

        let sweeper = ExpirySweeper::new(state.db.clone(), state.blobs.clone());
        assert_eq!(sweeper.sweep_step(), 1);
        assert_eq!(
            state.db.get_transfer("t-1").unwrap().unwrap().status,
            TransferStatus::Expired
        );
    }

    #[tokio::test]
    async fn run_stops_on_cancellation() {
        let (state, _dir) = test_state();
        let sweeper = ExpirySweeper::new(state.db.clone(), state.blobs.clone())
            .with_interval(Duration::from_millis(10));

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(sweeper.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should stop promptly")
            .unwrap();
    }
}
