// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sealdrop Contributors

//! # Runtime Configuration Constants
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for the database and encrypted blobs | `./data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `PUBLIC_BASE_URL` | Prefix for generated download links | empty (relative links) |
//! | `MAX_UPLOAD_BYTES` | Upload size ceiling | `104857600` (100 MB) |
//! | `DEFAULT_RETENTION_DAYS` | Retention for anonymous transfers | `7` |
//! | `DEFAULT_STORAGE_LIMIT_BYTES` | Quota for new accounts | `5368709120` (5 GiB) |
//! | `SWEEP_INTERVAL_SECS` | Expiry sweep interval | `60` |
//! | `SESSION_SECRET` | HS256 secret for session tokens | dev fallback (warned) |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

/// Environment variable name for the data directory path.
///
/// The database file (`transfers.redb`) and the encrypted blob directory
/// (`blobs/`) both live under this root.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Default data directory when `DATA_DIR` is not set.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Environment variable name for the public base URL prepended to generated
/// download links.
pub const PUBLIC_BASE_URL_ENV: &str = "PUBLIC_BASE_URL";

/// Environment variable name for the upload size ceiling in bytes.
pub const MAX_UPLOAD_BYTES_ENV: &str = "MAX_UPLOAD_BYTES";

/// Default upload size ceiling: 100 MB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// Environment variable name for the default retention period in days.
pub const DEFAULT_RETENTION_DAYS_ENV: &str = "DEFAULT_RETENTION_DAYS";

/// Default retention period for transfers: 7 days.
pub const DEFAULT_RETENTION_DAYS: u32 = 7;

/// Environment variable name for the storage quota assigned to new accounts.
pub const DEFAULT_STORAGE_LIMIT_ENV: &str = "DEFAULT_STORAGE_LIMIT_BYTES";

/// Default per-account storage quota: 5 GiB.
pub const DEFAULT_STORAGE_LIMIT_BYTES: u64 = 5 * 1024 * 1024 * 1024;

/// Environment variable name for the expiry sweep interval in seconds.
pub const SWEEP_INTERVAL_ENV: &str = "SWEEP_INTERVAL_SECS";

/// Environment variable name for the session token signing secret.
pub const SESSION_SECRET_ENV: &str = "SESSION_SECRET";
