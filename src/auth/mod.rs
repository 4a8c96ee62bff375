// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sealdrop Contributors

//! # Authentication Module
//!
//! Session authentication for the Sealdrop API.
//!
//! ## Auth Flow
//!
//! 1. A client signs up with email/password (`POST /api/auth/signup`) or is
//!    bridged from an external OAuth identity collaborator via
//!    `POST /api/auth/oauth`. The provider verification itself happens
//!    upstream, never here.
//! 2. Sign-in returns an HS256 session token carrying `sub` → user id.
//! 3. Requests send `Authorization: Bearer <token>`; the `Auth` extractor
//!    verifies signature and expiry, `OptionalAuth` falls back to
//!    anonymous.
//!
//! ## Security
//!
//! - Passwords are hashed with Argon2id; hashes never leave the database.
//! - Clock skew tolerance is 60 seconds.

pub mod error;
pub mod extractor;
pub mod password;
pub mod session;

pub use error::AuthError;
pub use extractor::{Auth, OptionalAuth};
pub use session::AuthenticatedUser;
