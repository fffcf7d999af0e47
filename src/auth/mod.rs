// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Shared-secret authentication for the recipients API.
//!
//! ## Auth Flow
//!
//! 1. The client sends a JSON body carrying an `API_KEY` field
//! 2. The server compares its string form to the configured secret
//! 3. On success the field is removed from the body before any other stage
//!    sees it; on failure the route short-circuits:
//!    - field missing or body not a JSON object → 400
//!    - wrong key → 401
//!
//! ## Security
//!
//! - The key is never logged
//! - Only the DELETE route (addressed by an unguessable hash) is open

pub mod error;
pub mod middleware;

pub use error::AuthError;
pub use middleware::{authenticate, require_api_key, API_KEY_FIELD};
