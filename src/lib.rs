// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Mailing List API - recipient signup and unsubscribe service
//!
//! Stores mailing-list recipients keyed by email, each identified publicly by
//! a salted SHA-256 hash so unsubscribe links never expose the address.
//!
//! ## Modules
//!
//! - `api` - HTTP routes and handlers (Axum)
//! - `auth` - Shared-secret `API_KEY` check on request bodies
//! - `pipeline` - Body sanitizing and schema validation stages
//! - `rate_limit` - Per-route, per-client limits (`governor`)
//! - `service` - Recipient business operations
//! - `storage` - Store trait and the redb-backed store

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod rate_limit;
pub mod service;
pub mod state;
pub mod storage;
pub mod store;
