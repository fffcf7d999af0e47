// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Recipient business operations.
//!
//! Wraps a [`RecipientStore`] and turns every store failure into the
//! client-facing [`ApiError`]. Store causes are logged, never returned: a
//! duplicate email, a bad record and a database outage all look the same to
//! the caller.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::models::Recipient;
use crate::storage::{RecipientStore, StoreError};

pub const INSERT_DENIED: &str = "Request was denied.";
pub const REMOVE_FAILED: &str = "Unable to remove recipient";
pub const LIST_FAILED: &str = "Unable to list recipients";

#[derive(Clone)]
pub struct RecipientService {
    store: Arc<dyn RecipientStore>,
    salt: Arc<str>,
}

impl RecipientService {
    pub fn new(store: Arc<dyn RecipientStore>, salt: impl Into<Arc<str>>) -> Self {
        Self {
            store,
            salt: salt.into(),
        }
    }

    pub fn store(&self) -> &Arc<dyn RecipientStore> {
        &self.store
    }

    /// Every recipient, oldest first.
    pub fn list(&self) -> Result<Vec<Recipient>, ApiError> {
        self.store.list().map_err(|e| {
            warn!(error = %e, "Failed to list recipients");
            ApiError::bad_request(LIST_FAILED)
        })
    }

    /// Create and store a recipient from sanitized, validated fields.
    ///
    /// The hash and join time are computed here; only `email` is read from
    /// `fields`.
    pub fn insert(&self, fields: &Map<String, Value>) -> Result<Recipient, ApiError> {
        let denied = || ApiError::bad_request(INSERT_DENIED);

        let Some(email) = fields.get("email").and_then(Value::as_str) else {
            warn!("Insert denied: no email field");
            return Err(denied());
        };

        let recipient = Recipient::new(email, &self.salt).map_err(|e| {
            warn!(error = %e, "Insert denied: invalid recipient");
            denied()
        })?;

        self.store.insert(&recipient).map_err(|e| {
            match e {
                StoreError::Duplicate(_) => warn!("Insert denied: email already registered"),
                e => warn!(error = %e, "Insert denied: store failure"),
            }
            denied()
        })?;

        info!(hash = %recipient.hash, "Recipient added");
        Ok(recipient)
    }

    /// Remove the recipient with `hash`, returning the removed record.
    ///
    /// An unknown hash and a store failure produce the same error, so a
    /// repeated removal is indistinguishable from a hash that never existed.
    pub fn remove(&self, hash: &str) -> Result<Recipient, ApiError> {
        let recipient = self.store.remove_by_hash(hash).map_err(|e| {
            match e {
                StoreError::NotFound(_) => warn!(%hash, "Remove failed: no such recipient"),
                e => warn!(%hash, error = %e, "Remove failed: store failure"),
            }
            ApiError::bad_request(REMOVE_FAILED)
        })?;

        info!(%hash, "Recipient removed");
        Ok(recipient)
    }
}
