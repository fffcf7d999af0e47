// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory recipient store.
//!
//! Used by tests and by `memory:` database URLs. Nothing survives a restart.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::models::Recipient;
use crate::storage::{sort_by_joined, RecipientStore, StoreError, StoreResult};

#[derive(Default)]
struct Recipients {
    by_email: HashMap<String, Recipient>,
    /// hash → email
    by_hash: HashMap<String, String>,
}

#[derive(Default)]
pub struct InMemoryStore {
    recipients: RwLock<Recipients>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecipientStore for InMemoryStore {
    fn list(&self) -> StoreResult<Vec<Recipient>> {
        let recipients = self.recipients.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut list: Vec<Recipient> = recipients.by_email.values().cloned().collect();
        sort_by_joined(&mut list);
        Ok(list)
    }

    fn insert(&self, recipient: &Recipient) -> StoreResult<()> {
        let mut recipients = self.recipients.write().map_err(|_| StoreError::LockPoisoned)?;
        if recipients.by_email.contains_key(&recipient.email) {
            return Err(StoreError::Duplicate(recipient.email.clone()));
        }

        recipients
            .by_hash
            .insert(recipient.hash.clone(), recipient.email.clone());
        recipients
            .by_email
            .insert(recipient.email.clone(), recipient.clone());
        Ok(())
    }

    fn remove_by_hash(&self, hash: &str) -> StoreResult<Recipient> {
        let mut recipients = self.recipients.write().map_err(|_| StoreError::LockPoisoned)?;
        let Some(email) = recipients.by_hash.remove(hash) else {
            return Err(StoreError::NotFound(hash.to_string()));
        };

        recipients
            .by_email
            .remove(&email)
            .ok_or_else(|| StoreError::NotFound(hash.to_string()))
    }

    fn ping(&self) -> StoreResult<()> {
        self.recipients
            .read()
            .map(|_| ())
            .map_err(|_| StoreError::LockPoisoned)
    }
}
