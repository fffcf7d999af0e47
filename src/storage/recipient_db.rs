// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded recipient database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `recipients`: email → serialized Recipient (JSON bytes)
//! - `recipient_hashes`: hash → email

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use tracing::debug;

use super::{sort_by_joined, RecipientStore, StoreError, StoreResult};
use crate::models::Recipient;

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: email → serialized Recipient (JSON bytes).
const RECIPIENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("recipients");

/// Index: recipient hash → email.
const RECIPIENT_HASHES: TableDefinition<&str, &str> = TableDefinition::new("recipient_hashes");

// =============================================================================
// RecipientDatabase
// =============================================================================

/// Embedded ACID recipient database.
pub struct RecipientDatabase {
    db: Database,
}

impl RecipientDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(RECIPIENTS)?;
            let _ = write_txn.open_table(RECIPIENT_HASHES)?;
        }
        write_txn.commit()?;

        debug!(path = %path.display(), "Opened recipient database");
        Ok(Self { db })
    }
}

impl RecipientStore for RecipientDatabase {
    fn list(&self) -> StoreResult<Vec<Recipient>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(RECIPIENTS)?;

        let mut recipients = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            recipients.push(serde_json::from_slice::<Recipient>(value.value())?);
        }

        sort_by_joined(&mut recipients);
        Ok(recipients)
    }

    fn insert(&self, recipient: &Recipient) -> StoreResult<()> {
        let json = serde_json::to_vec(recipient)?;

        // redb serializes write transactions, so the existence check and the
        // insert below cannot interleave with another insert.
        let write_txn = self.db.begin_write()?;
        {
            let mut recipients = write_txn.open_table(RECIPIENTS)?;
            if recipients.get(recipient.email.as_str())?.is_some() {
                // Dropping the uncommitted transaction aborts it.
                return Err(StoreError::Duplicate(recipient.email.clone()));
            }
            recipients.insert(recipient.email.as_str(), json.as_slice())?;

            let mut hashes = write_txn.open_table(RECIPIENT_HASHES)?;
            hashes.insert(recipient.hash.as_str(), recipient.email.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn remove_by_hash(&self, hash: &str) -> StoreResult<Recipient> {
        let write_txn = self.db.begin_write()?;
        let recipient = {
            let mut hashes = write_txn.open_table(RECIPIENT_HASHES)?;
            let email = match hashes.remove(hash)? {
                Some(email) => email.value().to_string(),
                None => return Err(StoreError::NotFound(hash.to_string())),
            };

            let mut recipients = write_txn.open_table(RECIPIENTS)?;
            let json = match recipients.remove(email.as_str())? {
                Some(json) => json.value().to_vec(),
                None => return Err(StoreError::NotFound(hash.to_string())),
            };
            serde_json::from_slice::<Recipient>(&json)?
        };
        write_txn.commit()?;
        Ok(recipient)
    }

    fn ping(&self) -> StoreResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(RECIPIENTS)?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
