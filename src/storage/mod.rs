// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Recipient Storage
//!
//! The document store behind the recipients API. Two backends implement
//! [`RecipientStore`]:
//!
//! - [`RecipientDatabase`]: embedded redb database (persistent, ACID)
//! - [`InMemoryStore`]: process-local map for tests and throwaway runs
//!
//! ## Guarantees
//!
//! - `email` is unique; a duplicate insert fails with [`StoreError::Duplicate`]
//!   and leaves the store unchanged
//! - `hash` is indexed; removal by hash returns the removed record
//! - the uniqueness check and the insert happen atomically, so concurrent
//!   inserts of the same email cannot both succeed
//!
//! ## Database URLs
//!
//! | URL | Backend |
//! |-----|---------|
//! | `memory:` / `memory://` | [`InMemoryStore`] |
//! | `redb:///var/lib/app/recipients.redb` | [`RecipientDatabase`] at that path |
//! | `data/recipients.redb` (no scheme) | [`RecipientDatabase`] at that path |

use std::path::Path;
use std::sync::Arc;

use crate::models::Recipient;

pub mod recipient_db;

pub use crate::store::InMemoryStore;
pub use recipient_db::RecipientDatabase;

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("recipient already exists: {0}")]
    Duplicate(String),

    #[error("recipient not found: {0}")]
    NotFound(String),

    #[error("unsupported database url: {0}")]
    UnsupportedUrl(String),

    #[error("store lock poisoned")]
    LockPoisoned,

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Store Trait
// =============================================================================

/// Storage operations for recipient records.
pub trait RecipientStore: Send + Sync {
    /// Every stored recipient, oldest first.
    fn list(&self) -> StoreResult<Vec<Recipient>>;

    /// Persist a new recipient. Fails with [`StoreError::Duplicate`] if the
    /// email is already present.
    fn insert(&self, recipient: &Recipient) -> StoreResult<()>;

    /// Remove the recipient with the given hash and return it. Fails with
    /// [`StoreError::NotFound`] if no recipient has that hash.
    fn remove_by_hash(&self, hash: &str) -> StoreResult<Recipient>;

    /// Check the backend is reachable.
    fn ping(&self) -> StoreResult<()>;
}

/// Open the store named by `database_url`.
pub fn open_store(database_url: &str) -> StoreResult<Arc<dyn RecipientStore>> {
    if matches!(database_url, "memory:" | "memory://") {
        return Ok(Arc::new(InMemoryStore::new()));
    }

    let path = match database_url.split_once("://") {
        Some(("redb", path)) => path,
        Some(_) => return Err(StoreError::UnsupportedUrl(database_url.to_string())),
        None => database_url,
    };

    if path.is_empty() {
        return Err(StoreError::UnsupportedUrl(database_url.to_string()));
    }

    Ok(Arc::new(RecipientDatabase::open(Path::new(path))?))
}

/// Sort recipients oldest first, breaking ties by email.
pub(crate) fn sort_by_joined(recipients: &mut [Recipient]) {
    recipients.sort_by(|a, b| a.joined.cmp(&b.joined).then_with(|| a.email.cmp(&b.email)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_urls_open_in_memory_store() {
        for url in ["memory:", "memory://"] {
            let store = open_store(url).unwrap();
            assert!(store.list().unwrap().is_empty());
        }
    }

    #[test]
    fn redb_urls_open_database_file() {
        let dir = tempfile::tempdir().unwrap();

        let path = dir.path().join("scheme.redb");
        let url = format!("redb://{}", path.display());
        open_store(&url).unwrap().ping().unwrap();
        assert!(path.exists());

        let bare = dir.path().join("bare.redb");
        open_store(bare.to_str().unwrap()).unwrap().ping().unwrap();
        assert!(bare.exists());
    }

    #[test]
    fn other_schemes_are_rejected() {
        for url in ["mongodb://localhost/email_db", "redb://"] {
            assert!(matches!(
                open_store(url),
                Err(StoreError::UnsupportedUrl(_))
            ));
        }
    }
}
