// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! This module defines the recipient record and the request/response data
//! structures used by the REST API. All types derive `Serialize` and
//! `ToSchema` for JSON handling and OpenAPI documentation.
//!
//! ## Recipient Hash
//!
//! Every recipient carries a `hash`: the lowercase hex SHA-256 digest of the
//! email followed by the server-side salt. The hash is the only handle a
//! recipient needs to unsubscribe, so it is computed by [`Recipient::new`]
//! and is never accepted from a caller.
//!
//! ## Model Categories
//!
//! - **Recipients**: Stored mailing-list entries
//! - **Requests**: Documented request bodies (the API key travels in the body)
//! - **Envelopes**: The `{success, payload}` wrapper around every response

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use crate::pipeline::validate::{Schema, ValidationErrors};

/// Maximum accepted length of an email address (RFC 5321 path limit).
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Length of a recipient hash in hex characters.
pub const HASH_LENGTH: usize = 64;

// =============================================================================
// Recipient
// =============================================================================

/// A mailing-list recipient.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Recipient {
    /// Email address of the recipient (unique).
    pub email: String,
    /// `sha256(email || salt)` in lowercase hex, used to unsubscribe.
    pub hash: String,
    /// When the recipient record was created.
    pub joined: DateTime<Utc>,
}

impl Recipient {
    /// Build a recipient from an email address, deriving its hash.
    ///
    /// The email is checked against the same rules the request validator
    /// applies, so a record can never hold an address the API would reject.
    pub fn new(email: impl Into<String>, salt: &str) -> Result<Self, ValidationErrors> {
        let email = email.into();
        let mut errors = ValidationErrors::default();
        check_email(&email, &mut errors);
        errors.into_result()?;

        let hash = recipient_hash(&email, salt);
        Ok(Self {
            email,
            hash,
            joined: Utc::now(),
        })
    }
}

impl Schema for Recipient {
    const NAME: &'static str = "Recipient";
    const FIELDS: &'static [&'static str] = &["email", "hash", "joined"];

    fn validate(body: &Map<String, Value>) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        match body.get("email") {
            None | Some(Value::Null) => errors.push("email", "Field is required"),
            Some(Value::String(email)) => check_email(email, &mut errors),
            Some(_) => errors.push("email", "StringField only accepts string values"),
        }

        match body.get("hash") {
            None | Some(Value::Null) => {}
            Some(Value::String(hash)) if hash.len() == HASH_LENGTH => {}
            Some(Value::String(_)) => {
                errors.push("hash", format!("String value must be {HASH_LENGTH} characters"))
            }
            Some(_) => errors.push("hash", "StringField only accepts string values"),
        }

        if let Some(joined) = body.get("joined") {
            let parses = match joined {
                Value::Null => true,
                Value::String(s) => DateTime::parse_from_rfc3339(s).is_ok(),
                _ => false,
            };
            if !parses {
                errors.push("joined", "cannot parse date");
            }
        }

        errors.into_result()
    }
}

fn check_email(email: &str, errors: &mut ValidationErrors) {
    if email.len() > MAX_EMAIL_LENGTH {
        errors.push("email", "String value is too long");
    } else if !is_valid_email(email) {
        errors.push("email", format!("Invalid email address: {email}"));
    }
}

/// Compute the recipient hash: `hex(sha256(email || salt))`.
pub fn recipient_hash(email: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

/// Whether `value` looks like a recipient hash (64 hex digits, any case).
pub fn is_recipient_hash(value: &str) -> bool {
    value.len() == HASH_LENGTH && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Syntactic email check.
///
/// Accepts `local@domain` where the local part is dot-separated atoms of
/// RFC 5322 `atext` and the domain is either `localhost` or at least two
/// DNS labels whose top-level label is at least two characters.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.rsplit_once('@') else {
        return false;
    };
    is_valid_local_part(local) && is_valid_domain(domain)
}

fn is_valid_local_part(local: &str) -> bool {
    const SPECIALS: &[u8] = b"!#$%&'*+/=?^_`{|}~-";

    !local.is_empty()
        && local.len() <= 64
        && local.split('.').all(|atom| {
            !atom.is_empty()
                && atom
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || SPECIALS.contains(&b))
        })
}

fn is_valid_domain(domain: &str) -> bool {
    if domain.eq_ignore_ascii_case("localhost") {
        return true;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }

    let labels_ok = labels.iter().all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
    });

    // Punycode TLDs (`xn--p1ai`) carry digits and hyphens.
    let tld = labels[labels.len() - 1];
    labels_ok && tld.len() >= 2
}

// =============================================================================
// Request Bodies
// =============================================================================

/// Body of a request that only carries the API key.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiKeyRequest {
    /// Shared secret configured on the server.
    #[serde(rename = "API_KEY")]
    pub api_key: String,
}

/// Body of a request to add a recipient.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateRecipientRequest {
    /// Shared secret configured on the server.
    #[serde(rename = "API_KEY")]
    pub api_key: String,
    /// Email address to add to the mailing list.
    pub email: String,
}

// =============================================================================
// Response Envelopes
// =============================================================================

/// Successful response envelope.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ApiResponse<T> {
    /// Always `true`.
    pub success: bool,
    /// Operation result.
    pub payload: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(payload: T) -> Self {
        Self {
            success: true,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn hash_matches_sha256_of_email_and_salt() {
        // sha256("a@example.compepper")
        let expected = {
            let mut hasher = Sha256::new();
            hasher.update(b"a@example.compepper");
            hex::encode(hasher.finalize())
        };
        let hash = recipient_hash("a@example.com", "pepper");
        assert_eq!(hash, expected);
        assert_eq!(hash.len(), HASH_LENGTH);
        assert_eq!(hash, hash.to_lowercase());
        assert_eq!(hash, recipient_hash("a@example.com", "pepper"));
    }

    #[test]
    fn hash_depends_on_salt() {
        assert_ne!(
            recipient_hash("a@example.com", "pepper"),
            recipient_hash("a@example.com", "salt")
        );
    }

    #[test]
    fn new_recipient_derives_hash_and_join_time() {
        let before = Utc::now();
        let recipient = Recipient::new("a@example.com", "pepper").unwrap();
        assert_eq!(recipient.email, "a@example.com");
        assert_eq!(recipient.hash, recipient_hash("a@example.com", "pepper"));
        assert!(recipient.joined >= before);
    }

    #[test]
    fn join_time_is_per_record() {
        let first = Recipient::new("a@example.com", "pepper").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = Recipient::new("b@example.com", "pepper").unwrap();
        assert!(second.joined > first.joined);
    }

    #[test]
    fn new_recipient_rejects_bad_email() {
        let err = Recipient::new("not-an-email", "pepper").unwrap_err();
        assert_eq!(err.fields(), vec!["email"]);
    }

    #[test]
    fn email_syntax() {
        for ok in [
            "a@example.com",
            "first.last+tag@sub.example.org",
            "x@localhost",
            "o'brien@example.ie",
            "a@example.xn--p1ai",
            "user@mail.co.xn--80asehdb",
            "a@example.c0m",
        ] {
            assert!(is_valid_email(ok), "{ok} should be valid");
        }
        for bad in [
            "",
            "plain",
            "@example.com",
            "a@",
            "a@example",
            "a..b@example.com",
            ".a@example.com",
            "a@-example.com",
            "a@example.c",
            "a@example.com-",
            "a b@example.com",
            "a@exa mple.com",
        ] {
            assert!(!is_valid_email(bad), "{bad} should be invalid");
        }
    }

    #[test]
    fn hash_pattern() {
        assert!(is_recipient_hash(&"a".repeat(64)));
        assert!(is_recipient_hash(&"A1".repeat(32)));
        assert!(!is_recipient_hash(&"a".repeat(63)));
        assert!(!is_recipient_hash(&"g".repeat(64)));
    }

    #[test]
    fn schema_requires_email() {
        let err = Recipient::validate(&body(json!({}))).unwrap_err();
        assert_eq!(err.fields(), vec!["email"]);

        let err = Recipient::validate(&body(json!({ "email": 42 }))).unwrap_err();
        assert_eq!(err.fields(), vec!["email"]);
    }

    #[test]
    fn schema_rejects_long_email() {
        let email = format!("{}@example.com", "a".repeat(250));
        let err = Recipient::validate(&body(json!({ "email": email }))).unwrap_err();
        assert!(err.to_string().contains("too long"));
    }

    #[test]
    fn schema_accepts_valid_body() {
        assert!(Recipient::validate(&body(json!({ "email": "a@example.com" }))).is_ok());
    }

    #[test]
    fn schema_checks_optional_fields() {
        let err = Recipient::validate(&body(json!({
            "email": "a@example.com",
            "hash": "short",
            "joined": "yesterday"
        })))
        .unwrap_err();
        assert_eq!(err.fields(), vec!["hash", "joined"]);
    }

    #[test]
    fn recipient_serializes_flat() {
        let recipient = Recipient::new("a@example.com", "pepper").unwrap();
        let value = serde_json::to_value(&recipient).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 3);
        assert_eq!(value["email"], "a@example.com");
        assert_eq!(value["hash"], recipient.hash);
    }
}
