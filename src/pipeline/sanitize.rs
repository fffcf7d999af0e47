// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Field sanitization.
//!
//! Strips every body field the target schema doesn't declare, plus an
//! ignore list of declared fields the server computes itself. Unexpected
//! fields are dropped silently, never rejected.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use serde_json::{Map, Value};
use tracing::debug;

use super::{take_json_body, JsonBody, Schema};

/// Allow-list filter for request bodies.
#[derive(Debug, Clone, Copy)]
pub struct FieldSanitizer {
    fields: &'static [&'static str],
    ignore: &'static [&'static str],
}

impl FieldSanitizer {
    pub const fn new(fields: &'static [&'static str], ignore: &'static [&'static str]) -> Self {
        Self { fields, ignore }
    }

    /// Sanitizer keeping the fields declared by `S`, minus `ignore`.
    pub const fn for_schema<S: Schema>(ignore: &'static [&'static str]) -> Self {
        Self::new(S::FIELDS, ignore)
    }

    /// Whether `field` survives sanitization.
    pub fn allows(&self, field: &str) -> bool {
        self.fields.iter().any(|f| *f == field) && !self.ignore.iter().any(|f| *f == field)
    }

    /// Remove every disallowed field from `body`, returning the removed names.
    pub fn sanitize(&self, body: &mut Map<String, Value>) -> Vec<String> {
        let removed: Vec<String> = body
            .keys()
            .filter(|field| !self.allows(field.as_str()))
            .cloned()
            .collect();
        for field in &removed {
            body.remove(field);
        }
        removed
    }
}

/// Middleware stage applying a [`FieldSanitizer`] to the request body.
///
/// A missing or unparsable body is treated as an empty object; rejecting it
/// is the job of the stages around this one.
pub async fn sanitize_body(
    State(sanitizer): State<FieldSanitizer>,
    request: Request,
    next: Next,
) -> Response {
    let (mut request, body) = take_json_body(request).await;
    let mut body = body.unwrap_or_default();

    let removed = sanitizer.sanitize(&mut body);
    if !removed.is_empty() {
        debug!(?removed, "Stripped undeclared request fields");
    }

    request.extensions_mut().insert(JsonBody(body));
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SANITIZER: FieldSanitizer =
        FieldSanitizer::new(&["email", "hash", "joined"], &["hash", "joined", "_id"]);

    fn body(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn keeps_only_declared_fields() {
        let mut input = body(json!({
            "email": "a@example.com",
            "admin": true,
            "name": "A",
        }));
        let mut removed = SANITIZER.sanitize(&mut input);
        removed.sort();

        assert_eq!(input, body(json!({ "email": "a@example.com" })));
        assert_eq!(removed, vec!["admin", "name"]);
    }

    #[test]
    fn strips_ignored_fields_even_when_declared() {
        let mut input = body(json!({
            "email": "a@example.com",
            "hash": "f".repeat(64),
            "joined": "2020-01-01T00:00:00Z",
            "_id": "x",
        }));
        SANITIZER.sanitize(&mut input);
        assert_eq!(input, body(json!({ "email": "a@example.com" })));
    }

    #[test]
    fn output_is_subset_of_allowed_fields() {
        let mut input = Map::new();
        for i in 0..100 {
            input.insert(format!("extra_{i}"), json!(i));
        }
        input.insert("email".into(), json!("a@example.com"));
        input.insert("hash".into(), json!("h"));

        SANITIZER.sanitize(&mut input);
        assert!(input.keys().all(|k| SANITIZER.allows(k)));
        assert_eq!(input.len(), 1);
    }

    #[test]
    fn empty_body_is_untouched() {
        let mut input = Map::new();
        assert!(SANITIZER.sanitize(&mut input).is_empty());
        assert!(input.is_empty());
    }
}
