// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! API key middleware for Axum.
//!
//! Applied per route with `from_fn_with_state`:
//!
//! ```rust,ignore
//! let list = get(list_recipients)
//!     .layer(axum::middleware::from_fn_with_state(state.clone(), require_api_key));
//! ```
//!
//! This is the first stage of the request pipeline; it buffers the body and
//! leaves the remaining fields in a [`JsonBody`] extension for the stages
//! behind it.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};
use tracing::warn;

use super::AuthError;
use crate::pipeline::{take_json_body, JsonBody};
use crate::state::AppState;

/// Name of the body field carrying the shared secret.
pub const API_KEY_FIELD: &str = "API_KEY";

/// Authentication middleware function.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let (mut request, body) = take_json_body(request).await;

    let mut body = match body {
        Some(body) => body,
        None => {
            warn!(path = %request.uri().path(), "Request body is not a JSON object");
            return AuthError::MissingApiKey.into_response();
        }
    };

    if let Err(e) = authenticate(&mut body, &state.config.api_key) {
        warn!(path = %request.uri().path(), error = %e, "API key check failed");
        return e.into_response();
    }

    request.extensions_mut().insert(JsonBody(body));
    next.run(request).await
}

/// Check the `API_KEY` field of `body` against `expected` and remove it.
///
/// Non-string values are compared by their JSON text, so `123` matches a
/// configured key of `"123"`. The body is left untouched on failure.
pub fn authenticate(body: &mut Map<String, Value>, expected: &str) -> Result<(), AuthError> {
    let given = match body.get(API_KEY_FIELD) {
        Some(Value::String(key)) => key.clone(),
        Some(other) => other.to_string(),
        None => return Err(AuthError::MissingApiKey),
    };

    if given != expected {
        return Err(AuthError::InvalidApiKey);
    }

    body.remove(API_KEY_FIELD);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn correct_key_is_removed() {
        let mut input = body(json!({ "API_KEY": "secret", "email": "a@example.com" }));
        authenticate(&mut input, "secret").unwrap();
        assert_eq!(input, body(json!({ "email": "a@example.com" })));
    }

    #[test]
    fn missing_key() {
        let mut input = body(json!({ "email": "a@example.com" }));
        assert_eq!(
            authenticate(&mut input, "secret"),
            Err(AuthError::MissingApiKey)
        );
    }

    #[test]
    fn wrong_key_leaves_body_alone() {
        let original = body(json!({ "API_KEY": "wrong", "email": "a@example.com" }));
        let mut input = original.clone();
        assert_eq!(
            authenticate(&mut input, "secret"),
            Err(AuthError::InvalidApiKey)
        );
        assert_eq!(input, original);
    }

    #[test]
    fn non_string_keys_compare_by_text() {
        let mut input = body(json!({ "API_KEY": 123 }));
        assert!(authenticate(&mut input, "123").is_ok());

        let mut input = body(json!({ "API_KEY": null }));
        assert_eq!(
            authenticate(&mut input, "secret"),
            Err(AuthError::InvalidApiKey)
        );
    }

    #[test]
    fn comparison_is_case_sensitive() {
        let mut input = body(json!({ "API_KEY": "SECRET" }));
        assert_eq!(
            authenticate(&mut input, "secret"),
            Err(AuthError::InvalidApiKey)
        );
    }
}
