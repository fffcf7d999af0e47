// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Request Pipeline
//!
//! Write routes pass the JSON body through an ordered chain of middleware
//! stages before the handler runs:
//!
//! 1. [`crate::auth::middleware::require_api_key`] checks and strips `API_KEY`
//! 2. [`sanitize::sanitize_body`] drops fields the target schema doesn't declare
//! 3. [`validate::validate_body`] runs the schema's validation rules
//!
//! Each stage either short-circuits with an error envelope or hands the body
//! on. The body travels between stages as a [`JsonBody`] request extension,
//! so it is buffered and parsed once.

use axum::{
    body::{to_bytes, Body},
    extract::Request,
};
use serde_json::{Map, Value};

pub mod sanitize;
pub mod validate;

pub use sanitize::FieldSanitizer;
pub use validate::{Schema, ValidationErrors};

/// Largest request body the pipeline will buffer.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Parsed JSON object body shared between pipeline stages and handlers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonBody(pub Map<String, Value>);

/// Take the JSON body out of a request.
///
/// Returns the body left by an earlier stage if there is one, otherwise
/// buffers and parses the raw request body. `None` means the body was
/// missing, too large, not JSON, or not a JSON object. The returned request
/// has an empty body; stages put the object back as a [`JsonBody`] extension.
pub(crate) async fn take_json_body(mut request: Request) -> (Request, Option<Map<String, Value>>) {
    if let Some(JsonBody(body)) = request.extensions_mut().remove::<JsonBody>() {
        return (request, Some(body));
    }

    let (parts, body) = request.into_parts();
    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => serde_json::from_slice::<Map<String, Value>>(&bytes).ok(),
        Err(_) => None,
    };

    (Request::from_parts(parts, Body::empty()), body)
}
