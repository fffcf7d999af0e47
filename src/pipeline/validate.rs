// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Schema validation for request bodies.
//!
//! A [`Schema`] declares its field names at compile time and checks a JSON
//! object against its rules. Validation is structural only: uniqueness is
//! enforced by the store at insert time.

use std::fmt;

use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};
use tracing::warn;

use super::{take_json_body, JsonBody};
use crate::error::ApiError;

/// A record type whose JSON form can be sanitized and validated.
pub trait Schema {
    /// Name used in validation messages.
    const NAME: &'static str;
    /// Every field the record declares.
    const FIELDS: &'static [&'static str];

    /// Check `body` against the schema rules.
    fn validate(body: &Map<String, Value>) -> Result<(), ValidationErrors>;
}

/// A single failed field rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Field-level validation failures, in the order they were found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Names of the failing fields.
    pub fn fields(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.field.as_str()).collect()
    }

    /// `Ok(())` when nothing failed.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: ['{}']", error.message, error.field)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Middleware stage validating the request body against `S`.
///
/// Failures short-circuit with HTTP 403. On success the body is passed on
/// unchanged.
pub async fn validate_body<S: Schema>(request: Request, next: Next) -> Response {
    let (mut request, body) = take_json_body(request).await;
    let body = body.unwrap_or_default();

    if let Err(errors) = S::validate(&body) {
        warn!(schema = S::NAME, fields = ?errors.fields(), "Request body failed validation");
        return ApiError::forbidden(format!("ValidationError ({}) ({errors})", S::NAME))
            .into_response();
    }

    request.extensions_mut().insert(JsonBody(body));
    next.run(request).await
}
