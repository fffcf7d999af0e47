// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

/// Error returned to API clients.
///
/// Serializes as the uniform envelope `{"success": false, "error": ...}`,
/// except for route parameter failures which use the parameter-validation
/// shape `{"error": ..., "status": false}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    shape: ErrorShape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorShape {
    Envelope,
    Parameter,
}

/// Uniform error envelope.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    /// Always `false`.
    pub success: bool,
    pub error: String,
}

/// Body returned when a route parameter fails validation.
#[derive(Serialize, ToSchema)]
pub struct ParameterErrorBody {
    pub error: String,
    /// Always `false`.
    pub status: bool,
}

/// Either 400 body `DELETE /api/recipients/{hash}` can return.
#[derive(Serialize, ToSchema)]
#[serde(untagged)]
pub enum DeleteErrorBody {
    /// Unknown hash.
    Envelope(ErrorBody),
    /// Hash failed its pattern check.
    Parameter(ParameterErrorBody),
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            shape: ErrorShape::Envelope,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, message)
    }

    /// A route parameter failed its pattern check.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self {
            shape: ErrorShape::Parameter,
            ..Self::bad_request(message)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.shape {
            ErrorShape::Envelope => {
                let body = Json(ErrorBody {
                    success: false,
                    error: self.message,
                });
                (self.status, body).into_response()
            }
            ErrorShape::Parameter => {
                let body = Json(ParameterErrorBody {
                    error: self.message,
                    status: false,
                });
                (self.status, body).into_response()
            }
        }
    }
}
