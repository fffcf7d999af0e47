// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use crate::{
    error::{ApiError, DeleteErrorBody, ErrorBody},
    models::{is_recipient_hash, ApiKeyRequest, ApiResponse, CreateRecipientRequest, Recipient},
    pipeline::JsonBody,
    state::AppState,
};

#[utoipa::path(
    get,
    path = "/api/recipients",
    request_body = ApiKeyRequest,
    tag = "Recipients",
    responses(
        (status = 200, body = ApiResponse<Vec<Recipient>>),
        (status = 400, description = "API_KEY missing", body = ErrorBody),
        (status = 401, description = "API_KEY invalid", body = ErrorBody),
        (status = 429, description = "Rate limit exceeded", body = ErrorBody)
    )
)]
pub async fn list_recipients(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Recipient>>>, ApiError> {
    let recipients = state.recipients.list()?;
    Ok(Json(ApiResponse::ok(recipients)))
}

/// Add a recipient. Runs behind the auth, sanitize and validate stages, so
/// `fields` holds at most the declared, client-settable fields.
#[utoipa::path(
    post,
    path = "/api/recipients",
    request_body = CreateRecipientRequest,
    tag = "Recipients",
    responses(
        (status = 200, body = ApiResponse<Recipient>),
        (status = 400, description = "API_KEY missing, or email already registered", body = ErrorBody),
        (status = 401, description = "API_KEY invalid", body = ErrorBody),
        (status = 403, description = "Body failed validation", body = ErrorBody),
        (status = 429, description = "Rate limit exceeded", body = ErrorBody)
    )
)]
pub async fn create_recipient(
    State(state): State<AppState>,
    Extension(JsonBody(fields)): Extension<JsonBody>,
) -> Result<Json<ApiResponse<Recipient>>, ApiError> {
    let recipient = state.recipients.insert(&fields)?;
    Ok(Json(ApiResponse::ok(recipient)))
}

#[utoipa::path(
    delete,
    path = "/api/recipients/{hash}",
    params(
        ("hash" = String, Path, description = "Recipient hash (64 hex characters)")
    ),
    tag = "Recipients",
    responses(
        (status = 200, body = ApiResponse<Recipient>),
        (status = 400, description = "Unknown hash (`{success, error}`) or malformed hash (`{error, status}`)", body = DeleteErrorBody),
        (status = 429, description = "Rate limit exceeded", body = ErrorBody)
    )
)]
pub async fn delete_recipient(
    Path(hash): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Recipient>>, ApiError> {
    if !is_recipient_hash(&hash) {
        return Err(ApiError::invalid_parameter(format!(
            "Pattern check failed for 'hash': {hash:?} does not match ^[A-Fa-f0-9]{{64}}$"
        )));
    }

    let recipient = state.recipients.remove(&hash)?;
    Ok(Json(ApiResponse::ok(recipient)))
}
