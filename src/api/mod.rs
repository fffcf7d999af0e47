// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::Request,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info_span;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::require_api_key,
    error::{DeleteErrorBody, ErrorBody, ParameterErrorBody},
    models::{ApiKeyRequest, CreateRecipientRequest, Recipient},
    pipeline::{sanitize::sanitize_body, validate::validate_body, FieldSanitizer},
    rate_limit::rate_limit,
    state::AppState,
};

pub mod health;
pub mod recipients;

/// Recipient fields the server computes; clients may not set them.
const SERVER_COMPUTED_FIELDS: &[&str] = &["hash", "joined", "_id"];

const RECIPIENT_SANITIZER: FieldSanitizer =
    FieldSanitizer::for_schema::<Recipient>(SERVER_COMPUTED_FIELDS);

/// Build the application router.
///
/// Stage order per route: rate limit → API key → sanitize → validate →
/// handler. `MethodRouter::layer` wraps inside-out, so the last layer added
/// runs first.
pub fn router(state: AppState) -> Router {
    let authenticate = from_fn_with_state(state.clone(), require_api_key);

    let list = get(recipients::list_recipients).layer(authenticate.clone());
    let create = post(recipients::create_recipient)
        .layer(from_fn(validate_body::<Recipient>))
        .layer(from_fn_with_state(RECIPIENT_SANITIZER, sanitize_body))
        .layer(authenticate);

    let api_routes = Router::new()
        .route("/recipients", list.merge(create))
        .route("/recipients/{hash}", delete(recipients::delete_recipient))
        .route_layer(from_fn_with_state(state.rate_limiter.clone(), rate_limit))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");
                info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        recipients::list_recipients,
        recipients::create_recipient,
        recipients::delete_recipient,
        health::health,
        health::liveness
    ),
    components(
        schemas(
            Recipient,
            ApiKeyRequest,
            CreateRecipientRequest,
            ErrorBody,
            ParameterErrorBody,
            DeleteErrorBody
        )
    ),
    tags(
        (name = "Recipients", description = "Mailing list signup and removal"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;
