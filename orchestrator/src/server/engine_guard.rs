//! Engine resolution boundary guard
//!
//! Middleware for routes that require a transformation engine: resolves the
//! engine from the request (dedicated header, then `engine` query parameter,
//! then `engine` body field), answers 400 with a machine-readable reason
//! when none resolves, and otherwise attaches the resolved `EngineKind` to
//! the request extensions.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::debug;

use crate::engines::factory::RequestMeta;
use crate::server::state::ServerState;

/// Dedicated engine selection header
pub const ENGINE_HEADER: &str = "x-engine";

/// Request bodies larger than this are not inspected for an engine field
const BODY_INSPECT_LIMIT: usize = 64 * 1024;

#[derive(Debug, Serialize)]
struct GuardError {
    error: String,
    reason: &'static str,
}

pub async fn engine_guard(
    State(state): State<Arc<ServerState>>,
    request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(ENGINE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    let query = request
        .uri()
        .query()
        .and_then(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .find(|(key, _)| key == "engine")
                .map(|(_, value)| value.into_owned())
        });

    // The body is only buffered when neither header nor query decided it
    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, BODY_INSPECT_LIMIT).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(GuardError {
                    error: format!("unreadable request body: {}", e),
                    reason: "invalid_body",
                }),
            )
                .into_response();
        }
    };

    let body_field = if header.is_none() && query.is_none() {
        serde_json::from_slice::<serde_json::Value>(&bytes)
            .ok()
            .and_then(|v| v.get("engine").and_then(|e| e.as_str()).map(String::from))
    } else {
        None
    };

    let meta = RequestMeta {
        header,
        query,
        body: body_field,
    };

    let kind = match state.factory.resolve_from_request(&meta) {
        Ok(kind) => kind,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(GuardError {
                    error: e.to_string(),
                    reason: "engine_not_resolvable",
                }),
            )
                .into_response();
        }
    };

    debug!("Engine guard resolved '{}'", kind);

    let mut request = Request::from_parts(parts, Body::from(bytes));
    request.extensions_mut().insert(kind);
    next.run(request).await
}
