//! Request middleware: code validation and cache lookup
//!
//! `validate_code` runs first and hands a typed [`LocationCode`] to the layers
//! below it. `serve_cached` answers straight from the cache on a hit, so the
//! handler only runs on a miss.

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Extension;

use super::handler::write_error;
use super::interceptor::BufferedResponse;
use super::AppState;
use crate::data::{ClientResponse, LocationCode};

/// Rejects anything that isn't a 4-6 digit code with a plain-text 404
///
/// A segment that doesn't even decode to UTF-8 is rejected the same way.
pub async fn validate_code(
    code: Result<Path<String>, PathRejection>,
    mut request: Request,
    next: Next,
) -> Response {
    let Path(code) = match code {
        Ok(code) => code,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "invalid code");
            return not_found().await;
        }
    };

    match code.parse::<LocationCode>() {
        Ok(code) => {
            request.extensions_mut().insert(code);
            next.run(request).await
        }
        Err(err) => {
            tracing::warn!(code = %err.0, "invalid code");
            not_found().await
        }
    }
}

/// Serves cached bytes for the code, or falls through to the handler
pub async fn serve_cached(
    State(state): State<AppState>,
    Extension(code): Extension<LocationCode>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(cached) = state.cache.get(code.as_str()) {
        tracing::info!(code = %code, "cache hit");
        return (
            StatusCode::OK,
            [(CONTENT_TYPE, HeaderValue::from_static("application/json"))],
            cached,
        )
            .into_response();
    }

    tracing::info!(code = %code, "cache miss");
    next.run(request).await
}

/// Plain-text 404 for invalid codes and unknown routes
pub async fn not_found() -> Response {
    let mut response = BufferedResponse::default();
    write_error(
        &mut response,
        &ClientResponse {
            status: StatusCode::NOT_FOUND,
            message: "404 page not found".to_string(),
        },
    );
    response.into_response()
}
