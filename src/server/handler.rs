//! Request handler for `GET /{code}`
//!
//! Runs the aggregator for one location and renders the outcome into a
//! response sink: the serialized report on success, a plain-text error
//! otherwise.

use axum::extract::State;
use axum::http::header::{CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::Extension;
use bytes::Bytes;

use super::interceptor::{BufferedResponse, CachingWriter, ResponseSink};
use super::AppState;
use crate::data::{Aggregator, ClientResponse, FetchError, LocationCode};

/// Axum handler behind the cache lookup
///
/// The response is written through a [`CachingWriter`] so a successful body
/// lands in the cache under the request's code.
pub async fn serve_code(
    State(state): State<AppState>,
    Extension(code): Extension<LocationCode>,
) -> Response {
    let mut response = BufferedResponse::default();
    {
        let mut writer = CachingWriter::new(&mut response, &state.cache, code.as_str());
        respond(&state.aggregator, &code, &mut writer).await;
    }
    response.into_response()
}

/// Aggregates `code` and writes the result into `sink` in a single body write
pub async fn respond<S: ResponseSink>(aggregator: &Aggregator, code: &LocationCode, sink: &mut S) {
    let report = match aggregator.aggregate(code).await {
        Ok(report) => report,
        Err(err) => {
            match &err {
                FetchError::Upstream(_) => tracing::error!(code = %code, error = %err, "meteoswiss error"),
                _ => tracing::error!(code = %code, error = %err, "can't fetch all"),
            }
            write_error(sink, &err.client_response());
            return;
        }
    };

    match serde_json::to_vec(&report) {
        Ok(body) => {
            sink.headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            sink.write(Bytes::from(body));
        }
        Err(err) => {
            tracing::error!(code = %code, error = %err, "write response");
            write_error(sink, &ClientResponse::internal_error());
        }
    }
}

/// Writes a plain-text error response
pub fn write_error<S: ResponseSink>(sink: &mut S, response: &ClientResponse) {
    let headers = sink.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    sink.write_header(response.status);
    sink.write(Bytes::from(response.message.clone()));
}
