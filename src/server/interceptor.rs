//! Response sinks and the caching interceptor
//!
//! Handlers write their response into a [`ResponseSink`]. The
//! [`CachingWriter`] decorator sits between a handler and the real sink,
//! watches the status it declares and stores the first body write in the
//! cache when that status is a success.

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};

use crate::cache::ExpiringCache;

/// Something a handler can write a response into
pub trait ResponseSink {
    /// Headers to send; must be set before the first write
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Declares the status code of the response
    fn write_header(&mut self, status: StatusCode);

    /// Appends to the body, implying `200 OK` if no status was declared
    fn write(&mut self, body: Bytes);
}

/// Collects a response in memory and turns it into an axum [`Response`]
///
/// The first declared status wins, as it would on a live connection.
#[derive(Debug, Default)]
pub struct BufferedResponse {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
}

impl BufferedResponse {
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

impl ResponseSink for BufferedResponse {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        match self.status {
            None => self.status = Some(status),
            Some(sent) => {
                tracing::warn!(sent = sent.as_u16(), ignored = status.as_u16(), "superfluous write_header call");
            }
        }
    }

    fn write(&mut self, body: Bytes) {
        self.status.get_or_insert(StatusCode::OK);
        self.body.extend_from_slice(&body);
    }
}

impl IntoResponse for BufferedResponse {
    fn into_response(self) -> Response {
        (self.status(), self.headers, self.body.freeze()).into_response()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    /// No body written yet; the cache decision is still open
    Pending,
    /// The first write has been cached (or not) and forwarded
    Forwarded,
}

/// Sink decorator that caches a successful response under a key
///
/// Only the first body write is considered, and only if the status declared
/// before it (or the implied `200`) is below `300`. Headers and status pass
/// through untouched.
pub struct CachingWriter<'a, S: ResponseSink> {
    inner: &'a mut S,
    cache: &'a ExpiringCache,
    key: &'a str,
    status: Option<StatusCode>,
    state: WriterState,
}

impl<'a, S: ResponseSink> CachingWriter<'a, S> {
    pub fn new(inner: &'a mut S, cache: &'a ExpiringCache, key: &'a str) -> Self {
        Self {
            inner,
            cache,
            key,
            status: None,
            state: WriterState::Pending,
        }
    }

    /// The most recently declared status, if any
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }
}

impl<S: ResponseSink> ResponseSink for CachingWriter<'_, S> {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write_header(&mut self, status: StatusCode) {
        self.status = Some(status);
        self.inner.write_header(status);
    }

    fn write(&mut self, body: Bytes) {
        if self.state == WriterState::Pending {
            let status = *self.status.get_or_insert(StatusCode::OK);
            if status.as_u16() < 300 {
                self.cache.set(self.key, body.clone());
                tracing::info!(code = self.key, status = status.as_u16(), "response cached");
            }
            self.state = WriterState::Forwarded;
        }

        self.inner.write(body);
    }
}
