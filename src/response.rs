//! Responses delivered to callbacks by `process_responses`.

use std::fmt;

use bytes::Bytes;

use crate::error::HttpError;
use crate::request::{Callback, Request};

/// The outcome of a queued request: a fully received, framed response, or a
/// record of where processing failed.
///
/// `body` is a zero-copy slice of `raw` for content-length and
/// close-delimited responses, and an independently owned buffer for chunked
/// responses; either way it holds the decoded body.
pub struct Response {
    pub(crate) request_id: u32,
    pub(crate) url: String,
    pub(crate) status_code: u16,
    pub(crate) reason: String,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) raw: Bytes,
    pub(crate) body: Bytes,
    pub(crate) error: Option<HttpError>,
    pub(crate) close: bool,
    pub(crate) callback: Option<Callback>,
}

impl Response {
    /// An empty response carrying the request's identity, ready for the
    /// worker to fill in. Takes the callback out of the request.
    pub(crate) fn pending(request: &mut Request) -> Self {
        Response {
            request_id: request.id,
            url: request.url.clone(),
            status_code: 0,
            reason: String::new(),
            headers: Vec::new(),
            raw: Bytes::new(),
            body: Bytes::new(),
            error: None,
            close: true,
            callback: request.callback.take(),
        }
    }

    /// Identifier returned by `send()` for the originating request.
    pub fn request_id(&self) -> u32 {
        self.request_id
    }

    /// The URL the request was issued against.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// HTTP status code; zero when the request errored before parsing.
    pub fn status(&self) -> u16 {
        self.status_code
    }

    /// Reason phrase from the status line.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Parsed response headers as (name, value) pairs, in wire order.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Get the first header value matching `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The complete raw bytes received; empty on failure.
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// Decoded body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body as UTF-8 text, if valid.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// The error that short-circuited processing, if any.
    pub fn error(&self) -> Option<&HttpError> {
        self.error.as_ref()
    }

    /// Whether the worker short-circuited before a complete response.
    pub fn errored(&self) -> bool {
        self.error.is_some()
    }

    /// Whether the connection was to be closed after this response.
    /// Always true; connection reuse is not implemented.
    pub fn close(&self) -> bool {
        self.close
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("request_id", &self.request_id)
            .field("url", &self.url)
            .field("status_code", &self.status_code)
            .field("reason", &self.reason)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .field("error", &self.error)
            .finish()
    }
}
