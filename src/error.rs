use std::io;

use thiserror::Error;

/// Errors produced while processing a request.
///
/// Every failure inside the worker is funneled into the request's
/// [`Response`](crate::Response) — there are no partial responses, and the
/// callback fires exactly once whether the request succeeded or not.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The URL scheme is missing or unrecognized, or a component is unusable.
    #[error("malformed url: {0}")]
    MalformedUrl(String),

    /// TCP connect, socket setup, or transport-level handshake I/O failed.
    #[error("connect failed: {0}")]
    Connect(#[source] io::Error),

    /// The URL host cannot be used as a TLS server name.
    #[error("invalid server name: {0}")]
    InvalidServerName(String),

    /// The CA trust bundle could not be loaded or parsed.
    #[error("ca bundle: {0}")]
    CaCert(String),

    /// TLS configuration, handshake, or certificate verification failed.
    #[error("tls error: {0}")]
    Tls(#[from] rustls::Error),

    /// Writing the serialized request failed.
    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    /// Reading the response failed, including the per-read timeout.
    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    /// The peer closed the connection before a complete response arrived.
    #[error("connection closed")]
    ConnectionClosed,

    /// The status line or body framing could not be parsed.
    #[error("bad response: {0}")]
    BadResponse(String),

    /// The response requested a transfer coding other than `chunked`.
    #[error("unsupported transfer encoding: {0}")]
    UnsupportedEncoding(String),
}
