//! httpq — queued HTTP/1.1 client with a background worker.
//!
//! The caller enqueues GET/POST requests; a single worker thread resolves,
//! connects (TCP or TLS), writes the serialized request, and reads and
//! frames the response. Completed responses queue up until the caller drains
//! them with [`HttpClient::process_responses`], which invokes each request's
//! callback synchronously on the calling thread — callbacks never run on the
//! worker. This fits a host application (a game engine, an editor) that
//! polls from its main loop and must never block it.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use httpq::HttpClient;
//!
//! fn main() -> std::io::Result<()> {
//!     let mut client = HttpClient::new()?;
//!
//!     client
//!         .get("http://example.com/")
//!         .header("accept", "text/html")
//!         .callback(|response| {
//!             println!("{} -> {}", response.url(), response.status());
//!         })
//!         .send();
//!
//!     // Poll from the application's update loop.
//!     while client.process_responses() == 0 {
//!         std::thread::yield_now();
//!     }
//!
//!     client.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! Requests travel over one channel to the worker and responses travel back
//! over another; the channels are both queue and wake signal, and a blocking
//! `recv` plus a `try_recv` drain means one wake services any number of
//! enqueued requests. One request is in flight at a time — no pooling, no
//! keep-alive, no retries, no redirects. A response is surfaced only once
//! fully received; `Content-Length`, chunked transfer coding, and
//! close-delimited framing are supported.
//!
//! TLS uses rustls with the compiled-in webpki roots, a PEM bundle from
//! disk, or no verification at all, selected per request via [`Flags`].

pub(crate) mod connection;
pub(crate) mod parse;
pub(crate) mod tls;
pub(crate) mod worker;

pub mod client;
pub mod error;
pub mod request;
pub mod response;
pub mod url;

/// Client handle: spawns the worker, enqueues requests, drains responses.
pub use client::HttpClient;
/// Builder carrying client-wide options.
pub use client::HttpClientBuilder;
/// Per-request behavior bits.
pub use client::Flags;
/// Builder for a single request.
pub use client::RequestBuilder;
/// Request error taxonomy.
pub use error::HttpError;
/// Request methods the client can emit.
pub use request::Method;
/// Completed (or failed) request outcome.
pub use response::Response;
/// Default PEM bundle path for [`Flags::USE_EXTERNAL_CERT_FILE`].
pub use tls::DEFAULT_CA_FILE;
/// Components of a parsed URL.
pub use url::ParsedUrl;
