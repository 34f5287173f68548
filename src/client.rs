//! Public dispatch surface: client handle, request builder, flags.

use std::io;
use std::ops::BitOr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use bytes::Bytes;
use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::info;

use crate::request::{Callback, Method, Request};
use crate::response::Response;
use crate::worker::{Job, Worker};

/// Per-request behavior bits.
///
/// `USE_EXTERNAL_CERT_FILE` is meaningful only together with
/// `VERIFY_HOST_CERT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(u32);

impl Flags {
    /// No special behavior; server certificates are not verified.
    pub const NONE: Flags = Flags(0);
    /// Verify the server certificate chain and host name.
    pub const VERIFY_HOST_CERT: Flags = Flags(1);
    /// Load trust anchors from the configured PEM bundle instead of the
    /// compiled-in roots.
    pub const USE_EXTERNAL_CERT_FILE: Flags = Flags(2);

    /// Whether all bits of `other` are set in `self`.
    pub fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Raw bit value.
    pub fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

/// Builder for an [`HttpClient`].
pub struct HttpClientBuilder {
    ca_file: Option<PathBuf>,
}

impl HttpClientBuilder {
    /// PEM bundle consulted when a request sets
    /// [`Flags::USE_EXTERNAL_CERT_FILE`]. Defaults to
    /// [`DEFAULT_CA_FILE`](crate::DEFAULT_CA_FILE).
    pub fn ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_file = Some(path.into());
        self
    }

    /// Create the queues and spawn the worker thread.
    pub fn build(self) -> io::Result<HttpClient> {
        let (jobs_tx, jobs_rx) = unbounded();
        let (completions_tx, completions_rx) = unbounded();
        let running = Arc::new(AtomicBool::new(true));

        let worker = Worker::spawn(jobs_rx, completions_tx, running.clone(), self.ca_file)?;

        Ok(HttpClient {
            jobs: jobs_tx,
            completions: completions_rx,
            running,
            worker: Some(worker),
            next_id: AtomicU32::new(1),
        })
    }
}

/// Handle to the queued HTTP client.
///
/// Requests travel over one channel to a single worker thread; completed
/// responses travel back over another and sit there until the owner drains
/// them with [`process_responses`](Self::process_responses). Dropping the
/// client shuts the worker down.
pub struct HttpClient {
    jobs: Sender<Job>,
    completions: Receiver<Response>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    next_id: AtomicU32,
}

impl HttpClient {
    /// Spawn the worker with default options.
    pub fn new() -> io::Result<HttpClient> {
        Self::builder().build()
    }

    /// Start building a client with non-default options.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder { ca_file: None }
    }

    /// Build a GET request for `url`.
    pub fn get(&self, url: &str) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::Get, url)
    }

    /// Build a POST request for `url`.
    pub fn post(&self, url: &str) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::Post, url)
    }

    /// Deliver completed responses by invoking their callbacks on the
    /// calling thread. Never blocks. Returns the number of responses
    /// drained.
    pub fn process_responses(&self) -> usize {
        if !self.running.load(Ordering::Acquire) {
            return 0;
        }

        let mut delivered = 0;
        while let Ok(mut response) = self.completions.try_recv() {
            if let Some(callback) = response.callback.take() {
                callback(&response);
            }
            delivered += 1;
        }
        delivered
    }

    /// Stop the worker and join it. Requests already queued are still
    /// processed before the worker observes the signal; responses that were
    /// never drained are dropped, so no callback fires after this returns.
    /// Idempotent.
    pub fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.running.store(false, Ordering::Release);
        let _ = self.jobs.send(Job::Shutdown);
        let _ = worker.join();
    }

    fn enqueue(
        &self,
        method: Method,
        url: String,
        headers: Vec<(String, String)>,
        body: Option<Bytes>,
        callback: Option<Callback>,
        flags: Flags,
    ) -> u32 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        info!(id, url = %url, "requesting");

        let request = Request {
            id,
            method,
            url,
            headers,
            body,
            callback,
            flags,
        };
        // The push is also the wake signal.
        let _ = self.jobs.send(Job::Request(Box::new(request)));
        id
    }
}

impl Drop for HttpClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Builder for a single request, created by [`HttpClient::get`] and
/// [`HttpClient::post`].
pub struct RequestBuilder<'a> {
    client: &'a HttpClient,
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
    callback: Option<Callback>,
    flags: Flags,
}

impl<'a> RequestBuilder<'a> {
    fn new(client: &'a HttpClient, method: Method, url: &str) -> Self {
        Self {
            client,
            method,
            url: url.to_string(),
            headers: Vec::new(),
            body: None,
            callback: None,
            flags: Flags::NONE,
        }
    }

    /// Add a header to the request.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Set the request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set per-request flags.
    pub fn flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    /// Invoke `callback` with the finished response during
    /// [`HttpClient::process_responses`].
    pub fn callback(mut self, callback: impl FnOnce(&Response) + Send + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Enqueue the request, wake the worker, and return the request id
    /// immediately. The id is never zero and correlates the eventual
    /// response.
    pub fn send(self) -> u32 {
        self.client.enqueue(
            self.method,
            self.url,
            self.headers,
            self.body,
            self.callback,
            self.flags,
        )
    }
}
