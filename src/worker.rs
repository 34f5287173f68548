//! Background worker: drains the request queue and produces responses.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use bytes::{Bytes, BytesMut};
use crossbeam_channel::{Receiver, Sender};
use tracing::{error, info, warn};

use crate::connection::{Connection, ReadEvent};
use crate::error::HttpError;
use crate::parse::{self, Framing};
use crate::request::Request;
use crate::response::Response;
use crate::url::ParsedUrl;

/// Items on the request queue. `Shutdown` doubles as the wake signal sent by
/// [`HttpClient::shutdown`](crate::HttpClient::shutdown).
pub(crate) enum Job {
    Request(Box<Request>),
    Shutdown,
}

pub(crate) struct Worker {
    jobs: Receiver<Job>,
    completions: Sender<Response>,
    running: Arc<AtomicBool>,
    ca_file: Option<PathBuf>,
}

impl Worker {
    pub fn spawn(
        jobs: Receiver<Job>,
        completions: Sender<Response>,
        running: Arc<AtomicBool>,
        ca_file: Option<PathBuf>,
    ) -> std::io::Result<thread::JoinHandle<()>> {
        thread::Builder::new().name("httpq-worker".to_string()).spawn(move || {
            Worker {
                jobs,
                completions,
                running,
                ca_file,
            }
            .run()
        })
    }

    fn run(self) {
        loop {
            // Block until woken, then drain the queue fully so a single wake
            // services any number of enqueued requests.
            let Ok(job) = self.jobs.recv() else { break };

            let mut next = Some(job);
            while let Some(job) = next.take() {
                let Job::Request(request) = job else { return };
                let response = self.process(*request);
                if self.completions.send(response).is_err() {
                    return;
                }
                next = self.jobs.try_recv().ok();
            }

            // The channel delivery provides the synchronizing edge.
            if !self.running.load(Ordering::Relaxed) {
                break;
            }
        }
    }

    /// Run one request through connect, write, read, and parse, funneling
    /// every failure into the response.
    fn process(&self, mut request: Request) -> Response {
        let mut response = Response::pending(&mut request);
        info!(id = request.id, url = %request.url, "processing request");

        match self.exchange(&request, &mut response) {
            Ok(()) => {
                if response.status_code >= 300 {
                    warn!(url = %response.url, status = response.status_code, "non-success response");
                }
            }
            Err(err) => {
                error!(url = %request.url, %err, "request failed");
                response.error = Some(err);
            }
        }
        response
    }

    fn exchange(&self, request: &Request, response: &mut Response) -> Result<(), HttpError> {
        let url = ParsedUrl::parse(&request.url)?;
        let mut conn = Connection::connect(&url, request.flags, self.ca_file.as_deref())?;

        let wire = crate::request::build_wire(request, &url);
        conn.write_all(&wire)?;

        read_response(&mut conn, response)
        // Dropping the connection sends close-notify and shuts the socket
        // down, on this path and on every error path above.
    }
}

enum BodyKind {
    /// Body is a span of the raw buffer (content-length and close framing).
    Span(usize, usize),
    /// Body was decoded into its own buffer (chunked framing).
    Owned(Vec<u8>),
}

/// Drive reads until the framing declares the response complete, then fill
/// in the parsed fields.
fn read_response(conn: &mut Connection, response: &mut Response) -> Result<(), HttpError> {
    let mut raw = BytesMut::with_capacity(4096);
    let mut buf = [0u8; 4096];

    // Phase 1: read until the header terminator appears.
    let head = loop {
        if let Some(head) = parse::parse_head(&raw)? {
            break head;
        }
        match conn.read(&mut buf)? {
            ReadEvent::Data(n) => raw.extend_from_slice(&buf[..n]),
            ReadEvent::Closed => return Err(HttpError::ConnectionClosed),
        }
    };

    // Phase 2: read until the body is complete. The completion check runs
    // after every read.
    let body = loop {
        match &head.framing {
            Framing::ContentLength(n) => {
                if raw.len() - head.body_start >= *n {
                    break BodyKind::Span(head.body_start, *n);
                }
            }
            Framing::Chunked => {
                if let Some(decoded) = parse::decode_chunked(&raw[head.body_start..])? {
                    break BodyKind::Owned(decoded);
                }
            }
            Framing::Close => {}
        }

        match conn.read(&mut buf)? {
            ReadEvent::Data(n) => raw.extend_from_slice(&buf[..n]),
            ReadEvent::Closed => match &head.framing {
                Framing::Close => {
                    break BodyKind::Span(head.body_start, raw.len() - head.body_start)
                }
                _ => return Err(HttpError::ConnectionClosed),
            },
        }
    };

    let raw = raw.freeze();
    response.status_code = head.status;
    response.reason = head.reason;
    response.headers = head.headers;
    response.body = match body {
        BodyKind::Span(start, len) => raw.slice(start..start + len),
        BodyKind::Owned(decoded) => Bytes::from(decoded),
    };
    response.raw = raw;
    Ok(())
}
