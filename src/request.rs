//! Request representation and HTTP/1.1 wire serialization.

use bytes::Bytes;

use crate::client::Flags;
use crate::response::Response;
use crate::url::ParsedUrl;

/// Request methods the client can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    /// Wire name of the method.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// Callback invoked with the finished response during
/// [`process_responses`](crate::HttpClient::process_responses).
pub(crate) type Callback = Box<dyn FnOnce(&Response) + Send + 'static>;

/// A queued request. Owned by the dispatcher until enqueued, then by the
/// worker until it produces a [`Response`].
pub(crate) struct Request {
    pub id: u32,
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
    pub callback: Option<Callback>,
    pub flags: Flags,
}

/// Product token sent as the default `user-agent`.
const USER_AGENT: &str = concat!("httpq/", env!("CARGO_PKG_VERSION"));

/// Serialize a request into HTTP/1.1 wire text.
///
/// User headers are lowercased and deduplicated in insertion order (later
/// values win), then the mandatory `user-agent`, `host`, and `content-length`
/// entries are merged in; `accept: */*` is added only when absent.
pub(crate) fn build_wire(request: &Request, url: &ParsedUrl) -> Vec<u8> {
    let mut headers: Vec<(String, String)> = Vec::with_capacity(request.headers.len() + 4);
    for (name, value) in &request.headers {
        upsert(&mut headers, name.to_ascii_lowercase(), value.clone());
    }

    upsert(&mut headers, "user-agent".to_string(), USER_AGENT.to_string());
    upsert(&mut headers, "host".to_string(), url.host_header());
    if let Some(body) = &request.body {
        upsert(
            &mut headers,
            "content-length".to_string(),
            body.len().to_string(),
        );
    }
    if !headers.iter().any(|(name, _)| name == "accept") {
        headers.push(("accept".to_string(), "*/*".to_string()));
    }

    let mut wire = Vec::with_capacity(256);
    wire.extend_from_slice(request.method.as_str().as_bytes());
    wire.push(b' ');
    wire.extend_from_slice(url.resource.as_bytes());
    wire.extend_from_slice(b" HTTP/1.1\r\n");
    for (name, value) in &headers {
        wire.extend_from_slice(name.as_bytes());
        wire.extend_from_slice(b": ");
        wire.extend_from_slice(value.as_bytes());
        wire.extend_from_slice(b"\r\n");
    }
    wire.extend_from_slice(b"\r\n");
    if let Some(body) = &request.body {
        wire.extend_from_slice(body);
    }
    wire
}

fn upsert(headers: &mut Vec<(String, String)>, name: String, value: String) {
    match headers.iter_mut().find(|(n, _)| *n == name) {
        Some((_, v)) => *v = value,
        None => headers.push((name, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: Method, url: &str) -> Request {
        Request {
            id: 1,
            method,
            url: url.to_string(),
            headers: Vec::new(),
            body: None,
            callback: None,
            flags: Flags::NONE,
        }
    }

    /// Re-parse serialized wire text: (start line, headers, body).
    fn reparse(wire: &[u8]) -> (String, Vec<(String, String)>, Vec<u8>) {
        let end = wire
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .expect("no header terminator");
        let head = std::str::from_utf8(&wire[..end]).unwrap();
        let mut lines = head.split("\r\n");
        let start = lines.next().unwrap().to_string();
        let headers = lines
            .map(|line| {
                let (name, value) = line.split_once(": ").unwrap();
                (name.to_string(), value.to_string())
            })
            .collect();
        (start, headers, wire[end + 4..].to_vec())
    }

    fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
        headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn get_has_mandatory_headers() {
        let req = request(Method::Get, "http://example.com/index.html");
        let url = ParsedUrl::parse(&req.url).unwrap();
        let (start, headers, body) = reparse(&build_wire(&req, &url));

        assert_eq!(start, "GET /index.html HTTP/1.1");
        assert_eq!(header(&headers, "host"), Some("example.com:80"));
        assert_eq!(header(&headers, "accept"), Some("*/*"));
        assert!(header(&headers, "user-agent").unwrap().starts_with("httpq/"));
        assert_eq!(header(&headers, "content-length"), None);
        assert!(body.is_empty());
    }

    #[test]
    fn post_sets_content_length() {
        let mut req = request(Method::Post, "http://example.com/x");
        req.body = Some(Bytes::from_static(b"payload"));
        let url = ParsedUrl::parse(&req.url).unwrap();
        let (start, headers, body) = reparse(&build_wire(&req, &url));

        assert_eq!(start, "POST /x HTTP/1.1");
        assert_eq!(header(&headers, "content-length"), Some("7"));
        assert_eq!(body, b"payload");
    }

    #[test]
    fn user_headers_lowercased_and_deduped() {
        let mut req = request(Method::Get, "http://h/");
        req.headers = vec![
            ("X-Token".to_string(), "first".to_string()),
            ("x-token".to_string(), "second".to_string()),
        ];
        let url = ParsedUrl::parse(&req.url).unwrap();
        let (_, headers, _) = reparse(&build_wire(&req, &url));

        let tokens: Vec<_> = headers.iter().filter(|(n, _)| n == "x-token").collect();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].1, "second");
    }

    #[test]
    fn user_accept_is_kept() {
        let mut req = request(Method::Get, "http://h/");
        req.headers = vec![("Accept".to_string(), "text/html".to_string())];
        let url = ParsedUrl::parse(&req.url).unwrap();
        let (_, headers, _) = reparse(&build_wire(&req, &url));

        assert_eq!(header(&headers, "accept"), Some("text/html"));
    }

    #[test]
    fn user_host_is_overridden() {
        let mut req = request(Method::Get, "http://h:8080/");
        req.headers = vec![("Host".to_string(), "spoofed".to_string())];
        let url = ParsedUrl::parse(&req.url).unwrap();
        let (_, headers, _) = reparse(&build_wire(&req, &url));

        assert_eq!(header(&headers, "host"), Some("h:8080"));
    }
}
