//! HTTP/1.1 response framing.
//!
//! Operates on a growing byte buffer fed by the connection read loop: first
//! locate the end of the header block, then classify the body framing and
//! decide completion as more bytes arrive. Response bodies are delimited by
//! `Content-Length`, by chunked transfer coding, or by connection close.

use tracing::warn;

use crate::error::HttpError;

/// How the response body is delimited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Framing {
    /// `Content-Length: n` — body is exactly `n` bytes.
    ContentLength(usize),
    /// `Transfer-Encoding: chunked`.
    Chunked,
    /// No length information — body runs until the peer closes.
    Close,
}

/// Parsed status line, headers, and framing classification.
#[derive(Debug)]
pub(crate) struct Head {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    /// Offset of the first body byte in the raw buffer.
    pub body_start: usize,
    pub framing: Framing,
}

/// Find the position of `\r\n\r\n` in data, returns index of the first `\r`.
pub(crate) fn find_header_end(data: &[u8]) -> Option<usize> {
    (0..data.len().saturating_sub(3)).find(|&i| {
        data[i] == b'\r' && data[i + 1] == b'\n' && data[i + 2] == b'\r' && data[i + 3] == b'\n'
    })
}

fn find_crlf(data: &[u8]) -> Option<usize> {
    (0..data.len().saturating_sub(1)).find(|&i| data[i] == b'\r' && data[i + 1] == b'\n')
}

/// Parse the status line and header block once the `\r\n\r\n` terminator has
/// arrived. Returns `Ok(None)` until then.
///
/// Malformed header lines are logged and skipped; a malformed status line or
/// length value fails the response.
pub(crate) fn parse_head(raw: &[u8]) -> Result<Option<Head>, HttpError> {
    let Some(end) = find_header_end(raw) else {
        return Ok(None);
    };
    let text = std::str::from_utf8(&raw[..end])
        .map_err(|_| HttpError::BadResponse("header block is not valid UTF-8".to_string()))?;
    let mut lines = text.split("\r\n");

    let (status, reason) = parse_status_line(lines.next().unwrap_or(""))?;

    let mut headers = Vec::new();
    let mut content_length: Option<usize> = None;
    let mut encodings: Option<String> = None;

    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            warn!(line, "malformed response header");
            continue;
        };
        let name = name.trim();
        let value = value.trim();
        if name.is_empty() {
            warn!(line, "malformed response header");
            continue;
        }

        if name.eq_ignore_ascii_case("content-length") {
            let parsed = value
                .parse::<usize>()
                .map_err(|_| HttpError::BadResponse(format!("bad content-length: {value:?}")))?;
            content_length = Some(parsed);
        } else if name.eq_ignore_ascii_case("transfer-encoding") {
            encodings = Some(value.to_string());
        }

        headers.push((name.to_string(), value.to_string()));
    }

    // Content-Length wins when both are present; otherwise walk the
    // transfer codings; otherwise the body runs to connection close.
    let framing = if let Some(n) = content_length {
        Framing::ContentLength(n)
    } else if let Some(tokens) = encodings {
        classify_encodings(&tokens)?
    } else {
        Framing::Close
    };

    Ok(Some(Head {
        status,
        reason,
        headers,
        body_start: end + 4,
        framing,
    }))
}

fn parse_status_line(line: &str) -> Result<(u16, String), HttpError> {
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or("");
    if !version.starts_with("HTTP/") {
        return Err(HttpError::BadResponse(format!("bad status line: {line:?}")));
    }
    let code = parts
        .next()
        .ok_or_else(|| HttpError::BadResponse(format!("bad status line: {line:?}")))?;
    let status = code
        .parse::<u16>()
        .map_err(|_| HttpError::BadResponse(format!("bad status code: {code:?}")))?;
    let reason = parts.next().unwrap_or("").to_string();
    Ok((status, reason))
}

/// Walk comma-separated transfer codings in order. Only `chunked` is
/// implemented; anything else is surfaced as an error rather than silently
/// truncating the body.
fn classify_encodings(tokens: &str) -> Result<Framing, HttpError> {
    let mut framing = None;
    for token in tokens.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if token.eq_ignore_ascii_case("chunked") {
            framing = Some(Framing::Chunked);
        } else {
            return Err(HttpError::UnsupportedEncoding(token.to_string()));
        }
    }
    framing.ok_or_else(|| HttpError::BadResponse("empty transfer-encoding".to_string()))
}

/// One step of chunked decoding.
enum ChunkStep<'a> {
    Complete {
        data: &'a [u8],
        consumed: usize,
        is_last: bool,
    },
    NeedMore,
}

/// Decode one chunk: a hex size line, that many bytes, a trailing CRLF.
/// Chunk extensions (`;key=value`) are ignored.
fn decode_chunk(data: &[u8]) -> Result<ChunkStep<'_>, HttpError> {
    let Some(crlf) = find_crlf(data) else {
        return Ok(ChunkStep::NeedMore);
    };

    let size_line = std::str::from_utf8(&data[..crlf])
        .map_err(|_| HttpError::BadResponse("chunk size line is not text".to_string()))?;
    let size_hex = size_line.split(';').next().unwrap_or("").trim();
    let size = usize::from_str_radix(size_hex, 16)
        .map_err(|_| HttpError::BadResponse(format!("bad chunk size: {size_hex:?}")))?;

    if size == 0 {
        // Last chunk. Trailers after it are discarded by the caller.
        return Ok(ChunkStep::Complete {
            data: &[],
            consumed: crlf + 2,
            is_last: true,
        });
    }

    let start = crlf + 2;
    // chunk bytes + trailing \r\n; an adversarial size must not wrap.
    let total = start
        .checked_add(size)
        .and_then(|v| v.checked_add(2))
        .ok_or_else(|| HttpError::BadResponse(format!("chunk size too large: {size_hex:?}")))?;
    if data.len() < total {
        return Ok(ChunkStep::NeedMore);
    }

    Ok(ChunkStep::Complete {
        data: &data[start..start + size],
        consumed: total,
        is_last: false,
    })
}

/// Decode the chunked body accumulated so far. `Ok(None)` means more bytes
/// are needed; `Ok(Some(body))` is the concatenated decoded body, with any
/// trailers after the zero-size chunk discarded.
pub(crate) fn decode_chunked(data: &[u8]) -> Result<Option<Vec<u8>>, HttpError> {
    let mut decoded = Vec::new();
    let mut rest = data;
    loop {
        match decode_chunk(rest)? {
            ChunkStep::NeedMore => return Ok(None),
            ChunkStep::Complete {
                data,
                consumed,
                is_last,
            } => {
                decoded.extend_from_slice(data);
                rest = &rest[consumed..];
                if is_last {
                    return Ok(Some(decoded));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_header_end_found() {
        let data = b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\n\r\nbody";
        assert_eq!(find_header_end(data), Some(34));
    }

    #[test]
    fn find_header_end_not_found() {
        let data = b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\n";
        assert_eq!(find_header_end(data), None);
    }

    #[test]
    fn head_incomplete_until_terminator() {
        let full = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\n";
        for split in 0..full.len() - 1 {
            assert!(
                parse_head(&full[..split]).unwrap().is_none(),
                "head complete at byte {split}"
            );
        }
        assert!(parse_head(full).unwrap().is_some());
    }

    #[test]
    fn content_length_framing() {
        let head = parse_head(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhel")
            .unwrap()
            .unwrap();
        assert_eq!(head.status, 200);
        assert_eq!(head.reason, "OK");
        assert_eq!(head.framing, Framing::ContentLength(5));
        assert_eq!(head.body_start, 38);
        assert_eq!(head.headers, vec![("Content-Length".to_string(), "5".to_string())]);
    }

    #[test]
    fn multiword_reason_preserved() {
        let head = parse_head(b"HTTP/1.1 404 Not Found\r\n\r\n").unwrap().unwrap();
        assert_eq!(head.status, 404);
        assert_eq!(head.reason, "Not Found");
    }

    #[test]
    fn missing_reason_is_empty() {
        let head = parse_head(b"HTTP/1.1 200\r\n\r\n").unwrap().unwrap();
        assert_eq!(head.status, 200);
        assert_eq!(head.reason, "");
    }

    #[test]
    fn chunked_framing() {
        let head = parse_head(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(head.framing, Framing::Chunked);
    }

    #[test]
    fn no_length_means_close_framing() {
        let head = parse_head(b"HTTP/1.1 200 OK\r\nServer: x\r\n\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(head.framing, Framing::Close);
    }

    #[test]
    fn content_length_wins_over_transfer_encoding() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 3\r\nTransfer-Encoding: chunked\r\n\r\n";
        let head = parse_head(raw).unwrap().unwrap();
        assert_eq!(head.framing, Framing::ContentLength(3));
    }

    #[test]
    fn unsupported_encoding_rejected() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: gzip, chunked\r\n\r\n";
        assert!(matches!(
            parse_head(raw),
            Err(HttpError::UnsupportedEncoding(token)) if token == "gzip"
        ));
    }

    #[test]
    fn bad_status_line_rejected() {
        assert!(matches!(
            parse_head(b"ICY 200 OK\r\n\r\n"),
            Err(HttpError::BadResponse(_))
        ));
        assert!(matches!(
            parse_head(b"HTTP/1.1 abc OK\r\n\r\n"),
            Err(HttpError::BadResponse(_))
        ));
    }

    #[test]
    fn malformed_header_line_skipped() {
        let head = parse_head(b"HTTP/1.1 200 OK\r\nno-colon-here\r\nServer: x\r\n\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(head.headers, vec![("Server".to_string(), "x".to_string())]);
    }

    #[test]
    fn bad_content_length_rejected() {
        assert!(matches!(
            parse_head(b"HTTP/1.1 200 OK\r\nContent-Length: many\r\n\r\n"),
            Err(HttpError::BadResponse(_))
        ));
    }

    #[test]
    fn decode_chunked_simple() {
        let body = decode_chunked(b"3\r\nfoo\r\n4\r\nbarz\r\n0\r\n\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(body, b"foobarz");
    }

    #[test]
    fn decode_chunked_ignores_extensions_and_trailers() {
        let body = decode_chunked(b"3;ext=1\r\nfoo\r\n0\r\nTrailer: x\r\n\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(body, b"foo");
    }

    #[test]
    fn decode_chunked_needs_more_on_partial_input() {
        // Complete only once the terminating zero-size chunk line is in.
        let encoded: &[u8] = b"3\r\nfoo\r\n4\r\nbarz\r\n0\r\n\r\n";
        for split in 0..encoded.len() - 2 {
            assert!(
                decode_chunked(&encoded[..split]).unwrap().is_none(),
                "premature completion at byte {split}"
            );
        }
        assert!(decode_chunked(encoded).unwrap().is_some());
    }

    #[test]
    fn decode_chunked_bad_size_rejected() {
        assert!(matches!(
            decode_chunked(b"zz\r\nfoo\r\n"),
            Err(HttpError::BadResponse(_))
        ));
    }

    #[test]
    fn decode_chunked_oversized_chunk_rejected() {
        assert!(matches!(
            decode_chunked(b"ffffffffffffffff\r\nfoo\r\n"),
            Err(HttpError::BadResponse(_))
        ));
    }

    /// Chunk-encode `body` in `chunk_size` pieces the way a server would.
    fn chunk_encode(body: &[u8], chunk_size: usize) -> Vec<u8> {
        let mut out = Vec::new();
        for chunk in body.chunks(chunk_size) {
            out.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
            out.extend_from_slice(chunk);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"0\r\n\r\n");
        out
    }

    #[test]
    fn decode_is_left_inverse_of_encode() {
        let body: Vec<u8> = (0u8..=255).cycle().take(1000).collect();
        for chunk_size in [1, 7, 64, 1000] {
            let encoded = chunk_encode(&body, chunk_size);
            let decoded = decode_chunked(&encoded).unwrap().unwrap();
            assert_eq!(decoded, body, "chunk_size {chunk_size}");
        }
    }
}
