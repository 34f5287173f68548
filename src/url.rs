//! URL splitting for request dispatch.

use crate::error::HttpError;

/// Components of a parsed `http://` or `https://` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUrl {
    /// True iff the scheme was `https://`.
    pub https: bool,
    /// Host name or address, without port.
    pub host: String,
    /// Explicit port, or the scheme default (80/443).
    pub port: u16,
    /// Path from the first `/` onward; `/` when the URL has no path.
    pub resource: String,
}

impl ParsedUrl {
    /// Split a raw URL into scheme flag, host, port, and resource path.
    ///
    /// The scheme must be `http://` or `https://`; anything else is rejected
    /// rather than defaulted. All components are owned so the result outlives
    /// the input.
    pub fn parse(url: &str) -> Result<Self, HttpError> {
        let (rest, https) = if let Some(rest) = url.strip_prefix("https://") {
            (rest, true)
        } else if let Some(rest) = url.strip_prefix("http://") {
            (rest, false)
        } else {
            return Err(HttpError::MalformedUrl(format!(
                "unrecognized scheme in {url:?}"
            )));
        };

        let (authority, resource) = match rest.find('/') {
            Some(slash) => (&rest[..slash], rest[slash..].to_string()),
            None => (rest, "/".to_string()),
        };

        let (host, port) = match authority.split_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| HttpError::MalformedUrl(format!("bad port in {url:?}")))?;
                (host, port)
            }
            None => (authority, if https { 443 } else { 80 }),
        };

        if host.is_empty() {
            return Err(HttpError::MalformedUrl(format!("empty host in {url:?}")));
        }

        Ok(ParsedUrl {
            https,
            host: host.to_string(),
            port,
            resource,
        })
    }

    /// Value for the mandatory `host` request header.
    pub(crate) fn host_header(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_host_with_path() {
        let url = ParsedUrl::parse("http://h/").unwrap();
        assert!(!url.https);
        assert_eq!(url.host, "h");
        assert_eq!(url.port, 80);
        assert_eq!(url.resource, "/");
    }

    #[test]
    fn https_with_port_and_no_path() {
        let url = ParsedUrl::parse("https://h:8443").unwrap();
        assert!(url.https);
        assert_eq!(url.host, "h");
        assert_eq!(url.port, 8443);
        assert_eq!(url.resource, "/");
    }

    #[test]
    fn https_default_port() {
        let url = ParsedUrl::parse("https://example.com/a/b?q=1").unwrap();
        assert_eq!(url.port, 443);
        assert_eq!(url.host, "example.com");
        assert_eq!(url.resource, "/a/b?q=1");
    }

    #[test]
    fn port_stops_at_slash() {
        let url = ParsedUrl::parse("http://h:8080/x:y").unwrap();
        assert_eq!(url.port, 8080);
        assert_eq!(url.resource, "/x:y");
    }

    #[test]
    fn missing_scheme_rejected() {
        assert!(matches!(
            ParsedUrl::parse("example.com/path"),
            Err(HttpError::MalformedUrl(_))
        ));
        assert!(matches!(
            ParsedUrl::parse("ftp://example.com/"),
            Err(HttpError::MalformedUrl(_))
        ));
    }

    #[test]
    fn bad_port_rejected() {
        assert!(matches!(
            ParsedUrl::parse("http://h:abc/"),
            Err(HttpError::MalformedUrl(_))
        ));
        assert!(matches!(
            ParsedUrl::parse("http://h:/"),
            Err(HttpError::MalformedUrl(_))
        ));
    }

    #[test]
    fn empty_host_rejected() {
        assert!(matches!(
            ParsedUrl::parse("http:///path"),
            Err(HttpError::MalformedUrl(_))
        ));
    }

    #[test]
    fn host_header_includes_port() {
        let url = ParsedUrl::parse("http://h/").unwrap();
        assert_eq!(url.host_header(), "h:80");
    }
}
