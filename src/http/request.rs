//! HTTP/1.1 request parsing using the [`httparse`] crate.

use bytes::Bytes;
use thiserror::Error;

use super::{FormData, Headers, Method};

/// Largest request body accepted, in bytes. Form posts are tiny.
pub const MAX_BODY_SIZE: usize = 1024 * 1024;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Errors that can occur while parsing an HTTP/1.1 request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete, more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("request body exceeds maximum allowed size of {max_bytes} bytes")]
    BodyTooLarge { max_bytes: usize },

    #[error("invalid Content-Length: {0}")]
    InvalidContentLength(String),
}

/// A parsed HTTP/1.1 request.
///
/// # Examples
///
/// ```
/// use todoq::http::request::Request;
///
/// let raw = b"POST /create/?next=%2F HTTP/1.1\r\n\
///             Content-Type: application/x-www-form-urlencoded\r\n\
///             Content-Length: 13\r\n\r\ntitle=Buy+tea";
/// let (request, _offset) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.path(), "/create/");
/// assert_eq!(request.query_param("next"), Some("/"));
/// assert_eq!(request.form().get("title"), Some("Buy tea"));
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
    query: FormData,
    content_length: Option<usize>,
    body: Bytes,
}

impl Request {
    /// Maximum number of headers we support per request.
    const MAX_HEADERS: usize = 64;

    /// Parses the head of a request from `buf`.
    ///
    /// Returns the request and the offset at which its body begins. The body
    /// holds whatever part of the declared `Content-Length` is already in
    /// `buf`; callers wait until `buf.len() >= offset + content_length()`
    /// before dispatching.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`]: the header block has not fully arrived.
    /// - [`RequestError::Parse`]: the data is malformed.
    /// - [`RequestError::MissingField`]: method, path or version is absent.
    /// - [`RequestError::BodyTooLarge`]: the declared body exceeds [`MAX_BODY_SIZE`].
    /// - [`RequestError::InvalidContentLength`]: a `Content-Length` is not a
    ///   plain decimal number, or several disagree.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method: Method = match raw_req.method {
            Some(token) => match token.parse() {
                Ok(method) => method,
                Err(never) => match never {},
            },
            None => return Err(RequestError::MissingField { field: "method" }),
        };

        let raw_path = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?;

        let (path, query) = match raw_path.split_once('?') {
            Some((path, query)) => (path.to_owned(), FormData::parse(query.as_bytes())),
            None => (raw_path.to_owned(), FormData::new()),
        };

        let version = raw_req
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let content_length = declared_length(&*raw_req.headers)?;

        let mut header_map = Headers::with_capacity(raw_req.headers.len());
        for header in raw_req.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                header_map.insert(header.name, value);
            }
        }

        let mut request = Self {
            method,
            path,
            version,
            headers: header_map,
            query,
            content_length,
            body: Bytes::new(),
        };

        let declared = content_length.unwrap_or(0);
        if declared > MAX_BODY_SIZE {
            return Err(RequestError::BodyTooLarge {
                max_bytes: MAX_BODY_SIZE,
            });
        }
        let available = buf.len().saturating_sub(body_offset).min(declared);
        request.body = Bytes::copy_from_slice(&buf[body_offset..body_offset + available]);

        Ok((request, body_offset))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request path, without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the HTTP minor version number (0 = HTTP/1.0, 1 = HTTP/1.1).
    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns a decoded query parameter by key.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.get(key)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Decodes the body as submitted form fields.
    ///
    /// Bodies with a `Content-Type` other than urlencoded form data yield an
    /// empty map, so every field reads as absent.
    pub fn form(&self) -> FormData {
        let is_form = self.headers.get("content-type").is_none_or(|value| {
            value
                .split(';')
                .next()
                .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
        });
        if is_form {
            FormData::parse(&self.body)
        } else {
            FormData::new()
        }
    }

    /// Returns `true` if the connection should be kept alive after this request.
    ///
    /// HTTP/1.1 defaults to keep-alive. HTTP/1.0 defaults to close unless
    /// `Connection: keep-alive` is explicitly set.
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(conn) => conn.eq_ignore_ascii_case("keep-alive"),
            None => self.version == 1,
        }
    }

    /// Returns the declared body length, if a `Content-Length` was sent.
    pub fn content_length(&self) -> Option<usize> {
        self.content_length
    }
}

// Every Content-Length header must be plain digits, and repeats must agree.
fn declared_length(headers: &[httparse::Header<'_>]) -> Result<Option<usize>, RequestError> {
    let mut declared = None;
    for header in headers
        .iter()
        .filter(|header| header.name.eq_ignore_ascii_case("content-length"))
    {
        let raw = String::from_utf8_lossy(header.value);
        let value = raw.trim();
        let length = value
            .bytes()
            .all(|b| b.is_ascii_digit())
            .then(|| value.parse::<usize>().ok())
            .flatten()
            .ok_or_else(|| RequestError::InvalidContentLength(format!("{value:?}")))?;

        match declared {
            Some(previous) if previous != length => {
                return Err(RequestError::InvalidContentLength(format!(
                    "conflicting values {previous} and {length}"
                )));
            }
            _ => declared = Some(length),
        }
    }
    Ok(declared)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let (req, offset) = Request::parse(raw).unwrap();
        assert_eq!(req.method(), &Method::Get);
        assert_eq!(req.path(), "/");
        assert_eq!(req.version(), 1);
        assert_eq!(req.headers().get("host"), Some("localhost"));
        assert_eq!(offset, raw.len());
        assert!(req.body().is_empty());
    }

    #[test]
    fn query_is_decoded() {
        let raw = b"GET /search?q=rust+lang&page=2 HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert_eq!(req.path(), "/search");
        assert_eq!(req.query_param("q"), Some("rust lang"));
        assert_eq!(req.query_param("page"), Some("2"));
    }

    #[test]
    fn incomplete_request() {
        let raw = b"GET / HTTP/1.1\r\nHost:";
        assert!(matches!(Request::parse(raw), Err(RequestError::Incomplete)));
    }

    #[test]
    fn keep_alive_defaults() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
        assert!(Request::parse(raw).unwrap().0.is_keep_alive());

        let raw = b"GET / HTTP/1.0\r\nHost: localhost\r\n\r\n";
        assert!(!Request::parse(raw).unwrap().0.is_keep_alive());

        let raw = b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n";
        assert!(!Request::parse(raw).unwrap().0.is_keep_alive());
    }

    #[test]
    fn body_stops_at_content_length() {
        let raw = b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nhelloGET / HTTP/1.1\r\n\r\n";
        let (req, body_offset) = Request::parse(raw).unwrap();
        assert_eq!(req.content_length(), Some(5));
        assert_eq!(req.body().as_ref(), b"hello");
        assert_eq!(&raw[body_offset..body_offset + 5], b"hello");
    }

    #[test]
    fn partial_body_is_truncated_to_what_arrived() {
        let raw = b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc";
        let (req, _) = Request::parse(raw).unwrap();
        assert_eq!(req.body().as_ref(), b"abc");
    }

    #[test]
    fn oversized_body_is_rejected() {
        let raw = format!(
            "POST / HTTP/1.1\r\nContent-Length: {}\r\n\r\n",
            MAX_BODY_SIZE + 1
        );
        assert!(matches!(
            Request::parse(raw.as_bytes()),
            Err(RequestError::BodyTooLarge { .. })
        ));
    }

    #[test]
    fn form_requires_urlencoded_content_type() {
        let raw = b"POST / HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: 7\r\n\r\ntitle=x";
        let (req, _) = Request::parse(raw).unwrap();
        assert!(req.form().is_empty());

        let raw = b"POST / HTTP/1.1\r\nContent-Type: application/x-www-form-urlencoded; charset=UTF-8\r\nContent-Length: 7\r\n\r\ntitle=x";
        let (req, _) = Request::parse(raw).unwrap();
        assert_eq!(req.form().get("title"), Some("x"));
    }

    #[test]
    fn malformed_content_length_is_rejected() {
        for value in ["7x", "", "-1", "+7", "7, 7", "99999999999999999999999"] {
            let raw = format!(
                "POST /create/ HTTP/1.1\r\nContent-Length: {value}\r\n\r\ntitle=a"
            );
            assert!(
                matches!(
                    Request::parse(raw.as_bytes()),
                    Err(RequestError::InvalidContentLength(_))
                ),
                "{value:?}"
            );
        }
    }

    #[test]
    fn conflicting_content_lengths_are_rejected() {
        let raw = b"POST /create/ HTTP/1.1\r\nContent-Length: 7\r\nContent-Length: 0\r\n\r\ntitle=a";
        assert!(matches!(
            Request::parse(raw),
            Err(RequestError::InvalidContentLength(_))
        ));
    }

    #[test]
    fn repeated_equal_content_lengths_are_accepted() {
        let raw = b"POST /create/ HTTP/1.1\r\nContent-Length: 7\r\ncontent-length: 7\r\n\r\ntitle=a";
        let (req, _) = Request::parse(raw).unwrap();
        assert_eq!(req.content_length(), Some(7));
        assert_eq!(req.body().as_ref(), b"title=a");
    }
}
