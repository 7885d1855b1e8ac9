//! HTTP/1.1 request parsing using the [`httparse`] crate.

use bytes::Bytes;
use percent_encoding::percent_decode_str;
use thiserror::Error;

use super::{Headers, Method, Values};

/// Errors that can occur while parsing an HTTP/1.1 request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete, more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
}

/// Content type whose bodies are decoded into [`Request::form`].
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// A fully parsed HTTP/1.1 request.
///
/// Created by [`Request::parse`] from a raw byte buffer. The body is stored
/// as a [`Bytes`] buffer. Query parameters are decoded eagerly; form bodies are
/// decoded on demand by [`Request::parse_form`].
///
/// # Examples
///
/// ```
/// use rttp_route::http::request::Request;
///
/// let raw = b"GET /hello?name=world HTTP/1.1\r\nHost: localhost\r\n\r\n";
/// let (request, _offset) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.method().as_str(), "GET");
/// assert_eq!(request.path(), "/hello");
/// assert_eq!(request.query_param("name"), Some("world"));
/// assert_eq!(request.headers().get("host"), Some("localhost"));
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    encoded_path: String,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
    query: Option<String>,
    body: Bytes,
    query_values: Values,
    form: Values,
}

impl Request {
    /// Maximum number of headers we support per request.
    const MAX_HEADERS: usize = 64;

    /// Parse a raw HTTP/1.1 request from a byte slice.
    ///
    /// Returns the parsed `Request` and the byte offset at which the body begins
    /// in `buf` (i.e. immediately after the `\r\n\r\n` header terminator).
    ///
    /// # Errors
    ///
    /// [`RequestError::Incomplete`] until the header block is complete,
    /// [`RequestError::Parse`] for malformed input, and
    /// [`RequestError::MissingField`] if httparse left a field unset.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method: Method = match raw_req.method {
            Some(m) => match m.parse() {
                Ok(method) => method,
                Err(never) => match never {},
            },
            None => return Err(RequestError::MissingField { field: "method" }),
        };

        let raw_path = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?;

        let (encoded_path, query) = match raw_path.split_once('?') {
            Some((path, query)) => (path.to_owned(), Some(query.to_owned())),
            None => (raw_path.to_owned(), None),
        };
        let path = percent_decode_str(&encoded_path).decode_utf8_lossy().into_owned();

        let version = raw_req
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let mut header_map = Headers::with_capacity(raw_req.headers.len());
        for header in raw_req.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                header_map.insert(header.name, value);
            }
        }

        let query_values = query.as_deref().map(Values::parse).unwrap_or_default();
        let body = Bytes::copy_from_slice(&buf[body_offset..]);

        Ok((
            Self {
                method,
                path,
                encoded_path,
                version,
                headers: header_map,
                query,
                body,
                query_values,
                form: Values::new(),
            },
            body_offset,
        ))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The percent-decoded path without its query string. Routes match on this.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The path exactly as it appeared on the request line.
    pub fn encoded_path(&self) -> &str {
        &self.encoded_path
    }

    /// Minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the raw query string (without the leading `?`), if any.
    ///
    /// After [`merge_params`](Self::merge_params) this reflects the merged set.
    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Returns the first query parameter value for `key`.
    ///
    /// Captured path parameters are visible here once the router has merged them.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query_values.get(key)
    }

    /// Returns the full decoded query parameter set.
    pub fn query(&self) -> &Values {
        &self.query_values
    }

    /// Returns the decoded form body values (empty until [`parse_form`](Self::parse_form)).
    pub fn form(&self) -> &Values {
        &self.form
    }

    /// Looks `key` up in the form body first, then in the query parameters.
    pub fn form_value(&self, key: &str) -> Option<&str> {
        self.form.get(key).or_else(|| self.query_values.get(key))
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Drops body bytes past `len`, e.g. a pipelined request that followed
    /// this one in the read buffer.
    pub fn truncate_body(&mut self, len: usize) {
        self.body.truncate(len);
    }

    /// Decodes an urlencoded body into [`form`](Self::form).
    ///
    /// Bodies of any other content type, or larger than `max_memory` bytes, are
    /// left undecoded. Returns `true` when a body was decoded.
    pub fn parse_form(&mut self, max_memory: usize) -> bool {
        let is_form = self
            .headers
            .get("content-type")
            .is_some_and(|ct| ct.starts_with(FORM_CONTENT_TYPE));
        if !is_form || self.body.is_empty() {
            return false;
        }
        if self.body.len() > max_memory {
            tracing::debug!(
                size = self.body.len(),
                max_memory,
                "form body exceeds memory threshold, left undecoded"
            );
            return false;
        }
        match std::str::from_utf8(&self.body) {
            Ok(text) => {
                self.form = Values::parse(text);
                true
            }
            Err(_) => false,
        }
    }

    /// Appends captured path parameters to the query parameter set.
    ///
    /// Existing query values keep their position and are never replaced; the raw
    /// query string is re-encoded so both views agree.
    pub fn merge_params(&mut self, params: &Values) {
        if params.is_empty() {
            return;
        }
        self.query_values.extend(params);
        self.query = Some(self.query_values.encode());
    }

    /// Returns `true` if the connection should be kept alive after this request.
    ///
    /// HTTP/1.1 defaults to keep-alive. HTTP/1.0 defaults to close unless
    /// `Connection: keep-alive` is explicitly set.
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(conn) => conn.eq_ignore_ascii_case("keep-alive"),
            None => self.version == 1, // HTTP/1.1 default: keep-alive
        }
    }

    /// Returns the value of the `Content-Length` header parsed as a `usize`, if present.
    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("content-length")?.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(target: &str, extra: &str) -> Request {
        let raw = format!("GET {target} HTTP/1.1\r\nHost: localhost\r\n{extra}\r\n");
        Request::parse(raw.as_bytes()).unwrap().0
    }

    #[test]
    fn splits_path_and_decodes_query() {
        let req = get("/search?q=rust+lang&tag=a&tag=b%2Fc", "");
        assert_eq!(req.path(), "/search");
        assert_eq!(req.query_param("q"), Some("rust lang"));
        assert_eq!(req.query().get_all("tag"), ["a", "b/c"]);
        assert_eq!(req.query_string(), Some("q=rust+lang&tag=a&tag=b%2Fc"));
    }

    #[test]
    fn path_is_percent_decoded_once() {
        let req = get("/u/%E4%B8%AD%20x%2541?q=%20", "");
        assert_eq!(req.path(), "/u/\u{4e2d} x%41");
        assert_eq!(req.encoded_path(), "/u/%E4%B8%AD%20x%2541");
        assert_eq!(req.query_param("q"), Some(" "));
    }

    #[test]
    fn unknown_method_is_kept_as_custom() {
        let (req, _) = Request::parse(b"PURGE /cache HTTP/1.1\r\nHost: a\r\n\r\n").unwrap();
        assert_eq!(req.method(), &Method::Custom("PURGE".into()));
    }

    #[test]
    fn partial_headers_are_incomplete() {
        assert!(matches!(
            Request::parse(b"GET / HTTP/1.1\r\nHost:"),
            Err(RequestError::Incomplete)
        ));
    }

    #[test]
    fn keep_alive_follows_version_and_header() {
        assert!(get("/", "").is_keep_alive());
        assert!(!get("/", "Connection: close\r\n").is_keep_alive());
        let (old, _) = Request::parse(b"GET / HTTP/1.0\r\n\r\n").unwrap();
        assert!(!old.is_keep_alive());
    }

    #[test]
    fn pipelined_bytes_are_truncated_off_the_body() {
        let raw = b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nhelloGET /next HTTP/1.1\r\n\r\n";
        let (mut req, offset) = Request::parse(raw).unwrap();
        assert_eq!(req.content_length(), Some(5));
        assert_eq!(&raw[offset..offset + 5], b"hello");
        req.truncate_body(5);
        assert_eq!(req.body().as_ref(), b"hello");
    }

    #[test]
    fn form_body_decoded_within_threshold() {
        let raw = b"POST /items HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: 14\r\n\r\n_method=delete";
        let (mut req, _) = Request::parse(raw).unwrap();
        assert!(req.parse_form(1024));
        assert_eq!(req.form_value("_method"), Some("delete"));
    }

    #[test]
    fn form_body_over_threshold_is_skipped() {
        let raw = b"POST /items HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: 14\r\n\r\n_method=delete";
        let (mut req, _) = Request::parse(raw).unwrap();
        assert!(!req.parse_form(4));
        assert_eq!(req.form_value("_method"), None);
    }

    #[test]
    fn form_value_falls_back_to_query() {
        let raw = b"POST /items?_method=put HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let (mut req, _) = Request::parse(raw).unwrap();
        assert!(!req.parse_form(1024));
        assert_eq!(req.form_value("_method"), Some("put"));
    }

    #[test]
    fn merge_params_is_additive() {
        let raw = b"GET /users/7?id=q HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let (mut req, _) = Request::parse(raw).unwrap();
        let mut captured = Values::new();
        captured.add("id", "7");
        req.merge_params(&captured);
        assert_eq!(req.query_param("id"), Some("q"));
        assert_eq!(req.query().get_all("id"), ["q", "7"]);
        assert_eq!(req.query_string(), Some("id=q&id=7"));
    }
}
