//! HTTP/1.1 response value and wire serialization.
//!
//! A [`Response`] is what the host listener writes to the socket. Inside the
//! router, output is accumulated in a [`ResponseWriter`](super::ResponseWriter)
//! and converted once the request has been fully handled.

use bytes::{BufMut, Bytes, BytesMut};

use super::{Headers, StatusCode};

/// An HTTP/1.1 response, ready to be serialized and sent.
///
/// # Examples
///
/// ```
/// use rttp_route::http::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::NotFound).body("404 page not found");
///
/// let bytes = response.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
/// assert!(text.contains("Content-Length: 18\r\n"));
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Bytes,
    keep_alive: bool,
}

impl Response {
    /// Creates a new response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self::from_parts(status, Headers::new(), Bytes::new())
    }

    /// Assembles a response from already-buffered parts.
    pub fn from_parts(status: StatusCode, headers: Headers, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
            keep_alive: true,
        }
    }

    /// Appends a response header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the response body from a string.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Bytes::from(body.into());
        self
    }

    /// Controls whether the `Connection: keep-alive` or `Connection: close` header is written.
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Returns the status code of this response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    /// Body decoded as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Serializes the response into a `BytesMut` buffer using HTTP/1.1 wire format.
    ///
    /// Automatically adds:
    /// - `Content-Type: text/plain; charset=utf-8` if the body is non-empty and no
    ///   `Content-Type` header was set.
    /// - `Connection: keep-alive` or `Connection: close`.
    /// - `Content-Length: <n>` (always written, last).
    pub fn into_bytes(mut self) -> BytesMut {
        let content_length = self.body.len();

        if !self.body.is_empty() && !self.headers.contains("content-type") {
            self.headers
                .set("Content-Type", "text/plain; charset=utf-8");
        }
        self.headers
            .set("Connection", if self.keep_alive { "keep-alive" } else { "close" });
        self.headers.remove("content-length");

        let mut buf = BytesMut::with_capacity(128 + self.headers.len() * 64 + content_length);
        buf.put(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason()
            )
            .as_bytes(),
        );
        buf.put(self.headers.to_string().as_bytes());
        buf.put(format!("Content-Length: {content_length}\r\n\r\n").as_bytes());
        buf.put(self.body);
        buf
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_string(bytes: BytesMut) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn serializes_status_line_and_body() {
        let s = to_string(Response::new(StatusCode::Ok).body("Hello").into_bytes());
        assert!(s.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(s.contains("Content-Length: 5\r\n"));
        assert!(s.ends_with("\r\n\r\nHello"));
    }

    #[test]
    fn explicit_content_type_is_kept() {
        let res = Response::new(StatusCode::Ok)
            .header("Content-Type", "text/html")
            .body("<p>");
        let s = to_string(res.into_bytes());
        assert!(s.contains("Content-Type: text/html\r\n"));
        assert!(!s.contains("text/plain"));
    }

    #[test]
    fn stale_content_length_is_replaced() {
        let res = Response::new(StatusCode::Ok)
            .header("Content-Length", "999")
            .body("ok");
        let s = to_string(res.into_bytes());
        assert!(!s.contains("999"));
        assert!(s.contains("Content-Length: 2\r\n"));
    }

    #[test]
    fn empty_body_has_no_content_type() {
        let s = to_string(Response::new(StatusCode::NoContent).into_bytes());
        assert!(!s.contains("Content-Type"));
        assert!(s.contains("Content-Length: 0\r\n"));
    }

    #[test]
    fn connection_close() {
        let s = to_string(Response::new(StatusCode::Ok).keep_alive(false).into_bytes());
        assert!(s.contains("Connection: close\r\n"));
    }
}
