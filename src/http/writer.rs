//! Response state tracking for the dispatch pipeline.
//!
//! Handlers, filters and error handlers never build a [`Response`] directly;
//! they write into a [`ResponseWriter`]. The writer remembers whether anything
//! has been written (`started`) and the router gates every remaining stage of
//! the request on that flag.

use bytes::{BufMut, BytesMut};

use super::{Headers, Response, StatusCode};

/// Per-request response buffer with a "started" flag.
///
/// The flag flips to `true` on the first call to [`write`](Self::write),
/// [`write_str`](Self::write_str) or [`write_header`](Self::write_header), and
/// never flips back. Header edits alone do not start the response.
///
/// # Examples
///
/// ```
/// use rttp_route::http::{ResponseWriter, StatusCode};
///
/// let mut w = ResponseWriter::new();
/// assert!(!w.started());
///
/// w.headers_mut().set("Content-Type", "text/html");
/// assert!(!w.started());
///
/// w.write_header(StatusCode::Created);
/// assert!(w.started());
/// assert_eq!(w.status(), Some(StatusCode::Created));
/// ```
#[derive(Debug, Default)]
pub struct ResponseWriter {
    headers: Headers,
    body: BytesMut,
    status: Option<StatusCode>,
    started: bool,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any status or body bytes have been written.
    pub fn started(&self) -> bool {
        self.started
    }

    /// The last status written, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Mutable header access. Does not mark the response as started.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Records the response status and marks the response started.
    ///
    /// Later calls overwrite the status; the last one wins.
    pub fn write_header(&mut self, status: StatusCode) {
        self.status = Some(status);
        self.started = true;
    }

    /// Appends raw bytes to the body and marks the response started.
    pub fn write(&mut self, bytes: &[u8]) {
        self.started = true;
        self.body.put_slice(bytes);
    }

    pub fn write_str(&mut self, text: &str) {
        self.write(text.as_bytes());
    }

    /// Body bytes written so far.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Converts the buffered output into a wire [`Response`].
    ///
    /// A response with a body but no explicit status is sent as `200 OK`, the
    /// same implicit status a handler gets by writing the body first.
    pub fn into_response(self) -> Response {
        let status = self.status.unwrap_or(StatusCode::Ok);
        Response::from_parts(status, self.headers, self.body.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_edits_do_not_start() {
        let mut w = ResponseWriter::new();
        w.headers_mut().insert("X-Trace", "1");
        assert!(!w.started());
        assert_eq!(w.status(), None);
    }

    #[test]
    fn body_write_starts_with_implicit_ok() {
        let mut w = ResponseWriter::new();
        w.write_str("hi");
        assert!(w.started());
        assert_eq!(w.status(), None);
        let res = w.into_response();
        assert_eq!(res.status(), StatusCode::Ok);
        assert_eq!(res.body_bytes(), b"hi");
    }

    #[test]
    fn last_status_wins() {
        let mut w = ResponseWriter::new();
        w.write_header(StatusCode::Created);
        w.write_header(StatusCode::Accepted);
        assert_eq!(w.status(), Some(StatusCode::Accepted));
        assert_eq!(w.into_response().status(), StatusCode::Accepted);
    }

    #[test]
    fn headers_carry_into_response() {
        let mut w = ResponseWriter::new();
        w.headers_mut().set("Content-Type", "application/json");
        w.write_str("{}");
        let res = w.into_response();
        assert_eq!(res.headers().get("content-type"), Some("application/json"));
    }
}
