//! HTTP/1.1 protocol types and parsing.
//!
//! This module provides the core HTTP primitives:
//! [`Method`], [`StatusCode`], [`Headers`], [`Request`], and [`Response`],
//! plus the router-facing [`Values`] parameter map and the [`ResponseWriter`]
//! that tracks whether a response has started.

use std::fmt;

pub mod headers;
pub mod request;
pub mod response;
pub mod values;
pub mod writer;

pub use headers::Headers;
pub use request::Request;
pub use response::Response;
pub use values::Values;
pub use writer::ResponseWriter;

macro_rules! status_codes {
    ($($variant:ident = $code:literal, $reason:literal;)+) => {
        /// An HTTP response status code.
        ///
        /// # Examples
        ///
        /// ```
        /// use rttp_route::http::StatusCode;
        ///
        /// let status = StatusCode::Ok;
        /// assert_eq!(status.as_u16(), 200);
        /// assert_eq!(status.canonical_reason(), "OK");
        /// assert!(status.is_success());
        /// ```
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum StatusCode {
            $($variant = $code,)+
        }

        impl StatusCode {
            /// Returns the canonical reason phrase for this status code.
            pub fn canonical_reason(self) -> &'static str {
                match self {
                    $(Self::$variant => $reason,)+
                }
            }

            /// Looks up a known status code by number.
            pub fn from_u16(code: u16) -> Option<Self> {
                match code {
                    $($code => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

status_codes! {
    Continue = 100, "Continue";
    SwitchingProtocols = 101, "Switching Protocols";

    Ok = 200, "OK";
    Created = 201, "Created";
    Accepted = 202, "Accepted";
    NoContent = 204, "No Content";

    MovedPermanently = 301, "Moved Permanently";
    Found = 302, "Found";
    SeeOther = 303, "See Other";
    NotModified = 304, "Not Modified";
    TemporaryRedirect = 307, "Temporary Redirect";
    PermanentRedirect = 308, "Permanent Redirect";

    BadRequest = 400, "Bad Request";
    Unauthorized = 401, "Unauthorized";
    Forbidden = 403, "Forbidden";
    NotFound = 404, "Not Found";
    MethodNotAllowed = 405, "Method Not Allowed";
    Conflict = 409, "Conflict";
    PayloadTooLarge = 413, "Payload Too Large";
    UnsupportedMediaType = 415, "Unsupported Media Type";
    UnprocessableEntity = 422, "Unprocessable Entity";
    TooManyRequests = 429, "Too Many Requests";

    InternalServerError = 500, "Internal Server Error";
    NotImplemented = 501, "Not Implemented";
    BadGateway = 502, "Bad Gateway";
    ServiceUnavailable = 503, "Service Unavailable";
    GatewayTimeout = 504, "Gateway Timeout";
}

impl StatusCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// `true` for 2xx codes.
    pub fn is_success(self) -> bool {
        (200..300).contains(&self.as_u16())
    }

    /// `true` for 4xx and 5xx codes.
    pub fn is_error(self) -> bool {
        self.as_u16() >= 400
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.canonical_reason())
    }
}

impl From<StatusCode> for u16 {
    fn from(code: StatusCode) -> u16 {
        code.as_u16()
    }
}

/// An HTTP request method.
///
/// The seven verbs a controller can handle, plus `CONNECT` and `TRACE`, are
/// unit variants. Anything else the client sends is kept verbatim in
/// `Custom` so the router can answer it with `405` instead of a parse error.
///
/// ```
/// use rttp_route::http::Method;
///
/// let method: Method = "PATCH".parse().unwrap();
/// assert_eq!(method, Method::Patch);
/// assert_eq!("PURGE".parse::<Method>().unwrap().as_str(), "PURGE");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
    Connect,
    Trace,
    Custom(String),
}

const STANDARD_METHODS: [(Method, &str); 9] = [
    (Method::Get, "GET"),
    (Method::Post, "POST"),
    (Method::Put, "PUT"),
    (Method::Delete, "DELETE"),
    (Method::Head, "HEAD"),
    (Method::Options, "OPTIONS"),
    (Method::Patch, "PATCH"),
    (Method::Connect, "CONNECT"),
    (Method::Trace, "TRACE"),
];

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Custom(s) => s.as_str(),
            standard => STANDARD_METHODS
                .iter()
                .find(|(m, _)| m == standard)
                .map_or("", |(_, name)| *name),
        }
    }

    /// `true` for methods outside the standard set.
    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = std::convert::Infallible;

    /// Method tokens are case-sensitive; `get` is a custom method.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(STANDARD_METHODS
            .iter()
            .find(|(_, name)| *name == s)
            .map_or_else(|| Self::Custom(s.to_owned()), |(m, _)| m.clone()))
    }
}

impl AsRef<str> for Method {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display_has_code_and_reason() {
        assert_eq!(StatusCode::NotFound.to_string(), "404 Not Found");
        assert_eq!(StatusCode::MethodNotAllowed.to_string(), "405 Method Not Allowed");
    }

    #[test]
    fn status_from_u16() {
        assert_eq!(StatusCode::from_u16(503), Some(StatusCode::ServiceUnavailable));
        assert_eq!(StatusCode::from_u16(299), None);
        assert!(StatusCode::NoContent.is_success());
        assert!(StatusCode::Forbidden.is_error());
        assert!(!StatusCode::Found.is_error());
    }

    #[test]
    fn methods_parse_case_sensitively() {
        assert_eq!("DELETE".parse::<Method>().unwrap(), Method::Delete);
        assert_eq!("TRACE".parse::<Method>().unwrap().as_str(), "TRACE");
        let lower = "get".parse::<Method>().unwrap();
        assert!(lower.is_custom());
        assert_eq!(lower.to_string(), "get");
    }
}
