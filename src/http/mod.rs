//! HTTP/1.1 protocol types and parsing.
//!
//! This module provides the primitives the to-do server speaks:
//! [`Method`], [`StatusCode`], [`Headers`], [`Request`], [`FormData`] and [`Response`].

use std::fmt;

pub mod form;
pub mod headers;
pub mod request;
pub mod response;

pub use form::FormData;
pub use headers::Headers;
pub use request::Request;
pub use response::Response;

/// An HTTP response status code.
///
/// Only the codes the server actually emits are modelled.
///
/// # Examples
///
/// ```
/// use todoq::http::StatusCode;
///
/// let status = StatusCode::Found;
/// assert_eq!(status.as_u16(), 302);
/// assert_eq!(status.canonical_reason(), "Found");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum StatusCode {
    // 2xx Success
    Ok = 200,

    // 3xx Redirection
    Found = 302,

    // 4xx Client Error
    BadRequest = 400,
    NotFound = 404,
    PayloadTooLarge = 413,

    // 5xx Server Error
    InternalServerError = 500,
    ServiceUnavailable = 503,
}

impl StatusCode {
    /// Returns the numeric status code as a `u16`.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the canonical reason phrase for this status code.
    pub fn canonical_reason(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Found => "Found",
            Self::BadRequest => "Bad Request",
            Self::NotFound => "Not Found",
            Self::PayloadTooLarge => "Payload Too Large",
            Self::InternalServerError => "Internal Server Error",
            Self::ServiceUnavailable => "Service Unavailable",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.canonical_reason())
    }
}

/// An HTTP request method.
///
/// Browser forms only ever send `GET` and `POST`; anything else is kept
/// verbatim in [`Method::Other`] so routing can reject it.
///
/// # Examples
///
/// ```
/// use todoq::http::Method;
///
/// let method: Method = "POST".parse().unwrap();
/// assert_eq!(method, Method::Post);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    /// Any other method token.
    Other(String),
}

impl Method {
    /// Returns the method as a string slice.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Other(s) => s.as_str(),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "GET" => Self::Get,
            "POST" => Self::Post,
            other => Self::Other(other.to_owned()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_method_is_preserved() {
        assert!(matches!("HEAD".parse::<Method>(), Ok(Method::Other(m)) if m == "HEAD"));
        let method: Method = "DELETE".parse().unwrap();
        assert_eq!(method, Method::Other("DELETE".to_owned()));
        assert_eq!(method.as_str(), "DELETE");
    }

    #[test]
    fn status_display() {
        assert_eq!(StatusCode::Found.as_u16(), 302);
        assert_eq!(StatusCode::NotFound.to_string(), "404 Not Found");
        assert_eq!(StatusCode::PayloadTooLarge.to_string(), "413 Payload Too Large");
    }
}
