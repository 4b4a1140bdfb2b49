//! Request and Response Descriptors
//!
//! Plain-data descriptors for the traffic the agent observes. A request
//! is immutable once classified; a response carries a source tag so
//! callers can tell a cache hit from a live network reply.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl Default for Method {
    fn default() -> Self {
        Self::Get
    }
}

impl Method {
    /// Convert to the wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

/// What kind of resource a request is for, as reported by the host runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Unknown or API-style call
    Empty,
    /// Top-level document / navigation
    Document,
    /// Script resource
    Script,
    /// Stylesheet resource
    Style,
    /// Image resource
    Image,
    /// Font resource
    Font,
    /// App manifest
    Manifest,
}

impl Default for Destination {
    fn default() -> Self {
        Self::Empty
    }
}

/// An outbound resource request observed at the interception boundary.
#[derive(Debug, Clone)]
pub struct Request {
    /// Request URL (path or absolute)
    pub url: String,
    /// HTTP method
    pub method: Method,
    /// Resource destination reported by the host
    pub destination: Destination,
    /// Origin the request targets
    pub origin: String,
    /// Accept header, if the host supplied one
    pub accept: Option<String>,
}

impl Request {
    /// Create a GET request for a URL on the given origin.
    pub fn get(url: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::Get,
            destination: Destination::Empty,
            origin: origin.into(),
            accept: None,
        }
    }

    /// Set the method.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Set the destination.
    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    /// Set the accept header.
    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }
}

/// Where a response originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    /// From the network.
    Network,
    /// From a cache partition.
    Cache,
    /// Synthesized by the agent itself.
    Synthesized,
}

/// A response descriptor.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Status text for the code
    pub status_text: String,
    /// Response headers (name → value)
    pub headers: BTreeMap<String, String>,
    /// Response body bytes
    pub body: Vec<u8>,
    /// Where this response came from
    pub source: ResponseSource,
}

impl Response {
    /// Create a new network response with the given status.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            status_text: status_text_for(status).to_string(),
            headers: BTreeMap::new(),
            body: Vec::new(),
            source: ResponseSource::Network,
        }
    }

    /// Set the body.
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Tag the source.
    pub fn with_source(mut self, source: ResponseSource) -> Self {
        self.source = source;
        self
    }

    /// Synthesized service-unavailable response, used when a document
    /// request has no network and no cached fallback.
    pub fn unavailable() -> Self {
        let mut response = Self::new(503);
        response.source = ResponseSource::Synthesized;
        response
            .headers
            .insert("Content-Type".to_string(), "text/plain".to_string());
        response.body = b"offline".to_vec();
        response
    }

    /// Check if the response is a success (2xx).
    pub fn ok(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Whether this response may be written to a partition.
    /// Only exact 200s are stored.
    pub fn cacheable(&self) -> bool {
        self.status == 200
    }
}

/// Get status text for a status code.
fn status_text_for(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown",
    }
}
