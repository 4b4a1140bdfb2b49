//! Origin and Request Classification
//!
//! Pure functions deciding whether a request is eligible for
//! interception and which retrieval strategy applies to it. Only GET
//! requests from the agent's own origin, or from an explicitly
//! allow-listed third-party origin, are ever intercepted; everything
//! else passes through untouched.

use alloc::string::String;
use alloc::vec::Vec;

use crate::request::{Destination, Method, Request};

/// Resource category driving strategy selection. Exhaustively matched
/// by the retrieval engine, so adding a category is a compile-time
/// checked change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Top-level document / navigation
    Document,
    /// Script or stylesheet
    ScriptOrStyle,
    /// Image
    Image,
    /// Everything else (API-style calls)
    Other,
}

impl Category {
    /// Map a host-reported destination to a category.
    pub fn from_destination(destination: Destination) -> Self {
        match destination {
            Destination::Document => Self::Document,
            Destination::Script | Destination::Style => Self::ScriptOrStyle,
            Destination::Image => Self::Image,
            Destination::Empty | Destination::Font | Destination::Manifest => Self::Other,
        }
    }
}

/// Which origins the agent will intercept responses for.
#[derive(Debug, Clone)]
pub struct TrustPolicy {
    /// The agent's own origin.
    own_origin: String,
    /// Allow-listed third-party origins, matched exactly and
    /// case-sensitively.
    allowed_origins: Vec<String>,
}

impl TrustPolicy {
    /// Create a policy for the given own origin.
    pub fn new(own_origin: impl Into<String>, allowed_origins: Vec<String>) -> Self {
        Self {
            own_origin: own_origin.into(),
            allowed_origins,
        }
    }

    /// The agent's own origin.
    pub fn own_origin(&self) -> &str {
        &self.own_origin
    }

    /// Whether an origin is trusted for interception.
    pub fn is_trusted(&self, origin: &str) -> bool {
        origin == self.own_origin || self.allowed_origins.iter().any(|o| o == origin)
    }
}

/// Classifier output for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Whether the request's origin is trusted.
    pub trusted: bool,
    /// Resource category.
    pub category: Category,
}

/// Classify a request. Pure; the request is not modified.
pub fn classify(policy: &TrustPolicy, request: &Request) -> Classification {
    Classification {
        trusted: policy.is_trusted(&request.origin),
        category: Category::from_destination(request.destination),
    }
}

/// Whether the agent should intercept this request at all. Untrusted
/// origins and non-GET methods always pass through unmodified.
pub fn should_intercept(policy: &TrustPolicy, request: &Request) -> bool {
    request.method == Method::Get && policy.is_trusted(&request.origin)
}
