//! Retrieval Strategy Engine
//!
//! Routes every intercepted request through a category-specific
//! strategy: documents and static assets are cache-first, API-style
//! calls are network-first with a cached fallback. Cache writes on the
//! response path are best-effort; a failed write is logged and never
//! blocks the response.
//!
//! The network boundary is the `NetworkBackend` trait. The engine
//! imposes no timeout of its own; a backend timeout surfaces as an
//! ordinary `NetworkError` and takes the same fallback path as any
//! other network failure.

use alloc::string::String;
use spin::RwLock;

use crate::classify::{classify, should_intercept, Category, TrustPolicy};
use crate::request::{Method, Request, Response};
use crate::store::{PartitionStore, StoreError};

// ── Network seam ────────────────────────────────────────────

/// Network failure surfaced by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// The endpoint could not be reached.
    Unreachable,
    /// The underlying call timed out.
    Timeout,
}

impl core::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            NetworkError::Unreachable => write!(f, "network unreachable"),
            NetworkError::Timeout => write!(f, "network timeout"),
        }
    }
}

/// The agent's view of the network. Implemented by the host runtime;
/// tests substitute scripted backends.
pub trait NetworkBackend {
    /// Perform the request, returning the remote response or a failure.
    fn fetch(&self, request: &Request) -> Result<Response, NetworkError>;
}

// ── Outcome ─────────────────────────────────────────────────

/// Result of routing one request through the engine.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// The agent supplies this response.
    Response(Response),
    /// Not intercepted; the caller proceeds with a normal network fetch.
    Passthrough,
    /// No strategy fallback exists for this category; the failure is the
    /// terminal answer for the original caller.
    Failed(NetworkError),
}

// ── Engine ──────────────────────────────────────────────────

/// Category-dispatching retrieval engine.
pub struct RetrievalEngine {
    policy: TrustPolicy,
    /// Full name of the static (install-time) partition.
    static_partition: String,
    /// Full name of the runtime (request-time) partition.
    runtime_partition: String,
    /// Key of the cached document served when a document request has no
    /// network and no direct cache hit.
    fallback_key: String,
}

impl RetrievalEngine {
    /// Create an engine over the given partitions.
    pub fn new(
        policy: TrustPolicy,
        static_partition: impl Into<String>,
        runtime_partition: impl Into<String>,
        fallback_key: impl Into<String>,
    ) -> Self {
        Self {
            policy,
            static_partition: static_partition.into(),
            runtime_partition: runtime_partition.into(),
            fallback_key: fallback_key.into(),
        }
    }

    /// Route one intercepted request.
    pub fn retrieve(
        &self,
        store: &RwLock<PartitionStore>,
        request: &Request,
        net: &dyn NetworkBackend,
    ) -> FetchOutcome {
        if !should_intercept(&self.policy, request) {
            return FetchOutcome::Passthrough;
        }

        match classify(&self.policy, request).category {
            Category::Document => self.cache_first_document(store, request, net),
            Category::ScriptOrStyle => {
                self.cache_first(store, request, net, &self.static_partition, true)
            }
            Category::Image => {
                self.cache_first(store, request, net, &self.runtime_partition, false)
            }
            Category::Other => self.network_first(store, request, net),
        }
    }

    /// Cache-first for documents: miss goes to network, a total failure
    /// degrades to the cached fallback shell or a synthesized 503.
    fn cache_first_document(
        &self,
        store: &RwLock<PartitionStore>,
        request: &Request,
        net: &dyn NetworkBackend,
    ) -> FetchOutcome {
        {
            let guard = store.read();
            if let Some(hit) = guard.match_key(&request.url, &self.static_partition) {
                return FetchOutcome::Response(hit);
            }
        }

        match net.fetch(request) {
            Ok(response) => {
                if response.cacheable() {
                    best_effort_put(store, &self.static_partition, &request.url, &response);
                }
                FetchOutcome::Response(response)
            }
            Err(error) => {
                let guard = store.read();
                if let Some(shell) = guard.match_key(&self.fallback_key, &self.static_partition) {
                    return FetchOutcome::Response(shell);
                }
                drop(guard);
                log::debug!(
                    "document {} unreachable ({}), no cached shell; synthesizing 503",
                    request.url,
                    error
                );
                FetchOutcome::Response(Response::unavailable())
            }
        }
    }

    /// Cache-first for assets. `match_all` widens the lookup across every
    /// partition; images stay confined to their own partition so they can
    /// be pruned independently. No fallback on total failure.
    fn cache_first(
        &self,
        store: &RwLock<PartitionStore>,
        request: &Request,
        net: &dyn NetworkBackend,
        partition: &str,
        match_all: bool,
    ) -> FetchOutcome {
        {
            let guard = store.read();
            let hit = if match_all {
                guard.match_key(&request.url, partition)
            } else {
                guard.get(partition, &request.url)
            };
            if let Some(hit) = hit {
                return FetchOutcome::Response(hit);
            }
        }

        match net.fetch(request) {
            Ok(response) => {
                if response.cacheable() {
                    best_effort_put(store, partition, &request.url, &response);
                }
                FetchOutcome::Response(response)
            }
            Err(error) => FetchOutcome::Failed(error),
        }
    }

    /// Network-first for API-style calls. A success is stored into the
    /// runtime partition; a failure (or non-200) falls back to any cached
    /// copy before propagating.
    fn network_first(
        &self,
        store: &RwLock<PartitionStore>,
        request: &Request,
        net: &dyn NetworkBackend,
    ) -> FetchOutcome {
        match net.fetch(request) {
            Ok(response) if response.cacheable() => {
                if request.method == Method::Get {
                    best_effort_put(store, &self.runtime_partition, &request.url, &response);
                }
                FetchOutcome::Response(response)
            }
            Ok(response) => {
                let guard = store.read();
                if let Some(hit) = guard.match_key(&request.url, &self.runtime_partition) {
                    return FetchOutcome::Response(hit);
                }
                drop(guard);
                // Nothing cached: the remote error is the terminal answer.
                FetchOutcome::Response(response)
            }
            Err(error) => {
                let guard = store.read();
                if let Some(hit) = guard.match_key(&request.url, &self.runtime_partition) {
                    return FetchOutcome::Response(hit);
                }
                drop(guard);
                FetchOutcome::Failed(error)
            }
        }
    }
}

/// Write a response copy into a partition, logging instead of failing.
/// The write completes before the response is returned to the caller,
/// but a `StoreError` never suppresses the response itself.
fn best_effort_put(store: &RwLock<PartitionStore>, partition: &str, key: &str, response: &Response) {
    let result: Result<(), StoreError> = store.write().put(partition, key, response);
    if let Err(error) = result {
        log::warn!("cache write for {} into {} failed: {}", key, partition, error);
    }
}

// ── Tests ───────────────────────────────────────────────────
