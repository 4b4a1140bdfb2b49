//! Offline-Resilience Agent
//!
//! This crate implements the agent that sits between a client
//! application and the network: it intercepts outbound resource
//! requests, serves previously-stored responses per category-specific
//! strategy, maintains named versioned cache partitions across an
//! install/activate lifecycle, queues locally-produced payloads for
//! deferred delivery, and turns push signals into notifications.
//!
//! # Architecture
//!
//! - `request`: request/response descriptors
//! - `store`: named, versioned cache partitions (quota + LRU eviction)
//! - `classify`: origin trust + resource category classification
//! - `strategy`: per-category retrieval strategies over a network seam
//! - `lifecycle`: install → installed → activating → active machine
//! - `outbox`: deferred delivery queues (FIFO per queue key)
//! - `notify`: notification template merge + interaction routing
//! - `clients`: open application-instance registry
//! - `channel`: control messages (skip-waiting, version, cache-data)
//! - `prompt`: install-prompt collaborator signals
//! - `agent`: the `OfflineAgent` facade owning all of the above

#![no_std]

extern crate alloc;

pub mod agent;
pub mod channel;
pub mod classify;
pub mod clients;
pub mod lifecycle;
pub mod notify;
pub mod outbox;
pub mod prompt;
pub mod request;
pub mod store;
pub mod strategy;


pub use agent::{AgentConfig, OfflineAgent};
pub use channel::{ChannelError, ControlMessage, ControlReply};
pub use classify::{classify, should_intercept, Category, Classification, TrustPolicy};
pub use clients::{ClientHandle, ClientRegistry};
pub use lifecycle::{
    ActivationReport, AgentState, InstallError, InstallManifest, InvalidTransition,
};
pub use notify::{
    InteractionOutcome, NotificationAction, NotificationDispatcher, NotificationRequest,
};
pub use outbox::{
    DeferredItem, DeliveryEndpoint, DeliveryError, DeliveryQueue, SnapshotError, SyncError,
};
pub use prompt::PromptOutcome;
pub use request::{Destination, Method, Request, Response, ResponseSource};
pub use store::{PartitionName, PartitionStore, StoreError};
pub use strategy::{FetchOutcome, NetworkBackend, NetworkError, RetrievalEngine};
