//! Deferred Delivery Queue
//!
//! Durable record of locally-produced payloads awaiting transmission.
//! Items under one queue key are delivered strictly in enqueue order;
//! an item leaves the queue only after the endpoint confirms delivery.
//! A failed delivery aborts that queue's drain and leaves the remainder
//! queued for the next trigger.

use alloc::collections::{BTreeMap, VecDeque};
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};
use serde::{Deserialize, Serialize};

/// One queued payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredItem {
    /// Queue this item belongs to (e.g. `"test-results"`).
    pub queue_key: String,
    /// Opaque payload bytes.
    pub payload: Vec<u8>,
    /// Monotonic enqueue stamp; orders items within a queue.
    pub enqueued_at: u64,
}

/// Delivery failure surfaced by an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The remote endpoint could not be reached.
    Unreachable,
    /// The remote endpoint refused the item.
    Rejected { status: u16 },
}

impl core::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DeliveryError::Unreachable => write!(f, "delivery endpoint unreachable"),
            DeliveryError::Rejected { status } => {
                write!(f, "delivery rejected with status {}", status)
            }
        }
    }
}

/// The remote endpoint deferred items are drained into. Implemented by
/// the host runtime; tests substitute scripted endpoints.
pub trait DeliveryEndpoint {
    /// Attempt delivery of one item. `Ok` confirms the item may be
    /// permanently removed from the queue.
    fn deliver(&self, item: &DeferredItem) -> Result<(), DeliveryError>;
}

/// A drain that stopped early. The failing item and everything behind
/// it remain queued for the next trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncError {
    /// Queue the drain was running for.
    pub queue_key: String,
    /// Items successfully delivered (and removed) before the failure.
    pub delivered: usize,
    /// Items still queued.
    pub remaining: usize,
    /// The failure that stopped the drain.
    pub error: DeliveryError,
}

impl core::fmt::Display for SyncError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "drain of {} stopped after {} item(s), {} remaining: {}",
            self.queue_key, self.delivered, self.remaining, self.error
        )
    }
}

/// Snapshot encode/decode failure.
#[derive(Debug, Clone)]
pub enum SnapshotError {
    Encode(String),
    Decode(String),
}

impl core::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SnapshotError::Encode(e) => write!(f, "snapshot encode failed: {}", e),
            SnapshotError::Decode(e) => write!(f, "snapshot decode failed: {}", e),
        }
    }
}

/// FIFO queues keyed by queue key.
pub struct DeliveryQueue {
    queues: BTreeMap<String, VecDeque<DeferredItem>>,
    next_stamp: AtomicU64,
}

impl DeliveryQueue {
    pub fn new() -> Self {
        Self {
            queues: BTreeMap::new(),
            next_stamp: AtomicU64::new(1),
        }
    }

    /// Append a payload to the named queue.
    pub fn enqueue(&mut self, queue_key: &str, payload: Vec<u8>) {
        let stamp = self.next_stamp.fetch_add(1, Ordering::Relaxed);
        self.queues
            .entry(String::from(queue_key))
            .or_insert_with(VecDeque::new)
            .push_back(DeferredItem {
                queue_key: String::from(queue_key),
                payload,
                enqueued_at: stamp,
            });
    }

    /// Deliver every queued item for one queue key, in enqueue order.
    /// Each item is removed only after confirmed delivery; the first
    /// failure aborts the drain and preserves the rest. Draining an
    /// empty or unknown queue is a no-op.
    pub fn drain(
        &mut self,
        queue_key: &str,
        endpoint: &dyn DeliveryEndpoint,
    ) -> Result<usize, SyncError> {
        let Some(queue) = self.queues.get_mut(queue_key) else {
            return Ok(0);
        };

        let mut delivered = 0;
        while let Some(item) = queue.front() {
            match endpoint.deliver(item) {
                Ok(()) => {
                    queue.pop_front();
                    delivered += 1;
                }
                Err(error) => {
                    let remaining = queue.len();
                    return Err(SyncError {
                        queue_key: queue_key.to_string(),
                        delivered,
                        remaining,
                        error,
                    });
                }
            }
        }
        self.queues.remove(queue_key);
        Ok(delivered)
    }

    /// Number of items waiting under one key.
    pub fn len(&self, queue_key: &str) -> usize {
        self.queues.get(queue_key).map(|q| q.len()).unwrap_or(0)
    }

    /// Whether nothing is queued anywhere.
    pub fn is_empty(&self) -> bool {
        self.queues.values().all(|q| q.is_empty())
    }

    /// All queue keys with waiting items.
    pub fn queue_keys(&self) -> Vec<String> {
        self.queues.keys().cloned().collect()
    }

    /// Items waiting under one key, oldest first.
    pub fn pending(&self, queue_key: &str) -> Vec<&DeferredItem> {
        self.queues
            .get(queue_key)
            .map(|q| q.iter().collect())
            .unwrap_or_default()
    }

    /// Serialize all queues for persistence across agent restarts.
    pub fn snapshot(&self) -> Result<Vec<u8>, SnapshotError> {
        postcard::to_allocvec(&self.queues)
            .map_err(|e| SnapshotError::Encode(e.to_string()))
    }

    /// Rebuild a queue set from a snapshot. The stamp counter resumes
    /// past the newest restored item so ordering stays monotonic.
    pub fn restore(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let queues: BTreeMap<String, VecDeque<DeferredItem>> =
            postcard::from_bytes(bytes).map_err(|e| SnapshotError::Decode(e.to_string()))?;
        let max_stamp = queues
            .values()
            .flat_map(|q| q.iter())
            .map(|i| i.enqueued_at)
            .max()
            .unwrap_or(0);
        Ok(Self {
            queues,
            next_stamp: AtomicU64::new(max_stamp + 1),
        })
    }
}

impl Default for DeliveryQueue {
    fn default() -> Self {
        Self::new()
    }
}
