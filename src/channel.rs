//! Control Channel
//!
//! Message-driven command interface between the hosting application and
//! the agent. Each message maps to exactly one action; replies, where a
//! message has one, go back on the caller's reply channel.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

/// Partition key the `CacheData` payload is stored under.
pub const CACHE_DATA_KEY: &str = "/__control/cache-data";

/// Inbound control messages. The JSON wire form is tagged by `type`,
/// e.g. `{"type":"GET_VERSION"}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    /// Force the waiting agent through activation immediately.
    #[serde(rename = "SKIP_WAITING")]
    SkipWaiting,
    /// Ask for the current static partition version.
    #[serde(rename = "GET_VERSION")]
    GetVersion,
    /// Write a payload directly into the runtime partition under
    /// [`CACHE_DATA_KEY`], overwriting any prior value.
    #[serde(rename = "CACHE_DATA")]
    CacheData { payload: serde_json::Value },
}

impl ControlMessage {
    /// Parse a message from its JSON wire form.
    pub fn parse(bytes: &[u8]) -> Result<Self, ChannelError> {
        serde_json::from_slice(bytes).map_err(|e| ChannelError::Parse(e.to_string()))
    }
}

/// Replies sent back over the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ControlReply {
    /// Reply to `GetVersion`: the static partition's version identifier.
    Version { version: String },
}

/// Control channel failures. `CacheData` storage failures are reported
/// here but never escalate beyond the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The message bytes did not parse.
    Parse(String),
    /// The `CacheData` write failed.
    CacheWrite(String),
}

impl core::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ChannelError::Parse(e) => write!(f, "control message did not parse: {}", e),
            ChannelError::CacheWrite(e) => write!(f, "cache-data write failed: {}", e),
        }
    }
}

/// Serialize a `CacheData` payload to the bytes stored in the partition.
pub fn payload_bytes(payload: &serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(payload).unwrap_or_default()
}
