//! Module that contains the replica-to-replica transport capability.
//!
//! The coordinator talks to remote replicas exclusively through the
//! [`ReplicaTransport`] trait. The bundled implementation speaks HTTP+JSON
//! (see [`http`]); [`mock`] provides an in-memory implementation so that
//! multi-node behavior can be tested deterministically without sockets.
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::utils::serde_utf8_bytes;

pub mod http;
pub mod mock;

/// Path of the internal replica PUT endpoint.
pub const REPLICA_PUT_PATH: &str = "/internal/replica/put";
/// Path of the internal replica GET endpoint. The key travels in the `key`
/// query parameter.
pub const REPLICA_GET_PATH: &str = "/internal/replica/get";
/// Path of the internal replica DELETE endpoint.
pub const REPLICA_DELETE_PATH: &str = "/internal/replica/delete";

/// Wire payload of the internal replica PUT endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReplicaPut {
    #[serde(with = "serde_utf8_bytes")]
    pub key: Bytes,
    #[serde(with = "serde_utf8_bytes")]
    pub value: Bytes,
}

/// Wire payload of the internal replica DELETE endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReplicaDelete {
    #[serde(with = "serde_utf8_bytes")]
    pub key: Bytes,
}

/// Capability to run PUT/GET/DELETE against a remote replica addressed by its
/// `host:port` string.
///
/// Implementations must bound every call with a timeout, be safe for
/// concurrent use, and tag errors with the host they refer to so that the
/// coordinator can compose per-replica failure reports. Receivers are
/// idempotent, so callers may retry `put` and `delete` freely.
#[async_trait]
pub trait ReplicaTransport: Send + Sync + std::fmt::Debug {
    /// Stores `key`/`value` on the remote replica.
    async fn put(&self, host: &str, key: Bytes, value: Bytes) -> Result<()>;

    /// Fetches `key` from the remote replica. `Ok(None)` is a definitive
    /// "not present on that replica"; an error means the replica gave no
    /// definitive answer.
    async fn get(&self, host: &str, key: &[u8]) -> Result<Option<Bytes>>;

    /// Removes `key` from the remote replica.
    async fn delete(&self, host: &str, key: Bytes) -> Result<()>;
}
