//! Module that contains the coordinator tying the [`Ring`], the local
//! [`StorageEngine`] and the [`ReplicaTransport`] into the single entry point
//! for client-visible operations.
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tracing::{event, Level};

use crate::cluster::ring::{NodeInfo, Ring};
use crate::error::{Error, Result};
use crate::storage_engine::StorageEngine;
use crate::transport::ReplicaTransport;

pub mod rebalance;

/// type alias to the [`StorageEngine`] that makes it clonable and [`Send`]
pub type LocalStore = Arc<dyn StorageEngine + Send + Sync + 'static>;
pub type Transport = Arc<dyn ReplicaTransport + 'static>;

/// The coordinator for client PUT/GET/DELETE requests.
///
/// For every operation the [`Ring`] resolves the ordered replica list of the
/// key; the router applies the operation locally when this node is one of the
/// replicas and over the [`ReplicaTransport`] for every remote one. The router
/// holds no mutable state of its own and is safe to share between concurrent
/// requests.
///
/// Writes are best-effort W = N: every replica is attempted even when earlier
/// ones fail, per-replica errors are accumulated and reported as one composite
/// [`Error::ReplicationPartial`] after the fan-out. Reads return the first
/// answer in ring order. There is no quorum and no read repair; callers must
/// tolerate divergence between replicas.
pub struct Router {
    node_id: String,
    ring: Arc<Ring>,
    local: LocalStore,
    transport: Transport,
    replication_factor: usize,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("node_id", &self.node_id)
            .field("ring", &self.ring)
            .field("replication_factor", &self.replication_factor)
            .finish()
    }
}

impl Router {
    /// Returns a new [`Router`]. A replication factor below 1 is clamped to 1.
    pub fn new(
        node_id: impl Into<String>,
        ring: Arc<Ring>,
        local: LocalStore,
        transport: Transport,
        replication_factor: usize,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            ring,
            local,
            transport,
            replication_factor: replication_factor.max(1),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// A replica is local when and only when its id equals this node's id.
    /// The host string is never compared: two ids may legitimately map to the
    /// same host.
    fn is_local(&self, replica: &NodeInfo) -> bool {
        replica.id == self.node_id
    }

    /// Stores `key`/`value` on every replica the ring selects for `key`.
    pub async fn put(&self, key: Bytes, value: Bytes) -> Result<()> {
        let replicas = self.ring.replicas_for_key(&key, self.replication_factor)?;
        if replicas.is_empty() {
            return Err(Error::NoReplicas);
        }

        event!(
            Level::DEBUG,
            "PUT fan-out for key {:?} to {} replicas",
            key,
            replicas.len()
        );

        let mut futures = FuturesUnordered::new();
        for replica in replicas {
            futures.push(self.put_replica(replica, key.clone(), value.clone()));
        }

        let mut failures = Vec::new();
        while let Some(res) = futures.next().await {
            if let Err(err) = res {
                event!(Level::WARN, "Failed a replica PUT: {:?}", err);
                failures.push(err);
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::ReplicationPartial {
                operation: "Put".to_string(),
                errors: failures,
            })
        }
    }

    async fn put_replica(&self, replica: NodeInfo, key: Bytes, value: Bytes) -> Result<()> {
        if self.is_local(&replica) {
            event!(Level::DEBUG, "Storing key {:?} locally", key);
            self.local.put(key, value).await?;
            Ok(())
        } else {
            event!(
                Level::DEBUG,
                "Storing key {:?} on remote replica {}",
                key,
                replica.host
            );
            self.transport.put(&replica.host, key, value).await
        }
    }

    /// Retrieves the value for `key` from the first replica in ring order that
    /// answers. A replica that definitively reports the key as absent, or that
    /// fails, is skipped and the walk continues with the next one. When the
    /// walk exhausts the list the key is reported as [`Error::NotFound`], even
    /// if every replica merely failed.
    pub async fn get(&self, key: Bytes) -> Result<Bytes> {
        let replicas = self.ring.replicas_for_key(&key, self.replication_factor)?;
        if replicas.is_empty() {
            return Err(Error::NoReplicas);
        }

        for replica in replicas {
            if self.is_local(&replica) {
                if let Some(value) = self.local.get(&key).await? {
                    return Ok(value);
                }
                continue;
            }

            match self.transport.get(&replica.host, &key).await {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => continue,
                Err(err) => {
                    event!(
                        Level::WARN,
                        "Failed a replica GET, trying next replica: {:?}",
                        err
                    );
                    continue;
                }
            }
        }

        Err(Error::NotFound { key })
    }

    /// Removes `key` from every replica the ring selects for it. Symmetric to
    /// [`Router::put`]: all replicas are attempted, failures are accumulated.
    pub async fn delete(&self, key: Bytes) -> Result<()> {
        let replicas = self.ring.replicas_for_key(&key, self.replication_factor)?;
        if replicas.is_empty() {
            return Err(Error::NoReplicas);
        }

        let mut futures = FuturesUnordered::new();
        for replica in replicas {
            futures.push(self.delete_replica(replica, key.clone()));
        }

        let mut failures = Vec::new();
        while let Some(res) = futures.next().await {
            if let Err(err) = res {
                event!(Level::WARN, "Failed a replica DELETE: {:?}", err);
                failures.push(err);
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::ReplicationPartial {
                operation: "Delete".to_string(),
                errors: failures,
            })
        }
    }

    async fn delete_replica(&self, replica: NodeInfo, key: Bytes) -> Result<()> {
        if self.is_local(&replica) {
            self.local.delete(&key).await?;
            Ok(())
        } else {
            self.transport.delete(&replica.host, key).await
        }
    }
}
