//! Relocation of locally held keys after a ring change.
//!
//! When the ring a node boots with differs from the one its keys were written
//! under, some local keys no longer include this node in their replica set.
//! The rebalancer walks the local key snapshot and pushes every such key
//! through the normal replication path to its current owners, deleting the
//! local copy only once the push fully succeeded. A key whose relocation
//! failed stays local - over-retention is preferred to data loss - and a later
//! re-run picks it up again. Re-running against a stable ring is a no-op.
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{event, Level};

use super::Router;
use crate::error::{Error, Result};

/// Counters reported after a completed rebalance scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RebalanceReport {
    /// keys relocated to their new owners and removed locally
    pub moved: usize,
    /// keys this node still legitimately holds
    pub kept: usize,
}

pub struct Rebalancer {
    router: Arc<Router>,
}

impl Rebalancer {
    pub fn new(router: Arc<Router>) -> Self {
        Self { router }
    }

    /// Runs one full scan over the local keys. The optional `deadline` is
    /// checked between keys; once it has passed the scan aborts with
    /// [`Error::Cancelled`], leaving already-moved keys moved and the rest
    /// untouched.
    pub async fn run(&self, deadline: Option<Instant>) -> Result<RebalanceReport> {
        event!(
            Level::INFO,
            "Starting rebalance on node {}",
            self.router.node_id
        );

        let keys = self.router.local.keys().await?;
        let mut report = RebalanceReport::default();

        for key in keys {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    event!(
                        Level::WARN,
                        "Rebalance cancelled, moved={} kept={}",
                        report.moved,
                        report.kept
                    );
                    return Err(Error::Cancelled);
                }
            }

            // the snapshot is not atomic: the key may be gone by now
            let Some(value) = self.router.local.get(&key).await? else {
                continue;
            };

            let replicas = self
                .router
                .ring
                .replicas_for_key(&key, self.router.replication_factor)?;
            if replicas.is_empty() {
                report.kept += 1;
                continue;
            }

            if replicas.iter().any(|r| r.id == self.router.node_id) {
                // still a legitimate holder
                report.kept += 1;
                continue;
            }

            // push the key to its current owners through the normal
            // replication path
            if let Err(err) = self.router.put(key.clone(), value).await {
                // not known to be safe on any replica: the local copy stays
                event!(
                    Level::WARN,
                    "Failed to relocate key {:?}, keeping local copy: {:?}",
                    key,
                    err
                );
                continue;
            }

            self.router.local.delete(&key).await?;
            report.moved += 1;
        }

        event!(
            Level::INFO,
            "Rebalance finished on node {}: moved={} kept={}",
            self.router.node_id,
            report.moved,
            report.kept
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use bytes::Bytes;

    use super::Rebalancer;
    use crate::cluster::ring::{NodeInfo, Ring, DEFAULT_VIRTUAL_NODES};
    use crate::router::Router;
    use crate::storage_engine::{in_memory::InMemory, StorageEngine};
    use crate::test_utils::fault::Fault;
    use crate::transport::mock::MockReplicaTransport;

    const SELF_ID: &str = "n1";

    fn grown_cluster() -> Vec<NodeInfo> {
        vec![
            NodeInfo::new("n1", "127.0.0.1:8081"),
            NodeInfo::new("n2", "127.0.0.1:8082"),
            NodeInfo::new("n3", "127.0.0.1:8083"),
        ]
    }

    /// Simulates a node that wrote `n_keys` while it was alone in the ring and
    /// then learned about two peers.
    async fn initialize_rebalancer(
        n_keys: usize,
        replication_factor: usize,
    ) -> (Rebalancer, Arc<Router>, Arc<InMemory>, Arc<MockReplicaTransport>) {
        let local = Arc::new(InMemory::default());
        for i in 0..n_keys {
            local
                .put(
                    Bytes::from(format!("key-{}", i)),
                    Bytes::from(format!("value-{}", i)),
                )
                .await
                .unwrap();
        }

        let ring = Arc::new(Ring::new(&grown_cluster(), DEFAULT_VIRTUAL_NODES));
        let transport = Arc::new(MockReplicaTransport::new());
        let router = Arc::new(Router::new(
            SELF_ID,
            ring,
            local.clone(),
            transport.clone(),
            replication_factor,
        ));
        let rebalancer = Rebalancer::new(router.clone());
        (rebalancer, router, local, transport)
    }

    #[tokio::test]
    async fn moves_keys_to_their_new_owners() {
        let (rebalancer, router, local, transport) = initialize_rebalancer(200, 1).await;

        let report = rebalancer.run(None).await.unwrap();
        assert_eq!(report.moved + report.kept, 200);
        // with 3 nodes and factor 1 a significant share must move
        assert!(report.moved > 0);

        // every key now lives on exactly the node the new ring selects
        for i in 0..200 {
            let key = Bytes::from(format!("key-{}", i));
            let value = Bytes::from(format!("value-{}", i));
            let owner = &router.ring.replicas_for_key(&key, 1).unwrap()[0];

            if owner.id == SELF_ID {
                assert_eq!(local.get(&key).await.unwrap().unwrap(), value);
            } else {
                assert!(local.get(&key).await.unwrap().is_none());
                assert_eq!(transport.contents(&owner.host).get(&key).unwrap(), &value);
            }
        }
    }

    #[tokio::test]
    async fn keeps_keys_this_node_still_replicates() {
        // factor 3 on a 3 node cluster: every key keeps n1 in its replica set
        let (rebalancer, _, local, _) = initialize_rebalancer(50, 3).await;

        let report = rebalancer.run(None).await.unwrap();
        assert_eq!(report.moved, 0);
        assert_eq!(report.kept, 50);
        assert_eq!(local.keys().await.unwrap().len(), 50);
    }

    #[tokio::test]
    async fn keeps_keys_whose_relocation_failed() {
        let (rebalancer, router, local, transport) = initialize_rebalancer(200, 1).await;
        transport.inject_fault("127.0.0.1:8083", Fault::always());

        let report = rebalancer.run(None).await.unwrap();

        for i in 0..200 {
            let key = Bytes::from(format!("key-{}", i));
            let owner = &router.ring.replicas_for_key(&key, 1).unwrap()[0];
            match owner.id.as_str() {
                // unreachable owner: the local copy must survive
                "n3" => assert!(local.get(&key).await.unwrap().is_some()),
                "n2" => assert!(local.get(&key).await.unwrap().is_none()),
                _ => {}
            }
        }

        // a re-run after the peer recovers completes the move
        transport.clear_fault("127.0.0.1:8083");
        let second = rebalancer.run(None).await.unwrap();
        assert!(second.moved > 0);

        for i in 0..200 {
            let key = Bytes::from(format!("key-{}", i));
            let owner = &router.ring.replicas_for_key(&key, 1).unwrap()[0];
            if owner.id != SELF_ID {
                assert!(local.get(&key).await.unwrap().is_none());
                assert!(transport.contents(&owner.host).get(&key).is_some());
            }
        }

        // both scans together still accounted for every key
        assert!(report.moved + second.moved + second.kept >= 200);
    }

    #[tokio::test]
    async fn rerun_on_stable_ring_is_a_noop() {
        let (rebalancer, _, local, _) = initialize_rebalancer(100, 1).await;

        rebalancer.run(None).await.unwrap();
        let keys_after_first = {
            let mut keys = local.keys().await.unwrap();
            keys.sort();
            keys
        };

        let report = rebalancer.run(None).await.unwrap();
        assert_eq!(report.moved, 0);

        let keys_after_second = {
            let mut keys = local.keys().await.unwrap();
            keys.sort();
            keys
        };
        assert_eq!(keys_after_first, keys_after_second);
    }

    #[tokio::test]
    async fn expired_deadline_cancels_the_scan() {
        let (rebalancer, _, local, _) = initialize_rebalancer(10, 1).await;

        let err = rebalancer
            .run(Some(Instant::now() - Duration::from_secs(1)))
            .await
            .err()
            .unwrap();
        assert!(err.is_cancelled());

        // nothing was touched
        assert_eq!(local.keys().await.unwrap().len(), 10);
    }
}
