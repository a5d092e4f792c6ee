//! Node bootstrap: wires the ring, the local store, the transport and the
//! coordinator together and serves the HTTP API.
use std::sync::Arc;
use std::time::Instant;

use tokio::net::TcpListener;
use tracing::{event, Level};

use crate::cluster::ring::{Ring, DEFAULT_VIRTUAL_NODES};
use crate::error::Result;
use crate::router::rebalance::Rebalancer;
use crate::router::{LocalStore, Router};
use crate::storage_engine::in_memory::InMemory;
use crate::transport::http::HttpReplicaTransport;

pub mod config;
pub mod handlers;

use config::Config;

pub struct Server {
    config: Config,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Runs the node until the process is stopped.
    ///
    /// Shortly after startup one rebalance scan is kicked off in the
    /// background so that a node (re)joining an existing cluster sheds the
    /// keys it no longer owns. The same scan can be re-run at any time via
    /// `POST /internal/rebalance`.
    pub async fn run(self) -> Result<()> {
        let config = self.config;
        event!(
            Level::INFO,
            "Starting node {} on {}, advertised as {} (cluster of {}, replication factor {})",
            config.node_id,
            config.listen_addr,
            config.self_host(),
            config.cluster_nodes.len(),
            config.replication_factor
        );

        let ring = Arc::new(Ring::new(&config.cluster_nodes, DEFAULT_VIRTUAL_NODES));
        let local: LocalStore = Arc::new(InMemory::default());
        let transport = Arc::new(HttpReplicaTransport::new());
        let router = Arc::new(Router::new(
            config.node_id.clone(),
            ring,
            local.clone(),
            transport,
            config.replication_factor,
        ));
        let rebalancer = Arc::new(Rebalancer::new(router.clone()));

        {
            let rebalancer = rebalancer.clone();
            let delay = config.rebalance_delay;
            let timeout = config.rebalance_timeout;
            tokio::spawn(async move {
                // give peers a chance to come up first
                tokio::time::sleep(delay).await;
                let deadline = Instant::now() + timeout;
                if let Err(err) = rebalancer.run(Some(deadline)).await {
                    event!(Level::ERROR, "Startup rebalance failed: {:?}", err);
                }
            });
        }

        let app = handlers::app(router, local, rebalancer);
        let listener = TcpListener::bind(config.bind_addr()).await?;
        event!(Level::INFO, "Listening on {}", listener.local_addr()?);
        axum::serve(listener, app).await?;

        Ok(())
    }
}
