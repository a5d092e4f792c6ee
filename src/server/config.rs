//! Node configuration.
//!
//! All options can be supplied as environment variables (the canonical names
//! below) or as command-line flags on `ringkv-server`:
//!
//! - `NODE_ID`: this node's id (default `node1`)
//! - `LISTEN_ADDR`: local bind address (default `:8081`)
//! - `CLUSTER_NODES`: comma-separated `id=host:port` entries. When absent the
//!   node starts a single-node ring containing only itself.
//! - `REPLICATION_FACTOR`: target replicas per key (default 3)
use std::time::Duration;

use tracing::{event, Level};

use crate::cluster::ring::NodeInfo;
use crate::error::{Error, Result};

pub const DEFAULT_NODE_ID: &str = "node1";
pub const DEFAULT_LISTEN_ADDR: &str = ":8081";
pub const DEFAULT_REPLICATION_FACTOR: usize = 3;

/// How long bootstrap waits before kicking off the startup rebalance, giving
/// peers a chance to come up.
pub const DEFAULT_REBALANCE_DELAY: Duration = Duration::from_secs(5);
/// Time limit for the startup rebalance scan.
pub const DEFAULT_REBALANCE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Config {
    pub node_id: String,
    pub listen_addr: String,
    pub cluster_nodes: Vec<NodeInfo>,
    pub replication_factor: usize,
    pub rebalance_delay: Duration,
    pub rebalance_timeout: Duration,
}

impl Config {
    /// Builds a [`Config`] out of the raw option values.
    ///
    /// An empty `cluster_nodes` string yields a single-node cluster whose host
    /// is derived from `listen_addr`.
    pub fn resolve(
        node_id: String,
        listen_addr: String,
        cluster_nodes: &str,
        replication_factor: usize,
    ) -> Result<Self> {
        if node_id.is_empty() {
            return Err(Error::InvalidServerConfig {
                reason: "NODE_ID must not be empty".to_string(),
            });
        }

        let mut nodes = parse_cluster_nodes(cluster_nodes);
        if nodes.is_empty() {
            event!(
                Level::INFO,
                "No CLUSTER_NODES set, using a single-node ring"
            );
            let host = derive_self_host(&node_id, &[], &listen_addr);
            nodes.push(NodeInfo::new(node_id.clone(), host));
        }

        Ok(Self {
            node_id,
            listen_addr,
            cluster_nodes: nodes,
            replication_factor,
            rebalance_delay: DEFAULT_REBALANCE_DELAY,
            rebalance_timeout: DEFAULT_REBALANCE_TIMEOUT,
        })
    }

    /// The `host:port` this node is reachable on by its peers.
    pub fn self_host(&self) -> String {
        derive_self_host(&self.node_id, &self.cluster_nodes, &self.listen_addr)
    }

    /// `listen_addr` in a form [`tokio::net::TcpListener`] accepts: a bare
    /// `:port` binds every interface.
    pub fn bind_addr(&self) -> String {
        if let Some(port) = self.listen_addr.strip_prefix(':') {
            format!("0.0.0.0:{}", port)
        } else {
            self.listen_addr.clone()
        }
    }
}

/// Parses `CLUSTER_NODES` entries of the form `id=host:port`. Invalid entries
/// are skipped with a warning rather than failing the bootstrap.
pub fn parse_cluster_nodes(raw: &str) -> Vec<NodeInfo> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match entry.split_once('=') {
            Some((id, host)) if !id.is_empty() && !host.is_empty() => {
                Some(NodeInfo::new(id, host))
            }
            _ => {
                event!(Level::WARN, "Invalid CLUSTER_NODES entry: {}", entry);
                None
            }
        })
        .collect()
}

/// Resolves the host this node advertises: its `CLUSTER_NODES` entry when
/// present, otherwise a host derived from the listen address.
fn derive_self_host(node_id: &str, nodes: &[NodeInfo], listen_addr: &str) -> String {
    if let Some(node) = nodes.iter().find(|n| n.id == node_id) {
        return node.host.clone();
    }

    let port = listen_addr.trim_start_matches(':');
    let port = if port.is_empty() { "8080" } else { port };
    match port.rsplit_once(':') {
        // listen_addr already carried a host
        Some(_) => port.to_string(),
        None => format!("localhost:{}", port),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_cluster_nodes, Config};
    use crate::cluster::ring::NodeInfo;

    #[test]
    fn parses_well_formed_entries() {
        let nodes =
            parse_cluster_nodes("node1=localhost:8081,node2=localhost:8082,node3=localhost:8083");
        assert_eq!(
            nodes,
            vec![
                NodeInfo::new("node1", "localhost:8081"),
                NodeInfo::new("node2", "localhost:8082"),
                NodeInfo::new("node3", "localhost:8083"),
            ]
        );
    }

    #[test]
    fn skips_malformed_entries_and_whitespace() {
        let nodes = parse_cluster_nodes(" node1=localhost:8081 , garbage ,, =nohost, noid= ");
        assert_eq!(nodes, vec![NodeInfo::new("node1", "localhost:8081")]);
    }

    #[test]
    fn empty_input_yields_no_nodes() {
        assert!(parse_cluster_nodes("").is_empty());
        assert!(parse_cluster_nodes("  ").is_empty());
    }

    #[test]
    fn resolve_falls_back_to_single_node_ring() {
        let config =
            Config::resolve("node1".to_string(), ":8081".to_string(), "", 3).unwrap();
        assert_eq!(
            config.cluster_nodes,
            vec![NodeInfo::new("node1", "localhost:8081")]
        );
        assert_eq!(config.self_host(), "localhost:8081");
    }

    #[test]
    fn resolve_rejects_empty_node_id() {
        assert!(Config::resolve(String::new(), ":8081".to_string(), "", 3).is_err());
    }

    #[test]
    fn self_host_prefers_the_cluster_entry() {
        let config = Config::resolve(
            "node2".to_string(),
            ":9999".to_string(),
            "node1=host-a:8081,node2=host-b:8082",
            3,
        )
        .unwrap();
        assert_eq!(config.self_host(), "host-b:8082");
    }

    #[test]
    fn bind_addr_fills_in_the_wildcard_interface() {
        let config = Config::resolve("node1".to_string(), ":8081".to_string(), "", 3).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:8081");

        let config =
            Config::resolve("node1".to_string(), "127.0.0.1:8081".to_string(), "", 3).unwrap();
        assert_eq!(config.bind_addr(), "127.0.0.1:8081");
    }
}
