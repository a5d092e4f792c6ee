use clap::Parser;
use ringkv::server::config::{
    Config, DEFAULT_LISTEN_ADDR, DEFAULT_NODE_ID, DEFAULT_REPLICATION_FACTOR,
};
use ringkv::server::Server;

#[derive(Debug, Parser)]
#[command(name = "ringkv-server")]
#[command(about = "ringkv node", long_about = None)]
struct Cli {
    /// This node's cluster-unique id
    #[arg(long, env = "NODE_ID", default_value = DEFAULT_NODE_ID)]
    node_id: String,

    /// Local bind address, either `host:port` or a bare `:port`
    #[arg(long, env = "LISTEN_ADDR", default_value = DEFAULT_LISTEN_ADDR)]
    listen_addr: String,

    /// Comma-separated `id=host:port` entries; empty for a single-node ring
    #[arg(long, env = "CLUSTER_NODES", default_value = "")]
    cluster_nodes: String,

    /// Target number of replicas per key
    #[arg(long, env = "REPLICATION_FACTOR", default_value_t = DEFAULT_REPLICATION_FACTOR)]
    replication_factor: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ringkv::telemetry::init_tracing();
    let args = Cli::parse();

    let config = Config::resolve(
        args.node_id,
        args.listen_addr,
        &args.cluster_nodes,
        args.replication_factor,
    )?;
    Server::new(config).run().await?;

    Ok(())
}
