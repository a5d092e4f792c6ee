use anyhow::anyhow;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "ringkv-cli")]
#[command(about = "ringkv command line client", long_about = None)]
struct Cli {
    /// `host:port` of the node to talk to
    #[arg(long, default_value = "127.0.0.1:8081")]
    addr: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Store a value under a key
    Put { key: String, value: String },
    /// Fetch the value of a key
    Get { key: String },
    /// Remove a key
    Delete { key: String },
    /// List the keys held locally by the node
    Keys,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let client = reqwest::Client::new();

    match args.command {
        Commands::Put { key, value } => {
            let response = client
                .put(format!("http://{}/kv/{}", args.addr, key))
                .body(value)
                .send()
                .await?;
            expect_success(response).await?;
            println!("OK");
        }
        Commands::Get { key } => {
            let response = client
                .get(format!("http://{}/kv/{}", args.addr, key))
                .send()
                .await?;
            let body = expect_success(response).await?;
            println!("{}", body);
        }
        Commands::Delete { key } => {
            let response = client
                .delete(format!("http://{}/kv/{}", args.addr, key))
                .send()
                .await?;
            expect_success(response).await?;
            println!("OK");
        }
        Commands::Keys => {
            let response = client
                .get(format!("http://{}/debug/keys", args.addr))
                .send()
                .await?;
            let keys: Vec<String> = serde_json::from_str(&expect_success(response).await?)?;
            for key in keys {
                println!("{}", key);
            }
        }
    }

    Ok(())
}

async fn expect_success(response: reqwest::Response) -> anyhow::Result<String> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(anyhow!("{}: {}", status, body));
    }
    Ok(body)
}
