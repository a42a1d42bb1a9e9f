use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser};

use p2pbench::addr::parse_peer_addr;
use p2pbench::cli::normalize_long_flags;
use p2pbench::client::BenchClient;
use p2pbench::config::BenchConfig;
use p2pbench::identity::Identity;
use p2pbench::node::Node;
use p2pbench::report::format_summary;

#[derive(Parser)]
#[command(
    name = "test-client",
    about = "Download from a libp2p test-server and report throughput",
    version,
    long_about = None
)]
struct Cli {
    /// Server multiaddress, e.g. /ip4/10.0.0.2/tcp/4001/p2p/12D3KooW...
    peer: String,

    /// Number of parallel download streams [default: 1]
    #[arg(short, long)]
    streams: Option<usize>,

    /// Seconds allowed for connecting and opening streams [default: 60]
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Per-stream copy buffer in bytes [default: 65536]
    #[arg(long, value_name = "BYTES")]
    buffer_size: Option<usize>,

    /// Key file for a stable peer ID; created if missing
    #[arg(long, value_name = "PATH")]
    identity: Option<PathBuf>,

    /// TOML config file (falls back to $P2PBENCH_CONFIG)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Emit JSON log lines
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn apply(&self, config: &mut BenchConfig) {
        if let Some(streams) = self.streams {
            config.transfer.streams = streams;
        }
        if let Some(secs) = self.timeout {
            config.network.connect_timeout_secs = secs;
        }
        if let Some(size) = self.buffer_size {
            config.transfer.buffer_size = size;
        }
        if let Some(path) = &self.identity {
            config.identity.key_path = Some(path.clone());
        }
        if self.log_json {
            config.logging.json = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_from(normalize_long_flags(std::env::args_os(), &Cli::command()));
    let mut config = BenchConfig::load_or_default(cli.config.as_deref())?;
    cli.apply(&mut config);

    p2pbench::init_tracing(&config.logging)?;
    config.validate()?;

    let peer = parse_peer_addr(&cli.peer)?;

    let identity = Identity::from_key_path(config.identity.key_path.as_deref())?;
    let node = Node::start(&identity, &config.network, &[]).await?;

    let mut client = BenchClient::connect(&node, peer, config.network.connect_timeout()).await?;
    let report = client
        .download(config.transfer.streams, config.transfer.buffer_size)
        .await?;

    println!("{}", format_summary(&report));

    node.shutdown().await;
    Ok(())
}
