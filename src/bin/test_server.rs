use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing::info;

use p2pbench::addr::{listen_addrs, with_peer_id};
use p2pbench::cli::normalize_long_flags;
use p2pbench::config::BenchConfig;
use p2pbench::identity::Identity;
use p2pbench::node::Node;
use p2pbench::server::FileServer;

#[derive(Parser)]
#[command(
    name = "test-server",
    about = "Serve a file over libp2p streams for throughput testing",
    version,
    long_about = None
)]
struct Cli {
    /// Listen port for both TCP and QUIC [default: 4001]
    #[arg(short, long, env = "P2PBENCH_PORT")]
    port: Option<u16>,

    /// Data file to serve [default: data]
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Address to bind [default: 0.0.0.0]
    #[arg(long)]
    listen_ip: Option<IpAddr>,

    /// Key file for a stable peer ID; created if missing
    #[arg(long, value_name = "PATH")]
    identity: Option<PathBuf>,

    /// Do not listen on TCP
    #[arg(long)]
    no_tcp: bool,

    /// Do not listen on QUIC
    #[arg(long)]
    no_quic: bool,

    /// TOML config file (falls back to $P2PBENCH_CONFIG)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Emit JSON log lines
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn apply(self, config: &mut BenchConfig) {
        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(file) = self.file {
            config.transfer.file = file;
        }
        if let Some(ip) = self.listen_ip {
            config.network.listen_ip = ip;
        }
        if let Some(path) = self.identity {
            config.identity.key_path = Some(path);
        }
        if self.no_tcp {
            config.network.tcp = false;
        }
        if self.no_quic {
            config.network.quic = false;
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

    // Fail before binding anything if the file is not there.
    let server = FileServer::new(&config.transfer.file, config.transfer.buffer_size)?;

    let identity = Identity::from_key_path(config.identity.key_path.as_deref())?;
    let listen = listen_addrs(
        config.network.listen_ip,
        config.network.port,
        config.network.tcp,
        config.network.quic,
    );
    let node = Node::start(&identity, &config.network, &listen).await?;

    let incoming = server.register(&node)?;

    for addr in node.listen_addrs() {
        println!("I am {}", with_peer_id(addr, node.peer_id()));
    }

    tokio::select! {
        _ = server.run(incoming) => {}
        _ = tokio::signal::ctrl_c() => info!("interrupted, shutting down"),
    }

    node.shutdown().await;
    Ok(())
}
