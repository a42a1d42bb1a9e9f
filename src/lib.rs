//! p2pbench -- throughput harness for libp2p.
//!
//! `test-server` streams a fixed file to every peer that opens a
//! [`TEST_PROTOCOL`] stream; `test-client` connects, opens one or more such
//! streams in parallel, and reports how many bytes arrived in how long.
//! Transports, multiplexing, addressing and security all come from libp2p.

pub mod addr;
pub mod cli;
pub mod client;
pub mod config;
pub mod identity;
pub mod node;
pub mod report;
pub mod server;
pub mod transfer;

use anyhow::Result;
use libp2p::StreamProtocol;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Protocol identifier that routes streams to the file-serving handler.
pub const TEST_PROTOCOL: StreamProtocol = StreamProtocol::new("/libp2p/test/data");

/// Install the global tracing subscriber. `RUST_LOG` overrides
/// `logging.level` when set.
pub fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}
