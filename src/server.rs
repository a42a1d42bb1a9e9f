//! File-serving side of the benchmark.
//!
//! `FileServer` registers [`TEST_PROTOCOL`] on a [`Node`] and, for every
//! inbound stream, copies the configured file onto it and closes the write
//! side. Each stream runs on its own task; one stream failing never affects
//! another.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use futures::StreamExt;
use libp2p::{PeerId, Stream};
use libp2p_stream::IncomingStreams;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::compat::FuturesAsyncReadCompatExt;
use tracing::{debug, error, info, warn};

use crate::node::Node;
use crate::transfer::{timed_copy, CopyOutcome};
use crate::TEST_PROTOCOL;

/// Serves one file to every peer that opens a [`TEST_PROTOCOL`] stream.
#[derive(Debug, Clone)]
pub struct FileServer {
    path: PathBuf,
    buffer_size: usize,
}

impl FileServer {
    /// Check that `path` names a regular file. Called before any listener is
    /// opened so a typo fails fast.
    pub fn new(path: impl Into<PathBuf>, buffer_size: usize) -> Result<Self> {
        let path = path.into();
        let meta = std::fs::metadata(&path)
            .with_context(|| format!("cannot serve {}", path.display()))?;
        anyhow::ensure!(meta.is_file(), "cannot serve {}: not a regular file", path.display());

        debug!(path = %path.display(), size = meta.len(), "file to serve");
        Ok(FileServer { path, buffer_size })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Register the stream handler. Streams opened by peers after this
    /// returns are queued until [`FileServer::run`] picks them up.
    pub fn register(&self, node: &Node) -> Result<IncomingStreams> {
        let incoming = node
            .control()
            .accept(TEST_PROTOCOL)
            .context("failed to register stream handler")?;
        info!(protocol = %TEST_PROTOCOL, file = %self.path.display(), "serving");
        Ok(incoming)
    }

    /// Spawn a task per inbound stream until the registration is dropped.
    pub async fn run(&self, mut incoming: IncomingStreams) {
        while let Some((peer, stream)) = incoming.next().await {
            let server = self.clone();
            tokio::spawn(async move {
                server.serve_stream(peer, stream).await;
            });
        }
        debug!("incoming stream registration dropped");
    }

    /// Copy the file onto one stream. Failures are logged, never propagated.
    pub async fn serve_stream(&self, peer: PeerId, stream: Stream) {
        debug!(%peer, "incoming stream");

        let mut file = match File::open(&self.path).await {
            Ok(f) => f,
            Err(e) => {
                error!(
                    %peer,
                    path = %self.path.display(),
                    error = %e,
                    "failed to open file, dropping stream"
                );
                return;
            }
        };

        let mut stream = stream.compat();
        let CopyOutcome {
            bytes,
            elapsed,
            result,
        } = timed_copy(&mut file, &mut stream, self.buffer_size).await;

        if let Err(e) = result {
            warn!(%peer, error = %e, "Error transmitting file");
        }
        if let Err(e) = stream.shutdown().await {
            debug!(%peer, error = %e, "failed to close stream");
        }

        info!(%peer, bytes, elapsed = ?elapsed, "Transmitted {bytes} bytes in {elapsed:?}");
    }
}
