//! Download side of the benchmark.
//!
//! A [`BenchClient`] connects to one server peer, opens `n` streams under
//! [`TEST_PROTOCOL`], and drains each into a discard sink on its own task.
//! An atomic counter sums the bytes; a join barrier marks the end of the run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use libp2p::Stream;
use tokio::io::AsyncRead;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::compat::FuturesAsyncReadCompatExt;
use tracing::{debug, info, warn};

use crate::addr::PeerAddr;
use crate::node::Node;
use crate::report::{StreamReport, TransferReport};
use crate::transfer::timed_copy;
use crate::TEST_PROTOCOL;

/// A connected benchmark client.
pub struct BenchClient {
    control: libp2p_stream::Control,
    peer: PeerAddr,
    /// Connecting and opening streams share one deadline.
    deadline: Instant,
    timeout: Duration,
}

impl BenchClient {
    /// Connect `node` to `peer`. `timeout` bounds both the connection and
    /// the later stream opens.
    pub async fn connect(node: &Node, peer: PeerAddr, timeout: Duration) -> Result<Self> {
        let deadline = Instant::now() + timeout;

        info!(peer = %peer.peer_id, addr = %peer.addr, "Connecting to {}", peer.peer_id);
        node.connect(&peer, timeout).await?;
        info!("Connected; requesting data...");

        Ok(BenchClient {
            control: node.control(),
            peer,
            deadline,
            timeout,
        })
    }

    /// Open `n` streams to the server. Any failure aborts the whole set.
    pub async fn open_streams(&mut self, n: usize) -> Result<Vec<Stream>> {
        let peer_id = self.peer.peer_id;
        let timeout = self.timeout;
        let deadline = self.deadline;
        let control = &mut self.control;

        let open_all = async move {
            let mut streams = Vec::with_capacity(n);
            for i in 0..n {
                let stream = control
                    .open_stream(peer_id, TEST_PROTOCOL)
                    .await
                    .with_context(|| format!("failed to open stream {i} to {peer_id}"))?;
                streams.push(stream);
            }
            Ok::<_, anyhow::Error>(streams)
        };

        tokio::time::timeout_at(deadline, open_all)
            .await
            .map_err(|_| anyhow!("timed out after {timeout:?} opening streams to {peer_id}"))?
    }

    /// Run the benchmark: open `streams` streams, then time how long it takes
    /// to drain all of them.
    pub async fn download(&mut self, streams: usize, buffer_size: usize) -> Result<TransferReport> {
        anyhow::ensure!(streams > 0, "stream count must be at least 1");

        let opened = self.open_streams(streams).await?;
        if streams == 1 {
            info!("Transferring data...");
        } else {
            info!("Transferring data in {streams} parallel streams");
        }

        let readers: Vec<_> = opened.into_iter().map(|s| s.compat()).collect();
        let report = drain_all(readers, buffer_size).await?;

        info!(
            bytes = report.total_bytes,
            elapsed = ?report.elapsed,
            "Received {} bytes in {:?}",
            report.total_bytes,
            report.elapsed
        );
        Ok(report)
    }
}

/// Drain every reader on its own task and wait for all of them. A failing
/// reader is recorded in its report and never stops the others.
async fn drain_all<R>(readers: Vec<R>, buffer_size: usize) -> Result<TransferReport>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let total = Arc::new(AtomicU64::new(0));
    let start = Instant::now();

    let mut tasks = JoinSet::new();
    let count = readers.len();
    for (index, reader) in readers.into_iter().enumerate() {
        let total = Arc::clone(&total);
        tasks.spawn(drain_stream(index, reader, buffer_size, total));
    }

    let mut reports = Vec::with_capacity(count);
    while let Some(joined) = tasks.join_next().await {
        reports.push(joined.context("stream task panicked")?);
    }
    let elapsed = start.elapsed();

    reports.sort_by_key(|r| r.index);
    Ok(TransferReport {
        streams: reports,
        total_bytes: total.load(Ordering::Relaxed),
        elapsed,
    })
}

/// Copy one stream into a discard sink and add its bytes to `total`.
async fn drain_stream<R>(
    index: usize,
    mut reader: R,
    buffer_size: usize,
    total: Arc<AtomicU64>,
) -> StreamReport
where
    R: AsyncRead + Unpin,
{
    let mut sink = tokio::io::sink();

    let outcome = timed_copy(&mut reader, &mut sink, buffer_size).await;
    total.fetch_add(outcome.bytes, Ordering::Relaxed);

    let error = match outcome.result {
        Ok(()) => None,
        Err(e) => {
            warn!(stream = index, bytes = outcome.bytes, error = %e, "Error receiving data");
            Some(e.to_string())
        }
    };

    debug!(
        stream = index,
        bytes = outcome.bytes,
        elapsed = ?outcome.elapsed,
        "stream drained"
    );

    StreamReport {
        index,
        bytes: outcome.bytes,
        elapsed: outcome.elapsed,
        error,
    }
}
