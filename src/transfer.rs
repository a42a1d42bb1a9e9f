//! Byte shoveling with accounting.
//!
//! `tokio::io::copy` discards the byte count when it fails. A throughput
//! report needs how far a broken stream got, so the copy loop here always
//! returns the bytes moved next to the final result.

use std::io;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest copy buffer a stream task will allocate.
pub const MAX_BUFFER_SIZE: usize = 16 * 1024 * 1024;

/// Result of one timed copy.
#[derive(Debug)]
pub struct CopyOutcome {
    /// Bytes written to the destination before EOF or the first error.
    pub bytes: u64,
    pub elapsed: Duration,
    pub result: io::Result<()>,
}

/// Copy `reader` into `writer` until EOF, returning the byte count even when
/// the copy ends with an error. The writer is flushed on EOF.
///
/// `buffer_size` is clamped to `1..=MAX_BUFFER_SIZE`.
pub async fn copy_counted<R, W>(
    reader: &mut R,
    writer: &mut W,
    buffer_size: usize,
) -> (u64, io::Result<()>)
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; buffer_size.clamp(1, MAX_BUFFER_SIZE)];
    let mut total: u64 = 0;

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return (total, Err(e)),
        };

        if let Err(e) = writer.write_all(&buf[..n]).await {
            return (total, Err(e));
        }
        total += n as u64;
    }

    (total, writer.flush().await)
}

/// [`copy_counted`] wrapped in a wall-clock timer.
pub async fn timed_copy<R, W>(reader: &mut R, writer: &mut W, buffer_size: usize) -> CopyOutcome
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let start = Instant::now();
    let (bytes, result) = copy_counted(reader, writer, buffer_size).await;
    CopyOutcome {
        bytes,
        elapsed: start.elapsed(),
        result,
    }
}
