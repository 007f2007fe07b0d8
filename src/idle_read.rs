//! Idle-read timeout decorator.
//!
//! Wraps a byte source or streamed HTTP response so a peer that stalls
//! mid-transfer aborts instead of hanging forever, while a slow-but-still-
//! progressing transfer is left alone: the clock resets on every read of at
//! least one byte.

use std::time::Duration;

use bytes::Bytes;
use reqwest::{Response, StatusCode};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};

fn idle_timeout() -> Error {
    Error::Transport {
        status: StatusCode::REQUEST_TIMEOUT,
        reason: "idle read timeout".to_owned(),
        body_snippet: String::new(),
    }
}

fn io_err(e: std::io::Error) -> Error {
    Error::Parse(serde_json::Error::io(e))
}

/// Fill `buf` completely. Each individual `read` call is bounded by
/// `timeout`; progress on an earlier call resets the clock for the next one.
pub(crate) async fn read_exact_idle(
    source: &mut (dyn AsyncRead + Unpin + Send),
    mut buf: &mut [u8],
    timeout: Duration,
) -> Result<()> {
    while !buf.is_empty() {
        let n = tokio::time::timeout(timeout, source.read(buf))
            .await
            .map_err(|_| idle_timeout())?
            .map_err(io_err)?;
        if n == 0 {
            return Err(io_err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "source ended before the fragment was fully read",
            )));
        }
        buf = &mut buf[n..];
    }
    Ok(())
}

/// Read up to `limit` bytes into `out`. Each individual `read` call is
/// bounded by `timeout`; progress resets the clock.
pub(crate) async fn read_to_end_idle(
    source: &mut (dyn AsyncRead + Unpin + Send),
    out: &mut Vec<u8>,
    limit: u64,
    timeout: Duration,
) -> Result<()> {
    let mut remaining = limit;
    let mut chunk = vec![0u8; (64 * 1024).min(limit.max(1) as usize)];
    while remaining > 0 {
        let want = chunk.len().min(remaining as usize);
        let n = tokio::time::timeout(timeout, source.read(&mut chunk[..want]))
            .await
            .map_err(|_| idle_timeout())?
            .map_err(io_err)?;
        if n == 0 {
            break;
        }
        out.extend_from_slice(&chunk[..n]);
        remaining -= n as u64;
    }
    Ok(())
}

/// Fetch the next chunk of a streamed response body, bounded by `timeout`.
/// Progress on the previous chunk resets the clock for this one.
pub(crate) async fn next_chunk_idle(resp: &mut Response, timeout: Duration) -> Result<Option<Bytes>> {
    tokio::time::timeout(timeout, resp.chunk())
        .await
        .map_err(|_| idle_timeout())?
        .map_err(Error::from)
}
