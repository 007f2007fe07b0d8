//! The resumable chunked upload engine (SPEC_FULL §4.8).
//!
//! Drives a per-file state machine: CREATE the upload session, PUT aligned
//! fragments sequentially with retry/backoff/seek-back, and either reach
//! DONE on the final fragment or CANCEL the session and raise
//! `UploadSessionError` on any fatal failure.

use std::io::SeekFrom;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use tokio::io::{AsyncRead, AsyncSeek, AsyncSeekExt};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{Error, Result};
use crate::idle_read::read_exact_idle;
use crate::pipeline::{Pipeline, Signing};
use crate::resolver::ResolvedDrive;
use crate::resource::{CreateUploadSessionItem, CreateUploadSessionRequest, DriveItem, UploadSessionResponse};
use crate::url_builder::{remote_file_url, Verb};

/// HTTP statuses that retry without backoff, per SPEC_FULL §9 decision 3
/// (tightened from "any 4xx ≠ 404").
const NO_BACKOFF_RETRY_STATUSES: [StatusCode; 3] =
    [StatusCode::REQUEST_TIMEOUT, StatusCode::CONFLICT, StatusCode::TOO_MANY_REQUESTS];

/// A source the upload engine can read fragments from and seek back on
/// retry. Implemented for any `AsyncRead + AsyncSeek`.
pub trait UploadSource: AsyncRead + AsyncSeek + Unpin + Send {}
impl<T: AsyncRead + AsyncSeek + Unpin + Send> UploadSource for T {}

/// Upload `name` from `source` (exactly `stream_length` bytes) using the
/// chunked session protocol. Callers choose between this and a single PUT
/// based on the 4 MB threshold (see `backend::put`).
pub async fn upload_chunked(
    pipeline: &Pipeline,
    drive: &ResolvedDrive,
    name: &str,
    source: &mut (dyn UploadSource + '_),
    stream_length: u64,
    fragment_size: u64,
    retry_count: u32,
    retry_delay: Duration,
    short_timeout: Duration,
    read_write_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<DriveItem> {
    let upload_url = create_session(pipeline, drive, name, short_timeout, cancel).await?;

    let buffer_size = fragment_size.min(stream_length.max(1));
    let fragment_count = stream_length.div_ceil(buffer_size).max(1) as usize;

    let mut offset: u64 = 0;
    let mut fragment_index = 0usize;
    let mut final_item: Option<DriveItem> = None;

    while offset < stream_length {
        let current_len = buffer_size.min(stream_length - offset);

        match upload_fragment(
            pipeline,
            &upload_url,
            source,
            offset,
            current_len,
            stream_length,
            retry_count,
            retry_delay,
            read_write_timeout,
            cancel,
        )
        .await
        {
            Ok(FragmentOutcome::Continue) => {}
            Ok(FragmentOutcome::Finished(item)) => final_item = Some(item),
            Err(cause) => {
                cancel_session(pipeline, &upload_url, short_timeout, cancel).await;
                return Err(Error::UploadSession {
                    fragment_index,
                    fragment_count,
                    source: Box::new(cause),
                });
            }
        }

        offset += current_len;
        fragment_index += 1;
    }

    final_item.ok_or_else(|| Error::UploadSession {
        fragment_index,
        fragment_count,
        source: Box::new(Error::Parse(serde_json::Error::io(std::io::Error::other(
            "session completed without a final DriveItem",
        )))),
    })
}

async fn create_session(
    pipeline: &Pipeline,
    drive: &ResolvedDrive,
    name: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<String> {
    let url = remote_file_url(&drive.api_version, &drive.drive_path, &drive.root_path, name, Verb::CreateUploadSession);
    let body = CreateUploadSessionRequest {
        item: CreateUploadSessionItem { conflict_behavior: "fail" },
    };
    let resp: UploadSessionResponse = pipeline.send_json(Method::POST, &url, &body, timeout, cancel).await?;
    resp.upload_url
        .ok_or_else(|| Error::Parse(serde_json::Error::io(std::io::Error::other("missing uploadUrl"))))
}

async fn cancel_session(pipeline: &Pipeline, upload_url: &str, timeout: Duration, cancel: &CancellationToken) {
    if let Err(e) = pipeline
        .send_no_content(Method::DELETE, upload_url, Signing::Unsigned, timeout, cancel)
        .await
    {
        warn!(error = %e, "failed to delete aborted upload session");
    }
}

enum FragmentOutcome {
    Continue,
    Finished(DriveItem),
}

#[allow(clippy::too_many_arguments)]
async fn upload_fragment(
    pipeline: &Pipeline,
    upload_url: &str,
    source: &mut (dyn UploadSource + '_),
    offset: u64,
    len: u64,
    total: u64,
    retry_count: u32,
    retry_delay: Duration,
    read_write_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<FragmentOutcome> {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;

        // Unconditional seek-back before every attempt, including the
        // first: see SPEC_FULL §9 decision 1.
        source
            .seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| Error::Parse(serde_json::Error::io(e)))?;

        let mut buf = vec![0u8; len as usize];
        read_exact_idle(source, &mut buf, read_write_timeout).await?;

        let content_range = format!("bytes {}-{}/{}", offset, offset + len - 1, total);
        let result = pipeline
            .execute_with_builder(
                Method::PUT,
                upload_url,
                Signing::Unsigned,
                read_write_timeout,
                cancel,
                |req| {
                    req.header(reqwest::header::CONTENT_LENGTH, len)
                        .header(reqwest::header::CONTENT_RANGE, content_range.clone())
                        .body(buf.clone())
                },
            )
            .await;

        let resp = match result {
            Ok(resp) => resp,
            Err(err) => match classify_retry(&err, attempt, retry_count, retry_delay) {
                RetryDecision::Fatal => return Err(err),
                RetryDecision::RetryNow => continue,
                RetryDecision::RetryAfter(delay) => {
                    tokio::select! {
                        () = cancel.cancelled() => return Err(Error::Cancelled),
                        () = tokio::time::sleep(delay) => {}
                    }
                    continue;
                }
            },
        };

        let bytes = resp.bytes().await?;
        if bytes.is_empty() {
            return Ok(FragmentOutcome::Continue);
        }
        if let Ok(item) = serde_json::from_slice::<DriveItem>(&bytes) {
            if item.id.is_some() {
                return Ok(FragmentOutcome::Finished(item));
            }
        }
        // Non-final fragment response (`UploadSession` JSON) — ignored,
        // the engine tracks offset itself per SPEC_FULL §4.8.
        return Ok(FragmentOutcome::Continue);
    }
}

enum RetryDecision {
    Fatal,
    RetryNow,
    RetryAfter(Duration),
}

fn classify_retry(err: &Error, attempt: u32, retry_count: u32, retry_delay: Duration) -> RetryDecision {
    if attempt >= retry_count {
        return RetryDecision::Fatal;
    }
    match err {
        Error::ItemNotFound => RetryDecision::Fatal,
        Error::Transport { status, .. } if status.is_server_error() => {
            let backoff = 2u64.saturating_pow(attempt).saturating_mul(retry_delay.as_millis() as u64);
            RetryDecision::RetryAfter(Duration::from_millis(backoff))
        }
        Error::Transport { status, .. } if NO_BACKOFF_RETRY_STATUSES.contains(status) => RetryDecision::RetryNow,
        _ => RetryDecision::Fatal,
    }
}
