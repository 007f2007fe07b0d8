//! The top-level backend façade: wires configuration, the token provider,
//! the request pipeline, drive resolution, pagination, folder creation, and
//! the upload engine into the uniform storage interface (SPEC_FULL §1/§6).

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::folder::ensure_root_path;
use crate::idle_read::{next_chunk_idle, read_to_end_idle};
use crate::pagination::{collect_all, PaginatedStream};
use crate::pipeline::{Pipeline, Signing};
use crate::resolver::{DrivePathResolver, DriveResolver, ResolvedDrive};
use crate::resource::{DriveItem, RenameRequest};
use crate::throttle::ThrottleGate;
use crate::token::SharedTokenProvider;
use crate::upload::{upload_chunked, UploadSource};
use crate::url_builder::{drive_url, item_metadata_url, remote_file_url, root_children_url, root_item_url, Verb};

/// `Error::ItemNotFound` means "this name isn't a file here"; give the
/// caller that context back.
fn missing_file(err: Error, name: &str) -> Error {
    match err {
        Error::ItemNotFound => Error::FileMissing { name: name.to_owned() },
        other => other,
    }
}

/// `Error::ItemNotFound` means "the resolved root itself is gone"; give the
/// caller that context back.
fn missing_folder(err: Error, path: &str) -> Error {
    match err {
        Error::ItemNotFound => Error::FolderMissing { path: path.to_owned() },
        other => other,
    }
}

/// Above this size, [`Backend::put`] uses the chunked upload engine instead
/// of a single PUT.
pub const UPLOAD_SMALL_LIMIT: u64 = 4_000_000;

/// Drive quota, or `None` when the server reports all-zero values (some
/// drives misreport, per SPEC_FULL §4.7).
#[derive(Debug, Clone, Copy)]
pub struct Quota {
    pub total: i64,
    pub remaining: i64,
}

pub struct Backend {
    config: Config,
    pipeline: Pipeline,
    resolver: DriveResolver,
}

impl Backend {
    pub fn new(
        config: Config,
        token_provider: SharedTokenProvider,
        drive_path_resolver: Box<dyn DrivePathResolver>,
        http_client: reqwest::Client,
    ) -> Self {
        let gate = Arc::new(ThrottleGate::new());
        let pipeline = Pipeline::new(
            http_client,
            gate,
            token_provider,
            config.auth_id.clone(),
            config.protocol_key.clone(),
        );
        let resolver = DriveResolver::new(config.root_url.clone(), drive_path_resolver);
        Self { config, pipeline, resolver }
    }

    async fn drive(&self, cancel: &CancellationToken) -> Result<&ResolvedDrive> {
        self.resolver.resolve(cancel).await
    }

    /// Upload `source` (exactly `length` bytes) as `name`, choosing between
    /// the single-PUT and chunked paths by size.
    pub async fn put(
        &self,
        name: &str,
        source: &mut (dyn UploadSource + '_),
        length: u64,
        cancel: &CancellationToken,
    ) -> Result<DriveItem> {
        let drive = self.drive(cancel).await?;
        if length < UPLOAD_SMALL_LIMIT {
            self.put_small(drive, name, source, length, cancel).await
        } else {
            upload_chunked(
                &self.pipeline,
                drive,
                name,
                source,
                length,
                self.config.fragment_size,
                self.config.fragment_retry_count,
                self.config.fragment_retry_delay,
                self.config.timeouts.short,
                self.config.timeouts.read_write,
                cancel,
            )
            .await
        }
    }

    async fn put_small(
        &self,
        drive: &ResolvedDrive,
        name: &str,
        source: &mut (dyn UploadSource + '_),
        length: u64,
        cancel: &CancellationToken,
    ) -> Result<DriveItem> {
        let url = remote_file_url(&drive.api_version, &drive.drive_path, &drive.root_path, name, Verb::Content);
        let mut buf = Vec::with_capacity(length as usize);
        read_to_end_idle(source, &mut buf, length, self.config.timeouts.read_write).await?;

        let resp = self
            .pipeline
            .execute(
                Method::PUT,
                &url,
                Signing::Bearer,
                self.config.timeouts.read_write,
                Some((buf, "application/octet-stream")),
                cancel,
            )
            .await?;
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(Error::Parse)
    }

    /// Stream `name`'s content into `sink`. A missing item surfaces as
    /// `Error::FileMissing`.
    pub async fn get(
        &self,
        name: &str,
        sink: &mut (dyn tokio::io::AsyncWrite + Unpin + Send),
        cancel: &CancellationToken,
    ) -> Result<()> {
        use tokio::io::AsyncWriteExt;
        let drive = self.drive(cancel).await?;
        let url = remote_file_url(&drive.api_version, &drive.drive_path, &drive.root_path, name, Verb::Content);
        let mut resp = self
            .pipeline
            .execute(Method::GET, &url, Signing::Bearer, self.config.timeouts.short, None, cancel)
            .await
            .map_err(|e| missing_file(e, name))?;
        loop {
            tokio::select! {
                () = cancel.cancelled() => return Err(Error::Cancelled),
                chunk = next_chunk_idle(&mut resp, self.config.timeouts.read_write) => {
                    match chunk? {
                        Some(bytes) => sink.write_all(&bytes).await.map_err(|e| Error::Parse(serde_json::Error::io(e)))?,
                        None => return Ok(()),
                    }
                }
            }
        }
    }

    pub async fn delete(&self, name: &str, cancel: &CancellationToken) -> Result<()> {
        let drive = self.drive(cancel).await?;
        let url = item_metadata_url(&drive.api_version, &drive.drive_path, &drive.root_path, name);
        self.pipeline
            .send_no_content(Method::DELETE, &url, Signing::Bearer, self.config.timeouts.short, cancel)
            .await
            .map_err(|e| missing_file(e, name))
    }

    pub async fn rename(&self, name: &str, new_name: &str, cancel: &CancellationToken) -> Result<DriveItem> {
        let drive = self.drive(cancel).await?;
        let url = item_metadata_url(&drive.api_version, &drive.drive_path, &drive.root_path, name);
        let body = RenameRequest { name: new_name };
        self.pipeline
            .send_json(Method::PATCH, &url, &body, self.config.timeouts.short, cancel)
            .await
            .map_err(|e| missing_file(e, name))
    }

    /// List immediate children of the root path, following pagination to
    /// completion. A missing root surfaces as `Error::FolderMissing`.
    pub async fn list(&self, cancel: &CancellationToken) -> Result<Vec<DriveItem>> {
        let drive = self.drive(cancel).await?;
        let url = root_children_url(&drive.api_version, &drive.drive_path, &drive.root_path);
        let stream = PaginatedStream::new(
            Arc::new(self.pipeline.clone()),
            url,
            self.config.timeouts.list,
            cancel.clone(),
        );
        collect_all(stream).await.map_err(|e| missing_folder(e, &drive.root_path))
    }

    pub async fn create_folder_path(&self, cancel: &CancellationToken) -> Result<Option<String>> {
        let drive = self.drive(cancel).await?;
        ensure_root_path(&self.pipeline, drive, &self.config.timeouts, cancel).await
    }

    /// Verify the root exists, then perform a tiny read/write round-trip to
    /// confirm credentials allow both. A missing root surfaces as
    /// `Error::FolderMissing`.
    pub async fn test(&self, cancel: &CancellationToken) -> Result<()> {
        let drive = self.drive(cancel).await?;
        let url = root_item_url(&drive.api_version, &drive.drive_path, &drive.root_path);
        self.pipeline
            .get_json::<DriveItem>(&url, self.config.timeouts.short, cancel)
            .await
            .map_err(|e| missing_folder(e, &drive.root_path))?;

        const PROBE_NAME: &str = ".backend-test-probe";
        let mut probe_data = std::io::Cursor::new(b"ok".to_vec());
        self.put(PROBE_NAME, &mut probe_data, 2, cancel).await?;
        let mut sink = Vec::new();
        self.get(PROBE_NAME, &mut sink, cancel).await?;
        let _ = self.delete(PROBE_NAME, cancel).await;
        if sink != b"ok" {
            return Err(Error::Transport {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                reason: "round-trip mismatch".to_owned(),
                body_snippet: String::new(),
            });
        }
        info!("backend self-test passed");
        Ok(())
    }

    /// `{total, remaining}`, or `None` when the server reports all-zero
    /// quota (some drives misreport).
    pub async fn quota(&self, cancel: &CancellationToken) -> Result<Option<Quota>> {
        let drive = self.drive(cancel).await?;
        let url = drive_url(&drive.api_version, &drive.drive_path);
        let resource: crate::resource::Drive =
            self.pipeline.get_json(&url, self.config.timeouts.short, cancel).await?;
        let Some(quota) = resource.quota else { return Ok(None) };
        let (total, used, remaining) = (
            quota.total.unwrap_or(0),
            quota.used.unwrap_or(0),
            quota.remaining.unwrap_or(0),
        );
        if total == 0 && used == 0 && remaining == 0 {
            Ok(None)
        } else {
            Ok(Some(Quota { total, remaining }))
        }
    }
}

