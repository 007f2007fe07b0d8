//! Lazy, memoized, single-shot resolution of the drive prefix and logical
//! root path from the user-supplied backup root URL.

use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{Error, Result};
use crate::url_builder::normalize_path;

/// `{apiVersion, drivePath, rootPath}`, resolved once and cached for the
/// lifetime of the backend instance.
#[derive(Debug, Clone)]
pub struct ResolvedDrive {
    pub api_version: String,
    pub drive_path: String,
    pub root_path: String,
}

/// A function that, given the backup root URL, determines `{apiVersion,
/// drivePath}` — possibly making a network call (e.g. resolving a SharePoint
/// site to a drive id). Protocol-specific subclasses supply this; it is out
/// of the core's scope to know how. Takes `cancel` since that network call
/// is I/O like any other.
pub trait DrivePathResolver: Send + Sync {
    fn resolve<'a>(
        &'a self,
        root_url: &'a str,
        cancel: &'a CancellationToken,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(String, String)>> + Send + 'a>>;
}

/// Resolves `{apiVersion, drivePath}` to a fixed pair, for callers who
/// already know them (e.g. `/me/drive`) and tests.
pub struct FixedDrivePath {
    pub api_version: String,
    pub drive_path: String,
}

impl DrivePathResolver for FixedDrivePath {
    fn resolve<'a>(
        &'a self,
        _root_url: &'a str,
        _cancel: &'a CancellationToken,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(String, String)>> + Send + 'a>> {
        Box::pin(async move { Ok((self.api_version.clone(), self.drive_path.clone())) })
    }
}

pub struct DriveResolver {
    root_url: String,
    path_resolver: Box<dyn DrivePathResolver>,
    cell: OnceCell<ResolvedDrive>,
}

impl DriveResolver {
    pub fn new(root_url: String, path_resolver: Box<dyn DrivePathResolver>) -> Self {
        Self {
            root_url,
            path_resolver,
            cell: OnceCell::new(),
        }
    }

    /// Resolve, or return the memoized result. Concurrent first callers
    /// share a single resolution attempt via [`OnceCell::get_or_try_init`].
    /// Cancelling while that attempt is in flight aborts this caller's wait
    /// without poisoning the cell: a dropped initializing future lets the
    /// next caller retry.
    pub async fn resolve(&self, cancel: &CancellationToken) -> Result<&ResolvedDrive> {
        if let Some(resolved) = self.cell.get() {
            return Ok(resolved);
        }
        tokio::select! {
            () = cancel.cancelled() => Err(Error::Cancelled),
            result = self.cell.get_or_try_init(|| async {
                let (api_version, drive_path) = self.path_resolver.resolve(&self.root_url, cancel).await?;
                let root_path = root_path_from_url(&self.root_url);
                Ok(ResolvedDrive {
                    api_version,
                    drive_path,
                    root_path,
                })
            }) => result,
        }
    }
}

/// Extract the path component of the backup root URL, URL-decode it, and
/// pass it through the URL builder's normalization.
fn root_path_from_url(root_url: &str) -> String {
    let decoded = Url::parse(root_url)
        .map(|u| {
            percent_encoding::percent_decode_str(u.path())
                .decode_utf8_lossy()
                .into_owned()
        })
        .unwrap_or_else(|_| root_url.to_owned());
    normalize_path(&decoded)
}
