//! Walks a root path, creating each missing segment via POST.

use std::sync::Arc;

use reqwest::Method;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::Timeouts;
use crate::error::{Error, Result};
use crate::pipeline::Pipeline;
use crate::resolver::ResolvedDrive;
use crate::resource::{CreateFolderRequest, DriveItem, FolderFacet};
use crate::url_builder::{folder_children_url, item_metadata_url};

/// Ensure every segment of `drive.root_path` exists under `drive.drive_path`,
/// creating any that are missing. Returns the id of the final (deepest)
/// folder.
pub async fn ensure_root_path(
    pipeline: &Pipeline,
    drive: &ResolvedDrive,
    timeouts: &Timeouts,
    cancel: &CancellationToken,
) -> Result<Option<String>> {
    let segments: Vec<&str> = drive.root_path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Ok(None);
    }

    let mut parent_id: Option<String> = None;
    let mut prefix = String::new();
    for segment in segments {
        prefix.push('/');
        prefix.push_str(segment);

        let url = item_metadata_url(&drive.api_version, &drive.drive_path, "", &prefix);
        let existing = pipeline
            .get_json::<DriveItem>(&url, timeouts.short, cancel)
            .await;

        match existing {
            Ok(item) => {
                parent_id = item.id;
            }
            Err(Error::ItemNotFound) => {
                debug!(segment, "creating missing folder segment");
                let create_url = match &parent_id {
                    Some(id) => folder_children_url(&drive.api_version, &drive.drive_path, id),
                    None => format!(
                        "{}{}/root/children",
                        drive.api_version, drive.drive_path
                    ),
                };
                let body = CreateFolderRequest {
                    name: segment,
                    folder: FolderFacet::default(),
                };
                let created: DriveItem = pipeline
                    .send_json(Method::POST, &create_url, &body, timeouts.short, cancel)
                    .await?;
                parent_id = created.id;
            }
            Err(other) => return Err(other),
        }
    }

    Ok(parent_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::throttle::ThrottleGate;
    use crate::token::StaticTokenProvider;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn pipeline() -> Pipeline {
        Pipeline::new(
            reqwest::Client::new(),
            Arc::new(ThrottleGate::new()),
            Arc::new(StaticTokenProvider::new("t")),
            "auth".into(),
            "msgraph".into(),
        )
    }

    #[tokio::test]
    async fn creates_missing_segment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.0/me/drive/root:/backup"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": {"code": "itemNotFound", "message": "not found"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1.0/me/drive/root/children"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "NEWID", "name": "backup", "folder": {}
            })))
            .mount(&server)
            .await;

        let pipeline = pipeline();
        let drive = ResolvedDrive {
            api_version: format!("{}/v1.0", server.uri()),
            drive_path: "/me/drive".to_owned(),
            root_path: "/backup".to_owned(),
        };
        let id = ensure_root_path(&pipeline, &drive, &Timeouts::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(id.as_deref(), Some("NEWID"));
    }
}
