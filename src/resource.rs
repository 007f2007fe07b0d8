//! Wire types consumed at the Graph API boundary. Only the fields the core
//! actually reads are modeled; everything else is ignored by serde.

use serde::{Deserialize, Serialize};

/// Facet present on file items; an empty object marks "this item is a file".
#[derive(Debug, Clone, Deserialize, Default)]
pub struct FileFacet {}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Deleted {
    pub state: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FileSystemInfo {
    pub last_accessed_date_time: Option<String>,
    pub last_modified_date_time: Option<String>,
}

/// Facet present on folder items; an empty object marks "this item is a
/// folder" when reading, and is sent as `{}` when creating one.
#[derive(Debug, Clone, Default)]
pub struct FolderFacet {}

impl<'de> Deserialize<'de> for FolderFacet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        serde::de::IgnoredAny::deserialize(deserializer)?;
        Ok(FolderFacet {})
    }
}

impl Serialize for FolderFacet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        serializer.serialize_struct("FolderFacet", 0)?.end()
    }
}

/// A Graph `driveItem` resource, narrowed to the fields SPEC_FULL §3 names.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    pub id: Option<String>,
    pub name: Option<String>,
    pub size: Option<i64>,
    pub file: Option<FileFacet>,
    pub folder: Option<FolderFacet>,
    pub deleted: Option<Deleted>,
    pub file_system_info: Option<FileSystemInfo>,
    pub last_modified_date_time: Option<String>,
}

impl DriveItem {
    pub fn is_file(&self) -> bool {
        self.file.is_some()
    }

    pub fn is_folder(&self) -> bool {
        self.folder.is_some()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.is_some()
    }
}

/// `{total, used, remaining}` from the drive resource's `quota` facet.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Quota {
    pub total: Option<i64>,
    pub used: Option<i64>,
    pub remaining: Option<i64>,
}

/// Drive resource; only the fields the quota operation consumes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Drive {
    pub id: Option<String>,
    pub quota: Option<Quota>,
}

/// `{value: T[], "@odata.nextLink": string?}`
#[derive(Debug, Clone, Deserialize)]
pub struct GraphCollection<T> {
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

/// Graph's standard error envelope, used only to enrich diagnostics.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ErrorObject {
    pub code: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorObject,
}

/// Request body for `POST …/createUploadSession`.
#[derive(Debug, Serialize)]
pub(crate) struct CreateUploadSessionRequest {
    pub item: CreateUploadSessionItem,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateUploadSessionItem {
    #[serde(rename = "@microsoft.graph.conflictBehavior")]
    pub conflict_behavior: &'static str,
}

/// Response from `createUploadSession`, and from each non-final fragment
/// PUT while the session is still active.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSessionResponse {
    pub upload_url: Option<String>,
    #[serde(default)]
    pub next_expected_ranges: Vec<String>,
    pub expiration_date_time: Option<String>,
}

/// Body for a folder-creation POST.
#[derive(Debug, Serialize)]
pub(crate) struct CreateFolderRequest<'a> {
    pub name: &'a str,
    pub folder: FolderFacet,
}

/// Body for a rename PATCH.
#[derive(Debug, Serialize)]
pub(crate) struct RenameRequest<'a> {
    pub name: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drive_item_classification() {
        let item: DriveItem = serde_json::from_str(
            r#"{"id":"1","name":"a.bin","size":256,"file":{}}"#,
        )
        .unwrap();
        assert!(item.is_file());
        assert!(!item.is_folder());
    }

    #[test]
    fn collection_without_next_link() {
        let coll: GraphCollection<DriveItem> =
            serde_json::from_str(r#"{"value":[{"id":"1"}]}"#).unwrap();
        assert_eq!(coll.value.len(), 1);
        assert!(coll.next_link.is_none());
    }
}
