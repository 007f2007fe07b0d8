//! Pure functions producing Graph request URLs from the drive prefix, the
//! logical root path, and a remote file name. No I/O.

/// Normalize a user-supplied path fragment: `\` becomes `/`, a leading `/`
/// is ensured for non-empty input, and any trailing `/` is stripped. The
/// empty string normalizes to itself.
pub fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }
    let mut out = path.replace('\\', "/");
    if !out.starts_with('/') {
        out.insert(0, '/');
    }
    while out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

/// Upload/download/children/createUploadSession verbs for a named file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verb {
    Content,
    Children,
    CreateUploadSession,
}

impl Verb {
    fn as_str(self) -> &'static str {
        match self {
            Verb::Content => "content",
            Verb::Children => "children",
            Verb::CreateUploadSession => "createUploadSession",
        }
    }
}

/// `{apiVersion}{drivePath}/root:{rootPath}{normalizedName}:/{verb}`
pub fn remote_file_url(api_version: &str, drive_path: &str, root_path: &str, name: &str, verb: Verb) -> String {
    let name = normalize_path(name);
    format!(
        "{api_version}{drive_path}/root:{root_path}{name}:/{verb}",
        verb = verb.as_str()
    )
}

/// Same as [`remote_file_url`] but without the `:/{verb}` suffix, for item
/// metadata requests.
pub fn item_metadata_url(api_version: &str, drive_path: &str, root_path: &str, name: &str) -> String {
    let name = normalize_path(name);
    format!("{api_version}{drive_path}/root:{root_path}{name}")
}

/// Item metadata URL for the root path itself (no trailing file name).
pub fn root_item_url(api_version: &str, drive_path: &str, root_path: &str) -> String {
    format!("{api_version}{drive_path}/root:{root_path}")
}

/// Children listing URL for the root path.
pub fn root_children_url(api_version: &str, drive_path: &str, root_path: &str) -> String {
    format!("{api_version}{drive_path}/root:{root_path}:/children")
}

/// `{apiVersion}{drivePath}/items/{parentId}/children`
pub fn folder_children_url(api_version: &str, drive_path: &str, parent_id: &str) -> String {
    format!("{api_version}{drive_path}/items/{parent_id}/children")
}

/// `{apiVersion}{drivePath}` — drive resource (used for quota).
pub fn drive_url(api_version: &str, drive_path: &str) -> String {
    format!("{api_version}{drive_path}")
}
