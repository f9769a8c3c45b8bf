// File metadata lookups

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{ClientError, Result};
use crate::transport::{ApiRequest, Transport};
use crate::types::{null_as_default, ItemParent, User};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileVersion {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sha1: String,
}

/// One folder in a file's path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default)]
    pub sequence_id: Option<String>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathCollection {
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_count: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub entries: Vec<FileEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SharedLinkPermissions {
    #[serde(default, deserialize_with = "null_as_default")]
    pub can_download: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub can_preview: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SharedLink {
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub vanity_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_password_enabled: bool,
    #[serde(default)]
    pub unshared_at: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub download_count: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub preview_count: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub access: String,
    #[serde(default)]
    pub permissions: Option<SharedLinkPermissions>,
}

/// File metadata as returned by `GET /files/{id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct File {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default)]
    pub file_version: Option<FileVersion>,
    #[serde(default)]
    pub sequence_id: Option<String>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sha1: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub size: u64,
    #[serde(default)]
    pub path_collection: Option<PathCollection>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub modified_at: String,
    #[serde(default)]
    pub created_by: Option<User>,
    #[serde(default)]
    pub modified_by: Option<User>,
    #[serde(default)]
    pub owned_by: Option<User>,
    #[serde(default)]
    pub shared_link: Option<SharedLink>,
    #[serde(default)]
    pub parent: Option<ItemParent>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub item_status: String,
}

/// File operations
#[derive(Debug, Clone)]
pub struct FileService {
    transport: Transport,
}

impl FileService {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    /// Fetch a file's metadata (single attempt)
    #[instrument(skip(self))]
    pub async fn get_file(&self, file_id: &str) -> Result<File> {
        self.transport.send(&file_request(file_id)?).await
    }

    /// SHA-1 of the file's current version
    pub async fn get_file_hash(&self, file_id: &str) -> Result<String> {
        Ok(self.get_file(file_id).await?.sha1)
    }
}

fn file_request(file_id: &str) -> Result<ApiRequest> {
    if file_id.is_empty() || !file_id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ClientError::config(format!("invalid file id: {:?}", file_id)));
    }
    Ok(ApiRequest::get(format!("/files/{}", file_id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_request() {
        assert_eq!(file_request("12345").unwrap().path(), "/files/12345");
        assert!(file_request("").is_err());
        assert!(file_request("../users").is_err());
    }

    #[test]
    fn test_decode_file() {
        let file: File = serde_json::from_str(
            r#"{
                "type": "file",
                "id": "12345",
                "file_version": {"type": "file_version", "id": "v1", "sha1": "abc"},
                "sequence_id": "3",
                "etag": "3",
                "sha1": "85136c79cbf9fe36bb9d05d0639c70c265c18d37",
                "name": "Contract.pdf",
                "description": null,
                "size": 629644,
                "path_collection": {
                    "total_count": 1,
                    "entries": [{"type": "folder", "id": "0", "sequence_id": null, "etag": null, "name": "All Files"}]
                },
                "created_by": {"type": "user", "id": "1", "name": "Ada", "login": "ada@example.com"},
                "shared_link": {
                    "url": "https://app.box.com/s/x",
                    "download_url": null,
                    "vanity_url": null,
                    "is_password_enabled": false,
                    "unshared_at": null,
                    "download_count": 3,
                    "preview_count": 5,
                    "access": "open",
                    "permissions": {"can_download": true, "can_preview": true}
                },
                "parent": {"type": "folder", "id": "0", "name": "All Files"},
                "item_status": "active"
            }"#,
        )
        .unwrap();

        assert_eq!(file.sha1, "85136c79cbf9fe36bb9d05d0639c70c265c18d37");
        assert_eq!(file.description, "");
        assert_eq!(file.size, 629644);
        assert_eq!(file.path_collection.unwrap().entries[0].name, "All Files");
        let link = file.shared_link.unwrap();
        assert_eq!(link.download_count, 3);
        assert!(link.permissions.unwrap().can_download);
        assert_eq!(file.file_version.unwrap().id, "v1");
    }
}
