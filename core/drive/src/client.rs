//! Google Drive API client for folder operations.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;

use drivepick_common::{Error, FolderRecord, Result};

/// Google Drive API base URL.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// MIME type identifying a Drive folder.
const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Response from listing files.
#[derive(Debug, Deserialize)]
struct FileListResponse {
    #[serde(default)]
    files: Vec<FolderRecord>,
}

/// Drive operations the provisioner needs.
///
/// `DriveClient` is the real implementation; tests substitute recording
/// fakes.
#[async_trait]
pub trait DriveApi: Send + Sync {
    /// Find a non-trashed folder whose name exactly matches `name`.
    ///
    /// Returns the first match; duplicate folders with the same name are a
    /// known, undeduplicated edge case.
    async fn find_folder(&self, token: &str, name: &str) -> Result<Option<FolderRecord>>;

    /// Create a folder named `name` in the Drive root.
    async fn create_folder(&self, token: &str, name: &str) -> Result<FolderRecord>;

    /// Grant anyone read access to `folder_id`.
    ///
    /// # Errors
    /// - `SharingRestricted` when the grant is rejected (organizational
    ///   policy may block public ACLs)
    async fn share_public(&self, token: &str, folder_id: &str) -> Result<()>;
}

/// Google Drive API client.
pub struct DriveClient {
    http: Client,
}

impl DriveClient {
    /// Create a new Drive client.
    pub fn new() -> Self {
        let http = Client::builder()
            .user_agent("DrivePick/0.1")
            .build()
            .expect("Failed to create HTTP client");

        Self { http }
    }

    /// Build the lookup query for a folder name.
    ///
    /// Embedded single quotes must be escaped or the query string breaks.
    fn folder_query(name: &str) -> String {
        format!(
            "mimeType='{}' and name='{}' and trashed=false",
            FOLDER_MIME_TYPE,
            name.replace('\'', "\\'")
        )
    }

    /// Turn a non-success response into `Error::Network`.
    async fn error_for(response: reqwest::Response) -> Error {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Error::Network { status, body }
    }
}

impl Default for DriveClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DriveApi for DriveClient {
    async fn find_folder(&self, token: &str, name: &str) -> Result<Option<FolderRecord>> {
        let url = format!("{}/files", DRIVE_API_BASE);
        let query = Self::folder_query(name);

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&[("q", query.as_str()), ("fields", "files(id,name)")])
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Folder lookup failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        let list: FileListResponse = response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("Failed to parse lookup response: {}", e)))?;

        Ok(list.files.into_iter().next())
    }

    async fn create_folder(&self, token: &str, name: &str) -> Result<FolderRecord> {
        let url = format!("{}/files", DRIVE_API_BASE);

        let metadata = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .header(header::CONTENT_TYPE, "application/json")
            .query(&[("fields", "id,name")])
            .json(&metadata)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Folder create failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("Failed to parse create response: {}", e)))
    }

    async fn share_public(&self, token: &str, folder_id: &str) -> Result<()> {
        let url = format!(
            "{}/files/{}/permissions?supportsAllDrives=true",
            DRIVE_API_BASE, folder_id
        );

        let grant = serde_json::json!({
            "role": "reader",
            "type": "anyone",
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&grant)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Share request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::FORBIDDEN {
            Err(Error::SharingRestricted(body))
        } else {
            Err(Error::SharingRestricted(format!("{} - {}", status, body)))
        }
    }
}
