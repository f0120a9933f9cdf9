//! Core data model: credentials, folder records and picked files.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Write-capable Drive scope. Its presence gates folder provisioning and
/// the upload view.
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// Short-lived bearer credential for provider API calls.
///
/// Exactly one credential is current per activation; it is held in memory
/// only and never persisted or refreshed.
#[derive(Debug, Clone)]
pub struct Credential {
    /// Bearer access token.
    pub token: String,
    /// Granted scopes, split from the space-separated scope string.
    pub scope_set: BTreeSet<String>,
    /// When the token was acquired.
    pub acquired_at: DateTime<Utc>,
}

impl Credential {
    /// Build a credential from an access token and a space-separated scope
    /// string.
    pub fn new(token: impl Into<String>, scopes: &str) -> Self {
        Self {
            token: token.into(),
            scope_set: scopes.split_whitespace().map(String::from).collect(),
            acquired_at: Utc::now(),
        }
    }

    /// Exact-token scope membership check.
    ///
    /// Deliberately not a substring or prefix match: `drive.file` must not
    /// be inferred from `drive.file.readonly` or similar related scopes.
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope_set.contains(scope)
    }

    /// Whether the credential carries the write-capable scope.
    pub fn has_write_scope(&self) -> bool {
        self.has_scope(DRIVE_FILE_SCOPE)
    }
}

/// A discoverable storage folder that can carry a sharing grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderRecord {
    /// Provider-assigned folder ID.
    pub id: String,
    /// Folder name.
    pub name: String,
}

/// A file selected by the user, normalized into a stable shape.
///
/// `id` is the only stable identity; the URL fields are derived for display
/// purposes and may resolve to inaccessible content if public sharing was
/// not actually granted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickedFile {
    /// Provider-unique file ID.
    pub id: String,
    /// File name.
    pub name: String,
    /// MIME type.
    pub mime_type: String,
    /// Provider thumbnail, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Viewer link, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_view_link: Option<String>,
    /// Direct content link, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_content_link: Option<String>,
    /// Derived direct-content URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
    /// Derived sized-thumbnail URL.
    pub display_url: String,
}

/// Outcome of one selection activation: a non-empty selection or a
/// cancellation signal, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// The user picked one or more files.
    Picked(Vec<PickedFile>),
    /// The user cancelled, or the selection surface went away.
    Cancelled,
}
