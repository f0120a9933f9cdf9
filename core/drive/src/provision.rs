//! Idempotent provisioning of a shared Drive folder.
//!
//! Provisioning is never fatal: every failure degrades to `None` so the
//! selection flow can proceed without a shared folder, at the cost of
//! derived public URLs possibly not resolving.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use drivepick_common::{Credential, Result};

use crate::client::DriveApi;

/// Folder provisioning options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionConfig {
    /// Known folder ID; when set, lookup/create is skipped entirely.
    #[serde(default)]
    pub folder_id: Option<String>,
    /// Folder name used for lookup and creation.
    pub folder_name: String,
    /// Whether to provision at all. `false` opts out and yields no folder.
    pub ensure_shared: bool,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            folder_id: None,
            folder_name: "DrivePick Public".to_string(),
            ensure_shared: true,
        }
    }
}

/// Ensures a shared, discoverable folder exists, at most once per lifetime.
///
/// The ensure-and-share sequence runs a single time and its result is
/// memoized, even when it degrades to `None`. Sharing failure never
/// invalidates a folder id that was already found or created.
pub struct FolderProvisioner {
    api: Arc<dyn DriveApi>,
    config: ProvisionConfig,
    ensured: OnceCell<Option<String>>,
}

impl FolderProvisioner {
    /// Create a new provisioner.
    pub fn new(api: Arc<dyn DriveApi>, config: ProvisionConfig) -> Self {
        Self {
            api,
            config,
            ensured: OnceCell::new(),
        }
    }

    /// Ensure the configured folder exists and is publicly shared.
    ///
    /// # Postconditions
    /// - Returns the same value on every subsequent call
    /// - Issues no network calls after the first completion
    pub async fn ensure_folder(&self, credential: &Credential) -> Option<String> {
        self.ensured
            .get_or_init(|| self.ensure_inner(credential))
            .await
            .clone()
    }

    async fn ensure_inner(&self, credential: &Credential) -> Option<String> {
        let has_write = credential.has_write_scope();

        // Explicit id: share best-effort, return it regardless.
        if let Some(folder_id) = &self.config.folder_id {
            if self.config.ensure_shared && has_write {
                self.share_best_effort(credential, folder_id).await;
            }
            return Some(folder_id.clone());
        }

        if !self.config.ensure_shared {
            debug!("Folder provisioning disabled by configuration");
            return None;
        }

        if !has_write {
            warn!(
                "Shared-folder provisioning requires the drive.file scope; continuing without a folder"
            );
            return None;
        }

        match self.find_or_create(credential).await {
            Ok(folder_id) => {
                self.share_best_effort(credential, &folder_id).await;
                Some(folder_id)
            }
            Err(e) => {
                warn!("Failed to ensure shared folder: {}", e);
                None
            }
        }
    }

    async fn find_or_create(&self, credential: &Credential) -> Result<String> {
        let name = &self.config.folder_name;

        if let Some(existing) = self.api.find_folder(&credential.token, name).await? {
            debug!(folder_id = %existing.id, "Found existing shared folder");
            return Ok(existing.id);
        }

        let created = self.api.create_folder(&credential.token, name).await?;
        debug!(folder_id = %created.id, "Created shared folder");
        Ok(created.id)
    }

    /// Attempt the public-read grant; the rejection is swallowed because
    /// the folder id is still usable when sharing is blocked.
    async fn share_best_effort(&self, credential: &Credential, folder_id: &str) {
        if let Err(e) = self.api.share_public(&credential.token, folder_id).await {
            warn!(folder_id, "Public sharing may be restricted by policy: {}", e);
        }
    }
}
