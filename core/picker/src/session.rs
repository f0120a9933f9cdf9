//! Activation orchestration: credential, folder, surface, in that order.
//!
//! One session instance owns the memoized folder id and the initialized
//! authorization capability. Each activation requests a fresh credential,
//! waits for provisioning to complete (or degrade) and only then opens the
//! surface, so the upload view can never reference a folder that does not
//! exist yet.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use drivepick_common::Result;
use drivepick_drive::{DriveApi, FolderProvisioner, ProvisionConfig};

use crate::broker::{BrokerConfig, CredentialBroker, TokenClient};
use crate::channel::ResultSink;
use crate::surface::{LaunchOptions, SelectionSurface, SurfaceLauncher};

/// Host-supplied picker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickerConfig {
    /// Provider API key.
    pub api_key: String,
    /// OAuth client identifier.
    pub client_id: String,
    /// Space-separated scope string.
    pub scopes: String,
    /// Known folder id, when the host already has one.
    #[serde(default)]
    pub folder_id: Option<String>,
    /// Folder name used for lookup/creation.
    #[serde(default = "default_folder_name")]
    pub folder_name: String,
    /// Provision (find/create + share) a public folder.
    #[serde(default = "default_true")]
    pub ensure_shared_folder: bool,
    /// Scope the browse view to the provisioned folder.
    #[serde(default = "default_true")]
    pub limit_browse_to_folder: bool,
    /// Pixel size for derived display URLs.
    #[serde(default = "default_display_size")]
    pub display_size: u32,
    /// Allow selecting multiple files.
    #[serde(default = "default_true")]
    pub multiselect: bool,
    /// Host origin forwarded to the surface, when known.
    #[serde(default)]
    pub origin: Option<String>,
}

fn default_folder_name() -> String {
    "DrivePick Public".to_string()
}

fn default_true() -> bool {
    true
}

fn default_display_size() -> u32 {
    800
}

/// One picker component instance.
///
/// Lives as long as the host keeps it mounted; activations share the
/// broker's initialization and the provisioner's memoized folder id, but
/// every activation acquires a fresh credential.
pub struct PickerSession {
    config: PickerConfig,
    broker: CredentialBroker,
    provisioner: FolderProvisioner,
    launcher: SurfaceLauncher,
}

impl PickerSession {
    /// Assemble a session from its injected capabilities.
    pub fn new(
        config: PickerConfig,
        token_client: Arc<dyn TokenClient>,
        drive: Arc<dyn DriveApi>,
        surface: Arc<dyn SelectionSurface>,
    ) -> Self {
        let broker = CredentialBroker::new(
            token_client,
            BrokerConfig::new(config.client_id.as_str(), config.scopes.as_str()),
        );
        let provisioner = FolderProvisioner::new(
            drive,
            ProvisionConfig {
                folder_id: config.folder_id.clone(),
                folder_name: config.folder_name.clone(),
                ensure_shared: config.ensure_shared_folder,
            },
        );
        let launcher = SurfaceLauncher::new(surface, config.api_key.as_str());

        Self {
            config,
            broker,
            provisioner,
            launcher,
        }
    }

    /// Run one activation: acquire a credential, ensure the folder, open
    /// the surface wired to `sink`.
    ///
    /// # Errors
    /// - `AuthTimeout`, `AuthDenied`, `ResourceLoad` — fatal to the
    ///   activation and surfaced to the host. Provisioning failures never
    ///   propagate; the flow continues without a folder.
    pub async fn activate(&self, sink: Arc<dyn ResultSink>) -> Result<()> {
        let credential = self.broker.acquire().await?;

        let folder_id = self.provisioner.ensure_folder(&credential).await;
        info!(folder = ?folder_id, "Opening selection surface");

        let options = LaunchOptions {
            limit_browse_to_folder: self.config.limit_browse_to_folder,
            display_size: self.config.display_size,
            multiselect: self.config.multiselect,
            origin: self.config.origin.clone(),
        };

        self.launcher
            .open(&credential, folder_id.as_deref(), &options, sink)
            .await
    }
}
