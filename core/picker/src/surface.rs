//! Configuration and launch of the provider-hosted selection surface.
//!
//! The surface itself is an opaque external capability; this module only
//! builds its configuration (browse view, optional upload view, bearer
//! token) and adapts its terminal actions into the result channel. The
//! launcher holds no result state of its own.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use drivepick_common::{Credential, Result, SelectionOutcome};

use crate::channel::ResultSink;
use crate::normalize::normalize;

/// Raw provider record handed back by the selection surface.
///
/// `url` is the viewer link in the provider's callback payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDoc {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub web_content_link: Option<String>,
}

/// A view added to the surface, in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceView {
    /// Image browsing, optionally scoped to a folder.
    ImageBrowse { parent: Option<String> },
    /// Upload view scoped to the same folder so uploads inherit its
    /// sharing state.
    Upload { parent: Option<String> },
}

/// Terminal and non-terminal actions reported by the surface.
#[derive(Debug, Clone)]
pub enum SurfaceAction {
    /// The user confirmed a selection.
    Picked(Vec<RawDoc>),
    /// The user dismissed the surface.
    Cancelled,
    /// Any other action (e.g., "loaded"); ignored.
    Other(String),
}

/// Full configuration for one surface display.
#[derive(Debug, Clone)]
pub struct SurfaceConfig {
    /// Provider API key.
    pub api_key: String,
    /// Bearer token for provider requests made by the surface.
    pub oauth_token: String,
    /// Host origin, when the surface needs it (detached hosting).
    pub origin: Option<String>,
    /// Views in display order.
    pub views: Vec<SurfaceView>,
    /// Whether multiple files may be selected.
    pub multiselect: bool,
}

/// Handler invoked for every surface action.
pub type SurfaceHandler = Box<dyn Fn(SurfaceAction) + Send + Sync>;

/// External selection-surface capability.
#[async_trait]
pub trait SelectionSurface: Send + Sync {
    /// Display the surface.
    ///
    /// # Errors
    /// - `ResourceLoad` when the surface script cannot be loaded
    async fn display(&self, config: SurfaceConfig, on_action: SurfaceHandler) -> Result<()>;
}

/// Display options for the launcher.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Scope the browse view to the provisioned folder.
    pub limit_browse_to_folder: bool,
    /// Pixel size embedded in derived display URLs.
    pub display_size: u32,
    /// Whether multiple files may be selected.
    pub multiselect: bool,
    /// Host origin forwarded to the surface, when known.
    pub origin: Option<String>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            limit_browse_to_folder: true,
            display_size: 800,
            multiselect: true,
            origin: None,
        }
    }
}

/// Configures and opens the selection surface.
pub struct SurfaceLauncher {
    surface: Arc<dyn SelectionSurface>,
    api_key: String,
}

impl SurfaceLauncher {
    /// Create a launcher over an injected surface capability.
    pub fn new(surface: Arc<dyn SelectionSurface>, api_key: impl Into<String>) -> Self {
        Self {
            surface,
            api_key: api_key.into(),
        }
    }

    /// Build the ordered view list for a credential and optional folder.
    fn views(
        credential: &Credential,
        folder_id: Option<&str>,
        limit_browse: bool,
    ) -> Vec<SurfaceView> {
        let browse_parent = if limit_browse {
            folder_id.map(String::from)
        } else {
            None
        };

        let mut views = vec![SurfaceView::ImageBrowse {
            parent: browse_parent,
        }];

        // Uploads require the write scope; they target the shared folder so
        // new files inherit its sharing grant.
        if credential.has_write_scope() {
            views.push(SurfaceView::Upload {
                parent: folder_id.map(String::from),
            });
        }

        views
    }

    /// Display the surface and wire its terminal actions into `sink`.
    ///
    /// # Preconditions
    /// - Folder provisioning has already completed (or degraded), so the
    ///   upload view never references a not-yet-created folder
    pub async fn open(
        &self,
        credential: &Credential,
        folder_id: Option<&str>,
        options: &LaunchOptions,
        sink: Arc<dyn ResultSink>,
    ) -> Result<()> {
        let config = SurfaceConfig {
            api_key: self.api_key.clone(),
            oauth_token: credential.token.clone(),
            origin: options.origin.clone(),
            views: Self::views(credential, folder_id, options.limit_browse_to_folder),
            multiselect: options.multiselect,
        };

        let display_size = options.display_size;
        let handler: SurfaceHandler = Box::new(move |action| match action {
            SurfaceAction::Picked(docs) => {
                let files = docs.iter().map(|d| normalize(d, display_size)).collect();
                sink.deliver(SelectionOutcome::Picked(files));
            }
            SurfaceAction::Cancelled => {
                sink.deliver(SelectionOutcome::Cancelled);
            }
            SurfaceAction::Other(action) => {
                debug!(action, "Ignoring non-terminal surface action");
            }
        });

        self.surface.display(config, handler).await
    }
}
