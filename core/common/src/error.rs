//! Common error types for DrivePick.

use thiserror::Error;

/// Top-level error type for DrivePick operations.
///
/// Only `AuthTimeout`, `AuthDenied` and `ResourceLoad` ever end an
/// activation; provisioning and sharing errors are caught at their call
/// sites and degrade the flow instead of propagating.
#[derive(Debug, Error)]
pub enum Error {
    /// Credential acquisition exceeded its wait bound.
    #[error("Authorization timed out after {0} seconds")]
    AuthTimeout(u64),

    /// The user declined the authorization prompt.
    #[error("Authorization denied: {0}")]
    AuthDenied(String),

    /// A required external capability failed to load or initialize.
    #[error("Resource load failure: {0}")]
    ResourceLoad(String),

    /// Provider API returned a non-success status.
    #[error("Network error: {status} - {body}")]
    Network { status: u16, body: String },

    /// Request could not be sent or the response could not be read.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Public-sharing grant was rejected (e.g., by organizational policy).
    #[error("Sharing restricted: {0}")]
    SharingRestricted(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Whether this error should end the activation when surfaced to the
    /// host. Everything else degrades gracefully.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::AuthTimeout(_) | Error::AuthDenied(_) | Error::ResourceLoad(_)
        )
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
