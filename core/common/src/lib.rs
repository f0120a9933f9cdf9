//! Common types shared across DrivePick modules.
//!
//! This module provides the error taxonomy and the data model used by the
//! credential, provisioning and selection layers.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{Credential, FolderRecord, PickedFile, SelectionOutcome, DRIVE_FILE_SCOPE};
