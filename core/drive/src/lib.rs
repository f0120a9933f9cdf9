//! Google Drive REST access for DrivePick.
//!
//! This module provides a thin Drive v3 client for the folder operations
//! the picker needs (lookup, create, public share) and the idempotent
//! folder provisioner built on top of it.
//!
//! # Design Principles
//! - Trait seam: the provisioner depends on `DriveApi`, not on reqwest,
//!   so it is testable with fake clients
//! - Degradation over failure: provisioning never aborts the flow

pub mod client;
pub mod provision;

pub use client::{DriveApi, DriveClient};
pub use provision::{FolderProvisioner, ProvisionConfig};
