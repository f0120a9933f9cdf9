//! Normalization of raw provider records into `PickedFile` values.
//!
//! Pure and deterministic; no network access. The derived URLs are keyed
//! only by the file id (plus a pixel size for the display URL) and are
//! display hints, not authoritative links.

use drivepick_common::PickedFile;

use crate::surface::RawDoc;

/// Direct-content URL for a Drive file id.
pub fn public_content_url(id: &str) -> String {
    format!(
        "https://drive.usercontent.google.com/uc?id={}&export=view",
        id
    )
}

/// Sized-thumbnail URL for a Drive file id.
pub fn display_url(id: &str, size: u32) -> String {
    format!("https://drive.google.com/thumbnail?id={}&sz=w{}", id, size)
}

/// Map a raw provider record to the stable result shape.
pub fn normalize(doc: &RawDoc, display_size: u32) -> PickedFile {
    PickedFile {
        id: doc.id.clone(),
        name: doc.name.clone(),
        mime_type: doc.mime_type.clone(),
        thumbnail_url: doc.thumbnail_url.clone(),
        web_view_link: doc.url.clone(),
        web_content_link: doc.web_content_link.clone(),
        public_url: Some(public_content_url(&doc.id)),
        display_url: display_url(&doc.id, display_size),
    }
}
