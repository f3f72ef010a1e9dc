//! # File Reference Model
//!
//! Identity and descriptive attributes of one physical input file.
//!
//! A [`FileReference`] is the `(product, filename)` pair used as the key for
//! in-flight processing tracking. Two references compare equal when both the
//! product identifier and filename match, regardless of where the file was
//! picked up from.

use serde::{Deserialize, Serialize};
use std::fmt;

use chrono::{DateTime, Utc};

/// Immutable `(product_id, filename)` identity of one input file.
///
/// Used as the registry key by
/// [`ProcessingState`](crate::processing::ProcessingState); must be unique per
/// concurrently-processed file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileReference {
    product_id: String,
    filename: String,
}

impl FileReference {
    pub fn new(product_id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            filename: filename.into(),
        }
    }

    /// Identifier of the aviation product this file belongs to.
    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }
}

impl fmt::Display for FileReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.product_id, self.filename)
    }
}

/// Descriptive attributes of one input file as delivered by the file watcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Identity of the file within the archiver.
    pub file_reference: FileReference,
    /// Name of the file format the product is configured with (e.g. `TAC`).
    pub format: String,
    /// Filesystem modification time, when known.
    pub file_modified: Option<DateTime<Utc>>,
}

impl FileMetadata {
    pub fn new(
        file_reference: FileReference,
        format: impl Into<String>,
        file_modified: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            file_reference,
            format: format.into(),
            file_modified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_reference_equality_is_by_value() {
        let a = FileReference::new("taf", "TAF_20260823_120000.txt");
        let b = FileReference::new("taf", "TAF_20260823_120000.txt");
        let c = FileReference::new("metar", "TAF_20260823_120000.txt");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn file_reference_displays_product_and_filename() {
        let reference = FileReference::new("taf", "bulletin.txt");
        assert_eq!(reference.to_string(), "taf/bulletin.txt");
    }
}
