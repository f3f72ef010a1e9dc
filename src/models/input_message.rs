//! # Input Message Model
//!
//! One parsed weather message plus its originating file and bulletin context.
//!
//! Instances are created once by the parser collaborator and never mutated;
//! the populator chain reads them concurrently across files without locking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::file_reference::FileMetadata;

/// Position of a message inside its input file.
///
/// Bulletin and message indexes are zero-based; together with the file
/// reference they identify one message unambiguously in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePositionInFile {
    pub bulletin_index: usize,
    pub message_index: usize,
}

impl MessagePositionInFile {
    pub fn new(bulletin_index: usize, message_index: usize) -> Self {
        Self {
            bulletin_index,
            message_index,
        }
    }
}

/// GTS bulletin heading under which a message arrived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputBulletinHeading {
    /// Abbreviated heading line, e.g. `FTFI31 EFKL 230900`.
    pub heading: String,
    /// IWXXM collect identifier, when the bulletin carried one.
    pub collect_identifier: Option<String>,
}

/// One parsed aviation weather message with its file and bulletin context.
///
/// All parsed attributes are optional: the TAC parser surfaces whatever it
/// could extract and the populator chain decides what is mandatory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputAviationMessage {
    /// Raw message text as it appeared in the bulletin.
    pub content: String,
    /// Parsed message type name, e.g. `TAF`, `METAR`, `SIGMET`.
    pub message_type: Option<String>,
    /// ICAO location indicator of the issuing aerodrome or centre.
    pub location_indicator: Option<String>,
    /// Message issue time.
    pub issue_time: Option<DateTime<Utc>>,
    /// Start of the message validity period.
    pub valid_from: Option<DateTime<Utc>>,
    /// End of the message validity period.
    pub valid_to: Option<DateTime<Utc>>,
    /// Message version token (e.g. amendment/correction indicator).
    pub version: Option<String>,
    /// Heading of the bulletin the message arrived under.
    pub heading: Option<InputBulletinHeading>,
    /// Position of this message within the input file.
    pub position: MessagePositionInFile,
    /// Metadata of the file the message was read from.
    pub file_metadata: FileMetadata,
}

impl InputAviationMessage {
    /// Convenience constructor carrying only the mandatory context; parsed
    /// attributes start unset and are filled by the parser.
    pub fn new(
        content: impl Into<String>,
        position: MessagePositionInFile,
        file_metadata: FileMetadata,
    ) -> Self {
        Self {
            content: content.into(),
            message_type: None,
            location_indicator: None,
            issue_time: None,
            valid_from: None,
            valid_to: None,
            version: None,
            heading: None,
            position,
            file_metadata,
        }
    }
}
