//! Message parsing contract.
//!
//! Parsing TAC bulletins is delegated to an external collaborator; the
//! pipeline only depends on this trait. A file whose content fails to parse
//! is routed to the failure directory without entering the populator chain.

use thiserror::Error;

use crate::models::{FileMetadata, InputAviationMessage};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed file content: {message}")]
    Malformed { message: String },

    #[error("unsupported file format: {format}")]
    UnsupportedFormat { format: String },
}

impl ParseError {
    pub fn malformed(message: impl Into<String>) -> Self {
        ParseError::Malformed {
            message: message.into(),
        }
    }
}

/// Parses one file's raw content into its constituent messages.
pub trait MessageParser: Send + Sync {
    fn parse(
        &self,
        content: &[u8],
        metadata: &FileMetadata,
    ) -> Result<Vec<InputAviationMessage>, ParseError>;
}
