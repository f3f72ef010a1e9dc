//! # Archiver Data Model
//!
//! Value types flowing through the message processing pipeline.
//!
//! ## Overview
//!
//! The model layer is split along the pipeline's data flow:
//!
//! - **[`FileReference`] / [`FileMetadata`]**: identity and descriptive
//!   attributes of one physical input file. `FileReference` is the key used
//!   by the in-flight processing registry.
//! - **[`InputAviationMessage`]**: one parsed weather message together with
//!   its originating bulletin and file context. Immutable once parsed and
//!   shared read-only across the populator chain.
//! - **[`ArchiveAviationMessage`] / [`ArchiveAviationMessageBuilder`]**: the
//!   progressively-built output record destined for the database. Every
//!   builder field is an explicit `Option`; probing an unset field returns
//!   `None`, never panics, so activation conditions can inspect a partially
//!   built record mid-chain.
//! - **[`MessageFields`]**: read accessor trait implemented by both the
//!   builder and the final message, letting condition property readers run
//!   against either side of the build boundary.

pub mod archive_message;
pub mod file_reference;
pub mod input_message;

pub use archive_message::{
    ArchivalStatus, ArchiveAviationMessage, ArchiveAviationMessageBuilder, MessageFields,
    ProcessingResult, RejectReason,
};
pub use file_reference::{FileMetadata, FileReference};
pub use input_message::{InputAviationMessage, InputBulletinHeading, MessagePositionInFile};
