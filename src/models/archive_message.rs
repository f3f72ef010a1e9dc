//! # Archive Message Model
//!
//! The progressively-built output record destined for the database.
//!
//! ## Partial-build tolerance
//!
//! The populator chain fills an [`ArchiveAviationMessageBuilder`] one step at
//! a time. Activation conditions probe the builder between steps, so every
//! field is an explicit `Option` and reading an unset field returns `None`
//! rather than panicking. `build()` is infallible; mandatory-field
//! enforcement (station id) happens at database insertion.
//!
//! ## Processing result vs archival status
//!
//! [`ProcessingResult`] is decided by the populator chain (`Ok` or
//! `Rejected` with a reason code) and stored with the record.
//! [`ArchivalStatus`] is the terminal classification assigned by the
//! pipeline once persistence has been attempted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reason code for a message rejected by the populator chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    /// Station ICAO code not present in the station table.
    UnknownStationIcaoCode,
    /// Message time is further in the future than the configured maximum.
    MessageTimeInFuture,
    /// Message type is not allowed for the product it arrived under.
    ForbiddenMessageType,
}

impl RejectReason {
    /// Numeric code stored in the rejected-message table.
    pub fn code(&self) -> i32 {
        match self {
            RejectReason::UnknownStationIcaoCode => 1,
            RejectReason::MessageTimeInFuture => 2,
            RejectReason::ForbiddenMessageType => 3,
        }
    }
}

/// Outcome of the populator chain for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ProcessingResult {
    /// Message is valid and goes to the primary message table.
    #[default]
    Ok,
    /// Message is stored in the rejected-message table with a reason code.
    Rejected(RejectReason),
}

impl ProcessingResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, ProcessingResult::Ok)
    }
}

/// Terminal classification of a message after the pipeline has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchivalStatus {
    /// Persisted into the primary message table.
    Archived,
    /// Persisted into the rejected-message table.
    Rejected,
    /// Intentionally excluded from persistence by a populator.
    Discarded,
    /// Processing or persistence failed; nothing was stored.
    Failed,
}

impl ArchivalStatus {
    /// Whether a row for this message exists in the database. Only persisted
    /// messages are eligible for post-actions.
    pub fn is_persisted(&self) -> bool {
        matches!(self, ArchivalStatus::Archived | ArchivalStatus::Rejected)
    }
}

/// Read access to archive message fields, implemented by both the builder and
/// the built message so condition property readers can run mid-chain and
/// post-persistence alike.
pub trait MessageFields {
    fn route_id(&self) -> Option<i32>;
    fn format_id(&self) -> Option<i32>;
    fn type_id(&self) -> Option<i32>;
    fn message_time(&self) -> Option<DateTime<Utc>>;
    fn station_id(&self) -> Option<i32>;
    fn station_icao_code(&self) -> Option<&str>;
    fn message(&self) -> Option<&str>;
    fn valid_from(&self) -> Option<DateTime<Utc>>;
    fn valid_to(&self) -> Option<DateTime<Utc>>;
    fn version(&self) -> Option<&str>;
    fn heading(&self) -> Option<&str>;
    fn file_modified(&self) -> Option<DateTime<Utc>>;
    fn processing_result(&self) -> ProcessingResult;
}

macro_rules! impl_message_fields {
    ($target:ty) => {
        impl MessageFields for $target {
            fn route_id(&self) -> Option<i32> {
                self.route_id
            }
            fn format_id(&self) -> Option<i32> {
                self.format_id
            }
            fn type_id(&self) -> Option<i32> {
                self.type_id
            }
            fn message_time(&self) -> Option<DateTime<Utc>> {
                self.message_time
            }
            fn station_id(&self) -> Option<i32> {
                self.station_id
            }
            fn station_icao_code(&self) -> Option<&str> {
                self.station_icao_code.as_deref()
            }
            fn message(&self) -> Option<&str> {
                self.message.as_deref()
            }
            fn valid_from(&self) -> Option<DateTime<Utc>> {
                self.valid_from
            }
            fn valid_to(&self) -> Option<DateTime<Utc>> {
                self.valid_to
            }
            fn version(&self) -> Option<&str> {
                self.version.as_deref()
            }
            fn heading(&self) -> Option<&str> {
                self.heading.as_deref()
            }
            fn file_modified(&self) -> Option<DateTime<Utc>> {
                self.file_modified
            }
            fn processing_result(&self) -> ProcessingResult {
                self.processing_result
            }
        }
    };
}

/// Mutable record under construction by the populator chain.
///
/// Created fresh per input message at chain start; discarded without
/// persistence when a populator signals a discard.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArchiveAviationMessageBuilder {
    pub route_id: Option<i32>,
    pub format_id: Option<i32>,
    pub type_id: Option<i32>,
    pub message_time: Option<DateTime<Utc>>,
    pub station_id: Option<i32>,
    pub station_icao_code: Option<String>,
    pub message: Option<String>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub version: Option<String>,
    pub heading: Option<String>,
    pub file_modified: Option<DateTime<Utc>>,
    pub processing_result: ProcessingResult,
}

impl ArchiveAviationMessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the record rejected. The first rejection reason wins; later
    /// rejections by downstream populators do not overwrite it.
    pub fn reject(&mut self, reason: RejectReason) {
        if self.processing_result.is_ok() {
            self.processing_result = ProcessingResult::Rejected(reason);
        }
    }

    /// Finalize the record. Infallible: unset fields stay `None` and are
    /// validated by the persistence layer where mandatory.
    pub fn build(self) -> ArchiveAviationMessage {
        ArchiveAviationMessage {
            route_id: self.route_id,
            format_id: self.format_id,
            type_id: self.type_id,
            message_time: self.message_time,
            station_id: self.station_id,
            station_icao_code: self.station_icao_code,
            message: self.message,
            valid_from: self.valid_from,
            valid_to: self.valid_to,
            version: self.version,
            heading: self.heading,
            file_modified: self.file_modified,
            processing_result: self.processing_result,
        }
    }
}

/// Immutable archive record as handed to the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveAviationMessage {
    pub route_id: Option<i32>,
    pub format_id: Option<i32>,
    pub type_id: Option<i32>,
    pub message_time: Option<DateTime<Utc>>,
    pub station_id: Option<i32>,
    pub station_icao_code: Option<String>,
    pub message: Option<String>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub version: Option<String>,
    pub heading: Option<String>,
    pub file_modified: Option<DateTime<Utc>>,
    pub processing_result: ProcessingResult,
}

impl_message_fields!(ArchiveAviationMessageBuilder);
impl_message_fields!(ArchiveAviationMessage);
