#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Aviation Message Archiver
//!
//! File-driven ETL pipeline for aviation weather messages (TAF, METAR,
//! SIGMET). Bulletin files dropped into per-product input directories are
//! parsed, enriched through a configurable populator chain, persisted to a
//! relational store, published downstream, and finally relocated to an
//! archive or failure directory.
//!
//! ## Architecture
//!
//! Files are processed concurrently under a bounded worker pool; within one
//! file the stages run sequentially: parse → populate → persist →
//! post-actions → relocate. A concurrency-safe
//! [`ProcessingState`](processing::ProcessingState) registry tracks in-flight
//! files, and every stage failure is recorded on a per-file monotonic error
//! flag that decides the final archive-or-fail disposition.
//!
//! Populators and post-actions are declared in configuration by name, built
//! through typed factory registries, and optionally gated behind activation
//! conditions evaluated per message.
//!
//! ## Module Organization
//!
//! - [`models`] - Input and archive message data types
//! - [`processing`] - In-flight registry and per-file context
//! - [`conditions`] - Activation predicates for configured components
//! - [`populators`] - Message enrichment and validation chain
//! - [`database`] - Persistence services over SQLx
//! - [`resilience`] - Retry policies and backoff
//! - [`actions`] - Post-persistence side effects
//! - [`pipeline`] - File-level orchestration, intake and relocation
//! - [`config`] - Typed, validated configuration
//! - [`parser`] - Parsing contract for bulletin content
//! - [`logging`] - Structured logging initialization
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use aviation_message_archiver::config::ConfigManager;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! aviation_message_archiver::logging::init_structured_logging();
//! let manager = ConfigManager::load()?;
//! println!("configured products: {}", manager.config().products.len());
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod conditions;
pub mod config;
pub mod database;
pub mod logging;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod populators;
pub mod processing;
pub mod resilience;

pub use config::{ArchiverConfig, ConfigManager, ConfigurationError};
pub use models::{
    ArchiveAviationMessage, FileMetadata, FileReference, InputAviationMessage,
};
pub use pipeline::{FileDisposition, FileOutcome, FileProcessorService, PipelineError};
pub use processing::{ProcessingContext, ProcessingState};
