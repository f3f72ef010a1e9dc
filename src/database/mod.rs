//! # Persistence Layer
//!
//! Archive and rejected-message persistence behind the narrow
//! [`DatabaseAccess`] contract.
//!
//! - [`access`]: the trait, its error taxonomy (fatal argument errors vs
//!   retried transient errors) and the sqlx Postgres implementation.
//! - [`service`]: batch insertion with per-message bounded retry and
//!   partial-failure semantics.

pub mod access;
pub mod service;

pub use access::{DatabaseAccess, DatabaseError, PgDatabaseAccess};
pub use service::{ArchivedMessage, DatabaseBatchResult, DatabaseService};
