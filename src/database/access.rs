//! Database access contract and sqlx Postgres implementation.

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use crate::models::{ArchiveAviationMessage, ProcessingResult};

/// Persistence failure, split so the retry layer can tell configuration and
/// data bugs (never retried) from infrastructure hiccups (retried).
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The record itself is invalid, e.g. a missing mandatory station id.
    /// Retrying cannot help.
    #[error("invalid message for insertion: {reason}")]
    InvalidArgument { reason: String },

    /// Transient infrastructure failure; eligible for retry.
    #[error("transient database failure during {operation}: {reason}")]
    Transient { operation: String, reason: String },
}

impl DatabaseError {
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        DatabaseError::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub fn transient(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        DatabaseError::Transient {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, DatabaseError::Transient { .. })
    }
}

/// Narrow contract against the relational store.
#[async_trait]
pub trait DatabaseAccess: Send + Sync {
    /// Insert a message with processing result OK into the primary message
    /// table, returning the generated id. The station id is mandatory.
    async fn insert_message(
        &self,
        message: &ArchiveAviationMessage,
    ) -> Result<i64, DatabaseError>;

    /// Insert a rejected message with its reason code into the
    /// rejected-message table, returning the generated id.
    async fn insert_rejected_message(
        &self,
        message: &ArchiveAviationMessage,
    ) -> Result<i64, DatabaseError>;

    /// Look up the station id for an ICAO code.
    async fn query_station_id(&self, icao_code: &str) -> Result<Option<i32>, DatabaseError>;
}

/// sqlx-backed Postgres implementation over an externally managed pool.
pub struct PgDatabaseAccess {
    pool: PgPool,
}

impl PgDatabaseAccess {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_sqlx(operation: &str, error: sqlx::Error) -> DatabaseError {
        DatabaseError::transient(operation, error.to_string())
    }
}

#[async_trait]
impl DatabaseAccess for PgDatabaseAccess {
    async fn insert_message(
        &self,
        message: &ArchiveAviationMessage,
    ) -> Result<i64, DatabaseError> {
        let station_id = message.station_id.ok_or_else(|| {
            DatabaseError::invalid_argument("station id is mandatory for archived messages")
        })?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO avidb_messages
                (message_time, station_id, type_id, route_id, message,
                 valid_from, valid_to, created, file_modified, flag,
                 messir_heading, version, format_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, now(), $8, 0, $9, $10, $11)
            RETURNING message_id
            "#,
        )
        .bind(message.message_time)
        .bind(station_id)
        .bind(message.type_id)
        .bind(message.route_id)
        .bind(message.message.as_deref())
        .bind(message.valid_from)
        .bind(message.valid_to)
        .bind(message.file_modified)
        .bind(message.heading.as_deref())
        .bind(message.version.as_deref())
        .bind(message.format_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| Self::map_sqlx("insert_message", error))?;

        Ok(id)
    }

    async fn insert_rejected_message(
        &self,
        message: &ArchiveAviationMessage,
    ) -> Result<i64, DatabaseError> {
        let reject_reason = match message.processing_result {
            ProcessingResult::Rejected(reason) => reason.code(),
            ProcessingResult::Ok => {
                return Err(DatabaseError::invalid_argument(
                    "message with result OK cannot go to the rejected-message table",
                ))
            }
        };

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO avidb_rejected_messages
                (icao_code, message_time, type_id, route_id, message,
                 valid_from, valid_to, created, file_modified, flag,
                 messir_heading, reject_reason, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, now(), $8, 0, $9, $10, $11)
            RETURNING rejected_message_id
            "#,
        )
        .bind(message.station_icao_code.as_deref())
        .bind(message.message_time)
        .bind(message.type_id)
        .bind(message.route_id)
        .bind(message.message.as_deref())
        .bind(message.valid_from)
        .bind(message.valid_to)
        .bind(message.file_modified)
        .bind(message.heading.as_deref())
        .bind(reject_reason)
        .bind(message.version.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| Self::map_sqlx("insert_rejected_message", error))?;

        Ok(id)
    }

    async fn query_station_id(&self, icao_code: &str) -> Result<Option<i32>, DatabaseError> {
        sqlx::query_scalar("SELECT station_id FROM avidb_stations WHERE icao_code = $1")
            .bind(icao_code)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| Self::map_sqlx("query_station_id", error))
    }
}
