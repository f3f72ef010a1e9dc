//! Batch persistence with per-message retry and partial-failure semantics.

use std::sync::Arc;

use tracing::{debug, error};

use super::{DatabaseAccess, DatabaseError};
use crate::models::{ArchivalStatus, ArchiveAviationMessage, InputAviationMessage};
use crate::populators::{MessageOutcome, ProcessedMessage};
use crate::processing::ProcessingContext;
use crate::resilience::{retry_with_policy, RetryPolicy};

/// One message that made it into the database, with its originating input
/// kept for post-action activation conditions and reporting.
#[derive(Debug, Clone)]
pub struct ArchivedMessage {
    pub input: InputAviationMessage,
    pub message: ArchiveAviationMessage,
    pub status: ArchivalStatus,
    pub database_id: i64,
}

/// Result of one batch insertion.
///
/// Insertion failures for one message do not block the rest of the batch;
/// the last-seen error is surfaced once after the batch completes so the
/// caller learns that something failed while forward progress was maximized.
#[derive(Debug, Default)]
pub struct DatabaseBatchResult {
    /// Messages now present in the database, in input order.
    pub archived: Vec<ArchivedMessage>,
    /// Count of messages whose insertion failed.
    pub failed: usize,
    /// Last insertion error of the batch, when any occurred.
    pub last_error: Option<DatabaseError>,
}

/// Persists classified messages under a bounded-retry policy.
pub struct DatabaseService {
    access: Arc<dyn DatabaseAccess>,
    retry_policy: RetryPolicy,
}

impl DatabaseService {
    pub fn new(access: Arc<dyn DatabaseAccess>, retry_policy: RetryPolicy) -> Self {
        Self {
            access,
            retry_policy,
        }
    }

    pub fn access(&self) -> Arc<dyn DatabaseAccess> {
        self.access.clone()
    }

    /// Insert every persistable message of `processed`. Discarded and failed
    /// messages pass through untouched; each insert runs under the retry
    /// policy, with fatal argument errors short-circuiting.
    pub async fn insert_messages(
        &self,
        ctx: &ProcessingContext,
        processed: Vec<ProcessedMessage>,
    ) -> DatabaseBatchResult {
        let mut result = DatabaseBatchResult::default();

        for item in processed {
            let (message, status, operation) = match item.outcome {
                MessageOutcome::Archive(message) => {
                    (message, ArchivalStatus::Archived, "insert_message")
                }
                MessageOutcome::Reject(message) => (
                    message,
                    ArchivalStatus::Rejected,
                    "insert_rejected_message",
                ),
                MessageOutcome::Discarded { .. } | MessageOutcome::Failed { .. } => continue,
            };

            let access = self.access.clone();
            let record = message.clone();
            let insert = retry_with_policy(
                operation,
                &self.retry_policy,
                DatabaseError::is_transient,
                move || {
                    let access = access.clone();
                    let record = record.clone();
                    async move {
                        match status {
                            ArchivalStatus::Archived => access.insert_message(&record).await,
                            _ => access.insert_rejected_message(&record).await,
                        }
                    }
                },
            )
            .await;

            match insert {
                Ok(database_id) => {
                    debug!(
                        processing_id = %ctx.processing_id(),
                        database_id,
                        status = ?status,
                        "message persisted"
                    );
                    result.archived.push(ArchivedMessage {
                        input: item.input,
                        message,
                        status,
                        database_id,
                    });
                }
                Err(db_error) => {
                    error!(
                        processing_id = %ctx.processing_id(),
                        operation,
                        error = %db_error,
                        "message insertion failed"
                    );
                    result.failed += 1;
                    result.last_error = Some(db_error);
                }
            }
        }

        result
    }
}
