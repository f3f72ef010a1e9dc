//! # File Processing Pipeline
//!
//! Drives one file through the full archival sequence: register in the
//! processing registry → parse → populator chain → persistence →
//! post-actions → deregister → relocate to the archive or failure directory.
//!
//! ## Concurrency and failure model
//!
//! Files are processed concurrently under a bounded worker pool; within one
//! file the stages run sequentially on the owning worker. Submissions wait a
//! bounded time for a pool slot and are rejected on saturation. Stage errors
//! are recorded on the file's [`ProcessingContext`] error flag; the flag
//! alone decides the final archive-or-fail relocation, which happens exactly
//! once per processing run. Per-message problems (rejection, discard, a
//! single failed population) never fail the file; a parse failure, an
//! all-messages-failed batch, or an exhausted persistence retry does.

pub mod mover;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use crate::config::ProcessingSettings;
use crate::database::DatabaseService;
use crate::models::{FileMetadata, FileReference};
use crate::parser::MessageParser;
use crate::populators::{MessageOutcome, MessagePopulatorService};
use crate::processing::{ProcessingContext, ProcessingState};

pub use crate::actions::PostActionService;
pub use mover::{FileMover, LocalFileMover};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("intake saturated: no worker slot became free within {waited_ms} ms")]
    IntakeSaturated { waited_ms: u64 },

    #[error("intake is closed")]
    IntakeClosed,

    #[error("unknown product: {product_id}")]
    UnknownProduct { product_id: String },

    #[error("file relocation failed: {0}")]
    Relocation(#[from] std::io::Error),
}

/// Where the input file ended up after processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileDisposition {
    Archived,
    Failed,
}

/// Per-stage message counts for one processed file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileProcessingStats {
    pub parsed: usize,
    pub archived: usize,
    pub rejected: usize,
    pub discarded: usize,
    pub failed: usize,
}

/// Summary of one file's processing run.
#[derive(Debug)]
pub struct FileOutcome {
    pub processing_id: Uuid,
    pub disposition: FileDisposition,
    pub stats: FileProcessingStats,
}

/// Orchestrates the per-file processing sequence under a bounded worker
/// pool.
pub struct FileProcessorService {
    state: Arc<ProcessingState>,
    parser: Arc<dyn MessageParser>,
    populators: MessagePopulatorService,
    database: DatabaseService,
    post_actions: PostActionService,
    mover: Arc<dyn FileMover>,
    intake: Arc<Semaphore>,
    intake_closed: AtomicBool,
    intake_max_wait: Duration,
    shutdown_poll_interval: Duration,
    post_action_drain: Duration,
    longest_intake_wait: Mutex<Duration>,
}

impl FileProcessorService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state: Arc<ProcessingState>,
        parser: Arc<dyn MessageParser>,
        populators: MessagePopulatorService,
        database: DatabaseService,
        post_actions: PostActionService,
        mover: Arc<dyn FileMover>,
        settings: &ProcessingSettings,
    ) -> Self {
        Self {
            state,
            parser,
            populators,
            database,
            post_actions,
            mover,
            intake: Arc::new(Semaphore::new(settings.worker_count)),
            intake_closed: AtomicBool::new(false),
            intake_max_wait: settings.intake_max_wait(),
            shutdown_poll_interval: settings.shutdown_poll_interval(),
            post_action_drain: settings.post_action_drain(),
            longest_intake_wait: Mutex::new(Duration::ZERO),
        }
    }

    /// Intake filter: a file already under processing must not be submitted
    /// again.
    pub fn should_skip(&self, file: &FileReference) -> bool {
        self.state.is_file_under_processing(file)
    }

    /// Longest wait any submission has spent queueing for a worker slot.
    pub fn longest_intake_wait(&self) -> Duration {
        *self.longest_intake_wait.lock()
    }

    pub fn processing_state(&self) -> Arc<ProcessingState> {
        self.state.clone()
    }

    /// Submit one file for processing, waiting at most the configured intake
    /// wait for a worker slot.
    pub async fn submit_file(
        &self,
        metadata: FileMetadata,
        content: Vec<u8>,
    ) -> Result<FileOutcome, PipelineError> {
        if self.intake_closed.load(Ordering::Acquire) {
            return Err(PipelineError::IntakeClosed);
        }

        let queued = Instant::now();
        let permit = match tokio::time::timeout(
            self.intake_max_wait,
            self.intake.clone().acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(PipelineError::IntakeClosed),
            Err(_) => {
                let waited = queued.elapsed();
                warn!(
                    file = %metadata.file_reference,
                    waited_ms = waited.as_millis() as u64,
                    "submission rejected: worker pool saturated"
                );
                return Err(PipelineError::IntakeSaturated {
                    waited_ms: waited.as_millis() as u64,
                });
            }
        };
        {
            let waited = queued.elapsed();
            let mut longest = self.longest_intake_wait.lock();
            if waited > *longest {
                *longest = waited;
            }
        }

        let outcome = self.process_file(metadata, content).await;
        drop(permit);
        outcome
    }

    /// Run the full stage sequence for one file.
    ///
    /// The file is registered in the processing state for the whole run and
    /// released before relocation, so the registry never reports a file
    /// whose disposition is already decided.
    pub async fn process_file(
        &self,
        metadata: FileMetadata,
        content: Vec<u8>,
    ) -> Result<FileOutcome, PipelineError> {
        let ctx = ProcessingContext::new(metadata.file_reference.clone());
        let span = ctx.file_span();
        self.state.start(ctx.file());

        let stats = self
            .run_stages(&ctx, &metadata, &content)
            .instrument(span)
            .await;

        self.state.finish(ctx.file());

        let disposition = if ctx.has_processing_errors() {
            self.mover.move_to_failed(ctx.file()).await?;
            FileDisposition::Failed
        } else {
            self.mover.move_to_archive(ctx.file()).await?;
            FileDisposition::Archived
        };
        info!(
            processing_id = %ctx.processing_id(),
            file = %ctx.file(),
            disposition = ?disposition,
            parsed = stats.parsed,
            archived = stats.archived,
            rejected = stats.rejected,
            discarded = stats.discarded,
            failed = stats.failed,
            "file processing completed"
        );
        Ok(FileOutcome {
            processing_id: ctx.processing_id(),
            disposition,
            stats,
        })
    }

    async fn run_stages(
        &self,
        ctx: &ProcessingContext,
        metadata: &FileMetadata,
        content: &[u8],
    ) -> FileProcessingStats {
        let mut stats = FileProcessingStats::default();

        let inputs = match self.parser.parse(content, metadata) {
            Ok(inputs) => inputs,
            Err(parse_error) => {
                error!(error = %parse_error, "file content failed to parse");
                ctx.signal_processing_errors();
                return stats;
            }
        };
        stats.parsed = inputs.len();
        debug!(message_count = inputs.len(), "file parsed");

        let processed = self.populators.populate_messages(ctx, inputs).await;
        for message in &processed {
            match &message.outcome {
                MessageOutcome::Archive(_) => stats.archived += 1,
                MessageOutcome::Reject(_) => stats.rejected += 1,
                MessageOutcome::Discarded { .. } => stats.discarded += 1,
                MessageOutcome::Failed { .. } => stats.failed += 1,
            }
        }
        if !processed.is_empty() && processed.iter().all(|message| message.is_failed()) {
            error!("population failed for every message of the file");
            ctx.signal_processing_errors();
            return stats;
        }

        let batch = self.database.insert_messages(ctx, processed).await;
        if let Some(db_error) = &batch.last_error {
            error!(
                failed = batch.failed,
                error = %db_error,
                "persistence failed for part of the file"
            );
            ctx.signal_processing_errors();
        }

        self.post_actions.run_all(ctx, &batch.archived).await;
        stats
    }

    /// Graceful shutdown: stop accepting submissions, wait for in-flight
    /// files to drain (bounded by `timeout`), then close the post-action
    /// chain with its drain grace.
    pub async fn shutdown(&self, timeout: Duration) {
        self.intake_closed.store(true, Ordering::Release);
        self.intake.close();

        let deadline = Instant::now() + timeout;
        while self.state.file_count_under_processing() > 0 && Instant::now() < deadline {
            debug!(
                in_flight = self.state.file_count_under_processing(),
                max_elapsed_ms =
                    self.state.running_file_processing_max_elapsed().as_millis() as u64,
                "waiting for in-flight files to drain"
            );
            tokio::time::sleep(self.shutdown_poll_interval).await;
        }
        let remaining = self.state.file_count_under_processing();
        if remaining > 0 {
            warn!(
                in_flight = remaining,
                "shutdown timeout elapsed with files still under processing"
            );
        }

        self.post_actions.close(self.post_action_drain).await;
        info!("file processor shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{DatabaseAccess, DatabaseError};
    use crate::models::{ArchiveAviationMessage, InputAviationMessage, MessagePositionInFile};
    use crate::parser::ParseError;
    use crate::resilience::RetryPolicy;
    use async_trait::async_trait;

    struct OneMessageParser;

    impl MessageParser for OneMessageParser {
        fn parse(
            &self,
            content: &[u8],
            metadata: &FileMetadata,
        ) -> Result<Vec<InputAviationMessage>, ParseError> {
            let text = std::str::from_utf8(content)
                .map_err(|_| ParseError::malformed("not utf-8"))?;
            Ok(vec![InputAviationMessage::new(
                text,
                MessagePositionInFile::new(0, 0),
                metadata.clone(),
            )])
        }
    }

    struct NullAccess;

    #[async_trait]
    impl DatabaseAccess for NullAccess {
        async fn insert_message(
            &self,
            _: &ArchiveAviationMessage,
        ) -> Result<i64, DatabaseError> {
            Ok(1)
        }

        async fn insert_rejected_message(
            &self,
            _: &ArchiveAviationMessage,
        ) -> Result<i64, DatabaseError> {
            Ok(1)
        }

        async fn query_station_id(&self, _: &str) -> Result<Option<i32>, DatabaseError> {
            Ok(None)
        }
    }

    /// Mover recording calls instead of touching the filesystem.
    #[derive(Default)]
    struct RecordingMover {
        archived: Mutex<Vec<FileReference>>,
        failed: Mutex<Vec<FileReference>>,
    }

    #[async_trait]
    impl FileMover for RecordingMover {
        async fn move_to_archive(&self, file: &FileReference) -> Result<(), PipelineError> {
            self.archived.lock().push(file.clone());
            Ok(())
        }

        async fn move_to_failed(&self, file: &FileReference) -> Result<(), PipelineError> {
            self.failed.lock().push(file.clone());
            Ok(())
        }
    }

    fn service(mover: Arc<RecordingMover>) -> FileProcessorService {
        FileProcessorService::new(
            Arc::new(ProcessingState::new()),
            Arc::new(OneMessageParser),
            MessagePopulatorService::new(vec![]),
            DatabaseService::new(Arc::new(NullAccess), RetryPolicy::no_retry()),
            PostActionService::new(vec![]),
            mover,
            &ProcessingSettings::default(),
        )
    }

    fn metadata(filename: &str) -> FileMetadata {
        FileMetadata::new(FileReference::new("taf", filename), "TAC", None)
    }

    #[tokio::test]
    async fn parsed_file_is_archived() {
        let mover = Arc::new(RecordingMover::default());
        let service = service(mover.clone());

        let outcome = service
            .submit_file(metadata("b.txt"), b"TAF EFHK ...".to_vec())
            .await
            .unwrap();

        assert_eq!(outcome.disposition, FileDisposition::Archived);
        assert_eq!(outcome.stats.parsed, 1);
        assert_eq!(mover.archived.lock().len(), 1);
        assert!(mover.failed.lock().is_empty());
    }

    #[tokio::test]
    async fn unparseable_file_is_failed() {
        let mover = Arc::new(RecordingMover::default());
        let service = service(mover.clone());

        let outcome = service
            .submit_file(metadata("b.txt"), vec![0xFF, 0xFE])
            .await
            .unwrap();

        assert_eq!(outcome.disposition, FileDisposition::Failed);
        assert_eq!(outcome.stats.parsed, 0);
        assert_eq!(mover.failed.lock().len(), 1);
    }

    #[tokio::test]
    async fn state_is_released_after_processing() {
        let mover = Arc::new(RecordingMover::default());
        let service = service(mover);

        let file = FileReference::new("taf", "b.txt");
        assert!(!service.should_skip(&file));

        service
            .submit_file(metadata("b.txt"), b"TAF ...".to_vec())
            .await
            .unwrap();

        assert!(!service.should_skip(&file));
        assert_eq!(service.processing_state().file_count_under_processing(), 0);
    }

    #[tokio::test]
    async fn shutdown_closes_the_intake() {
        let mover = Arc::new(RecordingMover::default());
        let service = service(mover);

        service.shutdown(Duration::from_millis(50)).await;

        let result = service
            .submit_file(metadata("b.txt"), b"TAF ...".to_vec())
            .await;
        assert!(matches!(result, Err(PipelineError::IntakeClosed)));
    }
}
