//! # Per-File Processing Context
//!
//! Correlation identity and error signalling threaded through every pipeline
//! stage, replacing global mutable diagnostic state with an explicit value.
//!
//! Log attribution for nested scopes (file → message) uses
//! `tracing` spans: entering a span guard attributes everything logged inside
//! it, and dropping the guard restores the parent scope even when the stack
//! unwinds through `?` or a panic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info_span, Span};
use uuid::Uuid;

use crate::models::{FileReference, MessagePositionInFile};

#[derive(Debug)]
struct ContextInner {
    processing_id: Uuid,
    file: FileReference,
    processing_errors: AtomicBool,
}

/// Per-file correlation context.
///
/// Cheap to clone; clones share the same monotonic error flag so that a
/// failure signalled from a spawned post-action still reaches the file's
/// final disposition decision.
#[derive(Debug, Clone)]
pub struct ProcessingContext {
    inner: Arc<ContextInner>,
}

impl ProcessingContext {
    pub fn new(file: FileReference) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                processing_id: Uuid::new_v4(),
                file,
                processing_errors: AtomicBool::new(false),
            }),
        }
    }

    pub fn processing_id(&self) -> Uuid {
        self.inner.processing_id
    }

    pub fn file(&self) -> &FileReference {
        &self.inner.file
    }

    /// Record that an error occurred during this file's processing.
    ///
    /// Monotonic and idempotent: once set the flag never resets within the
    /// context's lifetime.
    pub fn signal_processing_errors(&self) {
        self.inner.processing_errors.store(true, Ordering::Release);
    }

    pub fn has_processing_errors(&self) -> bool {
        self.inner.processing_errors.load(Ordering::Acquire)
    }

    /// Span attributing log lines to this file's processing run.
    pub fn file_span(&self) -> Span {
        info_span!(
            "file_processing",
            processing_id = %self.inner.processing_id,
            product = self.inner.file.product_id(),
            filename = self.inner.file.filename(),
        )
    }
}

/// Span attributing log lines to one message within the current file scope.
/// Carries the bulletin index alongside the message index.
pub fn message_span(position: &MessagePositionInFile) -> Span {
    info_span!(
        "message",
        bulletin_index = position.bulletin_index,
        message_index = position.message_index,
    )
}
