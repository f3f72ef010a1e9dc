//! # Message Populator Chain
//!
//! Ordered, independently configured transformation steps that incrementally
//! fill an [`ArchiveAviationMessageBuilder`] from an
//! [`InputAviationMessage`].
//!
//! ## Contract
//!
//! Each populator may set fields on the builder, signal a **discard**
//! (a typed error meaning "drop this message from further processing, but
//! report it for observability"), or fail with any other
//! [`PopulationError`], which fails only the current message. Populator
//! instances are shared across concurrently processed files and hold no
//! per-message state: configuration is immutable after assembly and per-call
//! state stays method-local.
//!
//! Each configured instance is wrapped at assembly time by
//! [`ConditionalPopulator`], which re-evaluates the instance's activation
//! condition per message since builder state changes as the chain
//! progresses.

pub mod builtin;
pub mod registry;
pub mod service;

use async_trait::async_trait;
use thiserror::Error;

use crate::conditions::ActivationCondition;
use crate::database::DatabaseError;
use crate::models::{ArchiveAviationMessageBuilder, InputAviationMessage};

pub use builtin::{
    BulletinHeadingPopulator, FileMetadataPopulator, FixedDurationValidityPeriodPopulator,
    MessageContentPopulator, MessageDiscarder, MessageFutureTimeValidator, StationIdPopulator,
};
pub use registry::{PopulatorFactory, PopulatorRegistry};
pub use service::{MessageOutcome, MessagePopulatorService, ProcessedMessage};

/// Error raised by a populator for one message.
#[derive(Debug, Error)]
pub enum PopulationError {
    /// Intentional, data-driven exclusion of the message from persistence.
    /// Not a failure.
    #[error("message discarded: {reason}")]
    Discard { reason: String },

    /// The message could not be populated; fails this message only.
    #[error("message population failed: {reason}")]
    Failed { reason: String },

    /// Database lookup needed by a populator failed.
    #[error("database error during population: {0}")]
    Database(#[from] DatabaseError),
}

impl PopulationError {
    pub fn discard(reason: impl Into<String>) -> Self {
        PopulationError::Discard {
            reason: reason.into(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        PopulationError::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_discard(&self) -> bool {
        matches!(self, PopulationError::Discard { .. })
    }
}

/// One step of the populator chain.
#[async_trait]
pub trait MessagePopulator: Send + Sync {
    /// Component name as used in configuration and logs.
    fn name(&self) -> &str;

    /// Fill fields of `builder` from `input`.
    async fn populate(
        &self,
        input: &InputAviationMessage,
        builder: &mut ArchiveAviationMessageBuilder,
    ) -> Result<(), PopulationError>;
}

/// Decorator gating a populator behind an activation condition.
pub struct ConditionalPopulator {
    condition: ActivationCondition,
    delegate: Box<dyn MessagePopulator>,
}

impl ConditionalPopulator {
    pub fn new(condition: ActivationCondition, delegate: Box<dyn MessagePopulator>) -> Self {
        Self {
            condition,
            delegate,
        }
    }
}

#[async_trait]
impl MessagePopulator for ConditionalPopulator {
    fn name(&self) -> &str {
        self.delegate.name()
    }

    async fn populate(
        &self,
        input: &InputAviationMessage,
        builder: &mut ArchiveAviationMessageBuilder,
    ) -> Result<(), PopulationError> {
        if self.condition.is_active(input, builder) {
            self.delegate.populate(input, builder).await
        } else {
            tracing::trace!(populator = self.delegate.name(), "populator skipped by condition");
            Ok(())
        }
    }
}
