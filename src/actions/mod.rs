//! # Post-Action Chain
//!
//! Side effects run after successful persistence of a message, e.g.
//! publishing the archived record to a downstream bus.
//!
//! ## Contract
//!
//! Only persisted messages (archived OK, or rejected but stored) are
//! eligible; discarded and failed messages never reach post-actions. An
//! error from one invocation is logged and isolated: it affects neither
//! other messages nor other actions, and never the persistence result.
//!
//! Actions may be wrapped by [`ConditionalPostAction`] (same activation
//! mechanism as populators, evaluated once per message against the final
//! input/archived pair) and by [`RetryingPostAction`], which executes the
//! delegate asynchronously with a per-attempt timeout and bounded retry.

pub mod publisher;
pub mod registry;
pub mod retrying;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::conditions::ActivationCondition;
use crate::database::ArchivedMessage;
use crate::processing::ProcessingContext;

pub use publisher::{MessagePublisher, MessagePublisherAction, PublishOutcome};
pub use registry::{PostActionFactory, PostActionRegistry};
pub use retrying::{ResultCheck, RetryingPostAction};

/// Error raised by one post-action invocation.
#[derive(Debug, Error)]
pub enum PostActionError {
    #[error("post action '{action}' failed: {reason}")]
    Failed { action: String, reason: String },

    #[error("post action '{action}' timed out after {timeout_ms} ms")]
    Timeout { action: String, timeout_ms: u64 },

    #[error("post action '{action}' invoked after close")]
    Closed { action: String },

    #[error("publish rejected by broker: {cause}")]
    PublishRejected { cause: String },

    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PostActionError {
    pub fn failed(action: impl Into<String>, reason: impl Into<String>) -> Self {
        PostActionError::Failed {
            action: action.into(),
            reason: reason.into(),
        }
    }
}

/// One post-persistence side effect.
#[async_trait]
pub trait PostAction: Send + Sync {
    /// Component name as used in configuration and logs.
    fn name(&self) -> &str;

    /// Run the side effect for one persisted message.
    async fn run(
        &self,
        ctx: &ProcessingContext,
        message: &ArchivedMessage,
    ) -> Result<(), PostActionError>;

    /// Release resources on shutdown, draining in-flight work for at most
    /// `grace`. Default is a no-op for synchronous actions.
    async fn close(&self, grace: Duration) {
        let _ = grace;
    }
}

/// Decorator gating a post-action behind an activation condition.
pub struct ConditionalPostAction {
    condition: ActivationCondition,
    delegate: Box<dyn PostAction>,
}

impl ConditionalPostAction {
    pub fn new(condition: ActivationCondition, delegate: Box<dyn PostAction>) -> Self {
        Self {
            condition,
            delegate,
        }
    }
}

#[async_trait]
impl PostAction for ConditionalPostAction {
    fn name(&self) -> &str {
        self.delegate.name()
    }

    async fn run(
        &self,
        ctx: &ProcessingContext,
        message: &ArchivedMessage,
    ) -> Result<(), PostActionError> {
        if self.condition.is_active(&message.input, &message.message) {
            self.delegate.run(ctx, message).await
        } else {
            tracing::trace!(action = self.delegate.name(), "post action skipped by condition");
            Ok(())
        }
    }

    async fn close(&self, grace: Duration) {
        self.delegate.close(grace).await;
    }
}

/// Runs the configured post-action chain over a file's persisted messages.
///
/// Outer loop over actions, inner sequential loop over messages; no
/// ordering is guaranteed across actions for the same message.
pub struct PostActionService {
    actions: Vec<Box<dyn PostAction>>,
}

impl PostActionService {
    pub fn new(actions: Vec<Box<dyn PostAction>>) -> Self {
        Self { actions }
    }

    /// Run every action for every persisted message, isolating failures per
    /// invocation.
    pub async fn run_all(&self, ctx: &ProcessingContext, messages: &[ArchivedMessage]) {
        for action in &self.actions {
            for message in messages {
                if !message.status.is_persisted() {
                    continue;
                }
                if let Err(error) = action.run(ctx, message).await {
                    warn!(
                        action = action.name(),
                        processing_id = %ctx.processing_id(),
                        error = %error,
                        "post action failed"
                    );
                }
            }
        }
    }

    /// Close all actions, giving each the same drain grace.
    pub async fn close(&self, grace: Duration) {
        for action in &self.actions {
            action.close(grace).await;
        }
    }
}
