//! Downstream publishing post-action.
//!
//! The transport (AMQP connection, channel management) is an external
//! collaborator behind [`MessagePublisher`]; the action owns serialization
//! and the accepted/rejected interpretation.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{PostAction, PostActionError};
use crate::database::ArchivedMessage;
use crate::processing::ProcessingContext;

/// Broker's verdict on one published payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Accepted,
    Rejected { cause: String },
}

/// Transport contract for delivering one payload downstream.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish(&self, payload: Vec<u8>) -> Result<PublishOutcome, PostActionError>;
}

/// Publishes each persisted message as a JSON payload.
///
/// Anything other than an accepted delivery is an error, so a wrapping
/// [`RetryingPostAction`](super::RetryingPostAction) re-invokes the publish.
pub struct MessagePublisherAction {
    publisher: Arc<dyn MessagePublisher>,
}

impl MessagePublisherAction {
    pub const NAME: &'static str = "publish";

    pub fn new(publisher: Arc<dyn MessagePublisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl PostAction for MessagePublisherAction {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(
        &self,
        ctx: &ProcessingContext,
        message: &ArchivedMessage,
    ) -> Result<(), PostActionError> {
        let payload = serde_json::to_vec(&message.message)?;
        match self.publisher.publish(payload).await? {
            PublishOutcome::Accepted => {
                debug!(
                    processing_id = %ctx.processing_id(),
                    database_id = message.database_id,
                    "message published"
                );
                Ok(())
            }
            PublishOutcome::Rejected { cause } => Err(PostActionError::PublishRejected { cause }),
        }
    }
}
