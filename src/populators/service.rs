//! Populator chain orchestration over one file's batch of messages.
//!
//! Messages are processed in input order; a failure in one message never
//! prevents sibling messages from being processed and classified
//! independently.

use tracing::{debug, warn, Instrument};

use super::{MessagePopulator, PopulationError};
use crate::models::{
    ArchiveAviationMessage, ArchiveAviationMessageBuilder, InputAviationMessage,
};
use crate::processing::{message_span, ProcessingContext};

/// Classification of one message after the populator chain has run.
#[derive(Debug)]
pub enum MessageOutcome {
    /// Valid; goes to the primary message table.
    Archive(ArchiveAviationMessage),
    /// Rejected by a validator; goes to the rejected-message table.
    Reject(ArchiveAviationMessage),
    /// Intentionally excluded from persistence.
    Discarded { reason: String },
    /// Population failed; excluded from persistence.
    Failed { reason: String },
}

/// One message's outcome with its originating input, correlated for
/// downstream reporting.
#[derive(Debug)]
pub struct ProcessedMessage {
    pub input: InputAviationMessage,
    pub outcome: MessageOutcome,
}

impl ProcessedMessage {
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, MessageOutcome::Failed { .. })
    }
}

/// Runs the configured populator chain over a batch of input messages.
pub struct MessagePopulatorService {
    populators: Vec<Box<dyn MessagePopulator>>,
}

impl MessagePopulatorService {
    pub fn new(populators: Vec<Box<dyn MessagePopulator>>) -> Self {
        Self { populators }
    }

    /// Process `inputs` in order, producing one classified outcome per
    /// message. Per-message failures are isolated; the batch always
    /// completes.
    pub async fn populate_messages(
        &self,
        ctx: &ProcessingContext,
        inputs: Vec<InputAviationMessage>,
    ) -> Vec<ProcessedMessage> {
        let mut processed = Vec::with_capacity(inputs.len());
        for input in inputs {
            let span = message_span(&input.position);
            let outcome = self
                .populate_single(ctx, &input)
                .instrument(span)
                .await;
            processed.push(ProcessedMessage { input, outcome });
        }
        processed
    }

    async fn populate_single(
        &self,
        ctx: &ProcessingContext,
        input: &InputAviationMessage,
    ) -> MessageOutcome {
        let mut builder = ArchiveAviationMessageBuilder::new();
        for populator in &self.populators {
            match populator.populate(input, &mut builder).await {
                Ok(()) => {}
                Err(PopulationError::Discard { reason }) => {
                    debug!(populator = populator.name(), reason, "message discarded");
                    return MessageOutcome::Discarded { reason };
                }
                Err(error) => {
                    warn!(
                        populator = populator.name(),
                        error = %error,
                        "message population failed"
                    );
                    return MessageOutcome::Failed {
                        reason: error.to_string(),
                    };
                }
            }
        }
        let message = builder.build();
        if message.processing_result.is_ok() {
            MessageOutcome::Archive(message)
        } else {
            debug!(
                processing_id = %ctx.processing_id(),
                result = ?message.processing_result,
                "message rejected by populator chain"
            );
            MessageOutcome::Reject(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{
        build_activation_condition, GeneralPropertyPredicate, PropertyReaderRegistry,
    };
    use crate::config::LookupTables;
    use crate::models::{FileMetadata, FileReference, MessagePositionInFile};
    use crate::populators::ConditionalPopulator;
    use async_trait::async_trait;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Arc;

    fn input_of_type(message_type: &str, index: usize) -> InputAviationMessage {
        let metadata = FileMetadata::new(FileReference::new("taf", "b.txt"), "TAC", None);
        let mut input = InputAviationMessage::new(
            format!("{message_type} ..."),
            MessagePositionInFile::new(0, index),
            metadata,
        );
        input.message_type = Some(message_type.to_string());
        input
    }

    fn ctx() -> ProcessingContext {
        ProcessingContext::new(FileReference::new("taf", "b.txt"))
    }

    /// Sets the version field to a fixed marker.
    struct MarkerPopulator(&'static str);

    #[async_trait]
    impl MessagePopulator for MarkerPopulator {
        fn name(&self) -> &str {
            "marker"
        }

        async fn populate(
            &self,
            _: &InputAviationMessage,
            builder: &mut ArchiveAviationMessageBuilder,
        ) -> Result<(), PopulationError> {
            builder.version = Some(self.0.to_string());
            Ok(())
        }
    }

    /// Fails for inputs whose message index matches.
    struct FailOn(usize);

    #[async_trait]
    impl MessagePopulator for FailOn {
        fn name(&self) -> &str {
            "fail_on"
        }

        async fn populate(
            &self,
            input: &InputAviationMessage,
            _: &mut ArchiveAviationMessageBuilder,
        ) -> Result<(), PopulationError> {
            if input.position.message_index == self.0 {
                Err(PopulationError::failed("boom"))
            } else {
                Ok(())
            }
        }
    }

    struct DiscardOn(usize);

    #[async_trait]
    impl MessagePopulator for DiscardOn {
        fn name(&self) -> &str {
            "discard_on"
        }

        async fn populate(
            &self,
            input: &InputAviationMessage,
            _: &mut ArchiveAviationMessageBuilder,
        ) -> Result<(), PopulationError> {
            if input.position.message_index == self.0 {
                Err(PopulationError::discard("filtered out"))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn failure_in_one_message_does_not_affect_siblings() {
        let service = MessagePopulatorService::new(vec![
            Box::new(FailOn(1)),
            Box::new(MarkerPopulator("ok")),
        ]);
        let inputs = vec![
            input_of_type("TAF", 0),
            input_of_type("TAF", 1),
            input_of_type("TAF", 2),
        ];

        let processed = service.populate_messages(&ctx(), inputs).await;

        assert_eq!(processed.len(), 3);
        assert!(matches!(processed[0].outcome, MessageOutcome::Archive(_)));
        assert!(matches!(processed[1].outcome, MessageOutcome::Failed { .. }));
        assert!(matches!(processed[2].outcome, MessageOutcome::Archive(_)));
    }

    #[tokio::test]
    async fn discarded_messages_are_classified_not_failed() {
        let service = MessagePopulatorService::new(vec![Box::new(DiscardOn(0))]);
        let processed = service
            .populate_messages(&ctx(), vec![input_of_type("TAF", 0), input_of_type("TAF", 1)])
            .await;

        assert!(matches!(
            processed[0].outcome,
            MessageOutcome::Discarded { .. }
        ));
        assert!(matches!(processed[1].outcome, MessageOutcome::Archive(_)));
    }

    #[tokio::test]
    async fn conditional_populator_applies_per_message() {
        // Scenario: second populator active only for TAF messages.
        let tables = Arc::new(LookupTables {
            message_types: HashMap::from([("TAF".to_string(), 2), ("METAR".to_string(), 1)]),
            ..Default::default()
        });
        let readers = PropertyReaderRegistry::with_builtin_readers(tables);
        let condition = build_activation_condition(
            &readers,
            &BTreeMap::from([(
                "type".to_string(),
                GeneralPropertyPredicate {
                    is: Some(serde_json::Value::String("TAF".to_string())),
                    ..Default::default()
                },
            )]),
        )
        .unwrap();

        let service = MessagePopulatorService::new(vec![Box::new(ConditionalPopulator::new(
            condition,
            Box::new(MarkerPopulator("taf-only")),
        ))]);

        let processed = service
            .populate_messages(
                &ctx(),
                vec![input_of_type("METAR", 0), input_of_type("TAF", 1)],
            )
            .await;

        let version_of = |p: &ProcessedMessage| match &p.outcome {
            MessageOutcome::Archive(message) => message.version.clone(),
            other => panic!("unexpected outcome: {other:?}"),
        };
        assert_eq!(version_of(&processed[0]), None);
        assert_eq!(version_of(&processed[1]), Some("taf-only".to_string()));
    }

    #[tokio::test]
    async fn messages_keep_input_order() {
        let service = MessagePopulatorService::new(vec![Box::new(MarkerPopulator("x"))]);
        let processed = service
            .populate_messages(
                &ctx(),
                (0..5).map(|i| input_of_type("TAF", i)).collect(),
            )
            .await;
        let indexes: Vec<usize> = processed
            .iter()
            .map(|p| p.input.position.message_index)
            .collect();
        assert_eq!(indexes, vec![0, 1, 2, 3, 4]);
    }
}
