//! Post-action factory registry.
//!
//! Same validated, name-keyed construction as the populator registry:
//! unknown action names and invalid `activate_on`/`config` maps are fatal at
//! assembly.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use super::{
    ConditionalPostAction, MessagePublisher, MessagePublisherAction, PostAction,
    RetryingPostAction,
};
use crate::conditions::{build_activation_condition, PropertyReaderRegistry};
use crate::config::{ComponentSpec, ConfigurationError, ProcessingSettings};
use crate::resilience::RetryPolicy;

/// Factory building one post-action instance from its `config` map.
pub type PostActionFactory = Box<
    dyn Fn(
            &serde_json::Map<String, serde_json::Value>,
        ) -> Result<Box<dyn PostAction>, ConfigurationError>
        + Send
        + Sync,
>;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct PublishConfig {
    /// In-flight bound for the asynchronous executor.
    max_in_flight: u32,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self { max_in_flight: 16 }
    }
}

/// Registry of post-action factories plus the property readers used to
/// build activation conditions.
pub struct PostActionRegistry {
    factories: HashMap<String, PostActionFactory>,
    readers: PropertyReaderRegistry,
}

impl PostActionRegistry {
    pub fn new(readers: PropertyReaderRegistry) -> Self {
        Self {
            factories: HashMap::new(),
            readers,
        }
    }

    /// Registry with the built-in publish action. The publisher transport is
    /// shared; the per-attempt timeout comes from the processing settings.
    pub fn with_builtin_actions(
        readers: PropertyReaderRegistry,
        publisher: Arc<dyn MessagePublisher>,
        retry_policy: RetryPolicy,
        settings: &ProcessingSettings,
    ) -> Self {
        let attempt_timeout = settings.post_action_timeout();
        let mut registry = Self::new(readers);
        registry.register(MessagePublisherAction::NAME, move |config| {
            let config: PublishConfig =
                serde_json::from_value(serde_json::Value::Object(config.clone())).map_err(
                    |error| ConfigurationError::InvalidComponentConfig {
                        component: MessagePublisherAction::NAME.to_string(),
                        reason: error.to_string(),
                    },
                )?;
            Ok(Box::new(RetryingPostAction::new(
                Arc::new(MessagePublisherAction::new(publisher.clone())),
                retry_policy.clone(),
                attempt_timeout,
                config.max_in_flight,
            )))
        });
        registry
    }

    /// Register a factory under `name`, replacing any previous registration.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(
                &serde_json::Map<String, serde_json::Value>,
            ) -> Result<Box<dyn PostAction>, ConfigurationError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    /// Build the configured post-action chain, wrapping each instance with
    /// its activation condition.
    pub fn build_chain(
        &self,
        specs: &[ComponentSpec],
    ) -> Result<Vec<Box<dyn PostAction>>, ConfigurationError> {
        let mut chain = Vec::with_capacity(specs.len());
        for spec in specs {
            let factory =
                self.factories
                    .get(&spec.name)
                    .ok_or_else(|| ConfigurationError::UnknownPostAction {
                        name: spec.name.clone(),
                    })?;
            let action = factory(&spec.config)?;
            let condition = build_activation_condition(&self.readers, &spec.activate_on)?;
            info!(
                action = spec.name,
                conditional = !condition.is_empty(),
                "post action configured"
            );
            if condition.is_empty() {
                chain.push(action);
            } else {
                chain.push(Box::new(ConditionalPostAction::new(condition, action)));
            }
        }
        Ok(chain)
    }
}
