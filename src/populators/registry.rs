//! Populator factory registry.
//!
//! Maps a component spec's string `name` to a typed factory function,
//! replacing reflective instantiation with validated, explicit construction.
//! Unknown names and invalid `activate_on`/`config` maps fail at assembly.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use super::builtin::{
    BulletinHeadingPopulator, FileMetadataPopulator, FixedDurationValidityPeriodPopulator,
    MessageContentPopulator, MessageDiscarder, MessageFutureTimeValidator, StationIdPopulator,
};
use super::{ConditionalPopulator, MessagePopulator};
use crate::conditions::{build_activation_condition, PropertyReaderRegistry};
use crate::config::{ComponentSpec, ConfigurationError, LookupTables};
use crate::database::DatabaseAccess;

/// Factory building one populator instance from its `config` map.
pub type PopulatorFactory = Box<
    dyn Fn(
            &serde_json::Map<String, serde_json::Value>,
        ) -> Result<Box<dyn MessagePopulator>, ConfigurationError>
        + Send
        + Sync,
>;

/// Registry of populator factories plus the property readers used to build
/// activation conditions.
pub struct PopulatorRegistry {
    factories: HashMap<String, PopulatorFactory>,
    readers: PropertyReaderRegistry,
}

impl PopulatorRegistry {
    pub fn new(readers: PropertyReaderRegistry) -> Self {
        Self {
            factories: HashMap::new(),
            readers,
        }
    }

    /// Registry with all built-in populators registered.
    pub fn with_builtin_populators(
        tables: Arc<LookupTables>,
        database: Arc<dyn DatabaseAccess>,
    ) -> Self {
        let readers = PropertyReaderRegistry::with_builtin_readers(tables.clone());
        let mut registry = Self::new(readers);

        let file_tables = tables.clone();
        registry.register(FileMetadataPopulator::NAME, move |_| {
            Ok(Box::new(FileMetadataPopulator::new(file_tables.clone())))
        });
        registry.register(BulletinHeadingPopulator::NAME, |_| {
            Ok(Box::new(BulletinHeadingPopulator))
        });
        let content_tables = tables;
        registry.register(MessageContentPopulator::NAME, move |_| {
            Ok(Box::new(MessageContentPopulator::new(
                content_tables.clone(),
            )))
        });
        registry.register(StationIdPopulator::NAME, move |_| {
            Ok(Box::new(StationIdPopulator::new(database.clone())))
        });
        registry.register(FixedDurationValidityPeriodPopulator::NAME, |config| {
            Ok(Box::new(FixedDurationValidityPeriodPopulator::from_config(
                config,
            )?))
        });
        registry.register(MessageFutureTimeValidator::NAME, |config| {
            Ok(Box::new(MessageFutureTimeValidator::from_config(config)?))
        });
        registry.register(MessageDiscarder::NAME, |_| Ok(Box::new(MessageDiscarder)));

        registry
    }

    /// Register a factory under `name`, replacing any previous registration.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(
                &serde_json::Map<String, serde_json::Value>,
            ) -> Result<Box<dyn MessagePopulator>, ConfigurationError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    /// Build the configured populator chain in declaration order, wrapping
    /// each instance with its activation condition.
    pub fn build_chain(
        &self,
        specs: &[ComponentSpec],
    ) -> Result<Vec<Box<dyn MessagePopulator>>, ConfigurationError> {
        let mut chain = Vec::with_capacity(specs.len());
        for spec in specs {
            let factory =
                self.factories
                    .get(&spec.name)
                    .ok_or_else(|| ConfigurationError::UnknownPopulator {
                        name: spec.name.clone(),
                    })?;
            let populator = factory(&spec.config)?;
            let condition = build_activation_condition(&self.readers, &spec.activate_on)?;
            info!(
                populator = spec.name,
                conditional = !condition.is_empty(),
                "populator configured"
            );
            if condition.is_empty() {
                chain.push(populator);
            } else {
                chain.push(Box::new(ConditionalPopulator::new(condition, populator)));
            }
        }
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseError;
    use crate::models::ArchiveAviationMessage;
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    struct NoDatabase;

    #[async_trait]
    impl DatabaseAccess for NoDatabase {
        async fn insert_message(&self, _: &ArchiveAviationMessage) -> Result<i64, DatabaseError> {
            Ok(0)
        }

        async fn insert_rejected_message(
            &self,
            _: &ArchiveAviationMessage,
        ) -> Result<i64, DatabaseError> {
            Ok(0)
        }

        async fn query_station_id(&self, _: &str) -> Result<Option<i32>, DatabaseError> {
            Ok(None)
        }
    }

    fn registry() -> PopulatorRegistry {
        PopulatorRegistry::with_builtin_populators(
            Arc::new(LookupTables::default()),
            Arc::new(NoDatabase),
        )
    }

    fn spec(name: &str) -> ComponentSpec {
        ComponentSpec {
            name: name.to_string(),
            activate_on: BTreeMap::new(),
            config: serde_json::Map::new(),
        }
    }

    #[test]
    fn unknown_populator_name_fails_at_assembly() {
        let result = registry().build_chain(&[spec("does_not_exist")]);
        assert!(matches!(
            result,
            Err(ConfigurationError::UnknownPopulator { .. })
        ));
    }

    #[test]
    fn invalid_component_config_fails_at_assembly() {
        // fixed_duration_validity_period requires validity_hours.
        let result = registry().build_chain(&[spec(FixedDurationValidityPeriodPopulator::NAME)]);
        assert!(matches!(
            result,
            Err(ConfigurationError::InvalidComponentConfig { .. })
        ));
    }

    #[test]
    fn chain_preserves_declaration_order() {
        let chain = registry()
            .build_chain(&[
                spec(FileMetadataPopulator::NAME),
                spec(BulletinHeadingPopulator::NAME),
                spec(MessageContentPopulator::NAME),
            ])
            .unwrap();
        let names: Vec<&str> = chain.iter().map(|populator| populator.name()).collect();
        assert_eq!(
            names,
            vec![
                FileMetadataPopulator::NAME,
                BulletinHeadingPopulator::NAME,
                MessageContentPopulator::NAME,
            ]
        );
    }
}
