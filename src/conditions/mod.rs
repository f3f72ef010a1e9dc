//! # Activation Condition Layer
//!
//! Decides, per message, whether a configured component (populator or
//! post-action) should run.
//!
//! ## Overview
//!
//! An activation condition is built from the component spec's `activate_on`
//! map: each entry names a property, resolved through the
//! [`PropertyReaderRegistry`] to a [`ConditionPropertyReader`], and a
//! [`GeneralPropertyPredicate`] evaluated against the value the reader
//! extracts from the `(input, in-progress output)` pair. All entries are
//! combined with logical AND; an empty map is vacuously true.
//!
//! Malformed condition specs (unknown property name, comparison value that
//! does not validate for the property, invalid regex) fail at assembly time,
//! never silently per message at runtime.

pub mod predicate;
pub mod readers;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::config::ConfigurationError;
use crate::models::{InputAviationMessage, MessageFields};

pub use predicate::{CompiledPredicate, GeneralPropertyPredicate};
pub use readers::PropertyReaderRegistry;

/// Extracts one named, typed property from the `(input, output)` pair.
///
/// `validate` is called at assembly time for every comparison value the
/// configuration pairs with this property, so that e.g. a message-type name
/// that does not exist in the configured type table is rejected before the
/// pipeline starts.
pub trait ConditionPropertyReader: Send + Sync {
    /// Property name as used in `activate_on` maps.
    fn name(&self) -> &str;

    /// Extract the property value, `None` when unset.
    fn read(&self, input: &InputAviationMessage, fields: &dyn MessageFields) -> Option<Value>;

    /// Check that a configured comparison value is legal for this property.
    fn validate(&self, value: &Value) -> Result<(), ConfigurationError> {
        let _ = value;
        Ok(())
    }
}

/// One `(reader, predicate)` pair of an activation condition.
pub struct PropertyCondition {
    reader: Arc<dyn ConditionPropertyReader>,
    predicate: CompiledPredicate,
}

impl PropertyCondition {
    pub fn new(reader: Arc<dyn ConditionPropertyReader>, predicate: CompiledPredicate) -> Self {
        Self { reader, predicate }
    }

    pub fn matches(&self, input: &InputAviationMessage, fields: &dyn MessageFields) -> bool {
        let value = self.reader.read(input, fields);
        self.predicate.test(value.as_ref())
    }
}

/// Conjunction of property conditions gating one component.
///
/// Re-evaluated per message: builder state changes as the chain progresses,
/// so a condition can match for one populator invocation and not the next.
#[derive(Default)]
pub struct ActivationCondition {
    conditions: Vec<PropertyCondition>,
}

impl ActivationCondition {
    /// Condition that is always active.
    pub fn always() -> Self {
        Self::default()
    }

    /// Combine conditions with logical AND. Zero conditions is vacuously
    /// true.
    pub fn and(conditions: Vec<PropertyCondition>) -> Self {
        Self { conditions }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn is_active(&self, input: &InputAviationMessage, fields: &dyn MessageFields) -> bool {
        self.conditions
            .iter()
            .all(|condition| condition.matches(input, fields))
    }
}

/// Build an [`ActivationCondition`] from an `activate_on` map, resolving
/// property names through `readers` and validating every comparison value.
pub fn build_activation_condition(
    readers: &PropertyReaderRegistry,
    activate_on: &BTreeMap<String, GeneralPropertyPredicate>,
) -> Result<ActivationCondition, ConfigurationError> {
    let mut conditions = Vec::with_capacity(activate_on.len());
    for (property, predicate) in activate_on {
        let reader = readers.get(property)?;
        let compiled = predicate.compile(property, reader.as_ref())?;
        conditions.push(PropertyCondition::new(reader, compiled));
    }
    Ok(ActivationCondition::and(conditions))
}
