//! Built-in condition property readers and their registry.
//!
//! Readers extract values from the `(input, in-progress output)` pair.
//! Where a property has both an input-side and an output-side source (the
//! station ICAO code is parsed from the message but may be replaced by a
//! populator), the output side wins once set.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::ConditionPropertyReader;
use crate::config::{ConfigurationError, LookupTables};
use crate::models::{InputAviationMessage, MessageFields};

/// Registry resolving `activate_on` property names to readers.
pub struct PropertyReaderRegistry {
    readers: HashMap<String, Arc<dyn ConditionPropertyReader>>,
}

impl PropertyReaderRegistry {
    pub fn new() -> Self {
        Self {
            readers: HashMap::new(),
        }
    }

    /// Registry with the built-in readers, validated against the configured
    /// lookup tables.
    pub fn with_builtin_readers(tables: Arc<LookupTables>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ProductReader));
        registry.register(Arc::new(FormatReader {
            tables: tables.clone(),
        }));
        registry.register(Arc::new(TypeReader {
            tables: tables.clone(),
        }));
        registry.register(Arc::new(RouteReader { tables }));
        registry.register(Arc::new(StationIcaoCodeReader));
        registry.register(Arc::new(ValidFromReader));
        registry
    }

    pub fn register(&mut self, reader: Arc<dyn ConditionPropertyReader>) {
        self.readers.insert(reader.name().to_string(), reader);
    }

    pub fn get(
        &self,
        name: &str,
    ) -> Result<Arc<dyn ConditionPropertyReader>, ConfigurationError> {
        self.readers
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownProperty {
                name: name.to_string(),
            })
    }
}

impl Default for PropertyReaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn expect_string(value: &Value, property: &str) -> Result<(), ConfigurationError> {
    if value.is_string() {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidPredicate {
            property: property.to_string(),
            reason: format!("expected a string value, got {value}"),
        })
    }
}

/// `product`: identifier of the product the file arrived under.
struct ProductReader;

impl ConditionPropertyReader for ProductReader {
    fn name(&self) -> &str {
        "product"
    }

    fn read(&self, input: &InputAviationMessage, _: &dyn MessageFields) -> Option<Value> {
        Some(Value::String(
            input.file_metadata.file_reference.product_id().to_string(),
        ))
    }

    fn validate(&self, value: &Value) -> Result<(), ConfigurationError> {
        expect_string(value, self.name())
    }
}

/// `format`: file format name of the input file; must name a configured
/// format.
struct FormatReader {
    tables: Arc<LookupTables>,
}

impl ConditionPropertyReader for FormatReader {
    fn name(&self) -> &str {
        "format"
    }

    fn read(&self, input: &InputAviationMessage, _: &dyn MessageFields) -> Option<Value> {
        Some(Value::String(input.file_metadata.format.clone()))
    }

    fn validate(&self, value: &Value) -> Result<(), ConfigurationError> {
        expect_string(value, self.name())?;
        let name = value.as_str().unwrap_or_default();
        if self.tables.formats.contains_key(name) {
            Ok(())
        } else {
            Err(ConfigurationError::InvalidPredicate {
                property: self.name().to_string(),
                reason: format!("'{name}' is not a configured format"),
            })
        }
    }
}

/// `type`: parsed message type name; must name a configured message type.
struct TypeReader {
    tables: Arc<LookupTables>,
}

impl ConditionPropertyReader for TypeReader {
    fn name(&self) -> &str {
        "type"
    }

    fn read(&self, input: &InputAviationMessage, _: &dyn MessageFields) -> Option<Value> {
        input.message_type.clone().map(Value::String)
    }

    fn validate(&self, value: &Value) -> Result<(), ConfigurationError> {
        expect_string(value, self.name())?;
        let name = value.as_str().unwrap_or_default();
        if self.tables.message_types.contains_key(name) {
            Ok(())
        } else {
            Err(ConfigurationError::InvalidPredicate {
                property: self.name().to_string(),
                reason: format!("'{name}' is not a configured message type"),
            })
        }
    }
}

/// `route`: route name the message's product is configured with.
struct RouteReader {
    tables: Arc<LookupTables>,
}

impl ConditionPropertyReader for RouteReader {
    fn name(&self) -> &str {
        "route"
    }

    fn read(&self, input: &InputAviationMessage, _: &dyn MessageFields) -> Option<Value> {
        self.tables
            .product_routes
            .get(input.file_metadata.file_reference.product_id())
            .cloned()
            .map(Value::String)
    }

    fn validate(&self, value: &Value) -> Result<(), ConfigurationError> {
        expect_string(value, self.name())?;
        let name = value.as_str().unwrap_or_default();
        if self.tables.routes.contains_key(name) {
            Ok(())
        } else {
            Err(ConfigurationError::InvalidPredicate {
                property: self.name().to_string(),
                reason: format!("'{name}' is not a configured route"),
            })
        }
    }
}

/// `station`: station ICAO code; the in-progress output wins over the parsed
/// location indicator once a populator has set it.
struct StationIcaoCodeReader;

impl ConditionPropertyReader for StationIcaoCodeReader {
    fn name(&self) -> &str {
        "station"
    }

    fn read(&self, input: &InputAviationMessage, fields: &dyn MessageFields) -> Option<Value> {
        fields
            .station_icao_code()
            .map(str::to_string)
            .or_else(|| input.location_indicator.clone())
            .map(Value::String)
    }

    fn validate(&self, value: &Value) -> Result<(), ConfigurationError> {
        expect_string(value, self.name())
    }
}

/// `valid_from`: start of the validity period from the in-progress output,
/// falling back to the parsed input. Rendered as RFC 3339, mostly useful
/// with `presence` predicates.
struct ValidFromReader;

impl ConditionPropertyReader for ValidFromReader {
    fn name(&self) -> &str {
        "valid_from"
    }

    fn read(&self, input: &InputAviationMessage, fields: &dyn MessageFields) -> Option<Value> {
        fields
            .valid_from()
            .or(input.valid_from)
            .map(|time| Value::String(time.to_rfc3339()))
    }
}
