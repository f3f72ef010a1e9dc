//! General property predicate as declared in `activate_on` maps.
//!
//! A predicate is deserialized from configuration, then compiled once per
//! chain assembly: regexes are built, comparison values are validated by the
//! property's reader, and specs with no constraints at all are rejected.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ConditionPropertyReader;
use crate::config::ConfigurationError;

/// Declarative form of one property predicate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GeneralPropertyPredicate {
    /// Property value must equal this value.
    pub is: Option<Value>,
    /// Property value must equal one of these values.
    pub is_any_of: Vec<Value>,
    /// Property value must not equal this value.
    pub is_not: Option<Value>,
    /// Property value must not equal any of these values.
    pub is_not_any_of: Vec<Value>,
    /// Property value, rendered as a string, must match this pattern.
    pub matches: Option<String>,
    /// Property value, rendered as a string, must not match this pattern.
    pub does_not_match: Option<String>,
    /// `true` requires the property to be set, `false` requires it unset.
    pub presence: Option<bool>,
}

impl GeneralPropertyPredicate {
    /// Validate and compile this predicate for `reader`'s property.
    pub fn compile(
        &self,
        property: &str,
        reader: &dyn ConditionPropertyReader,
    ) -> Result<CompiledPredicate, ConfigurationError> {
        if self.is_empty() {
            return Err(ConfigurationError::InvalidPredicate {
                property: property.to_string(),
                reason: "predicate specifies no conditions".to_string(),
            });
        }

        for value in self.comparison_values() {
            reader
                .validate(value)
                .map_err(|error| ConfigurationError::InvalidPredicate {
                    property: property.to_string(),
                    reason: error.to_string(),
                })?;
        }

        let compile_regex = |pattern: &Option<String>| -> Result<Option<Regex>, ConfigurationError> {
            pattern
                .as_deref()
                .map(|pattern| {
                    Regex::new(pattern).map_err(|error| ConfigurationError::InvalidPredicate {
                        property: property.to_string(),
                        reason: format!("invalid pattern '{pattern}': {error}"),
                    })
                })
                .transpose()
        };

        Ok(CompiledPredicate {
            is: self.is.clone(),
            is_any_of: self.is_any_of.clone(),
            is_not: self.is_not.clone(),
            is_not_any_of: self.is_not_any_of.clone(),
            matches: compile_regex(&self.matches)?,
            does_not_match: compile_regex(&self.does_not_match)?,
            presence: self.presence,
        })
    }

    fn is_empty(&self) -> bool {
        self.is.is_none()
            && self.is_any_of.is_empty()
            && self.is_not.is_none()
            && self.is_not_any_of.is_empty()
            && self.matches.is_none()
            && self.does_not_match.is_none()
            && self.presence.is_none()
    }

    fn comparison_values(&self) -> impl Iterator<Item = &Value> {
        self.is
            .iter()
            .chain(self.is_any_of.iter())
            .chain(self.is_not.iter())
            .chain(self.is_not_any_of.iter())
    }
}

/// Validated, ready-to-evaluate form of a [`GeneralPropertyPredicate`].
#[derive(Debug, Clone)]
pub struct CompiledPredicate {
    is: Option<Value>,
    is_any_of: Vec<Value>,
    is_not: Option<Value>,
    is_not_any_of: Vec<Value>,
    matches: Option<Regex>,
    does_not_match: Option<Regex>,
    presence: Option<bool>,
}

impl CompiledPredicate {
    /// Evaluate against an extracted property value.
    ///
    /// An unset property satisfies only predicates without positive
    /// requirements: `is`, `is_any_of`, `matches` and `presence: true` all
    /// require a value to be present.
    pub fn test(&self, value: Option<&Value>) -> bool {
        let Some(value) = value else {
            return self.is.is_none()
                && self.is_any_of.is_empty()
                && self.matches.is_none()
                && self.presence != Some(true);
        };

        if self.presence == Some(false) {
            return false;
        }
        if let Some(expected) = &self.is {
            if value != expected {
                return false;
            }
        }
        if !self.is_any_of.is_empty() && !self.is_any_of.contains(value) {
            return false;
        }
        if let Some(forbidden) = &self.is_not {
            if value == forbidden {
                return false;
            }
        }
        if self.is_not_any_of.contains(value) {
            return false;
        }
        let rendered = render(value);
        if let Some(pattern) = &self.matches {
            if !pattern.is_match(&rendered) {
                return false;
            }
        }
        if let Some(pattern) = &self.does_not_match {
            if pattern.is_match(&rendered) {
                return false;
            }
        }
        true
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
