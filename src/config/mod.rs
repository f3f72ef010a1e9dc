//! # Archiver Configuration System
//!
//! Typed, validated configuration for products, lookup tables and the
//! populator/post-action chains.
//!
//! ## Architecture
//!
//! - **Single source of truth**: configuration comes from layered files
//!   loaded through [`ConfigManager`], with environment overrides.
//! - **Explicit validation**: unknown component names, unknown activation
//!   properties and values that do not validate for their property are
//!   configuration-time errors raised at assembly, never silent runtime
//!   behavior.
//! - **No reflection**: components are instantiated through typed factory
//!   registries keyed by the spec's `name` field.

pub mod loader;

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conditions::GeneralPropertyPredicate;
use crate::resilience::RetryPolicy;

pub use loader::ConfigManager;

/// Configuration-time failure. Raised during assembly (startup or first
/// use) and always fatal; the archiver never starts with an invalid chain.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("unknown message populator: {name}")]
    UnknownPopulator { name: String },

    #[error("unknown post action: {name}")]
    UnknownPostAction { name: String },

    #[error("unknown activation property: {name}")]
    UnknownProperty { name: String },

    #[error("invalid activation predicate for property '{property}': {reason}")]
    InvalidPredicate { property: String, reason: String },

    #[error("invalid configuration for component '{component}': {reason}")]
    InvalidComponentConfig { component: String, reason: String },

    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },

    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// One configured aviation product: where its files arrive, how they are
/// routed and formatted, and where they end up after processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductConfig {
    pub id: String,
    /// Route name; must exist in the route lookup table.
    pub route: String,
    /// File format name; must exist in the format lookup table.
    pub format: String,
    pub input_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub fail_dir: PathBuf,
}

/// Declaration of one populator or post-action instance.
///
/// `activate_on` maps property names to predicates combined with logical
/// AND; an empty map means the component is always active. `config` carries
/// component-specific settings interpreted by the component's factory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub name: String,
    #[serde(default)]
    pub activate_on: BTreeMap<String, GeneralPropertyPredicate>,
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
}

/// Worker-pool and shutdown tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingSettings {
    /// Maximum number of files processed concurrently.
    pub worker_count: usize,
    /// Bounded wait for a worker-pool slot before a submission is rejected.
    pub intake_max_wait_ms: u64,
    /// Interval between liveness polls during graceful shutdown.
    pub shutdown_poll_interval_ms: u64,
    /// Per-attempt timeout for asynchronously executed post-actions.
    pub post_action_timeout_ms: u64,
    /// Grace period for draining in-flight post-actions on close.
    pub post_action_drain_ms: u64,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            worker_count: 4,
            intake_max_wait_ms: 10_000,
            shutdown_poll_interval_ms: 250,
            post_action_timeout_ms: 30_000,
            post_action_drain_ms: 20_000,
        }
    }
}

impl ProcessingSettings {
    pub fn intake_max_wait(&self) -> Duration {
        Duration::from_millis(self.intake_max_wait_ms)
    }

    pub fn shutdown_poll_interval(&self) -> Duration {
        Duration::from_millis(self.shutdown_poll_interval_ms)
    }

    pub fn post_action_timeout(&self) -> Duration {
        Duration::from_millis(self.post_action_timeout_ms)
    }

    pub fn post_action_drain(&self) -> Duration {
        Duration::from_millis(self.post_action_drain_ms)
    }
}

/// Retry tuning as written in configuration files; converted to a
/// [`RetryPolicy`] for the resilience layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub initial_interval_ms: u64,
    pub multiplier: f64,
    pub max_interval_ms: u64,
    /// `None` retries indefinitely (bounded only by `max_elapsed_ms`).
    pub max_attempts: Option<u32>,
    pub max_elapsed_ms: Option<u64>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            initial_interval_ms: 500,
            multiplier: 2.0,
            max_interval_ms: 60_000,
            max_attempts: Some(10),
            max_elapsed_ms: None,
        }
    }
}

impl RetrySettings {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            initial_interval: Duration::from_millis(self.initial_interval_ms),
            multiplier: self.multiplier,
            max_interval: Duration::from_millis(self.max_interval_ms),
            max_attempts: self.max_attempts,
            max_elapsed: self.max_elapsed_ms.map(Duration::from_millis),
        }
    }
}

/// Static name-to-id lookup tables shared by populators and condition
/// property readers.
#[derive(Debug, Clone, Default)]
pub struct LookupTables {
    pub message_types: HashMap<String, i32>,
    pub formats: HashMap<String, i32>,
    pub routes: HashMap<String, i32>,
    /// Product id to configured route name.
    pub product_routes: HashMap<String, String>,
}

/// Root configuration of the archiver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiverConfig {
    pub products: Vec<ProductConfig>,
    pub message_types: HashMap<String, i32>,
    pub formats: HashMap<String, i32>,
    pub routes: HashMap<String, i32>,
    #[serde(default)]
    pub message_populators: Vec<ComponentSpec>,
    #[serde(default)]
    pub post_actions: Vec<ComponentSpec>,
    #[serde(default)]
    pub processing: ProcessingSettings,
    #[serde(default)]
    pub retry: RetrySettings,
}

impl ArchiverConfig {
    /// Structural validation beyond deserialization. Chain assembly performs
    /// its own component-level validation on top of this.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.products.is_empty() {
            return Err(ConfigurationError::Invalid {
                reason: "at least one product must be configured".to_string(),
            });
        }
        for product in &self.products {
            if !self.routes.contains_key(&product.route) {
                return Err(ConfigurationError::Invalid {
                    reason: format!(
                        "product '{}' references unknown route '{}'",
                        product.id, product.route
                    ),
                });
            }
            if !self.formats.contains_key(&product.format) {
                return Err(ConfigurationError::Invalid {
                    reason: format!(
                        "product '{}' references unknown format '{}'",
                        product.id, product.format
                    ),
                });
            }
        }
        if self.processing.worker_count == 0 {
            return Err(ConfigurationError::Invalid {
                reason: "processing.worker_count must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn lookup_tables(&self) -> LookupTables {
        LookupTables {
            message_types: self.message_types.clone(),
            formats: self.formats.clone(),
            routes: self.routes.clone(),
            product_routes: self
                .products
                .iter()
                .map(|product| (product.id.clone(), product.route.clone()))
                .collect(),
        }
    }

    pub fn product(&self, product_id: &str) -> Option<&ProductConfig> {
        self.products.iter().find(|product| product.id == product_id)
    }
}
