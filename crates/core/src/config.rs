use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::BridgeResult;

/// Root bridge configuration. Loaded from an optional TOML file and from
/// environment variables with the prefix `ANALYTICS_BRIDGE__`.
///
/// ```toml
/// queue_capacity = 50
///
/// [integrations.google_analytics_cordova]
/// trackingId = "UA-000000-1"
/// sendUserId = true
///
/// [integrations.quantcast_cordova]
/// key = "qc-api-key"
/// globalLabels = ["mobile", "beta"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Messages held per integration while it is not yet ready.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Raw settings blocks keyed by each integration's settings key. An
    /// integration without a block is not registered by the binary.
    #[serde(default)]
    pub integrations: HashMap<String, serde_json::Value>,
}

fn default_queue_capacity() -> usize {
    100
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            integrations: HashMap::new(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from `path` (if given) overlaid with environment
    /// variables, e.g. `ANALYTICS_BRIDGE__INTEGRATIONS__QUANTCAST_CORDOVA__KEY`.
    ///
    /// Environment values stay strings. Each integration converts them to the
    /// type of the option they set when its settings are parsed (see
    /// [`crate::IntegrationDescriptor::parse_options`]).
    pub fn load(path: Option<&Path>) -> BridgeResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("ANALYTICS_BRIDGE").separator("__"),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Settings block for one integration, if configured.
    pub fn settings(&self, settings_key: &str) -> Option<&serde_json::Value> {
        self.integrations.get(settings_key)
    }
}
