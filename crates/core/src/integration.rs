//! Integration trait, the seam between the dispatch registry and each
//! vendor adapter.
//!
//! An adapter declares itself through an [`IntegrationDescriptor`] (name,
//! options with defaults, lifecycle flags) and implements the event methods
//! it supports. Event methods never fail; an adapter that cannot forward a
//! call simply skips it.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{BridgeError, BridgeResult};
use crate::facade::{Identify, Page, Track};
use crate::user::UserContext;

/// A declared option and its default value.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OptionSpec {
    pub name: &'static str,
    pub default: Value,
}

/// Registration record for one integration.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IntegrationDescriptor {
    /// Display name; also the key under a message's `integrations` block.
    pub name: &'static str,
    /// Key of the settings block in [`crate::config::BridgeConfig`].
    pub settings_key: &'static str,
    pub options: Vec<OptionSpec>,
    /// Readiness is checked as soon as `initialize` returns.
    pub ready_on_initialize: bool,
    /// Initialization is deferred to the first page message, which stands in
    /// for the vendor's own startup pageview.
    pub assumes_pageview: bool,
}

impl IntegrationDescriptor {
    pub fn new(name: &'static str, settings_key: &'static str) -> Self {
        Self {
            name,
            settings_key,
            options: Vec::new(),
            ready_on_initialize: false,
            assumes_pageview: false,
        }
    }

    pub fn option(mut self, name: &'static str, default: Value) -> Self {
        self.options.push(OptionSpec { name, default });
        self
    }

    pub fn ready_on_initialize(mut self) -> Self {
        self.ready_on_initialize = true;
        self
    }

    pub fn assumes_pageview(mut self) -> Self {
        self.assumes_pageview = true;
        self
    }

    /// Every declared option at its default.
    pub fn defaults(&self) -> Map<String, Value> {
        self.options
            .iter()
            .map(|option| (option.name.to_string(), option.default.clone()))
            .collect()
    }

    /// Overlay `settings` on the declared defaults and deserialize the result.
    ///
    /// Setting names match declared options case-insensitively, ignoring `_`
    /// and `-`, so `tracking_id` and `TRACKINGID` both set `trackingId`.
    /// Undeclared settings are ignored with a warning.
    ///
    /// Values are converted towards the type of the option's default: strings
    /// become booleans, numbers or comma-separated lists, and scalars become
    /// strings for options defaulting to a string or `null`. Settings coming
    /// from environment variables are always strings.
    pub fn parse_options<T: DeserializeOwned>(&self, settings: Option<&Value>) -> BridgeResult<T> {
        let mut merged = self.defaults();

        match settings {
            Some(Value::Object(values)) => {
                for (key, value) in values {
                    match self.declared(key) {
                        Some(option) => {
                            merged.insert(
                                option.name.to_string(),
                                coerce(&option.default, value.clone()),
                            );
                        }
                        None => warn!(
                            integration = self.name,
                            setting = %key,
                            "ignoring undeclared integration setting"
                        ),
                    }
                }
            }
            Some(Value::Null) | None => {}
            Some(other) => {
                warn!(
                    integration = self.name,
                    settings = %other,
                    "integration settings are not an object, using defaults"
                );
            }
        }

        serde_json::from_value(Value::Object(merged)).map_err(|source| BridgeError::Settings {
            integration: self.name.to_string(),
            source,
        })
    }

    fn declared(&self, key: &str) -> Option<&OptionSpec> {
        let wanted = fold(key);
        self.options
            .iter()
            .find(|option| option.name == key || fold(option.name) == wanted)
    }
}

/// Convert `value` towards the JSON type of `default`. Values that do not
/// convert are passed through and rejected by deserialization.
fn coerce(default: &Value, value: Value) -> Value {
    match (default, value) {
        (Value::Bool(_), Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(s),
        },
        (Value::Number(_), Value::String(s)) => match serde_json::from_str::<Value>(s.trim()) {
            Ok(number @ Value::Number(_)) => number,
            _ => Value::String(s),
        },
        (Value::Array(_), Value::String(s)) => Value::Array(
            s.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| Value::String(item.to_string()))
                .collect(),
        ),
        (Value::String(_) | Value::Null, Value::Number(n)) => Value::String(n.to_string()),
        (Value::String(_) | Value::Null, Value::Bool(b)) => Value::String(b.to_string()),
        (_, value) => value,
    }
}

fn fold(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Lifecycle of a registered integration. There is no way back from `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Uninitialized,
    Initializing,
    Ready,
}

/// A vendor adapter driven by the dispatch registry.
pub trait Integration: Send {
    fn descriptor(&self) -> &IntegrationDescriptor;

    fn name(&self) -> &'static str {
        self.descriptor().name
    }

    /// Called exactly once by the registry.
    fn initialize(&mut self, user: &UserContext);

    /// Whether the vendor SDK is reachable. Polled by the registry until true.
    fn loaded(&self) -> bool;

    fn page(&mut self, _page: &Page) {}

    fn identify(&mut self, _identify: &Identify) {}

    /// `options` are per-call options supplied by the caller; when absent the
    /// adapter may read the message's own `integrations.<name>` block.
    fn track(&mut self, _track: &Track, _options: Option<&Value>) {}

    /// Order completions; adapters without e-commerce support see a plain
    /// track with the message's own options.
    fn completed_order(&mut self, track: &Track) {
        let name = self.name();
        self.track(track, track.options(name));
    }
}
