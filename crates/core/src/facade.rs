//! Event envelopes: page, identify and track messages as delivered by the
//! host application, with typed accessors over their property mappings.
//!
//! Accessors never fail: a missing or mistyped property reads as `None`.
//! Property lookups go through [`crate::path`], so nested and loosely-cased
//! keys resolve the same way everywhere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{BridgeError, BridgeResult};
use crate::path;

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Fields shared by every message type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(default = "Uuid::new_v4")]
    pub message_id: Uuid,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Per-integration switches and option blocks, keyed by integration name.
    /// `"All": false` disables every integration not explicitly enabled.
    #[serde(default)]
    pub integrations: Map<String, Value>,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            message_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            user_id: None,
            integrations: Map::new(),
        }
    }
}

impl Envelope {
    /// The user id, if present and non-empty.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Option block addressed to one integration.
    pub fn options(&self, integration: &str) -> Option<&Value> {
        self.integrations.get(integration).filter(|v| v.is_object())
    }

    /// Whether this message should reach `integration`.
    pub fn is_enabled_for(&self, integration: &str) -> bool {
        match self.integrations.get(integration) {
            Some(Value::Bool(enabled)) => *enabled,
            Some(_) => true,
            None => !matches!(self.integrations.get("All"), Some(Value::Bool(false))),
        }
    }
}

/// A message delivered to the dispatch registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Page(Page),
    Identify(Identify),
    Track(Track),
}

impl Message {
    /// Parse one JSON-encoded message.
    pub fn from_json(raw: &str) -> BridgeResult<Self> {
        serde_json::from_str(raw).map_err(|e| BridgeError::Message(e.to_string()))
    }

    pub fn envelope(&self) -> &Envelope {
        match self {
            Message::Page(page) => &page.envelope,
            Message::Identify(identify) => &identify.envelope,
            Message::Track(track) => &track.envelope,
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Page(_) => "page",
            Message::Identify(_) => "identify",
            Message::Track(_) => "track",
        }
    }
}

/// A screen or page view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "empty_object")]
    pub properties: Value,
}

impl Page {
    pub fn new(category: Option<&str>, properties: Value) -> Self {
        Self {
            envelope: Envelope::default(),
            name: None,
            category: category.map(str::to_string),
            properties,
        }
    }

    pub fn properties(&self) -> &Value {
        &self.properties
    }

    /// The page category, falling back to `properties.category`.
    pub fn category(&self) -> Option<String> {
        self.category
            .clone()
            .filter(|c| !c.is_empty())
            .or_else(|| path::get_string(&self.properties, "category"))
    }

    pub fn url(&self) -> Option<String> {
        path::get_string(&self.properties, "url")
    }
}

/// Associates the current user with an id and traits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Identify {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default = "empty_object")]
    pub traits: Value,
}

impl Identify {
    pub fn new(user_id: Option<&str>, traits: Value) -> Self {
        Self {
            envelope: Envelope {
                user_id: user_id.map(str::to_string),
                ..Envelope::default()
            },
            traits,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.envelope.user_id()
    }

    pub fn traits(&self) -> &Value {
        &self.traits
    }
}

/// A named user action with free-form properties.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Track {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub event: String,
    #[serde(default = "empty_object")]
    pub properties: Value,
}

impl Track {
    pub fn new(event: impl Into<String>, properties: Value) -> Self {
        Self {
            envelope: Envelope::default(),
            event: event.into(),
            properties,
        }
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn properties(&self) -> &Value {
        &self.properties
    }

    pub fn user_id(&self) -> Option<&str> {
        self.envelope.user_id()
    }

    pub fn options(&self, integration: &str) -> Option<&Value> {
        self.envelope.options(integration)
    }

    /// Matches "Completed Order", "completed_order", "completedOrder" and
    /// friends.
    pub fn is_completed_order(&self) -> bool {
        let lower = self.event.to_ascii_lowercase();
        let separator = |c: char| c == ' ' || c == '_';
        let trimmed = lower.strip_prefix(separator).unwrap_or(&lower);
        let trimmed = trimmed.strip_suffix(separator).unwrap_or(trimmed);
        matches!(
            trimmed,
            "completedorder" | "completed order" | "completed_order"
        )
    }

    pub fn category(&self) -> Option<String> {
        path::get_string(&self.properties, "category")
    }

    pub fn label(&self) -> Option<String> {
        path::get_string(&self.properties, "label")
    }

    pub fn value(&self) -> Option<f64> {
        path::get_number(&self.properties, "value")
    }

    /// `properties.revenue`; completed orders fall back to `properties.total`.
    pub fn revenue(&self) -> Option<f64> {
        path::get_number(&self.properties, "revenue").or_else(|| {
            if self.is_completed_order() {
                path::get_number(&self.properties, "total")
            } else {
                None
            }
        })
    }

    pub fn total(&self) -> Option<f64> {
        path::get_number(&self.properties, "total").or_else(|| self.revenue())
    }

    /// `properties.id`, falling back to `properties.orderId`.
    pub fn order_id(&self) -> Option<String> {
        path::get_string(&self.properties, "id")
            .or_else(|| path::get_string(&self.properties, "orderId"))
    }

    pub fn affiliation(&self) -> Option<String> {
        path::get_string(&self.properties, "affiliation")
    }

    pub fn tax(&self) -> Option<f64> {
        path::get_number(&self.properties, "tax")
    }

    pub fn shipping(&self) -> Option<f64> {
        path::get_number(&self.properties, "shipping")
    }

    /// Line items of an order, in list order. Non-object entries are skipped.
    pub fn products(&self) -> Vec<Product> {
        match path::get(&self.properties, "products") {
            Some(Value::Array(items)) => items
                .iter()
                .filter(|item| item.is_object())
                .cloned()
                .map(Product)
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// One line item of an order.
#[derive(Debug, Clone, PartialEq)]
pub struct Product(pub Value);

impl Product {
    pub fn name(&self) -> Option<String> {
        path::get_string(&self.0, "name")
    }

    pub fn sku(&self) -> Option<String> {
        path::get_string(&self.0, "sku")
    }

    pub fn category(&self) -> Option<String> {
        path::get_string(&self.0, "category")
    }

    pub fn price(&self) -> Option<f64> {
        path::get_number(&self.0, "price")
    }

    /// Defaults to a single unit.
    pub fn quantity(&self) -> f64 {
        path::get_number(&self.0, "quantity").unwrap_or(1.0)
    }
}
