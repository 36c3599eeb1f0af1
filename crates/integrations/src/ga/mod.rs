//! Google Analytics Cordova adapter. Forwards page views, identifies,
//! events and completed orders to the Google Analytics mobile plugin.
//!
//! Options:
//!
//! | option       | default | meaning                                           |
//! |--------------|---------|---------------------------------------------------|
//! | `debug`      | `false` | switch the plugin to debug mode on initialize     |
//! | `dimensions` | `{}`    | user trait path → custom dimension key            |
//! | `sendUserId` | `false` | forward the user id on initialize and identify    |
//! | `trackingId` | `""`    | property id passed to `startTrackerWithId`        |

pub mod tracker;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use bridge_core::facade::{Identify, Page, Track};
use bridge_core::integration::{Integration, IntegrationDescriptor};
use bridge_core::user::UserContext;
use bridge_core::BridgeResult;

pub use tracker::{GaCall, GaTracker, LoggingGaTracker, RecordingGaTracker};

pub const NAME: &str = "Google Analytics Cordova";
pub const SETTINGS_KEY: &str = "google_analytics_cordova";

/// Category used for events when neither the event nor a preceding page
/// supplies one.
const DEFAULT_CATEGORY: &str = "All";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GaOptions {
    pub debug: bool,
    /// Trait path → dimension key, e.g. `{"revenue": "dimension8"}`.
    pub dimensions: BTreeMap<String, String>,
    pub send_user_id: bool,
    pub tracking_id: String,
}

pub fn descriptor() -> IntegrationDescriptor {
    IntegrationDescriptor::new(NAME, SETTINGS_KEY)
        .ready_on_initialize()
        .option("debug", json!(false))
        .option("dimensions", json!({}))
        .option("sendUserId", json!(false))
        .option("trackingId", json!(""))
}

pub struct GoogleAnalyticsCordova {
    descriptor: IntegrationDescriptor,
    options: GaOptions,
    tracker: Arc<dyn GaTracker>,
    /// Category of the most recent page, reused by events without one.
    page_category: Option<String>,
}

impl GoogleAnalyticsCordova {
    pub fn new(options: GaOptions, tracker: Arc<dyn GaTracker>) -> Self {
        Self {
            descriptor: descriptor(),
            options,
            tracker,
            page_category: None,
        }
    }

    /// Build from a raw settings block, filling unset options with defaults.
    pub fn from_settings(settings: Option<&Value>, tracker: Arc<dyn GaTracker>) -> BridgeResult<Self> {
        let options = descriptor().parse_options(settings)?;
        Ok(Self::new(options, tracker))
    }

    pub fn options(&self) -> &GaOptions {
        &self.options
    }

    /// Report each configured trait that the user actually has as a custom
    /// dimension.
    fn set_dimensions(&self, user: &UserContext) {
        for (trait_path, key) in &self.options.dimensions {
            match user.trait_value(trait_path) {
                Some(value) => self.tracker.add_custom_dimension(key, value),
                None => debug!(trait_path = %trait_path, "no trait value for custom dimension"),
            }
        }
    }
}

/// Event values must be non-negative integers.
fn format_value(value: Option<f64>) -> i64 {
    match value {
        Some(v) if v > 0.0 => v.round() as i64,
        _ => 0,
    }
}

impl Integration for GoogleAnalyticsCordova {
    fn descriptor(&self) -> &IntegrationDescriptor {
        &self.descriptor
    }

    fn initialize(&mut self, user: &UserContext) {
        if self.options.debug {
            self.tracker.debug_mode();
        }

        self.tracker.start_tracker_with_id(&self.options.tracking_id);

        if self.options.send_user_id {
            if let Some(id) = user.id() {
                self.tracker.set_user_id(id);
            }
        }

        self.set_dimensions(user);
    }

    fn loaded(&self) -> bool {
        self.tracker.is_present()
    }

    fn page(&mut self, page: &Page) {
        self.page_category = page.category();
        self.tracker.track_view(page.url().as_deref());
    }

    fn identify(&mut self, identify: &Identify) {
        if !self.options.send_user_id {
            return;
        }
        if let Some(id) = identify.user_id() {
            self.tracker.set_user_id(id);
        }
    }

    fn track(&mut self, track: &Track, options: Option<&Value>) {
        let options = options.or_else(|| track.options(NAME));
        let category = track
            .category()
            .or_else(|| self.page_category.clone())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
        let value = track
            .value()
            .filter(|v| *v != 0.0)
            .or_else(|| track.revenue());

        debug!(
            event = track.event(),
            category = %category,
            options = ?options,
            "forwarding event"
        );

        self.tracker.track_event(
            &category,
            track.event(),
            track.label().as_deref(),
            format_value(value),
        );
    }

    fn completed_order(&mut self, track: &Track) {
        let Some(order_id) = track.order_id() else {
            debug!(event = track.event(), "completed order without an order id, skipping");
            return;
        };
        let total = track.total().unwrap_or(0.0);

        self.tracker.add_transaction(
            &order_id,
            track.affiliation().as_deref(),
            total,
            track.tax(),
            track.shipping(),
        );

        for product in track.products() {
            self.tracker.add_transaction_item(
                &order_id,
                product.name().as_deref(),
                product.sku().as_deref(),
                product.category().as_deref(),
                product.price(),
                product.quantity(),
            );
        }
    }
}
