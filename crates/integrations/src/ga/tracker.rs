//! Call surface of the Google Analytics mobile plugin, plus two stock
//! implementations: a recorder for tests and inspection, and a tracing
//! logger for hosts without the native SDK.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

/// The plugin's global tracking object. Argument order mirrors the plugin's
/// positional signatures.
pub trait GaTracker: Send + Sync {
    /// Whether the plugin object is exposed by the host runtime.
    fn is_present(&self) -> bool;

    fn debug_mode(&self);

    fn start_tracker_with_id(&self, tracking_id: &str);

    fn set_user_id(&self, user_id: &str);

    fn track_view(&self, url: Option<&str>);

    fn track_event(&self, category: &str, action: &str, label: Option<&str>, value: i64);

    fn add_custom_dimension(&self, key: &str, value: &Value);

    fn add_transaction(
        &self,
        order_id: &str,
        affiliation: Option<&str>,
        total: f64,
        tax: Option<f64>,
        shipping: Option<f64>,
    );

    fn add_transaction_item(
        &self,
        order_id: &str,
        name: Option<&str>,
        sku: Option<&str>,
        category: Option<&str>,
        price: Option<f64>,
        quantity: f64,
    );
}

/// One recorded plugin call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum GaCall {
    DebugMode,
    StartTracker {
        tracking_id: String,
    },
    SetUserId {
        user_id: String,
    },
    TrackView {
        url: Option<String>,
    },
    TrackEvent {
        category: String,
        action: String,
        label: Option<String>,
        value: i64,
    },
    AddCustomDimension {
        key: String,
        value: Value,
    },
    AddTransaction {
        order_id: String,
        affiliation: Option<String>,
        total: f64,
        tax: Option<f64>,
        shipping: Option<f64>,
    },
    AddTransactionItem {
        order_id: String,
        name: Option<String>,
        sku: Option<String>,
        category: Option<String>,
        price: Option<f64>,
        quantity: f64,
    },
}

/// In-memory tracker that captures calls in order.
pub struct RecordingGaTracker {
    calls: Mutex<Vec<GaCall>>,
    present: AtomicBool,
}

impl RecordingGaTracker {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            present: AtomicBool::new(true),
        }
    }

    /// A tracker whose plugin object is missing from the host.
    pub fn absent() -> Self {
        let tracker = Self::new();
        tracker.set_present(false);
        tracker
    }

    pub fn set_present(&self, present: bool) {
        self.present.store(present, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<GaCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: GaCall) {
        self.calls.lock().push(call);
    }
}

impl Default for RecordingGaTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl GaTracker for RecordingGaTracker {
    fn is_present(&self) -> bool {
        self.present.load(Ordering::SeqCst)
    }

    fn debug_mode(&self) {
        self.record(GaCall::DebugMode);
    }

    fn start_tracker_with_id(&self, tracking_id: &str) {
        self.record(GaCall::StartTracker {
            tracking_id: tracking_id.to_string(),
        });
    }

    fn set_user_id(&self, user_id: &str) {
        self.record(GaCall::SetUserId {
            user_id: user_id.to_string(),
        });
    }

    fn track_view(&self, url: Option<&str>) {
        self.record(GaCall::TrackView {
            url: url.map(str::to_string),
        });
    }

    fn track_event(&self, category: &str, action: &str, label: Option<&str>, value: i64) {
        self.record(GaCall::TrackEvent {
            category: category.to_string(),
            action: action.to_string(),
            label: label.map(str::to_string),
            value,
        });
    }

    fn add_custom_dimension(&self, key: &str, value: &Value) {
        self.record(GaCall::AddCustomDimension {
            key: key.to_string(),
            value: value.clone(),
        });
    }

    fn add_transaction(
        &self,
        order_id: &str,
        affiliation: Option<&str>,
        total: f64,
        tax: Option<f64>,
        shipping: Option<f64>,
    ) {
        self.record(GaCall::AddTransaction {
            order_id: order_id.to_string(),
            affiliation: affiliation.map(str::to_string),
            total,
            tax,
            shipping,
        });
    }

    fn add_transaction_item(
        &self,
        order_id: &str,
        name: Option<&str>,
        sku: Option<&str>,
        category: Option<&str>,
        price: Option<f64>,
        quantity: f64,
    ) {
        self.record(GaCall::AddTransactionItem {
            order_id: order_id.to_string(),
            name: name.map(str::to_string),
            sku: sku.map(str::to_string),
            category: category.map(str::to_string),
            price,
            quantity,
        });
    }
}

/// Tracker that writes each call as a structured log event. Always present.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingGaTracker;

impl GaTracker for LoggingGaTracker {
    fn is_present(&self) -> bool {
        true
    }

    fn debug_mode(&self) {
        info!(vendor = "ga", call = "debugMode", "plugin call");
    }

    fn start_tracker_with_id(&self, tracking_id: &str) {
        info!(vendor = "ga", call = "startTrackerWithId", tracking_id, "plugin call");
    }

    fn set_user_id(&self, user_id: &str) {
        info!(vendor = "ga", call = "setUserId", user_id, "plugin call");
    }

    fn track_view(&self, url: Option<&str>) {
        info!(vendor = "ga", call = "trackView", url = ?url, "plugin call");
    }

    fn track_event(&self, category: &str, action: &str, label: Option<&str>, value: i64) {
        info!(
            vendor = "ga",
            call = "trackEvent",
            category,
            action,
            label = ?label,
            value,
            "plugin call"
        );
    }

    fn add_custom_dimension(&self, key: &str, value: &Value) {
        info!(vendor = "ga", call = "addCustomDimension", key, value = %value, "plugin call");
    }

    fn add_transaction(
        &self,
        order_id: &str,
        affiliation: Option<&str>,
        total: f64,
        tax: Option<f64>,
        shipping: Option<f64>,
    ) {
        info!(
            vendor = "ga",
            call = "addTransaction",
            order_id,
            affiliation = ?affiliation,
            total,
            tax = ?tax,
            shipping = ?shipping,
            "plugin call"
        );
    }

    fn add_transaction_item(
        &self,
        order_id: &str,
        name: Option<&str>,
        sku: Option<&str>,
        category: Option<&str>,
        price: Option<f64>,
        quantity: f64,
    ) {
        info!(
            vendor = "ga",
            call = "addTransactionItem",
            order_id,
            name = ?name,
            sku = ?sku,
            category = ?category,
            price = ?price,
            quantity,
            "plugin call"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_recorder_presence() {
        assert!(RecordingGaTracker::new().is_present());
        let tracker = RecordingGaTracker::absent();
        assert!(!tracker.is_present());
        tracker.set_present(true);
        assert!(tracker.is_present());
    }

    #[test]
    fn test_recorder_keeps_order_and_clears() {
        let tracker = RecordingGaTracker::new();
        tracker.start_tracker_with_id("UA-1");
        tracker.track_view(Some("app://home"));
        assert_eq!(
            tracker.calls(),
            vec![
                GaCall::StartTracker {
                    tracking_id: "UA-1".into()
                },
                GaCall::TrackView {
                    url: Some("app://home".into())
                },
            ]
        );
        tracker.clear();
        assert_eq!(tracker.count(), 0);
    }

    #[test]
    fn test_call_serializes_with_tag() {
        let call = GaCall::AddCustomDimension {
            key: "dimension8".into(),
            value: json!(1.9),
        };
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["call"], "add_custom_dimension");
        assert_eq!(json["key"], "dimension8");
    }
}
