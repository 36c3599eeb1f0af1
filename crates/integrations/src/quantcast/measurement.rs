//! Call surface of the Quantcast measurement plugin.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

/// The plugin's global measurement object.
pub trait QuantcastMeasurement: Send + Sync {
    /// Whether the plugin object is exposed by the host runtime.
    fn is_present(&self) -> bool;

    fn set_up_quantcast_measurement(&self, key: Option<&str>, uid: Option<&str>, labels: &[String]);

    fn set_debug_logging(&self, enabled: bool);

    fn set_geo_location(&self, enabled: bool);

    /// `previous_id` is part of the plugin signature and is always `None`
    /// when called from the adapter.
    fn record_user_identifier(&self, previous_id: Option<&str>, user_id: &str, labels: &[String]);

    fn log_event(&self, name: &str, labels: &[String]);
}

/// One recorded plugin call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum QuantcastCall {
    SetUp {
        key: Option<String>,
        uid: Option<String>,
        labels: Vec<String>,
    },
    SetDebugLogging {
        enabled: bool,
    },
    SetGeoLocation {
        enabled: bool,
    },
    RecordUserIdentifier {
        previous_id: Option<String>,
        user_id: String,
        labels: Vec<String>,
    },
    LogEvent {
        name: String,
        labels: Vec<String>,
    },
}

/// In-memory measurement object that captures calls in order.
pub struct RecordingQuantcast {
    calls: Mutex<Vec<QuantcastCall>>,
    present: AtomicBool,
}

impl RecordingQuantcast {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            present: AtomicBool::new(true),
        }
    }

    pub fn absent() -> Self {
        let measurement = Self::new();
        measurement.set_present(false);
        measurement
    }

    pub fn set_present(&self, present: bool) {
        self.present.store(present, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<QuantcastCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().len()
    }

    fn record(&self, call: QuantcastCall) {
        self.calls.lock().push(call);
    }
}

impl Default for RecordingQuantcast {
    fn default() -> Self {
        Self::new()
    }
}

impl QuantcastMeasurement for RecordingQuantcast {
    fn is_present(&self) -> bool {
        self.present.load(Ordering::SeqCst)
    }

    fn set_up_quantcast_measurement(&self, key: Option<&str>, uid: Option<&str>, labels: &[String]) {
        self.record(QuantcastCall::SetUp {
            key: key.map(str::to_string),
            uid: uid.map(str::to_string),
            labels: labels.to_vec(),
        });
    }

    fn set_debug_logging(&self, enabled: bool) {
        self.record(QuantcastCall::SetDebugLogging { enabled });
    }

    fn set_geo_location(&self, enabled: bool) {
        self.record(QuantcastCall::SetGeoLocation { enabled });
    }

    fn record_user_identifier(&self, previous_id: Option<&str>, user_id: &str, labels: &[String]) {
        self.record(QuantcastCall::RecordUserIdentifier {
            previous_id: previous_id.map(str::to_string),
            user_id: user_id.to_string(),
            labels: labels.to_vec(),
        });
    }

    fn log_event(&self, name: &str, labels: &[String]) {
        self.record(QuantcastCall::LogEvent {
            name: name.to_string(),
            labels: labels.to_vec(),
        });
    }
}

/// Measurement object that writes each call as a structured log event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingQuantcast;

impl QuantcastMeasurement for LoggingQuantcast {
    fn is_present(&self) -> bool {
        true
    }

    fn set_up_quantcast_measurement(&self, key: Option<&str>, uid: Option<&str>, labels: &[String]) {
        info!(
            vendor = "quantcast",
            call = "setUpQuantcastMeasurement",
            key = ?key,
            uid = ?uid,
            labels = ?labels,
            "plugin call"
        );
    }

    fn set_debug_logging(&self, enabled: bool) {
        info!(vendor = "quantcast", call = "setDebugLogging", enabled, "plugin call");
    }

    fn set_geo_location(&self, enabled: bool) {
        info!(vendor = "quantcast", call = "setGeoLocation", enabled, "plugin call");
    }

    fn record_user_identifier(&self, previous_id: Option<&str>, user_id: &str, labels: &[String]) {
        info!(
            vendor = "quantcast",
            call = "recordUserIdentifier",
            previous_id = ?previous_id,
            user_id,
            labels = ?labels,
            "plugin call"
        );
    }

    fn log_event(&self, name: &str, labels: &[String]) {
        info!(
            vendor = "quantcast",
            call = "logEvent",
            event = name,
            labels = ?labels,
            "plugin call"
        );
    }
}
