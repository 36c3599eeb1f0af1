//! Quantcast Cordova adapter: audience measurement through the Quantcast
//! mobile plugin. Every outbound call carries the configured global labels.
//!
//! The plugin counts its own session start as a pageview, so this
//! integration is initialized on the first page message and has no `page`
//! handler.

pub mod measurement;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use bridge_core::facade::{Identify, Track};
use bridge_core::integration::{Integration, IntegrationDescriptor};
use bridge_core::user::UserContext;
use bridge_core::BridgeResult;

pub use measurement::{LoggingQuantcast, QuantcastCall, QuantcastMeasurement, RecordingQuantcast};

pub const NAME: &str = "Quantcast Cordova";
pub const SETTINGS_KEY: &str = "quantcast_cordova";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuantcastOptions {
    /// API key; `null` until configured.
    pub key: Option<String>,
    pub debug: bool,
    pub enable_geo: bool,
    pub global_labels: Vec<String>,
}

pub fn descriptor() -> IntegrationDescriptor {
    IntegrationDescriptor::new(NAME, SETTINGS_KEY)
        .assumes_pageview()
        .ready_on_initialize()
        .option("key", Value::Null)
        .option("debug", json!(false))
        .option("enableGeo", json!(false))
        .option("globalLabels", json!([]))
}

pub struct QuantcastCordova {
    descriptor: IntegrationDescriptor,
    options: QuantcastOptions,
    measurement: Arc<dyn QuantcastMeasurement>,
}

impl QuantcastCordova {
    pub fn new(options: QuantcastOptions, measurement: Arc<dyn QuantcastMeasurement>) -> Self {
        Self {
            descriptor: descriptor(),
            options,
            measurement,
        }
    }

    pub fn from_settings(
        settings: Option<&Value>,
        measurement: Arc<dyn QuantcastMeasurement>,
    ) -> BridgeResult<Self> {
        let options = descriptor().parse_options(settings)?;
        Ok(Self::new(options, measurement))
    }

    pub fn options(&self) -> &QuantcastOptions {
        &self.options
    }
}

impl Integration for QuantcastCordova {
    fn descriptor(&self) -> &IntegrationDescriptor {
        &self.descriptor
    }

    fn initialize(&mut self, user: &UserContext) {
        self.measurement.set_up_quantcast_measurement(
            self.options.key.as_deref(),
            user.id(),
            &self.options.global_labels,
        );

        if self.options.debug {
            self.measurement.set_debug_logging(true);
        }
        if self.options.enable_geo {
            self.measurement.set_geo_location(true);
        }
    }

    fn loaded(&self) -> bool {
        self.measurement.is_present()
    }

    fn identify(&mut self, identify: &Identify) {
        match identify.user_id() {
            Some(id) => {
                self.measurement
                    .record_user_identifier(None, id, &self.options.global_labels);
            }
            None => debug!("identify without a user id, skipping"),
        }
    }

    fn track(&mut self, track: &Track, _options: Option<&Value>) {
        self.measurement
            .log_event(track.event(), &self.options.global_labels);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn adapter(options: QuantcastOptions) -> (QuantcastCordova, Arc<RecordingQuantcast>) {
        let measurement = Arc::new(RecordingQuantcast::new());
        (QuantcastCordova::new(options, measurement.clone()), measurement)
    }

    fn labelled() -> QuantcastOptions {
        QuantcastOptions {
            key: Some("qc-key".into()),
            global_labels: vec!["mobile".into(), "beta".into()],
            ..Default::default()
        }
    }

    fn labels() -> Vec<String> {
        vec!["mobile".into(), "beta".into()]
    }

    #[test]
    fn test_descriptor_flags() {
        let d = descriptor();
        assert_eq!(d.name, NAME);
        assert!(d.assumes_pageview);
        assert!(d.ready_on_initialize);
        assert_eq!(d.defaults()["key"], Value::Null);
    }

    #[test]
    fn test_from_settings() {
        let settings = json!({ "key": "abc", "enable_geo": true, "globalLabels": ["x"] });
        let measurement = Arc::new(RecordingQuantcast::new());
        let qc = QuantcastCordova::from_settings(Some(&settings), measurement).unwrap();
        assert_eq!(
            qc.options(),
            &QuantcastOptions {
                key: Some("abc".into()),
                debug: false,
                enable_geo: true,
                global_labels: vec!["x".into()],
            }
        );
    }

    #[test]
    fn test_initialize_with_user() {
        let (mut qc, measurement) = adapter(labelled());
        qc.initialize(&UserContext::new(Some("u-1".into()), Map::new()));
        assert_eq!(
            measurement.calls(),
            vec![QuantcastCall::SetUp {
                key: Some("qc-key".into()),
                uid: Some("u-1".into()),
                labels: labels(),
            }]
        );
    }

    #[test]
    fn test_initialize_anonymous_with_debug_and_geo() {
        let (mut qc, measurement) = adapter(QuantcastOptions {
            debug: true,
            enable_geo: true,
            ..Default::default()
        });
        qc.initialize(&UserContext::default());
        assert_eq!(
            measurement.calls(),
            vec![
                QuantcastCall::SetUp {
                    key: None,
                    uid: None,
                    labels: vec![],
                },
                QuantcastCall::SetDebugLogging { enabled: true },
                QuantcastCall::SetGeoLocation { enabled: true },
            ]
        );
    }

    #[test]
    fn test_identify_records_user_identifier() {
        let (mut qc, measurement) = adapter(labelled());
        qc.identify(&Identify::new(None, json!({})));
        qc.identify(&Identify::new(Some(""), json!({})));
        assert_eq!(measurement.count(), 0);

        qc.identify(&Identify::new(Some("u-9"), json!({})));
        assert_eq!(
            measurement.calls(),
            vec![QuantcastCall::RecordUserIdentifier {
                previous_id: None,
                user_id: "u-9".into(),
                labels: labels(),
            }]
        );
    }

    #[test]
    fn test_track_logs_event_name_only() {
        let (mut qc, measurement) = adapter(labelled());
        qc.track(
            &Track::new("Played Song", json!({ "category": "Music", "value": 3 })),
            None,
        );
        assert_eq!(
            measurement.calls(),
            vec![QuantcastCall::LogEvent {
                name: "Played Song".into(),
                labels: labels(),
            }]
        );
    }

    #[test]
    fn test_completed_order_is_logged_as_event() {
        let (mut qc, measurement) = adapter(labelled());
        qc.completed_order(&Track::new("Completed Order", json!({ "orderId": "O1" })));
        assert_eq!(
            measurement.calls(),
            vec![QuantcastCall::LogEvent {
                name: "Completed Order".into(),
                labels: labels(),
            }]
        );
    }

    #[test]
    fn test_loaded_follows_presence() {
        let measurement = Arc::new(RecordingQuantcast::absent());
        let qc = QuantcastCordova::new(QuantcastOptions::default(), measurement.clone());
        assert!(!qc.loaded());
        measurement.set_present(true);
        assert!(qc.loaded());
    }
}
