//! Vendor adapters for the analytics bridge: Google Analytics and Quantcast
//! through their Cordova mobile plugins.
//!
//! Each adapter talks to its plugin through an injected client trait
//! ([`GaTracker`], [`QuantcastMeasurement`]); recording and logging clients
//! ship alongside for tests and plugin-less hosts.

#![warn(clippy::unwrap_used)]

pub mod ga;
pub mod quantcast;

use std::sync::Arc;

use tracing::info;

use bridge_core::{Analytics, BridgeConfig, BridgeResult};

pub use ga::{GaOptions, GaTracker, GoogleAnalyticsCordova};
pub use quantcast::{QuantcastCordova, QuantcastMeasurement, QuantcastOptions};

/// Register every adapter that has a settings block in `config`. Returns the
/// names of the registered integrations.
pub fn register_configured(
    analytics: &mut Analytics,
    config: &BridgeConfig,
    tracker: Arc<dyn GaTracker>,
    measurement: Arc<dyn QuantcastMeasurement>,
) -> BridgeResult<Vec<&'static str>> {
    let mut registered = Vec::new();

    if let Some(settings) = config.settings(ga::SETTINGS_KEY) {
        let adapter = GoogleAnalyticsCordova::from_settings(Some(settings), tracker)?;
        analytics.add_integration(Box::new(adapter))?;
        registered.push(ga::NAME);
    }

    if let Some(settings) = config.settings(quantcast::SETTINGS_KEY) {
        let adapter = QuantcastCordova::from_settings(Some(settings), measurement)?;
        analytics.add_integration(Box::new(adapter))?;
        registered.push(quantcast::NAME);
    }

    info!(integrations = ?registered, "integrations registered from config");
    Ok(registered)
}
