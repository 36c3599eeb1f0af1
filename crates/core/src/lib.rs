//! Core of the analytics bridge: message facades, dotted-path lookup, the
//! user context, the [`Integration`] seam and the dispatch registry that
//! drives vendor adapters through their lifecycle.

#![warn(clippy::unwrap_used)]

pub mod config;
pub mod error;
pub mod facade;
pub mod integration;
pub mod path;
pub mod registry;
pub mod user;

pub use config::BridgeConfig;
pub use error::{BridgeError, BridgeResult};
pub use facade::{Envelope, Identify, Message, Page, Product, Track};
pub use integration::{Integration, IntegrationDescriptor, Lifecycle, OptionSpec};
pub use registry::Analytics;
pub use user::UserContext;
