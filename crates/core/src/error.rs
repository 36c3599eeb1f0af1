use thiserror::Error;

pub type BridgeResult<T> = Result<T, BridgeError>;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid settings for integration '{integration}': {source}")]
    Settings {
        integration: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Integration already registered: {0}")]
    DuplicateIntegration(String),

    #[error("Unknown integration: {0}")]
    UnknownIntegration(String),

    #[error("Malformed message: {0}")]
    Message(String),
}
