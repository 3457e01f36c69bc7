use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("remote api error (status {status}): {message}")]
    RemoteApi { status: u16, message: String },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("response decoding error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("sync did not finish within {0:?}")]
    Deadline(Duration),
    #[error("node store error: {0}")]
    Sink(#[from] StoreError),
}

impl SyncError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("node store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("node store serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to locate a configuration directory")]
    NoConfigDir,
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
