/// CLI error types
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] bridge_core::CoreError),

    #[error(transparent)]
    Client(#[from] bridge_client::ClientError),

    #[error(transparent)]
    Playback(#[from] bridge_playback::PlaybackError),
}

impl From<config::ConfigError> for CliError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
