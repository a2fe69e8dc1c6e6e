use thiserror::Error;
use volley::core::ConfigError;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("No configuration given; pass --config <path>")]
    NoConfig,

    #[error("Failed to load configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to render report: {0}")]
    Report(#[from] serde_json::Error),
}
