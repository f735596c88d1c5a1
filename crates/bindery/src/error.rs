//! Application error types

use bindery_common::LoggingError;
use bindery_config::ConfigError;
use bindery_di::ContainerError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Logic error: {0}")]
    Logic(String),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Logging(#[from] LoggingError),
}

impl AppError {
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration(message.into())
    }

    pub fn logic<S: Into<String>>(message: S) -> Self {
        Self::Logic(message.into())
    }
}
