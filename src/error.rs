//! Application-wide error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("context error: {0}")]
    Context(String),

    #[error("comms error: {0}")]
    Comms(String),
}
