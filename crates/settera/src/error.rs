//! Store error types.

use thiserror::Error;

/// Result type for store operations.
pub type SetteraResult<T> = Result<T, SetteraError>;

/// Usage errors surfaced synchronously to the caller.
///
/// Validation, save and action failures never show up here. They are logged
/// and reflected in the store state instead.
#[derive(Debug, Error)]
pub enum SetteraError {
    /// The key is not defined by the installed schema.
    #[error("unknown setting: {0}")]
    UnknownSetting(String),

    /// No action handler is registered for the key.
    #[error("no action handler registered for setting: {0}")]
    NoActionHandler(String),

    /// The store was created outside a tokio runtime.
    #[error("settings store must be created inside a tokio runtime")]
    MissingRuntime,

    /// The store has already been torn down.
    #[error("settings store has been destroyed")]
    Destroyed,

    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),

    /// Schema document could not be parsed.
    #[error("schema error: {0}")]
    Schema(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
