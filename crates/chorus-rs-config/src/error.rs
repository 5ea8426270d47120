use thiserror::Error;

/// Failures while reading settings, prompts, or the bot manifest.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed json5: {0}")]
    Json5(#[from] json5::Error),
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
    /// A field has the wrong shape; `path` is `<layer>:<dotted.field>`.
    #[error("{path}: {message}")]
    InvalidField { path: String, message: String },
    /// Values that parse but cannot run together.
    #[error("invalid settings: {0}")]
    Invalid(String),
    /// `bots.json` has not been created yet.
    #[error("no bot manifest at {0}")]
    MissingManifest(String),
}
