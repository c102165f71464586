// error.rs - Error types shared by the bot core
// Configuration errors surface at load time; fetch and parse errors are
// rendered into replies by the handlers and never leave them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("invalid capture pattern for trigger '{trigger}': {source}")]
    InvalidPattern {
        trigger: String,
        #[source]
        source: regex::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value has a shape the store never writes under that key.
    #[error("invalid state under key '{key}': expected a list of ids, found {found}")]
    InvalidState { key: String, found: String },

    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("parse failed: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, BotError>;

impl From<reqwest::Error> for BotError {
    fn from(err: reqwest::Error) -> Self {
        BotError::Fetch(err.to_string())
    }
}
