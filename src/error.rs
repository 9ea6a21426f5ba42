use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Credentials missing: {0}")]
    CredentialsMissing(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Warehouse error: {0}")]
    Warehouse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Visualization error: {0}")]
    Visualization(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    /// Distinguishes missing-credential failures from transient ones so
    /// callers can pick between provider fallback and a fixed message.
    pub fn is_credentials(&self) -> bool {
        matches!(self, AgentError::CredentialsMissing(_))
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
