use async_openai::error::OpenAIError;
use thiserror::Error;
use tokio::task::JoinError;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),
    #[error("OpenAI error: {0}")]
    OpenAI(#[from] OpenAIError),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Unprocessable: {0}")]
    Unprocessable(String),
    #[error("Authorization error: {0}")]
    Auth(String),
    #[error("Rate limited: {0}")]
    RateLimited(String),
    #[error("Provider error: {0}")]
    Provider(String),
    #[error("LLM parsing error: {0}")]
    LLMParsing(String),
    #[error("Citation error: {0}")]
    Citation(String),
    #[error("Deadline exceeded: {0}")]
    Timeout(String),
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("Ingestion Processing error: {0}")]
    Processing(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Errors that a provider retry loop or the job queue may attempt again.
    /// Validation and citation failures are terminal by definition.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Validation(_)
                | Self::Unprocessable(_)
                | Self::Citation(_)
                | Self::NotFound(_)
                | Self::Auth(_)
                | Self::LLMParsing(_)
        )
    }
}
