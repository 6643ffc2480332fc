use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("Request to the LMS failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("The LMS answered {status} for {url}")]
    HttpStatus {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("The LMS session appears to have expired")]
    SessionExpired,

    #[error("Failed to parse HTML: {0}")]
    ParsingError(String),

    #[error("Storage operation failed: {0}")]
    StorageError(String),

    #[error("Could not (de)serialize stored data: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

impl ScraperError {
    /// True for failures that came from talking to the LMS rather than from
    /// interpreting or storing what it returned.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            ScraperError::RequestError(_)
                | ScraperError::HttpStatus { .. }
                | ScraperError::SessionExpired
        )
    }
}

pub type Result<T> = std::result::Result<T, ScraperError>;
