use thiserror::Error;

/// Application-wide error types for carspec.
#[derive(Error, Debug)]
pub enum AppError {
    /// The site answered with a missing-page marker, or no table ever rendered.
    #[error("Page not found: {0}")]
    NotFound(String),

    /// A bot-detection or CAPTCHA page was served instead of content.
    #[error("Blocked by site: {0}")]
    Blocked(String),

    /// Navigation succeeded but no trims or specifications could be read.
    #[error("No data extracted for {0}")]
    ExtractionEmpty(String),

    /// The automation session stopped answering and could not be rebuilt.
    #[error("Session crashed: {0}")]
    SessionCrash(String),

    /// A call into the automation surface failed.
    #[error("Browser error: {0}")]
    BrowserError(String),

    /// A bounded wait elapsed.
    #[error("Timed out after {0} ms")]
    Timeout(u64),

    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// CSV read or write failed.
    #[error("CSV error: {0}")]
    CsvError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Batch input could not be interpreted as a list of targets.
    #[error("Invalid batch input: {0}")]
    InvalidBatch(String),

    /// An existing CSV file has a header that differs from the expected schema.
    #[error("Schema mismatch in {path}: {reason}")]
    SchemaMismatch { path: String, reason: String },

    /// Configuration value missing or malformed.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A worker could not be launched or awaited.
    #[error("Worker error: {0}")]
    WorkerError(String),
}

impl AppError {
    /// Returns true if the error describes the target itself rather than the
    /// session. Such failures never warrant a liveness probe.
    pub fn is_target_failure(&self) -> bool {
        matches!(
            self,
            AppError::NotFound(_) | AppError::Blocked(_) | AppError::ExtractionEmpty(_)
        )
    }

    /// Returns true if the error came from the automation surface and the
    /// session may be unusable afterwards.
    pub fn is_session_error(&self) -> bool {
        matches!(
            self,
            AppError::BrowserError(_) | AppError::Timeout(_) | AppError::SessionCrash(_)
        )
    }
}
