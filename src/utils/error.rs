use thiserror::Error;

#[derive(Error, Debug)]
pub enum BulkError {
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Item {item:?} has no consolidated offers")]
    ItemNotFound { item: String },

    #[error("Item {item:?} is not available from any source")]
    ItemUnavailable { item: String },

    #[error("Item {item:?}: requested {requested}, only {available} available")]
    PartialAllocation {
        item: String,
        requested: u32,
        available: u32,
    },

    #[error("No seller offers item {item:?}, delivery-aware allocation is impossible")]
    NoFeasibleAllocation { item: String },

    #[error("Source {source_name} failed: {message}")]
    SourceFailure { source_name: String, message: String },

    #[error("Deadline exceeded during {stage}")]
    DeadlineExceeded { stage: String },

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value {value:?} for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Request,
    Allocation,
    Source,
    Timeout,
    Configuration,
    Output,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl BulkError {
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        BulkError::InvalidRequest {
            reason: reason.into(),
        }
    }

    pub fn source_failure(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        BulkError::SourceFailure {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn deadline(stage: impl Into<String>) -> Self {
        BulkError::DeadlineExceeded {
            stage: stage.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            BulkError::InvalidRequest { .. } => ErrorCategory::Request,
            BulkError::ItemNotFound { .. }
            | BulkError::ItemUnavailable { .. }
            | BulkError::PartialAllocation { .. }
            | BulkError::NoFeasibleAllocation { .. } => ErrorCategory::Allocation,
            BulkError::SourceFailure { .. } | BulkError::ApiError(_) => ErrorCategory::Source,
            BulkError::DeadlineExceeded { .. } => ErrorCategory::Timeout,
            BulkError::ConfigError { .. }
            | BulkError::ConfigValidationError { .. }
            | BulkError::InvalidConfigValueError { .. }
            | BulkError::MissingConfigError { .. } => ErrorCategory::Configuration,
            BulkError::CsvError(_) | BulkError::ZipError(_) | BulkError::SerializationError(_) => {
                ErrorCategory::Output
            }
            BulkError::IoError(_) | BulkError::Internal { .. } => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Source => ErrorSeverity::Low,
            ErrorCategory::Timeout => ErrorSeverity::Medium,
            ErrorCategory::Request
            | ErrorCategory::Allocation
            | ErrorCategory::Configuration
            | ErrorCategory::Output => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            BulkError::InvalidRequest { reason } => format!("The shopping list is invalid: {}", reason),
            BulkError::ItemNotFound { item } => {
                format!("Internal inconsistency: no search result for {:?}", item)
            }
            BulkError::ItemUnavailable { item } => {
                format!("Nobody is selling {:?} right now", item)
            }
            BulkError::PartialAllocation {
                item,
                requested,
                available,
            } => format!(
                "Not enough copies of {:?}: wanted {}, found {}",
                item, requested, available
            ),
            BulkError::NoFeasibleAllocation { item } => format!(
                "Cannot plan delivery because no seller offers {:?}",
                item
            ),
            BulkError::DeadlineExceeded { stage } => {
                format!("The search took too long and was stopped during {}", stage)
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Request => "Check the shopping list: one item per line, quantities must be positive, no duplicates",
            ErrorCategory::Allocation => "Remove or reduce the reported item and try again",
            ErrorCategory::Source => "The source may be down or rate limited; retry later",
            ErrorCategory::Timeout => "Increase engine.deadline_seconds or switch search.mode to \"heuristic\"",
            ErrorCategory::Configuration => "Fix the configuration file and re-run",
            ErrorCategory::Output => "Check the output path and available disk space",
            ErrorCategory::System => "Re-run with --verbose and report the log",
        }
    }
}

pub type Result<T> = std::result::Result<T, BulkError>;
