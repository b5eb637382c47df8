use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("GraphQL query failed: {message}")]
    QueryError { message: String },

    #[error("Query returned no data for '{root_field}'")]
    NoDataError { root_field: String },

    #[error("Script execution failed in {stage}: {message}")]
    ExecutionError { stage: String, message: String },

    #[error("Failed to persist '{path}': {message}")]
    PersistenceError { path: String, message: String },

    #[error("Planning error: {message}")]
    PlanningError { message: String },

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    Script,
    Storage,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AnalysisError {
    pub fn query(message: impl Into<String>) -> Self {
        Self::QueryError {
            message: message.into(),
        }
    }

    pub fn persistence(path: impl Into<String>, message: impl ToString) -> Self {
        Self::PersistenceError {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::QueryError { .. } => ErrorCategory::Network,
            Self::NoDataError { .. } | Self::PlanningError { .. } => ErrorCategory::Data,
            Self::ExecutionError { .. } => ErrorCategory::Script,
            Self::PersistenceError { .. }
            | Self::ZipError(_)
            | Self::CsvError(_)
            | Self::IoError(_)
            | Self::SerializationError(_) => ErrorCategory::Storage,
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 重試或調整查詢即可
            ErrorCategory::Network | ErrorCategory::Data => ErrorSeverity::Medium,
            ErrorCategory::Script | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::QueryError { .. } => {
                "Check GRAPHQL_ENDPOINT and your network connection, then verify the query matches the subgraph schema"
            }
            Self::NoDataError { .. } => {
                "Widen the time window, check the pool address, or ask about a different entity"
            }
            Self::PlanningError { .. } => {
                "Rephrase the question or pass a schema file that defines the requested entity"
            }
            Self::ExecutionError { .. } => {
                "Fix the analysis script and run again, or disable strict mode"
            }
            Self::PersistenceError { .. } | Self::IoError(_) | Self::ZipError(_) => {
                "Make sure the output directory exists, is writable and has free space"
            }
            Self::CsvError(_) | Self::SerializationError(_) => {
                "The dataset file is corrupted; re-run the query to regenerate it"
            }
            Self::MissingConfigError { .. } => {
                "Set the missing environment variable or add it to your .env file"
            }
            Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. } => "Review the configuration values and try again",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::QueryError { message } => format!("Could not fetch data from the subgraph: {}", message),
            Self::NoDataError { root_field } => {
                format!("No matching records were found for '{}'", root_field)
            }
            Self::ExecutionError { stage, message } => {
                format!("The {} script failed: {}", stage, message)
            }
            Self::PersistenceError { path, .. } => format!("Could not write '{}'", path),
            Self::MissingConfigError { field } => format!("{} is not configured", field),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_mapping() {
        assert_eq!(AnalysisError::query("boom").severity(), ErrorSeverity::Medium);
        assert_eq!(
            AnalysisError::persistence("out.csv", "disk full").severity(),
            ErrorSeverity::Critical
        );
        let missing = AnalysisError::MissingConfigError {
            field: "GRAPHQL_ENDPOINT".to_string(),
        };
        assert_eq!(missing.category(), ErrorCategory::Configuration);
        assert_eq!(missing.severity(), ErrorSeverity::High);
    }

    #[test]
    fn test_user_friendly_message() {
        let err = AnalysisError::NoDataError {
            root_field: "swaps".to_string(),
        };
        assert_eq!(
            err.user_friendly_message(),
            "No matching records were found for 'swaps'"
        );
    }
}
