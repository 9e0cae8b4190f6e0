use thiserror::Error;

/// Errors raised while loading or validating configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Failed to read configuration file {path}: {reason}")]
    FileReadError { path: String, reason: String },

    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Missing required configuration field {field} ({context})")]
    MissingRequiredField { field: String, context: String },

    #[error("Invalid value {value} for {field}: {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

impl ConfigurationError {
    pub fn file_read_error(path: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::FileReadError {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn missing_required_field(field: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingRequiredField {
            field: field.into(),
            context: context.into(),
        }
    }

    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

impl From<config::ConfigError> for ConfigurationError {
    fn from(error: config::ConfigError) -> Self {
        Self::LoadError(error.to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;
