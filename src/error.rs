use thiserror::Error;

use crate::hid::HidError;

/// Application-wide error type
///
/// Device-level conditions live in [`HidError`]; this type wraps them together
/// with the failures of the surrounding stack (configuration, I/O, encoding).
#[derive(Error, Debug)]
pub enum AppError {
    #[error("HID error: {0}")]
    Hid(#[from] HidError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Short machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Hid(e) => e.code(),
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Toml(_) => "config_parse",
            AppError::Serialization(_) => "serialization",
        }
    }
}

/// Result type alias for crate-level operations
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hid_error_conversion() {
        let err: AppError = HidError::Canceled.into();
        assert!(matches!(err, AppError::Hid(HidError::Canceled)));
        assert_eq!(err.code(), "canceled");
    }

    #[test]
    fn test_config_error_message() {
        let err = AppError::Config("queue capacity must be at least 1".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: queue capacity must be at least 1"
        );
    }
}
