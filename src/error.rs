// src/error.rs

//! Unified error handling for the notifier.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for notifier operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Link pattern failed to compile
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Login missing or rejected by the portal
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// No link matched a navigation step
    #[error("Navigation failed at step '{step}': {message}")]
    Navigation { step: String, message: String },

    /// Results page structure not recognised
    #[error("Parse error: {0}")]
    Parse(String),

    /// Snapshot store unavailable or unreadable
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Notification could not be delivered
    #[error("Notification error: {0}")]
    Notify(String),

    /// Another instance holds the lock
    #[error("Already running: lock held on {}", .0.display())]
    AlreadyRunning(PathBuf),

    /// A poll cycle aborted
    #[error(transparent)]
    Cycle(#[from] CycleError),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Create a navigation error for a step.
    pub fn navigation(step: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Navigation {
            step: step.into(),
            message: message.to_string(),
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Create a persistence error.
    pub fn persistence(message: impl fmt::Display) -> Self {
        Self::Persistence(message.to_string())
    }

    /// Create a notification error.
    pub fn notify(message: impl fmt::Display) -> Self {
        Self::Notify(message.to_string())
    }
}

/// Stage of a poll cycle in which an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    Authenticate,
    Navigate,
    Extract,
    Persist,
}

impl fmt::Display for CycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleStage::Authenticate => "authenticate",
            CycleStage::Navigate => "navigate",
            CycleStage::Extract => "extract",
            CycleStage::Persist => "persist",
        };
        f.write_str(name)
    }
}

/// A poll cycle aborted; the snapshot was not touched.
#[derive(Error, Debug)]
#[error("Poll cycle failed during {stage}: {cause}")]
pub struct CycleError {
    pub stage: CycleStage,
    #[source]
    pub cause: Box<AppError>,
}

impl CycleError {
    pub fn new(stage: CycleStage, cause: AppError) -> Self {
        Self {
            stage,
            cause: Box::new(cause),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_message() {
        let err = AppError::navigation("Examinations", "no matching link");
        assert_eq!(
            err.to_string(),
            "Navigation failed at step 'Examinations': no matching link"
        );
    }

    #[test]
    fn test_cycle_error_wraps_cause() {
        let err = CycleError::new(CycleStage::Extract, AppError::parse("table missing"));
        assert_eq!(err.stage, CycleStage::Extract);
        assert!(matches!(*err.cause, AppError::Parse(_)));
        assert!(err.to_string().contains("during extract"));
    }
}
