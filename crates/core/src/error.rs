use std::path::PathBuf;

use thiserror::Error;

/// Failure categories surfaced at the action boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    ResourceNotFound,
    LoadFailure,
    DetectionMiss,
    Gateway,
    EnvironmentUnavailable,
    Launch,
    Aborted,
}

#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("resource not found: {}", .0.display())]
    ResourceNotFound(PathBuf),

    #[error("failed to load {}: {reason}", path.display())]
    LoadFailure { path: PathBuf, reason: String },

    #[error("detection miss: {0}")]
    DetectionMiss(String),

    #[error("classification gateway failure: {0}")]
    Gateway(String),

    #[error("environment unavailable: {0}")]
    EnvironmentUnavailable(String),

    #[error("failed to launch {app}: {reason}")]
    Launch { app: String, reason: String },

    #[error("aborted: {0}")]
    Aborted(String),
}

impl AutomationError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::ResourceNotFound(_) => ErrorKind::ResourceNotFound,
            Self::LoadFailure { .. } => ErrorKind::LoadFailure,
            Self::DetectionMiss(_) => ErrorKind::DetectionMiss,
            Self::Gateway(_) => ErrorKind::Gateway,
            Self::EnvironmentUnavailable(_) => ErrorKind::EnvironmentUnavailable,
            Self::Launch { .. } => ErrorKind::Launch,
            Self::Aborted(_) => ErrorKind::Aborted,
        }
    }
}

pub type Result<T> = std::result::Result<T, AutomationError>;
