use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

// Numeric codes reported to `x-error` callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidInput,
    NotFound,
    AlreadyExists,
    FeatureUnavailable,
    HandlerError,
}

impl ErrorCode {
    pub fn as_u16(&self) -> u16 {
        match self {
            ErrorCode::InvalidInput => 400,
            ErrorCode::NotFound => 404,
            ErrorCode::AlreadyExists => 409,
            ErrorCode::FeatureUnavailable => 412,
            ErrorCode::HandlerError => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u16(self.as_u16())
    }
}

/// Failures of the note store collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("notes folder not set")]
    NoNotesFolder,

    #[error("invalid note path '{0}'")]
    InvalidPath(String),

    #[error("note not found: {0}")]
    NotFound(String),

    #[error("invalid date format '{0}' in periodic note settings")]
    DateFormat(String),

    #[error("failed to parse front matter in '{path}': {message}")]
    FrontMatter { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            StoreError::NotFound(_) => ErrorCode::NotFound,
            StoreError::InvalidPath(_) => ErrorCode::InvalidInput,
            _ => ErrorCode::HandlerError,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown period '{0}'")]
pub struct UnknownPeriod(pub String);

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("route '{0}' is already registered")]
    Duplicate(String),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no route registered for '{0}'")]
    UnknownRoute(String),

    #[error("invalid incoming URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("URL scheme '{0}' is not handled here")]
    ForeignScheme(String),

    #[error("URL namespace '{0}' is not handled here")]
    ForeignNamespace(String),

    #[error("{0}")]
    Validation(crate::params::ValidationErrors),
}

#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to launch URL: {0}")]
    Launch(#[from] std::io::Error),

    #[error("launcher task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_distinct() {
        assert_eq!(ErrorCode::NotFound.as_u16(), 404);
        assert_ne!(
            ErrorCode::FeatureUnavailable.as_u16(),
            ErrorCode::NotFound.as_u16()
        );
        assert_eq!(serde_json::to_string(&ErrorCode::HandlerError).unwrap(), "500");
    }

    #[test]
    fn test_store_error_code() {
        assert_eq!(StoreError::NotFound("a.md".into()).code(), ErrorCode::NotFound);
        assert_eq!(StoreError::NoNotesFolder.code(), ErrorCode::HandlerError);
    }
}
