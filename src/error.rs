//! Error types for csspipe operations.
//!
//! Two kinds of failure exist. [`UserCodeError`] is attributable to an
//! author's embedded snippet (bad JSON, template syntax, a script throwing)
//! and is caught and logged where that snippet was compiled or executed.
//! Every other [`Error`] variant is fatal for the current render pass.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

use crate::stage::Stage;

/// Errors that can occur while compiling or running stylesheet rules.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    UserCode(#[from] UserCodeError),

    #[error("unknown plugin: {mode}")]
    UnknownMode { mode: String },

    #[error("mode `{mode}` does not support the {stage} stage")]
    UnsupportedStage { mode: String, stage: Stage },

    #[error("stylesheet is not accessible (cross-origin): {0}")]
    CrossOrigin(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a user-code error from a message and the underlying cause.
    ///
    /// Plugin authors return this from compilers and renderers so the engine
    /// logs the failure with its rule context instead of aborting the pass.
    pub fn user_code<E>(message: impl Into<String>, cause: E) -> Self
    where
        E: Into<Box<dyn StdError + 'static>>,
    {
        Error::UserCode(UserCodeError::new(message, cause))
    }

    /// Build a user-code error that has no underlying cause.
    pub fn user_code_msg(message: impl Into<String>) -> Self {
        Error::UserCode(UserCodeError {
            message: message.into(),
            cause: None,
        })
    }

    pub fn is_user_code(&self) -> bool {
        matches!(self, Error::UserCode(_))
    }
}

/// A recoverable failure raised by author-supplied code.
#[derive(Debug)]
pub struct UserCodeError {
    message: String,
    cause: Option<Box<dyn StdError + 'static>>,
}

impl UserCodeError {
    pub fn new<E>(message: impl Into<String>, cause: E) -> Self
    where
        E: Into<Box<dyn StdError + 'static>>,
    {
        Self {
            message: message.into(),
            cause: Some(cause.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The message followed by its cause, if any.
    pub fn detail(&self) -> String {
        match &self.cause {
            Some(cause) => format!("{}: {}", self.message, cause),
            None => self.message.clone(),
        }
    }
}

impl fmt::Display for UserCodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for UserCodeError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_deref()
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_code_detail_includes_cause() {
        let cause = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err = Error::user_code("invalid JSON", cause);
        assert!(err.is_user_code());

        let Error::UserCode(inner) = err else {
            panic!("expected user-code error");
        };
        assert_eq!(inner.message(), "invalid JSON");
        assert!(inner.detail().starts_with("invalid JSON: "));
        assert!(inner.source().is_some());
    }

    #[test]
    fn test_unknown_mode_is_fatal() {
        let err = Error::UnknownMode {
            mode: "yaml".to_string(),
        };
        assert!(!err.is_user_code());
        assert_eq!(err.to_string(), "unknown plugin: yaml");
    }
}
