//! Unified error handling for the automation core.
//!
//! Every failure surfaced by the crate flows through [`Error`]; the HTTP
//! shell maps variants to status codes via [`Error::http_status`].

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy of the automation core.
///
/// Variants carry the structured context a caller needs to act on the
/// failure (offending field, config key, provider, selector).
#[derive(Debug, Error)]
pub enum Error {
    /// Request-level input was rejected before any work started.
    #[error("invalid input: {message}")]
    InvalidInput {
        message: String,
        field: Option<String>,
    },

    /// Missing or malformed configuration (environment, credentials).
    #[error("configuration error: {message}")]
    Configuration {
        message: String,
        key: Option<String>,
    },

    /// A prompt failed rule-based validation.
    #[error("validation failed: {message}")]
    Validation {
        message: String,
        critical_findings: usize,
    },

    /// Transport or protocol failure talking to the model provider.
    #[error("llm request failed ({provider}/{model}): {message}")]
    Llm {
        message: String,
        provider: String,
        model: String,
    },

    /// Browser-driver failure while executing a tool.
    #[error("browser error: {message}")]
    Browser {
        message: String,
        action: Option<String>,
        selector: Option<String>,
    },

    /// The run reached an invalid or terminal loop state.
    #[error("state error: {message}")]
    State { message: String },

    /// Persistence failure in a collaborator store. Never fatal to a run.
    #[error("database error: {message}")]
    Database {
        message: String,
        operation: Option<String>,
    },
}

impl Error {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Error::InvalidInput {
            message: message.into(),
            field: None,
        }
    }

    pub fn invalid_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Error::InvalidInput {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
            key: None,
        }
    }

    pub fn config_key(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    pub fn validation(message: impl Into<String>, critical_findings: usize) -> Self {
        Error::Validation {
            message: message.into(),
            critical_findings,
        }
    }

    pub fn llm(
        message: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Error::Llm {
            message: message.into(),
            provider: provider.into(),
            model: model.into(),
        }
    }

    pub fn browser(message: impl Into<String>) -> Self {
        Error::Browser {
            message: message.into(),
            action: None,
            selector: None,
        }
    }

    pub fn browser_action(
        message: impl Into<String>,
        action: impl Into<String>,
        selector: Option<&str>,
    ) -> Self {
        Error::Browser {
            message: message.into(),
            action: Some(action.into()),
            selector: selector.map(|s| s.to_string()),
        }
    }

    pub fn state(message: impl Into<String>) -> Self {
        Error::State {
            message: message.into(),
        }
    }

    /// HTTP status the thin shell should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::InvalidInput { .. } => 400,
            Error::Validation { .. } => 422,
            Error::Configuration { .. } => 500,
            Error::Llm { .. } => 502,
            Error::Browser { .. } => 500,
            Error::State { .. } => 409,
            Error::Database { .. } => 500,
        }
    }
}
