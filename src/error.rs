//! Error types for template resolution
//!
//! Every failure is raised to the immediate caller; nothing here is retried
//! or swallowed. "Already exists" on directory creation is not an error.

use std::path::PathBuf;

use thiserror::Error;

use crate::placeholder::PlaceholderError;

/// Boxed error returned by a deferred template base
pub type BaseError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Text did not match a datestamp format
#[derive(Error, Debug)]
#[error("Cannot parse '{text}' with format '{format}': {source}")]
pub struct DatestampParseError {
    pub text: String,
    pub format: String,
    #[source]
    pub source: chrono::ParseError,
}

/// Errors raised while building or resolving path templates
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template '{name}' has an empty pattern")]
    EmptyPattern { name: String },

    #[error("Template '{name}': base resolution failed: {source}")]
    BaseResolution {
        name: String,
        #[source]
        source: BaseError,
    },

    #[error("Template '{name}': pattern '{pattern}' references unknown key '{key}'")]
    TemplateFormat {
        name: String,
        pattern: String,
        key: String,
    },

    #[error("Template '{name}': pattern '{pattern}' has malformed placeholder '{fragment}'")]
    TemplateSyntax {
        name: String,
        pattern: String,
        fragment: String,
    },

    #[error("Cannot create directory '{}': {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Template '{name}' does not resolve to {expected}")]
    UnexpectedShape { name: String, expected: &'static str },

    #[error("Template '{0}' not found")]
    UnknownTemplate(String),

    #[error("Unknown path kind '{0}': expected one of inputs, outputs, cache, logs, checkpoints, tensorboard")]
    UnknownKind(String),

    #[error("Invalid run name '{0}': must be a single non-empty path segment")]
    InvalidRun(String),

    #[error(transparent)]
    Datestamp(#[from] DatestampParseError),
}

impl TemplateError {
    /// Attach template context to a substitution failure
    pub(crate) fn placeholder(name: &str, pattern: &str, err: PlaceholderError) -> Self {
        match err {
            PlaceholderError::UnknownKey { key } => Self::TemplateFormat {
                name: name.to_string(),
                pattern: pattern.to_string(),
                key,
            },
            PlaceholderError::Malformed { fragment } => Self::TemplateSyntax {
                name: name.to_string(),
                pattern: pattern.to_string(),
                fragment,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, TemplateError>;
