//! Error types for module compilation.
//!
//! Every error here is fatal for the whole pass: the caller gets either a
//! complete plan or one of these, never a partially decided plan.

use thiserror::Error;

/// Errors raised while resolving parameters or rendering content.
#[derive(Debug, Error)]
pub enum Error {
    /// The parameters contain an irreconcilable combination or a malformed value
    #[error("invalid parameter '{field}': {message}")]
    Validation {
        /// Name of the offending parameter
        field: &'static str,
        /// What is wrong with it
        message: String,
    },

    /// A template identifier did not resolve in any template source
    #[error("template not found: {id}")]
    TemplateNotFound {
        /// The identifier that was looked up
        id: String,
    },

    /// A template resolved but could not be rendered
    #[error("failed to render template '{template}': {message}")]
    Render {
        /// Identifier of the template being rendered
        template: String,
        /// Description of the failure
        message: String,
    },

    /// IO error while reading a template store
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub(crate) fn render(template: &str, message: impl Into<String>) -> Self {
        Self::Render {
            template: template.to_string(),
            message: message.into(),
        }
    }

    /// Whether this error came from parameter validation.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

/// Result type for module compilation.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_names_the_field() {
        let err = Error::validation("version", "must not be empty");
        assert_eq!(
            err.to_string(),
            "invalid parameter 'version': must not be empty"
        );
        assert!(err.is_validation());
    }

    #[test]
    fn render_error_names_the_template() {
        let err = Error::render("spec.tmpl", "missing binding 'opt_a'");
        assert!(err.to_string().contains("spec.tmpl"));
        assert!(!err.is_validation());
    }
}
