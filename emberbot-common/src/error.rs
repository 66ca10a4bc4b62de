// ================================================================
// File: emberbot-common/src/error.rs
// ================================================================

use std::fmt;

use thiserror::Error;

/// One failed field from trigger validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// All field failures collected in one validation pass, so an admin client
/// can show every broken field at once instead of fixing them one by one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<FieldError>,
}

impl ValidationReport {
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for e in &self.errors {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", e.field, e.message)?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation failed: {0}")]
    Validation(ValidationReport),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Session expired: {0}")]
    SessionExpired(String),

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Template render error: {0}")]
    TemplateRender(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Webhook rejected with status {0}")]
    WebhookRejected(u16),

    #[error("Webhook unreachable: {0}")]
    WebhookUnreachable(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Gateway(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Gateway(s.to_string())
    }
}

impl Error {
    /// True for conditions that are answered with a chat message and then
    /// forgotten, as opposed to ones that should abort the surrounding task.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::SessionExpired(_)
                | Error::TemplateRender(_)
                | Error::InvalidUrl(_)
                | Error::WebhookRejected(_)
                | Error::WebhookUnreachable(_)
        )
    }
}
