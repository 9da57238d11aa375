//! Structured error types for the sync pipeline.

use serde::Serialize;
use std::fmt;

/// Error categories surfaced to the caller.
///
/// The category decides retry behaviour in the Plane client and is printed
/// alongside the message when the process exits non-zero.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Credentials were rejected by the remote service.
    Auth,
    /// Unknown project or workspace.
    NotFound,
    /// Network failure, timeout, rate limit or 5xx.
    Transient,
    /// The remote broke its contract (bad payload, runaway pagination).
    Integrity,
    /// Invalid user input, detected before any network call.
    Validation,
    /// Local file system failure.
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Auth => "AUTH",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Transient => "TRANSIENT",
            ErrorKind::Integrity => "INTEGRITY",
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Io => "IO",
        }
    }

    /// Whether an operation failing with this kind may be attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Transient)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised anywhere in the sync pipeline.
#[derive(Debug, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct SyncError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Detail text supplied by the remote service, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Server-requested wait before the next attempt (429 `Retry-After`).
    #[serde(skip)]
    pub retry_after: Option<std::time::Duration>,
}

impl SyncError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            field: None,
            details: None,
            retry_after: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        let details = details.into();
        if !details.trim().is_empty() {
            self.details = Some(details);
        }
        self
    }

    pub fn with_retry_after(mut self, wait: std::time::Duration) -> Self {
        self.retry_after = Some(wait);
        self
    }

    // Convenience constructors

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Auth, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Integrity, message)
    }

    pub fn invalid_value(field: &str, reason: impl fmt::Display) -> Self {
        Self::new(ErrorKind::Validation, format!("{} {}", field, reason)).with_field(field)
    }

    pub fn project_not_found(project: &str) -> Self {
        Self::not_found(format!("Project not found: {}", project))
    }

    pub fn io(context: &str, err: impl fmt::Display) -> Self {
        Self::new(ErrorKind::Io, format!("{}: {}", context, err))
    }

    /// One-line rendering used by the CLI: `error[KIND]: message (details)`.
    pub fn report(&self) -> String {
        let mut line = format!("error[{}]: {}", self.kind, self.message);
        if let Some(ref field) = self.field {
            line.push_str(&format!(" (field: {})", field));
        }
        if let Some(ref details) = self.details {
            line.push_str(&format!("\n  remote detail: {}", details));
        }
        line
    }
}

// Allow using ? with anyhow errors by converting them
impl From<anyhow::Error> for SyncError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<SyncError>() {
            Ok(sync_err) => sync_err,
            Err(err) => SyncError::new(ErrorKind::Validation, format!("{:#}", err)),
        }
    }
}

/// Result type for pipeline operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;
