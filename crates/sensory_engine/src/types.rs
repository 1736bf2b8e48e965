use std::fmt;

use sensory_core::FetchMethod;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::content::ExtractedContent;

/// Free-form diagnostic fields attached to a fetch or a job.
pub type Diagnostics = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Strategy-specific deadline exceeded.
    Timeout,
    /// Navigation or in-session browser failure.
    Error,
    /// Non-2xx status or transport failure on the plain HTTP path.
    RequestError,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Error => "error",
            FailureKind::RequestError => "request_error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Result of exactly one fetcher invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub success: bool,
    pub method: FetchMethod,
    pub status_code: Option<u16>,
    pub raw_html: Option<String>,
    /// Structured content, for strategies that extract in-page.
    pub content: Option<ExtractedContent>,
    pub failure: Option<FetchError>,
    pub diagnostics: Diagnostics,
}

impl FetchOutcome {
    pub fn failed(method: FetchMethod, error: FetchError, mut diagnostics: Diagnostics) -> Self {
        diagnostics.insert("error_type".into(), Value::from(error.kind.as_str()));
        diagnostics.insert("error".into(), Value::from(error.message.clone()));
        Self {
            success: false,
            method,
            status_code: None,
            raw_html: None,
            content: None,
            failure: Some(error),
            diagnostics,
        }
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// The failure detail shown to users, `None` on success.
    pub fn error_message(&self) -> Option<String> {
        if self.success {
            return None;
        }
        Some(
            self.failure
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| format!("{} fetch failed", self.method)),
        )
    }
}
