use std::fmt;

use serde::{Deserialize, Serialize};

/// A way of retrieving page content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMethod {
    Browser,
    Http,
}

impl FetchMethod {
    /// How the structured content is derived when this strategy succeeds.
    pub fn extraction_method(self) -> ExtractionMethod {
        match self {
            FetchMethod::Browser => ExtractionMethod::Browser,
            FetchMethod::Http => ExtractionMethod::HttpRegex,
        }
    }

    /// Capability tags recorded on the job when this strategy succeeds.
    pub fn capabilities(self) -> &'static [&'static str] {
        match self {
            FetchMethod::Browser => &[
                "browser_automation",
                "anti_detection",
                "screenshot_capture",
                "dom_analysis",
                "javascript_execution",
            ],
            FetchMethod::Http => &[
                "http_requests",
                "regex_parsing",
                "content_analysis",
                "link_extraction",
                "image_extraction",
                "structure_analysis",
            ],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FetchMethod::Browser => "browser",
            FetchMethod::Http => "http",
        }
    }
}

impl fmt::Display for FetchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Browser,
    HttpRegex,
    #[default]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Started,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}
