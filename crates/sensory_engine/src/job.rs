use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use sensory_core::{ExtractionMethod, FetchMethod, JobStatus};
use serde::Serialize;
use serde_json::Value;

use crate::content::ExtractedContent;
use crate::types::{Diagnostics, FetchOutcome};

/// Tag identifying this worker in results sent to the hub.
pub const COMPONENT: &str = "sensory_neurons";

/// Stable, time-derived job identifier with millisecond resolution.
pub fn job_id_for(at: DateTime<Utc>) -> String {
    format!("sensory_{}", at.format("%Y%m%d_%H%M%S_%3f"))
}

/// The canonical record of one run. Owned and mutated by the pipeline,
/// handed read-only to the reporter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobResult {
    pub job_id: String,
    pub url: String,
    pub status: JobStatus,
    pub component: String,
    pub timestamp: String,
    pub priority: String,
    pub extraction_method: ExtractionMethod,
    pub capabilities_used: BTreeSet<String>,
    pub data: JobData,
    pub error: Option<String>,
    pub metadata: JobMetadata,
}

/// Extracted fields (flattened in) plus per-strategy diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobData {
    #[serde(flatten)]
    pub content: Option<ExtractedContent>,
    /// Keyed by strategy name (`browser`, `http`) and `environment`.
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobMetadata {
    pub learning_insights: Vec<String>,
    pub performance: PerformanceMetrics,
    pub adaptation_notes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub total_duration_ms: Option<u64>,
    pub fetch_durations_ms: BTreeMap<String, u64>,
    /// In-page timing figures reported by the browser, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<Value>,
}

impl JobResult {
    pub fn started(url: &str, priority: &str, at: DateTime<Utc>) -> Self {
        Self {
            job_id: job_id_for(at),
            url: url.to_string(),
            status: JobStatus::Started,
            component: COMPONENT.to_string(),
            timestamp: at.to_rfc3339(),
            priority: priority.to_string(),
            extraction_method: ExtractionMethod::None,
            capabilities_used: BTreeSet::new(),
            data: JobData::default(),
            error: None,
            metadata: JobMetadata::default(),
        }
    }

    pub fn set_environment(&mut self, environment: Diagnostics) {
        self.data
            .diagnostics
            .insert("environment".into(), Value::Object(environment));
    }

    /// Keep one fetch attempt's diagnostics, whatever its outcome.
    pub fn record_attempt(&mut self, outcome: &FetchOutcome) {
        let key = outcome.method.as_str();
        self.data
            .diagnostics
            .insert(key.into(), Value::Object(outcome.diagnostics.clone()));

        if let Some(elapsed) = outcome.diagnostics.get("elapsed_ms").and_then(Value::as_u64) {
            self.metadata
                .performance
                .fetch_durations_ms
                .insert(key.to_string(), elapsed);
        }
        if let Some(page) = outcome.diagnostics.get("performance") {
            self.metadata.performance.page = Some(page.clone());
        }

        if let Some(failure) = &outcome.failure {
            self.metadata.adaptation_notes.push(format!(
                "{} strategy failed ({}): {}",
                outcome.method, failure.kind, failure.message
            ));
        }
    }

    pub fn complete(&mut self, method: FetchMethod, content: ExtractedContent, at: DateTime<Utc>) {
        self.status = JobStatus::Completed;
        self.extraction_method = method.extraction_method();
        self.capabilities_used = method
            .capabilities()
            .iter()
            .map(|tag| tag.to_string())
            .collect();
        self.error = None;
        self.timestamp = at.to_rfc3339();

        if !self.metadata.adaptation_notes.is_empty() {
            self.metadata
                .adaptation_notes
                .push(format!("recovered through {method} strategy"));
        }
        self.metadata.learning_insights = learning_insights(method, &content);
        self.data.content = Some(content);
    }

    pub fn fail(&mut self, error: impl Into<String>, at: DateTime<Utc>) {
        self.status = JobStatus::Failed;
        self.extraction_method = ExtractionMethod::None;
        self.error = Some(error.into());
        self.timestamp = at.to_rfc3339();
    }

    pub fn set_total_duration(&mut self, elapsed: Duration) {
        self.metadata.performance.total_duration_ms = Some(elapsed.as_millis() as u64);
    }
}

fn learning_insights(method: FetchMethod, content: &ExtractedContent) -> Vec<String> {
    let structure = &content.structure;
    let mut insights = vec![format!("content extracted via {method} strategy")];
    if structure.has_articles || structure.has_main {
        insights.push("page uses semantic article/main markup".to_string());
    }
    if structure.content_area_score > 0 {
        insights.push(format!(
            "content area hints found (score {})",
            structure.content_area_score
        ));
    }
    if structure.script_count > 10 {
        insights.push(format!(
            "script-heavy page ({} scripts)",
            structure.script_count
        ));
    }
    if structure.form_count > 0 {
        insights.push("page contains forms".to_string());
    }
    if content.text_length == 0 {
        insights.push("no visible text extracted".to_string());
    }
    insights
}

/// Minimal record written when the run cannot even be set up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetupFailureRecord {
    pub job_id: String,
    pub status: JobStatus,
    pub component: String,
    pub timestamp: String,
    pub error: String,
}

impl SetupFailureRecord {
    pub fn new(error: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            job_id: job_id_for(at),
            status: JobStatus::Failed,
            component: COMPONENT.to_string(),
            timestamp: at.to_rfc3339(),
            error: error.into(),
        }
    }
}
