use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use engine_logging::{engine_error, engine_info, engine_warn};
use sensory_core::{update, Effect, FetchMethod, Msg, PipelineState};
use serde_json::Value;

use crate::content::ExtractedContent;
use crate::extract::{Extractor, HtmlExtractor};
use crate::fetch::PageFetcher;
use crate::job::JobResult;
use crate::report::{ReportSummary, ResultReporter};
use crate::types::{Diagnostics, FailureKind, FetchError, FetchOutcome};

/// What to fetch and how to label it.
#[derive(Debug, Clone, Default)]
pub struct JobRequest {
    pub url: String,
    pub priority: String,
    /// Stored under `data.diagnostics.environment`.
    pub environment: Diagnostics,
}

#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub result: JobResult,
    pub report: ReportSummary,
}

/// Fetch-with-fallback over an ordered list of strategies. Transitions come
/// from `sensory_core::update`; this type only performs the effects.
pub struct ExtractionPipeline {
    fetchers: Vec<Arc<dyn PageFetcher>>,
    extractor: Arc<dyn Extractor>,
    reporter: ResultReporter,
}

impl ExtractionPipeline {
    /// Strategies are attempted in the order given.
    pub fn new(fetchers: Vec<Arc<dyn PageFetcher>>, reporter: ResultReporter) -> Self {
        Self {
            fetchers,
            extractor: Arc::new(HtmlExtractor),
            reporter,
        }
    }

    /// Replace the extractor used on raw HTML bodies.
    pub fn with_extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn strategies(&self) -> Vec<FetchMethod> {
        self.fetchers.iter().map(|fetcher| fetcher.method()).collect()
    }

    pub async fn run(&self, request: JobRequest) -> PipelineRun {
        let started = Instant::now();
        let mut job = JobResult::started(&request.url, &request.priority, Utc::now());
        job.set_environment(request.environment);
        engine_info!(
            "Job started job_id={} url={} strategies={:?}",
            job.job_id,
            job.url,
            self.strategies()
        );
        self.reporter.persist(&job);

        let mut state = PipelineState::new(self.strategies());
        let mut queue = VecDeque::from([Msg::Start]);
        let mut last_outcome: Option<FetchOutcome> = None;
        let mut report: Option<ReportSummary> = None;

        while let Some(msg) = queue.pop_front() {
            let (next, effects) = update(state, msg);
            state = next;

            for effect in effects {
                match effect {
                    Effect::Fetch(method) => {
                        engine_info!("Trying {} strategy job_id={}", method, job.job_id);
                        let outcome = self.fetch_with(method, &job.url).await;
                        job.record_attempt(&outcome);
                        queue.push_back(Msg::FetchFinished {
                            method,
                            success: outcome.success,
                            error: outcome.error_message(),
                        });
                        last_outcome = Some(outcome);
                    }
                    Effect::Complete { method } => {
                        let content = match last_outcome.take() {
                            Some(outcome) => self.content_from(outcome, &job.url),
                            None => ExtractedContent::default(),
                        };
                        engine_info!(
                            "Job completed job_id={} method={} links={} text_length={}",
                            job.job_id,
                            method,
                            content.links.len(),
                            content.text_length
                        );
                        job.complete(method, content, Utc::now());
                    }
                    Effect::Fail { error } => {
                        engine_warn!("Job failed job_id={} error={}", job.job_id, error);
                        job.fail(error, Utc::now());
                    }
                    Effect::Report => {
                        job.set_total_duration(started.elapsed());
                        report = Some(self.reporter.report(&job).await);
                        queue.push_back(Msg::Reported);
                    }
                }
            }
        }

        let report = match report {
            Some(report) => report,
            None => {
                engine_error!(
                    "Pipeline ended without reporting job_id={}; reporting now",
                    job.job_id
                );
                if !job.status.is_terminal() {
                    job.fail("pipeline ended before reaching a terminal status", Utc::now());
                }
                job.set_total_duration(started.elapsed());
                self.reporter.report(&job).await
            }
        };

        PipelineRun {
            result: job,
            report,
        }
    }

    async fn fetch_with(&self, method: FetchMethod, url: &str) -> FetchOutcome {
        match self.fetchers.iter().find(|fetcher| fetcher.method() == method) {
            Some(fetcher) => fetcher.fetch(url).await,
            None => FetchOutcome::failed(
                method,
                FetchError::new(FailureKind::Error, format!("no {method} fetcher registered")),
                Diagnostics::new(),
            ),
        }
    }

    /// Structured content from a successful outcome: taken as-is when the
    /// fetcher extracted in-page, otherwise derived from the raw body.
    fn content_from(&self, outcome: FetchOutcome, requested_url: &str) -> ExtractedContent {
        if let Some(content) = outcome.content {
            return content;
        }
        let base = outcome
            .diagnostics
            .get("final_url")
            .and_then(Value::as_str)
            .unwrap_or(requested_url);
        match outcome.raw_html {
            Some(html) => self.extractor.extract(&html, base),
            None => ExtractedContent::default(),
        }
    }
}
