//! Wires configuration into the engine and runs one job.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use engine_logging::{engine_error, engine_info, engine_warn};
use sensory_engine::{
    ensure_output_dir, find_browser, ArtifactStore, BrowserFetcher, BrowserSettings,
    ExtractionPipeline, FingerprintPool, FingerprintSource, HttpFetcher, HttpSettings,
    HubSettings, JobRequest, PageFetcher, PipelineRun, ResultReporter, ResultStore,
    SetupFailureRecord,
};

use crate::config::{output_dir_from, SensoryConfig};
use crate::diagnostics::{environment_summary, log_summary};

pub const LOG_FILE: &str = "sensory.log";

pub const EXIT_OK: u8 = 0;
pub const EXIT_SETUP_FAILURE: u8 = 1;

/// Run one job end to end and return the process exit code.
///
/// A finished run exits 0 whatever the job status. Only a fault before
/// the pipeline can run exits non-zero, after writing a minimal error record.
pub fn run_process<F>(lookup: F) -> u8
where
    F: Fn(&str) -> Option<String>,
{
    let output_dir = output_dir_from(&lookup);
    let outcome = SensoryConfig::from_lookup(&lookup)
        .context("Failed to load configuration")
        .and_then(|config| {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            runtime.block_on(execute(&config))
        });

    match outcome {
        Ok(run) => {
            engine_info!(
                "Run finished job_id={} status={:?} extraction_method={:?} delivery={:?}",
                run.result.job_id,
                run.result.status,
                run.result.extraction_method,
                run.report.delivery
            );
            EXIT_OK
        }
        Err(err) => {
            engine_error!("Setup failure: {:#}", err);
            write_setup_failure(&output_dir, &err);
            EXIT_SETUP_FAILURE
        }
    }
}

pub async fn execute(config: &SensoryConfig) -> Result<PipelineRun> {
    ensure_output_dir(&config.output_dir)
        .with_context(|| format!("Failed to prepare output directory {:?}", config.output_dir))?;
    let screenshots = config.screenshots_dir();
    ensure_output_dir(&screenshots)
        .with_context(|| format!("Failed to prepare screenshots directory {:?}", screenshots))?;

    let browser = if config.browser_enabled {
        find_browser(config.chrome_path.as_deref())
    } else {
        None
    };
    let environment = environment_summary(config, browser.as_deref());
    log_summary(&environment);

    let fingerprints = Arc::new(FingerprintSource::new(
        FingerprintPool::default(),
        config.seed,
    ));
    let artifacts = ArtifactStore::new(screenshots);

    let mut fetchers: Vec<Arc<dyn PageFetcher>> = Vec::new();
    match browser {
        Some(executable) => {
            let settings = BrowserSettings {
                executable: Some(executable),
                ..BrowserSettings::default()
            };
            fetchers.push(Arc::new(
                BrowserFetcher::new(settings, Arc::clone(&fingerprints))
                    .with_artifacts(artifacts.clone()),
            ));
        }
        None if config.browser_enabled => {
            engine_warn!("No Chromium-family browser found; continuing with HTTP only");
        }
        None => engine_info!("Browser strategy disabled"),
    }
    let http = HttpFetcher::new(HttpSettings::default(), fingerprints)
        .context("Failed to create HTTP client")?
        .with_artifacts(artifacts);
    fetchers.push(Arc::new(http));

    let hub = HubSettings {
        url: config.hub_url.clone(),
        api_key: config.api_key.clone(),
        ..HubSettings::default()
    };
    let reporter = ResultReporter::new(ResultStore::new(config.output_dir.clone()), hub)
        .context("Failed to create hub client")?;

    let pipeline = ExtractionPipeline::new(fetchers, reporter);
    Ok(pipeline
        .run(JobRequest {
            url: config.target_url.clone(),
            priority: config.priority.clone(),
            environment,
        })
        .await)
}

fn write_setup_failure(output_dir: &Path, err: &anyhow::Error) {
    let record = SetupFailureRecord::new(format!("{err:#}"), Utc::now());
    match ResultStore::new(output_dir.to_path_buf()).save(&record) {
        Ok(path) => engine_info!("Wrote setup failure record to {:?}", path),
        Err(save_err) => engine_error!("Could not write setup failure record: {}", save_err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        SENSORY_API_KEY, SENSORY_BROWSER, SENSORY_OUTPUT_DIR, SYNAPSE_HUB_URL, TARGET_URL,
    };
    use pretty_assertions::assert_eq;
    use sensory_engine::{JobStatus, CALLBACK_PATH, RESULTS_FILE};
    use serde_json::Value;
    use std::collections::HashMap;
    use tempfile::TempDir;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn lookup(pairs: Vec<(&'static str, String)>) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<&'static str, String> = pairs.into_iter().collect();
        move |key: &str| map.get(key).cloned()
    }

    fn saved(dir: &Path) -> Value {
        let text = std::fs::read_to_string(dir.join(RESULTS_FILE)).unwrap();
        serde_json::from_str(&text).unwrap()
    }

    #[test]
    fn invalid_target_url_writes_error_record_and_exits_nonzero() {
        engine_logging::initialize_for_tests();
        let temp = TempDir::new().unwrap();
        let code = run_process(lookup(vec![
            (TARGET_URL, "::not a url::".into()),
            (SENSORY_OUTPUT_DIR, temp.path().display().to_string()),
        ]));

        assert_eq!(code, EXIT_SETUP_FAILURE);
        let record = saved(temp.path());
        assert_eq!(record["status"], "failed");
        assert_eq!(record["component"], "sensory_neurons");
        assert!(record["error"].as_str().unwrap().contains("TARGET_URL"));
        assert!(record["job_id"].as_str().unwrap().starts_with("sensory_"));
    }

    #[test]
    fn failed_job_still_exits_zero() {
        let temp = TempDir::new().unwrap();
        let code = run_process(lookup(vec![
            (TARGET_URL, "http://127.0.0.1:9/".into()),
            (SENSORY_BROWSER, "off".into()),
            (SENSORY_OUTPUT_DIR, temp.path().display().to_string()),
        ]));

        assert_eq!(code, EXIT_OK);
        let record = saved(temp.path());
        assert_eq!(record["status"], "failed");
        assert_eq!(record["extraction_method"], "none");
        assert!(!record["error"].as_str().unwrap().is_empty());
        assert_eq!(record["data"]["diagnostics"]["environment"]["browser_enabled"], false);
    }

    #[tokio::test]
    async fn http_only_run_extracts_and_calls_back() {
        let target = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "<title>Hi</title><h1>A</h1><p>text</p>",
                "text/html; charset=utf-8",
            ))
            .mount(&target)
            .await;
        let hub = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CALLBACK_PATH))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&hub)
            .await;

        let temp = TempDir::new().unwrap();
        let config = SensoryConfig::from_lookup(lookup(vec![
            (TARGET_URL, format!("{}/page", target.uri())),
            (SYNAPSE_HUB_URL, hub.uri()),
            (SENSORY_API_KEY, "test-key".into()),
            (SENSORY_BROWSER, "0".into()),
            (SENSORY_OUTPUT_DIR, temp.path().display().to_string()),
        ]))
        .unwrap();

        let run = execute(&config).await.unwrap();

        assert_eq!(run.result.status, JobStatus::Completed);
        let record = saved(temp.path());
        assert_eq!(record["status"], "completed");
        assert_eq!(record["extraction_method"], "http_regex");
        assert_eq!(record["data"]["title"], "Hi");
        assert_eq!(record["data"]["headings"][0]["text"], "A");
        assert_eq!(
            record["data"]["diagnostics"]["environment"][SENSORY_API_KEY],
            "****"
        );

        let analysis: Vec<_> = std::fs::read_dir(config.screenshots_dir())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with("page_analysis_"))
            .collect();
        assert_eq!(analysis.len(), 1);
    }
}
