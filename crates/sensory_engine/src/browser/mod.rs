//! Browser strategy: headless Chromium driven over CDP via chromiumoxide.

mod session;
mod snapshot;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use engine_logging::{engine_info, engine_warn};
use sensory_core::FetchMethod;
use serde_json::{json, Value};

use crate::content::ExtractedContent;
use crate::fetch::PageFetcher;
use crate::fingerprint::{Fingerprint, FingerprintSource};
use crate::persist::ArtifactStore;
use crate::types::{Diagnostics, FailureKind, FetchError, FetchOutcome};

use session::BrowserSession;
use snapshot::{PageSnapshot, PAGE_SNAPSHOT_SCRIPT};

const STEALTH_SCRIPT: &str = include_str!("stealth.js");

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Explicit browser binary; discovered on `PATH` when unset.
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub launch_timeout: Duration,
    pub navigation_timeout: Duration,
    /// Fixed wait after load so late dynamic content can render.
    pub settle_delay: Duration,
    /// Budget for screenshot capture and in-page evaluation.
    pub evaluation_timeout: Duration,
    /// Grace period for a clean shutdown before the process is killed.
    pub close_timeout: Duration,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            launch_timeout: Duration::from_secs(20),
            navigation_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_secs(3),
            evaluation_timeout: Duration::from_secs(15),
            close_timeout: Duration::from_secs(10),
        }
    }
}

/// Locate a Chromium-family binary: the explicit path if it exists, then
/// the usual names on `PATH`, then the standard macOS install location.
pub fn find_browser(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    for name in [
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
        "chrome",
    ] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

pub struct BrowserFetcher {
    settings: BrowserSettings,
    fingerprints: Arc<FingerprintSource>,
    artifacts: Option<ArtifactStore>,
}

struct Capture {
    content: ExtractedContent,
    final_url: String,
    performance: Value,
    screenshot: Option<PathBuf>,
}

impl BrowserFetcher {
    pub fn new(settings: BrowserSettings, fingerprints: Arc<FingerprintSource>) -> Self {
        Self {
            settings,
            fingerprints,
            artifacts: None,
        }
    }

    /// Save a full-page screenshot for every successful fetch.
    pub fn with_artifacts(mut self, artifacts: ArtifactStore) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    async fn capture(
        &self,
        session: &BrowserSession,
        url: &str,
        fingerprint: &Fingerprint,
    ) -> Result<Capture, FetchError> {
        let page = session
            .browser()
            .new_page("about:blank")
            .await
            .map_err(|err| in_session("create page", err))?;

        page.set_user_agent(fingerprint.user_agent.as_str())
            .await
            .map_err(|err| in_session("set user agent", err))?;
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_SCRIPT))
            .await
            .map_err(|err| in_session("register anti-detection script", err))?;

        let navigation = async {
            page.goto(url).await?;
            page.wait_for_navigation().await?;
            Ok::<(), chromiumoxide::error::CdpError>(())
        };
        match tokio::time::timeout(self.settings.navigation_timeout, navigation).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(in_session("navigate", err)),
            Err(_) => {
                return Err(FetchError::new(
                    FailureKind::Timeout,
                    format!(
                        "navigation timed out after {}s",
                        self.settings.navigation_timeout.as_secs()
                    ),
                ))
            }
        }

        tokio::time::sleep(self.settings.settle_delay).await;

        let screenshot = self.save_screenshot(&page).await;

        let snapshot: PageSnapshot =
            tokio::time::timeout(self.settings.evaluation_timeout, page.evaluate(PAGE_SNAPSHOT_SCRIPT))
                .await
                .map_err(|_| {
                    FetchError::new(FailureKind::Timeout, "in-page extraction timed out")
                })?
                .map_err(|err| in_session("evaluate page", err))?
                .into_value()
                .map_err(|err| {
                    FetchError::new(FailureKind::Error, format!("page snapshot decode: {err}"))
                })?;

        if let Err(err) = page.close().await {
            engine_warn!("Page close failed: {}", err);
        }

        let final_url = snapshot.url.clone();
        let performance = snapshot.performance.clone();
        Ok(Capture {
            content: snapshot.into_content(url),
            final_url,
            performance,
            screenshot,
        })
    }

    /// Screenshot problems are logged and never fail the fetch.
    async fn save_screenshot(&self, page: &Page) -> Option<PathBuf> {
        let artifacts = self.artifacts.as_ref()?;
        let params = ScreenshotParams::builder().full_page(true).build();
        let png = match tokio::time::timeout(self.settings.evaluation_timeout, page.screenshot(params))
            .await
        {
            Ok(Ok(png)) => png,
            Ok(Err(err)) => {
                engine_warn!("Screenshot capture failed: {}", err);
                return None;
            }
            Err(_) => {
                engine_warn!("Screenshot capture timed out");
                return None;
            }
        };
        match artifacts.save_screenshot(&png, Utc::now()) {
            Ok(path) => Some(path),
            Err(err) => {
                engine_warn!("Could not save screenshot: {}", err);
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl PageFetcher for BrowserFetcher {
    fn method(&self) -> FetchMethod {
        FetchMethod::Browser
    }

    async fn fetch(&self, url: &str) -> FetchOutcome {
        let started = Instant::now();
        let fingerprint = self.fingerprints.next();
        let mut diagnostics = Diagnostics::new();
        diagnostics.insert("user_agent".into(), Value::from(fingerprint.user_agent.clone()));
        diagnostics.insert("viewport".into(), json!(fingerprint.viewport));

        let Some(executable) = find_browser(self.settings.executable.as_deref()) else {
            let error = FetchError::new(FailureKind::Error, "browser executable not found");
            engine_warn!("Browser fetch skipped url={} error={}", url, error);
            return FetchOutcome::failed(FetchMethod::Browser, error, diagnostics);
        };
        diagnostics.insert(
            "browser_executable".into(),
            Value::from(executable.display().to_string()),
        );

        engine_info!(
            "Browser fetch starting url={} viewport={}x{}",
            url,
            fingerprint.viewport.width,
            fingerprint.viewport.height
        );
        let session = match BrowserSession::launch(
            &executable,
            self.settings.headless,
            &fingerprint,
            self.settings.launch_timeout,
        )
        .await
        {
            Ok(session) => session,
            Err(error) => {
                engine_warn!("Browser launch failed url={} error={}", url, error);
                diagnostics.insert(
                    "elapsed_ms".into(),
                    Value::from(started.elapsed().as_millis() as u64),
                );
                return FetchOutcome::failed(FetchMethod::Browser, error, diagnostics);
            }
        };

        let result = self.capture(&session, url, &fingerprint).await;
        session.close(self.settings.close_timeout).await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        diagnostics.insert("elapsed_ms".into(), Value::from(elapsed_ms));

        match result {
            Ok(capture) => {
                engine_info!(
                    "Browser fetch ok url={} links={} elapsed_ms={}",
                    url,
                    capture.content.links.len(),
                    elapsed_ms
                );
                diagnostics.insert("final_url".into(), Value::from(capture.final_url));
                diagnostics.insert("performance".into(), capture.performance);
                if let Some(path) = capture.screenshot {
                    diagnostics.insert(
                        "screenshot_file".into(),
                        Value::from(path.display().to_string()),
                    );
                }
                FetchOutcome {
                    success: true,
                    method: FetchMethod::Browser,
                    status_code: None,
                    raw_html: None,
                    content: Some(capture.content),
                    failure: None,
                    diagnostics,
                }
            }
            Err(error) => {
                engine_warn!("Browser fetch failed url={} error={}", url, error);
                FetchOutcome::failed(FetchMethod::Browser, error, diagnostics)
            }
        }
    }
}

fn in_session(step: &str, err: chromiumoxide::error::CdpError) -> FetchError {
    FetchError::new(FailureKind::Error, format!("{step}: {err}"))
}
