use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use engine_logging::{engine_debug, engine_info, engine_warn};
use futures_util::StreamExt;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CONNECTION, CONTENT_TYPE,
    USER_AGENT,
};
use sensory_core::FetchMethod;
use serde_json::{json, Value};

use crate::decode::{decode_body, DecodedBody};
use crate::fingerprint::{Fingerprint, FingerprintSource};
use crate::persist::ArtifactStore;
use crate::preview::prepare_preview_content;
use crate::types::{Diagnostics, FailureKind, FetchError, FetchOutcome};

/// One way of retrieving a page. Implementations never return early with a
/// panic or an error: every failure is folded into the returned outcome.
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    fn method(&self) -> FetchMethod;

    async fn fetch(&self, url: &str) -> FetchOutcome;
}

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
        }
    }
}

struct HttpPage {
    status: u16,
    final_url: String,
    headers: BTreeMap<String, String>,
    content_type: Option<String>,
    body: DecodedBody,
    byte_len: u64,
}

struct RequestFailure {
    error: FetchError,
    status: Option<u16>,
}

impl From<FetchError> for RequestFailure {
    fn from(error: FetchError) -> Self {
        Self {
            error,
            status: None,
        }
    }
}

/// Plain GET with a browser-like header set. The client is built once and
/// reused for every call made through this fetcher.
pub struct HttpFetcher {
    settings: HttpSettings,
    fingerprints: Arc<FingerprintSource>,
    artifacts: Option<ArtifactStore>,
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(
        settings: HttpSettings,
        fingerprints: Arc<FingerprintSource>,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
            .build()
            .map_err(|err| FetchError::new(FailureKind::RequestError, err.to_string()))?;
        Ok(Self {
            settings,
            fingerprints,
            artifacts: None,
            client,
        })
    }

    /// Write a page-analysis note for every successful fetch.
    pub fn with_artifacts(mut self, artifacts: ArtifactStore) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    fn request_headers(fingerprint: &Fingerprint) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&fingerprint.user_agent) {
            headers.insert(USER_AGENT, value);
        }
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers
    }

    async fn fetch_page(
        &self,
        url: &str,
        fingerprint: &Fingerprint,
    ) -> Result<HttpPage, RequestFailure> {
        let parsed = reqwest::Url::parse(url).map_err(|err| {
            FetchError::new(FailureKind::RequestError, format!("invalid url: {err}"))
        })?;

        let response = self
            .client
            .get(parsed)
            .headers(Self::request_headers(fingerprint))
            .send()
            .await
            .map_err(|err| map_reqwest_error(err, self.settings.request_timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RequestFailure {
                error: FetchError::new(FailureKind::RequestError, format!("HTTP {status}")),
                status: Some(status.as_u16()),
            });
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(RequestFailure {
                    error: too_large(self.settings.max_bytes, content_len),
                    status: Some(status.as_u16()),
                });
            }
        }

        let final_url = response.url().to_string();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| RequestFailure {
                error: map_reqwest_error(err, self.settings.request_timeout),
                status: Some(status.as_u16()),
            })?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(RequestFailure {
                    error: too_large(self.settings.max_bytes, next_len),
                    status: Some(status.as_u16()),
                });
            }
            bytes.extend_from_slice(&chunk);
        }

        let body = decode_body(&bytes, content_type.as_deref());
        Ok(HttpPage {
            status: status.as_u16(),
            final_url,
            headers,
            content_type,
            body,
            byte_len: bytes.len() as u64,
        })
    }
}

#[async_trait::async_trait]
impl PageFetcher for HttpFetcher {
    fn method(&self) -> FetchMethod {
        FetchMethod::Http
    }

    async fn fetch(&self, url: &str) -> FetchOutcome {
        let started = Instant::now();
        let fingerprint = self.fingerprints.next();
        let mut diagnostics = Diagnostics::new();
        diagnostics.insert("user_agent".into(), Value::from(fingerprint.user_agent.clone()));

        engine_info!("HTTP fetch starting url={}", url);
        let result = self.fetch_page(url, &fingerprint).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        diagnostics.insert("elapsed_ms".into(), Value::from(elapsed_ms));

        let page = match result {
            Ok(page) => page,
            Err(RequestFailure { error, status }) => {
                engine_warn!("HTTP fetch failed url={} error={}", url, error);
                if let Some(code) = status {
                    diagnostics.insert("status_code".into(), Value::from(code));
                }
                let outcome = FetchOutcome::failed(FetchMethod::Http, error, diagnostics);
                return match status {
                    Some(code) => outcome.with_status(code),
                    None => outcome,
                };
            }
        };

        engine_info!(
            "HTTP fetch ok url={} status={} bytes={} elapsed_ms={}",
            url,
            page.status,
            page.byte_len,
            elapsed_ms
        );
        diagnostics.insert("status_code".into(), Value::from(page.status));
        diagnostics.insert("final_url".into(), Value::from(page.final_url.clone()));
        diagnostics.insert("content_length".into(), Value::from(page.byte_len));
        diagnostics.insert("encoding".into(), Value::from(page.body.encoding_label.clone()));
        if page.body.lossy {
            diagnostics.insert("decode_lossy".into(), Value::Bool(true));
        }
        if let Some(ct) = &page.content_type {
            diagnostics.insert("content_type".into(), Value::from(ct.clone()));
        }
        diagnostics.insert("headers".into(), json!(page.headers));

        if let Some(artifacts) = &self.artifacts {
            let host = reqwest::Url::parse(&page.final_url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string));
            let report = page_analysis_report(url, &page);
            match artifacts.save_page_analysis(host.as_deref(), &report, Utc::now()) {
                Ok(path) => {
                    diagnostics.insert(
                        "analysis_file".into(),
                        Value::from(path.display().to_string()),
                    );
                }
                Err(err) => engine_warn!("Could not save page analysis: {}", err),
            }
        }

        FetchOutcome {
            success: true,
            method: FetchMethod::Http,
            status_code: Some(page.status),
            raw_html: Some(page.body.html),
            content: None,
            failure: None,
            diagnostics,
        }
    }
}

fn page_analysis_report(requested_url: &str, page: &HttpPage) -> String {
    let mut report = String::new();
    let _ = writeln!(report, "Page analysis");
    let _ = writeln!(report, "=============");
    let _ = writeln!(report, "URL: {requested_url}");
    if page.final_url != requested_url {
        let _ = writeln!(report, "Final URL: {}", page.final_url);
    }
    let _ = writeln!(report, "Status: {}", page.status);
    let _ = writeln!(report, "Content length: {} bytes", page.byte_len);
    let _ = writeln!(report, "Encoding: {}", page.body.encoding_label);
    let _ = writeln!(report);
    let _ = writeln!(report, "Headers:");
    for (name, value) in &page.headers {
        let _ = writeln!(report, "  {name}: {value}");
    }
    let _ = writeln!(report);
    let _ = writeln!(report, "Content preview:");
    let _ = writeln!(report, "{}", prepare_preview_content(&page.body.html));
    report
}

fn too_large(max_bytes: u64, actual: u64) -> FetchError {
    FetchError::new(
        FailureKind::RequestError,
        format!("response too large (max {max_bytes} bytes, got {actual})"),
    )
}

fn map_reqwest_error(err: reqwest::Error, timeout: Duration) -> FetchError {
    engine_debug!("reqwest error: {:?}", err);
    if err.is_timeout() {
        return FetchError::new(
            FailureKind::RequestError,
            format!("request timed out after {}s: {err}", timeout.as_secs()),
        );
    }
    if err.is_redirect() {
        return FetchError::new(
            FailureKind::RequestError,
            format!("redirect limit exceeded: {err}"),
        );
    }
    FetchError::new(FailureKind::RequestError, err.to_string())
}
