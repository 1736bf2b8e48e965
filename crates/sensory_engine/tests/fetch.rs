use std::sync::Arc;
use std::time::Duration;

use sensory_engine::{
    ArtifactStore, FailureKind, FetchMethod, FingerprintPool, FingerprintSource, HttpFetcher,
    HttpSettings, PageFetcher, Viewport,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const AGENT: &str = "SensoryTest/1.0";

fn fixed_fingerprints() -> Arc<FingerprintSource> {
    let pool = FingerprintPool {
        user_agents: vec![AGENT.into()],
        viewports: vec![Viewport {
            width: 1280,
            height: 720,
        }],
    };
    Arc::new(FingerprintSource::new(pool, Some(1)))
}

/// Whole-value header match. `matchers::header` splits values on commas.
fn header_exact(
    name: &'static str,
    expected: &'static str,
) -> impl Fn(&Request) -> bool + Send + Sync {
    move |request: &Request| {
        request
            .headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            == Some(expected)
    }
}

fn fetcher(settings: HttpSettings) -> HttpFetcher {
    HttpFetcher::new(settings, fixed_fingerprints()).expect("client builds")
}

#[tokio::test]
async fn success_returns_body_status_and_diagnostics() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/doc"))
        .and(header("user-agent", AGENT))
        .and(header_exact("accept-language", "en-US,en;q=0.5"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-served-by", "mock")
                .set_body_raw("<title>ok</title>", "text/html; charset=utf-8"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/doc", server.uri());
    let outcome = fetcher(HttpSettings::default()).fetch(&url).await;

    assert!(outcome.success, "{:?}", outcome.failure);
    assert_eq!(outcome.method, FetchMethod::Http);
    assert_eq!(outcome.status_code, Some(200));
    assert_eq!(outcome.raw_html.as_deref(), Some("<title>ok</title>"));
    assert!(outcome.content.is_none());
    assert_eq!(outcome.error_message(), None);

    let diags = &outcome.diagnostics;
    assert_eq!(diags["status_code"], 200);
    assert_eq!(diags["final_url"], url.as_str());
    assert_eq!(diags["user_agent"], AGENT);
    assert_eq!(diags["encoding"], "UTF-8");
    assert_eq!(diags["headers"]["x-served-by"], "mock");
    assert!(diags["elapsed_ms"].is_u64());
}

#[tokio::test]
async fn not_found_is_a_request_error_with_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let outcome = fetcher(HttpSettings::default())
        .fetch(&format!("{}/missing", server.uri()))
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.status_code, Some(404));
    assert!(outcome.raw_html.is_none());
    let failure = outcome.failure.clone().unwrap();
    assert_eq!(failure.kind, FailureKind::RequestError);
    assert!(failure.message.contains("404"));
    assert_eq!(outcome.diagnostics["error_type"], "request_error");
    assert!(!outcome.error_message().unwrap().is_empty());
}

#[tokio::test]
async fn slow_response_times_out_as_request_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(500))
                .set_body_string("slow"),
        )
        .mount(&server)
        .await;

    let settings = HttpSettings {
        request_timeout: Duration::from_millis(50),
        ..HttpSettings::default()
    };
    let outcome = fetcher(settings)
        .fetch(&format!("{}/slow", server.uri()))
        .await;

    assert!(!outcome.success);
    let failure = outcome.failure.unwrap();
    assert_eq!(failure.kind, FailureKind::RequestError);
    assert!(failure.message.contains("timed out"), "{}", failure.message);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/large"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/html")
                .set_body_string("01234567890"),
        )
        .mount(&server)
        .await;

    let settings = HttpSettings {
        max_bytes: 10,
        ..HttpSettings::default()
    };
    let outcome = fetcher(settings)
        .fetch(&format!("{}/large", server.uri()))
        .await;

    assert!(!outcome.success);
    let failure = outcome.failure.unwrap();
    assert_eq!(failure.kind, FailureKind::RequestError);
    assert!(failure.message.contains("too large"), "{}", failure.message);
}

#[tokio::test]
async fn unreachable_host_fails_without_panicking() {
    // Port 9 (discard) on localhost is closed in test environments.
    let outcome = fetcher(HttpSettings {
        connect_timeout: Duration::from_millis(200),
        request_timeout: Duration::from_millis(500),
        ..HttpSettings::default()
    })
    .fetch("http://127.0.0.1:9/")
    .await;

    assert!(!outcome.success);
    assert_eq!(outcome.failure.unwrap().kind, FailureKind::RequestError);
}

#[tokio::test]
async fn invalid_url_is_a_request_error() {
    let outcome = fetcher(HttpSettings::default()).fetch("not a url").await;
    assert!(!outcome.success);
    assert_eq!(outcome.diagnostics["error_type"], "request_error");
}

#[tokio::test]
async fn page_analysis_artifact_is_written() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<p>hello</p>", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let temp = tempfile::TempDir::new().unwrap();
    let screenshots = temp.path().join("screenshots");
    let outcome = fetcher(HttpSettings::default())
        .with_artifacts(ArtifactStore::new(screenshots.clone()))
        .fetch(&format!("{}/page", server.uri()))
        .await;

    assert!(outcome.success);
    let path = outcome.diagnostics["analysis_file"].as_str().unwrap();
    let name = std::path::Path::new(path)
        .file_name()
        .unwrap()
        .to_string_lossy()
        .into_owned();
    assert!(name.starts_with("page_analysis_127.0.0.1_"), "{name}");
    assert!(name.ends_with(".txt"));

    let report = std::fs::read_to_string(path).unwrap();
    assert!(report.contains("Status: 200"));
    assert!(report.contains("content-type: text/html"));
    assert!(report.contains("<p>hello</p>"));
    assert_eq!(std::fs::read_dir(&screenshots).unwrap().count(), 1);
}
