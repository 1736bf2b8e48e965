//! Sensory engine: fetch strategies, extraction, and result reporting.
mod browser;
mod content;
mod decode;
mod extract;
mod fetch;
mod filename;
mod fingerprint;
mod job;
mod links;
mod persist;
mod pipeline;
mod preview;
mod report;
mod types;

pub use browser::{find_browser, BrowserFetcher, BrowserSettings};
pub use content::{
    limits, normalize_whitespace, ExtractedContent, Heading, PageImage, PageLink, PageStructure,
    NO_TITLE,
};
pub use decode::{decode_body, DecodedBody};
pub use extract::{analyze_structure, extract_content, visible_text, Extractor, HtmlExtractor};
pub use fetch::{HttpFetcher, HttpSettings, PageFetcher};
pub use filename::artifact_filename;
pub use fingerprint::{Fingerprint, FingerprintPool, FingerprintSource, Viewport};
pub use job::{
    job_id_for, JobData, JobMetadata, JobResult, PerformanceMetrics, SetupFailureRecord, COMPONENT,
};
pub use links::resolve_url;
pub use persist::{ensure_output_dir, ArtifactStore, AtomicFileWriter, PersistError};
pub use pipeline::{ExtractionPipeline, JobRequest, PipelineRun};
pub use preview::{clip_chars, prepare_preview_content, MAX_PREVIEW_CHARS};
pub use report::{
    Delivery, HubSettings, ReportError, ReportSummary, ResultReporter, ResultStore, CALLBACK_PATH,
    RESULTS_FILE,
};
pub use types::{Diagnostics, FailureKind, FetchError, FetchOutcome};

pub use sensory_core::{ExtractionMethod, FetchMethod, JobStatus};
