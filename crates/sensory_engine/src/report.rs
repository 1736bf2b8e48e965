use std::path::PathBuf;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use thiserror::Error;

use crate::job::JobResult;
use crate::persist::{AtomicFileWriter, PersistError};

pub const RESULTS_FILE: &str = "results.json";
pub const CALLBACK_PATH: &str = "/api/v1/callbacks/sensory";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("result serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("result store: {0}")]
    Persist(#[from] PersistError),
    #[error("hub client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Where the hub lives and how to authenticate. Delivery only happens when
/// both the URL and the key are present.
#[derive(Debug, Clone)]
pub struct HubSettings {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl HubSettings {
    /// Callback endpoint and bearer token, or `None` when delivery is off.
    pub fn endpoint(&self) -> Option<(String, &str)> {
        let url = self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())?;
        let key = self.api_key.as_deref().filter(|k| !k.is_empty())?;
        Some((format!("{}{}", url.trim_end_matches('/'), CALLBACK_PATH), key))
    }
}

/// Single-record JSON store, overwritten on every write.
#[derive(Debug, Clone)]
pub struct ResultStore {
    writer: AtomicFileWriter,
}

impl ResultStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir),
        }
    }

    pub fn save<T: Serialize>(&self, record: &T) -> Result<PathBuf, ReportError> {
        let json = serde_json::to_string_pretty(record)?;
        Ok(self.writer.write(RESULTS_FILE, &json)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Hub URL or key not configured.
    Skipped,
    Delivered,
    /// The hub answered with something other than 200.
    Rejected(u16),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSummary {
    pub persisted: Option<PathBuf>,
    pub delivery: Delivery,
}

pub struct ResultReporter {
    store: ResultStore,
    hub: HubSettings,
    client: reqwest::Client,
}

impl ResultReporter {
    pub fn new(store: ResultStore, hub: HubSettings) -> Result<Self, ReportError> {
        let client = reqwest::Client::builder().timeout(hub.timeout).build()?;
        Ok(Self { store, hub, client })
    }

    /// Write the record to the store; failures are logged and reported as `None`.
    pub fn persist(&self, result: &JobResult) -> Option<PathBuf> {
        match self.store.save(result) {
            Ok(path) => {
                engine_debug!(
                    "Persisted job_id={} status={:?} to {:?}",
                    result.job_id,
                    result.status,
                    path
                );
                Some(path)
            }
            Err(err) => {
                engine_warn!("Could not persist job_id={}: {}", result.job_id, err);
                None
            }
        }
    }

    /// Persist, then deliver to the hub if configured. Never fails; the
    /// outcome is only informational and never feeds back into the job.
    pub async fn report(&self, result: &JobResult) -> ReportSummary {
        let persisted = self.persist(result);
        if let Some(path) = &persisted {
            engine_info!("Saved result job_id={} to {:?}", result.job_id, path);
        }
        let delivery = self.deliver(result).await;
        ReportSummary {
            persisted,
            delivery,
        }
    }

    async fn deliver(&self, result: &JobResult) -> Delivery {
        let Some((endpoint, api_key)) = self.hub.endpoint() else {
            engine_info!(
                "Hub not configured; skipping callback for job_id={}",
                result.job_id
            );
            return Delivery::Skipped;
        };

        let body = match serde_json::to_vec(result) {
            Ok(body) => body,
            Err(err) => {
                engine_warn!("Could not serialize job_id={}: {}", result.job_id, err);
                return Delivery::Failed(err.to_string());
            }
        };

        let response = self
            .client
            .post(&endpoint)
            .header(AUTHORIZATION, format!("Bearer {api_key}"))
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().as_u16() == 200 => {
                engine_info!("Delivered job_id={} to {}", result.job_id, endpoint);
                Delivery::Delivered
            }
            Ok(resp) => {
                let code = resp.status().as_u16();
                engine_warn!(
                    "Hub rejected job_id={} with status {}",
                    result.job_id,
                    code
                );
                Delivery::Rejected(code)
            }
            Err(err) => {
                engine_warn!("Hub delivery failed for job_id={}: {}", result.job_id, err);
                Delivery::Failed(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hub(url: Option<&str>, key: Option<&str>) -> HubSettings {
        HubSettings {
            url: url.map(String::from),
            api_key: key.map(String::from),
            ..HubSettings::default()
        }
    }

    #[test]
    fn endpoint_requires_url_and_key() {
        assert_eq!(hub(None, Some("k")).endpoint(), None);
        assert_eq!(hub(Some("https://hub.test"), None).endpoint(), None);
        assert_eq!(hub(Some("https://hub.test"), Some("")).endpoint(), None);
        assert_eq!(
            hub(Some("https://hub.test/"), Some("k")).endpoint(),
            Some(("https://hub.test/api/v1/callbacks/sensory".to_string(), "k"))
        );
    }
}
