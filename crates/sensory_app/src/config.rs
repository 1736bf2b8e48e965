//! Process configuration read from environment-style keys.

use std::path::PathBuf;

use log::LevelFilter;
use thiserror::Error;
use url::Url;

pub const TARGET_URL: &str = "TARGET_URL";
pub const SYNAPSE_HUB_URL: &str = "SYNAPSE_HUB_URL";
pub const SENSORY_API_KEY: &str = "SENSORY_API_KEY";
pub const PRIORITY: &str = "PRIORITY";
pub const SENSORY_OUTPUT_DIR: &str = "SENSORY_OUTPUT_DIR";
pub const SENSORY_BROWSER: &str = "SENSORY_BROWSER";
pub const CHROME_PATH: &str = "CHROME_PATH";
pub const SENSORY_SEED: &str = "SENSORY_SEED";
pub const SENSORY_LOG: &str = "SENSORY_LOG";

pub const DEFAULT_TARGET_URL: &str = "https://httpbin.org/html";
pub const DEFAULT_PRIORITY: &str = "normal";
const SCREENSHOTS_DIR: &str = "screenshots";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("TARGET_URL is not a valid URL ({value}): {reason}")]
    InvalidTargetUrl { value: String, reason: String },
    #[error("TARGET_URL must use http or https, got {0}")]
    UnsupportedScheme(String),
    #[error("SENSORY_SEED must be an unsigned integer, got {0}")]
    InvalidSeed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensoryConfig {
    pub target_url: String,
    pub hub_url: Option<String>,
    pub api_key: Option<String>,
    pub priority: String,
    pub output_dir: PathBuf,
    pub browser_enabled: bool,
    pub chrome_path: Option<PathBuf>,
    pub seed: Option<u64>,
    pub log_level: LevelFilter,
}

impl SensoryConfig {
    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let target_url = get(TARGET_URL).unwrap_or_else(|| DEFAULT_TARGET_URL.to_string());
        let parsed = Url::parse(&target_url).map_err(|err| ConfigError::InvalidTargetUrl {
            value: target_url.clone(),
            reason: err.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(parsed.scheme().to_string()));
        }

        let seed = get(SENSORY_SEED)
            .map(|raw| raw.parse::<u64>().map_err(|_| ConfigError::InvalidSeed(raw)))
            .transpose()?;

        Ok(Self {
            target_url,
            hub_url: get(SYNAPSE_HUB_URL),
            api_key: get(SENSORY_API_KEY),
            priority: get(PRIORITY).unwrap_or_else(|| DEFAULT_PRIORITY.to_string()),
            output_dir: output_dir_from(&lookup),
            browser_enabled: get(SENSORY_BROWSER).map_or(true, |raw| !is_off(&raw)),
            chrome_path: get(CHROME_PATH).map(PathBuf::from),
            seed,
            log_level: log_level_from(&lookup),
        })
    }

    pub fn screenshots_dir(&self) -> PathBuf {
        self.output_dir.join(SCREENSHOTS_DIR)
    }

    /// Callback is only attempted when both are present.
    pub fn hub_configured(&self) -> bool {
        self.hub_url.is_some() && self.api_key.is_some()
    }
}

/// Output directory on its own, usable even when the rest of the
/// configuration is invalid.
pub fn output_dir_from<F>(lookup: &F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    lookup(SENSORY_OUTPUT_DIR)
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn log_level_from<F>(lookup: &F) -> LevelFilter
where
    F: Fn(&str) -> Option<String>,
{
    lookup(SENSORY_LOG)
        .as_deref()
        .and_then(engine_logging::parse_level)
        .unwrap_or(LevelFilter::Info)
}

fn is_off(raw: &str) -> bool {
    matches!(
        raw.to_ascii_lowercase().as_str(),
        "off" | "0" | "false" | "no" | "disabled"
    )
}
