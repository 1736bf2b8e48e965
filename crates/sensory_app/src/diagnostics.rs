//! Startup environment summary, logged and attached to the job result.

use std::path::Path;

use engine_logging::engine_info;
use sensory_engine::{Diagnostics, RESULTS_FILE};
use serde_json::Value;

use crate::config::{
    SensoryConfig, PRIORITY, SENSORY_API_KEY, SYNAPSE_HUB_URL, TARGET_URL,
};

const NOT_SET: &str = "NOT SET";

/// Hide a secret while keeping enough to tell two keys apart.
pub fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count < 12 {
        return "****".to_string();
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("****{tail}")
}

pub fn environment_summary(config: &SensoryConfig, browser: Option<&Path>) -> Diagnostics {
    let mut env = Diagnostics::new();
    env.insert(TARGET_URL.into(), Value::from(config.target_url.clone()));
    env.insert(
        SYNAPSE_HUB_URL.into(),
        Value::from(config.hub_url.clone().unwrap_or_else(|| NOT_SET.into())),
    );
    env.insert(
        SENSORY_API_KEY.into(),
        Value::from(
            config
                .api_key
                .as_deref()
                .map(mask_secret)
                .unwrap_or_else(|| NOT_SET.into()),
        ),
    );
    env.insert(PRIORITY.into(), Value::from(config.priority.clone()));
    env.insert("hub_callback".into(), Value::Bool(config.hub_configured()));
    env.insert("browser_enabled".into(), Value::Bool(config.browser_enabled));
    env.insert(
        "browser_executable".into(),
        browser.map_or(Value::Null, |p| Value::from(p.display().to_string())),
    );
    env.insert(
        "results_file".into(),
        Value::from(config.output_dir.join(RESULTS_FILE).display().to_string()),
    );
    env.insert(
        "screenshots_dir".into(),
        Value::from(config.screenshots_dir().display().to_string()),
    );
    if let Ok(cwd) = std::env::current_dir() {
        env.insert("working_directory".into(), Value::from(cwd.display().to_string()));
    }
    env.insert("log_level".into(), Value::from(config.log_level.to_string()));
    env.insert("os".into(), Value::from(std::env::consts::OS));
    env.insert("version".into(), Value::from(env!("CARGO_PKG_VERSION")));
    env
}

pub fn log_summary(summary: &Diagnostics) {
    engine_info!("Environment:");
    for (key, value) in summary {
        match value {
            Value::String(text) => engine_info!("  {}: {}", key, text),
            other => engine_info!("  {}: {}", key, other),
        }
    }
}
