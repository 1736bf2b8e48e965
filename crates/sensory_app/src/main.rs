mod app;
mod config;
mod diagnostics;

use std::path::PathBuf;
use std::process::ExitCode;

use engine_logging::LogDestination;

fn main() -> ExitCode {
    let lookup = |key: &str| std::env::var(key).ok();
    engine_logging::initialize(
        LogDestination::Both(PathBuf::from(app::LOG_FILE)),
        config::log_level_from(&lookup),
    );
    ExitCode::from(app::run_process(lookup))
}
