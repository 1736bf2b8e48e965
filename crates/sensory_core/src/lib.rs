//! Sensory core: pure fetch-fallback state machine and shared job vocabulary.
mod effect;
mod method;
mod msg;
mod state;
mod update;

pub use effect::Effect;
pub use method::{ExtractionMethod, FetchMethod, JobStatus};
pub use msg::Msg;
pub use state::{AttemptRecord, Phase, PipelineState};
pub use update::update;
