use crate::FetchMethod;

/// Where the run currently is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Init,
    /// Waiting for the fetcher at `strategies[index]`.
    Trying { method: FetchMethod, index: usize },
    Succeeded { method: FetchMethod },
    AllFailed,
    /// Terminal: the reporter has been invoked.
    Reported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub method: FetchMethod,
    pub success: bool,
    pub error: Option<String>,
}

/// State of one pipeline run: the ordered strategy list plus everything
/// that has been tried so far.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PipelineState {
    strategies: Vec<FetchMethod>,
    phase: Phase,
    attempts: Vec<AttemptRecord>,
}

impl PipelineState {
    /// Strategies are attempted in the given order; duplicates are dropped.
    pub fn new(strategies: impl IntoIterator<Item = FetchMethod>) -> Self {
        let mut ordered: Vec<FetchMethod> = Vec::new();
        for method in strategies {
            if !ordered.contains(&method) {
                ordered.push(method);
            }
        }
        Self {
            strategies: ordered,
            phase: Phase::Init,
            attempts: Vec::new(),
        }
    }

    pub fn strategies(&self) -> &[FetchMethod] {
        &self.strategies
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    /// The strategy that produced the content, if any.
    pub fn succeeded_with(&self) -> Option<FetchMethod> {
        self.attempts
            .iter()
            .find(|attempt| attempt.success)
            .map(|attempt| attempt.method)
    }

    /// Failure detail of the most recent failed attempt.
    pub fn last_error(&self) -> Option<&str> {
        self.attempts
            .iter()
            .rev()
            .find(|attempt| !attempt.success)
            .and_then(|attempt| attempt.error.as_deref())
    }

    pub fn is_reported(&self) -> bool {
        self.phase == Phase::Reported
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub(crate) fn record_attempt(&mut self, attempt: AttemptRecord) {
        self.attempts.push(attempt);
    }
}
