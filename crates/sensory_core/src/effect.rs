use crate::FetchMethod;

/// Work the pipeline driver must perform after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Run the fetcher for this strategy and feed back `Msg::FetchFinished`.
    Fetch(FetchMethod),
    /// The strategy succeeded; record its extraction method and capabilities.
    Complete { method: FetchMethod },
    /// Every strategy failed; `error` is the detail of the last attempt.
    Fail { error: String },
    /// Hand the terminal result to the reporter, then feed back `Msg::Reported`.
    Report,
}
