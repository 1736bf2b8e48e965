use crate::FetchMethod;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Begin the run with the first configured strategy.
    Start,
    /// A fetcher returned. `error` carries the failure detail when `success` is false.
    FetchFinished {
        method: FetchMethod,
        success: bool,
        error: Option<String>,
    },
    /// The reporter finished (successfully or not).
    Reported,
}
