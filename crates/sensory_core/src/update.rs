use crate::{AttemptRecord, Effect, Msg, Phase, PipelineState};

const NO_STRATEGY_ERROR: &str = "no fetch strategy configured";
const UNKNOWN_FAILURE: &str = "fetch failed without detail";

/// Pure update function: applies a message to state and returns any effects.
///
/// Messages that do not fit the current phase (a stale `FetchFinished`, a
/// second `Start`) leave the state untouched and produce no effects.
pub fn update(mut state: PipelineState, msg: Msg) -> (PipelineState, Vec<Effect>) {
    let effects = match msg {
        Msg::Start => {
            if *state.phase() != Phase::Init {
                return (state, Vec::new());
            }
            match state.strategies().first().copied() {
                Some(method) => {
                    state.set_phase(Phase::Trying { method, index: 0 });
                    vec![Effect::Fetch(method)]
                }
                None => {
                    state.set_phase(Phase::AllFailed);
                    vec![
                        Effect::Fail {
                            error: NO_STRATEGY_ERROR.to_string(),
                        },
                        Effect::Report,
                    ]
                }
            }
        }
        Msg::FetchFinished {
            method,
            success,
            error,
        } => {
            let index = match state.phase() {
                Phase::Trying {
                    method: expected,
                    index,
                } if *expected == method => *index,
                _ => return (state, Vec::new()),
            };

            let error = if success {
                None
            } else {
                Some(
                    error
                        .filter(|detail| !detail.trim().is_empty())
                        .unwrap_or_else(|| UNKNOWN_FAILURE.to_string()),
                )
            };
            state.record_attempt(AttemptRecord {
                method,
                success,
                error: error.clone(),
            });

            if success {
                state.set_phase(Phase::Succeeded { method });
                vec![Effect::Complete { method }, Effect::Report]
            } else if let Some(next) = state.strategies().get(index + 1).copied() {
                state.set_phase(Phase::Trying {
                    method: next,
                    index: index + 1,
                });
                vec![Effect::Fetch(next)]
            } else {
                // Last attempted strategy wins for the user-visible error.
                state.set_phase(Phase::AllFailed);
                vec![
                    Effect::Fail {
                        error: error.unwrap_or_else(|| UNKNOWN_FAILURE.to_string()),
                    },
                    Effect::Report,
                ]
            }
        }
        Msg::Reported => {
            if matches!(state.phase(), Phase::Succeeded { .. } | Phase::AllFailed) {
                state.set_phase(Phase::Reported);
            }
            Vec::new()
        }
    };

    (state, effects)
}
