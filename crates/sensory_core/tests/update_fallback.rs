use pretty_assertions::assert_eq;
use sensory_core::{update, Effect, FetchMethod, JobStatus, Msg, Phase, PipelineState};

fn init_logging() {
    engine_logging::initialize_for_tests();
}

fn finished(method: FetchMethod, success: bool, error: Option<&str>) -> Msg {
    Msg::FetchFinished {
        method,
        success,
        error: error.map(ToOwned::to_owned),
    }
}

#[test]
fn browser_is_attempted_first_when_configured() {
    init_logging();
    let state = PipelineState::new([FetchMethod::Browser, FetchMethod::Http]);
    let (state, effects) = update(state, Msg::Start);

    assert_eq!(effects, vec![Effect::Fetch(FetchMethod::Browser)]);
    assert_eq!(
        *state.phase(),
        Phase::Trying {
            method: FetchMethod::Browser,
            index: 0
        }
    );
}

#[test]
fn browser_success_completes_without_http() {
    let state = PipelineState::new([FetchMethod::Browser, FetchMethod::Http]);
    let (state, _) = update(state, Msg::Start);
    let (state, effects) = update(state, finished(FetchMethod::Browser, true, None));

    assert_eq!(
        effects,
        vec![
            Effect::Complete {
                method: FetchMethod::Browser
            },
            Effect::Report
        ]
    );
    assert_eq!(state.succeeded_with(), Some(FetchMethod::Browser));
    assert_eq!(state.attempts().len(), 1);
}

#[test]
fn browser_failure_falls_back_to_http() {
    let state = PipelineState::new([FetchMethod::Browser, FetchMethod::Http]);
    let (state, _) = update(state, Msg::Start);
    let (state, effects) = update(
        state,
        finished(FetchMethod::Browser, false, Some("navigation timeout")),
    );

    assert_eq!(effects, vec![Effect::Fetch(FetchMethod::Http)]);

    let (state, effects) = update(state, finished(FetchMethod::Http, true, None));
    assert_eq!(
        effects,
        vec![
            Effect::Complete {
                method: FetchMethod::Http
            },
            Effect::Report
        ]
    );
    assert_eq!(state.succeeded_with(), Some(FetchMethod::Http));
    assert_eq!(state.last_error(), Some("navigation timeout"));
}

#[test]
fn last_attempted_strategy_error_wins_when_all_fail() {
    let state = PipelineState::new([FetchMethod::Browser, FetchMethod::Http]);
    let (state, _) = update(state, Msg::Start);
    let (state, _) = update(state, finished(FetchMethod::Browser, false, Some("browser crashed")));
    let (state, effects) = update(state, finished(FetchMethod::Http, false, Some("HTTP 404")));

    assert_eq!(
        effects,
        vec![
            Effect::Fail {
                error: "HTTP 404".to_string()
            },
            Effect::Report
        ]
    );
    assert_eq!(*state.phase(), Phase::AllFailed);
    assert_eq!(state.attempts().len(), 2);
    assert_eq!(state.attempts()[0].error.as_deref(), Some("browser crashed"));
}

#[test]
fn http_only_pipeline_starts_with_http() {
    let state = PipelineState::new([FetchMethod::Http]);
    let (_state, effects) = update(state, Msg::Start);
    assert_eq!(effects, vec![Effect::Fetch(FetchMethod::Http)]);
}

#[test]
fn empty_strategy_list_fails_immediately() {
    let state = PipelineState::new(Vec::<FetchMethod>::new());
    let (state, effects) = update(state, Msg::Start);

    assert_eq!(*state.phase(), Phase::AllFailed);
    assert!(matches!(&effects[0], Effect::Fail { error } if !error.is_empty()));
    assert_eq!(effects[1], Effect::Report);
}

#[test]
fn failure_without_detail_still_yields_an_error_message() {
    let state = PipelineState::new([FetchMethod::Http]);
    let (state, _) = update(state, Msg::Start);
    let (_state, effects) = update(state, finished(FetchMethod::Http, false, Some("   ")));

    match &effects[0] {
        Effect::Fail { error } => assert!(!error.trim().is_empty()),
        other => panic!("unexpected effect {other:?}"),
    }
}

#[test]
fn stale_fetch_result_is_ignored() {
    let state = PipelineState::new([FetchMethod::Browser, FetchMethod::Http]);
    let (state, _) = update(state, Msg::Start);
    let before = state.clone();
    let (state, effects) = update(state, finished(FetchMethod::Http, true, None));

    assert!(effects.is_empty());
    assert_eq!(state, before);
}

#[test]
fn reported_is_terminal_and_start_cannot_restart() {
    let state = PipelineState::new([FetchMethod::Http]);
    let (state, _) = update(state, Msg::Start);
    let (state, _) = update(state, finished(FetchMethod::Http, true, None));
    let (state, effects) = update(state, Msg::Reported);
    assert!(effects.is_empty());
    assert!(state.is_reported());

    let (state, effects) = update(state, Msg::Start);
    assert!(effects.is_empty());
    assert!(state.is_reported());
}

#[test]
fn duplicate_strategies_are_collapsed() {
    let state = PipelineState::new([FetchMethod::Http, FetchMethod::Http, FetchMethod::Browser]);
    assert_eq!(state.strategies(), &[FetchMethod::Http, FetchMethod::Browser]);
}

#[test]
fn capability_tags_and_methods_serialize_as_tags() {
    assert_eq!(
        serde_json::to_string(&FetchMethod::Http.extraction_method()).unwrap(),
        "\"http_regex\""
    );
    assert_eq!(FetchMethod::Browser.capabilities().len(), 5);
    assert!(FetchMethod::Http.capabilities().contains(&"regex_parsing"));
}

#[test]
fn only_completed_and_failed_are_terminal() {
    assert!(!JobStatus::Started.is_terminal());
    assert!(JobStatus::Completed.is_terminal());
    assert!(JobStatus::Failed.is_terminal());
}
