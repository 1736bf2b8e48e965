use sensory_core::{update, FetchMethod, Msg, PipelineState};

#[test]
fn messages_before_start_are_ignored() {
    let state = PipelineState::new([FetchMethod::Browser, FetchMethod::Http]);

    for msg in [
        Msg::Reported,
        Msg::FetchFinished {
            method: FetchMethod::Browser,
            success: true,
            error: None,
        },
    ] {
        let (next, effects) = update(state.clone(), msg);
        assert_eq!(state, next);
        assert!(effects.is_empty());
    }
}
