#![no_main]

use libfuzzer_sys::fuzz_target;

use classbot::polls::{render_tally, ChatPollState, PollDocument};

fuzz_target!(|data: &[u8]| {
    // Documents on disk may be truncated or hand-edited. A document that
    // parses must merge and render without panicking.
    let Ok(doc) = serde_json::from_slice::<PollDocument>(data) else {
        return;
    };
    let votes = doc.votes.len();
    let mut state = ChatPollState::new("fuzz");
    state.merge_document(doc);
    assert_eq!(state.votes.len(), votes);
    let _ = render_tally(&state);
});
