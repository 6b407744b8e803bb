#![no_main]

use libfuzzer_sys::fuzz_target;

use classbot::bot::Action;
use classbot::polls::parse_document_chat_id;

fuzz_target!(|data: &str| {
    // Callback data is attacker-controlled: any client can send any payload
    // up to 64 bytes. Routing must never panic.
    if let Some(Action::Day { profile, .. }) = Action::parse(data) {
        assert!(!profile.is_empty());
    }

    let _ = parse_document_chat_id(data);
});
