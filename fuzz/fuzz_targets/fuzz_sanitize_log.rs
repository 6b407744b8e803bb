#![no_main]

use libfuzzer_sys::fuzz_target;

use classbot::security::logging::sanitize_log_message;

fuzz_target!(|data: &str| {
    // The sanitizer runs on every transport error. Catastrophic regex
    // backtracking would show up here as a libFuzzer timeout.
    let _ = sanitize_log_message(data);
});
