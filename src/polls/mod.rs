//! Cafeteria poll
//!
//! Per-chat attendance votes, their tally and the debounced document store.

pub mod store;
pub mod tally;
pub mod types;

pub use store::{
    chat_label, document_file_name, parse_document_chat_id, PersistOutcome, PollStore,
    DEFAULT_PERSIST_INTERVAL, POLL_FILE_PREFIX,
};
pub use tally::{render_tally, Tally, TallyGroup};
pub use types::{ChatPollState, PollDocument, Vote, VoteStatus, Voter};
