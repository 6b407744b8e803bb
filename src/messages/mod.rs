//! Outbound message handling.

pub mod delivery;
