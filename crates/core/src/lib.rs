//! Coldchain core domain: refrigeration readings, the telemetry generator
//! and the alert evaluator.
//!
//! Nothing in this crate performs I/O. Publishing lives in
//! `coldchain-events`; the HTTP surface lives in `coldchain-api`.

pub mod alert;
pub mod error;
pub mod evaluator;
pub mod generator;
pub mod log_event;
pub mod reading;
pub mod status;
pub mod types;
