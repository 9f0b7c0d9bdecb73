//! # lr-observer
//!
//! The periodic project-health observer: every Nth action of a session it
//! runs five heuristics over the project tree and the store, persists the
//! resulting alerts, and escalates to a hard stop when the project state
//! is severely stale.
//!
//! The observer is sampled, not per-invocation — gates answer "is this
//! action ok", the observer answers "is this project drifting" and only
//! needs to ask every so often.

pub mod observer;
pub mod phase;

pub use observer::{run_if_due, ObserverConfig, ObserverOutcome};
pub use phase::{detect_drift, expected_actions, extract_phase};
