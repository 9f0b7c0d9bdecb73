//! # lr-action
//!
//! The leaf layer of the enforcement pipeline: the tool-event input model,
//! the action classifier, and the literature-search detector.
//!
//! Everything here is a pure function of the incoming [`ToolEvent`] plus
//! static pattern tables — no store access, no filesystem access. The
//! classifier is total: every input yields an [`ActionType`] or `None`
//! ("too trivial to log"), never an error.

pub mod classify;
pub mod event;
pub mod literature;

pub use classify::{classify, ActionType};
pub use event::{summarize_input, summarize_output, ToolEvent, ToolInput, ToolKind};
pub use literature::detect;

/// Max characters for input/output summaries in action records.
pub const SUMMARY_MAX_CHARS: usize = 200;
