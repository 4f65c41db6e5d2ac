//! Application layer (use-cases, policies).
//!
//! Orchestrates the diff engine and the stream client into the state the
//! console renders: the application list and diff view sessions.

pub mod apps;
pub mod diff_view;

pub use apps::{AppSummary, ApplicationCollection, MergeOutcome, reduce};
pub use diff_view::{DiffEntry, DiffView, FileView};
