//! Unified diff text for a single resource.
//!
//! The output always carries one synthetic git file pair so any unified-diff
//! parser reads it back as exactly one file with zero or more hunks.

use crate::domain::{DiffError, DiffJob};
use similar::{Algorithm, TextDiff};
use std::fmt::Write;

/// Context lines around each change in compact mode.
pub const DEFAULT_CONTEXT_LINES: usize = 2;

/// Cosmetic placeholder; nothing downstream reads the blob ids.
const INDEX_LINE: &str = "index 6829b8a2..4c565f1b 100644";

pub fn line_count(text: &str) -> usize {
    text.lines().count()
}

pub fn diff_header(name: &str) -> String {
    format!("diff --git a/{name} b/{name}\n{INDEX_LINE}\n--- a/{name}\n+++ b/{name}\n")
}

/// Produces the patch text for `before` -> `after`.
///
/// Compact mode keeps `context_lines` around each change. Otherwise the context
/// radius covers the whole file so all changes land in one hunk. A last line
/// without a line break is followed by `\ No newline at end of file`.
pub fn diff_text(before: &str, after: &str, name: &str, compact: bool, context_lines: usize) -> String {
    let radius = if compact {
        context_lines
    } else {
        line_count(before).max(line_count(after)).max(1)
    };

    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_lines(before, after);

    let mut out = diff_header(name);
    let _ = write!(out, "{}", diff.unified_diff().context_radius(radius));
    out
}

/// Runs one queued job through [`diff_text`].
pub fn compute_job(job: &DiffJob, context_lines: usize) -> Result<String, DiffError> {
    if job.id.trim().is_empty() {
        return Err(DiffError::Computation {
            name: job.name.clone(),
            message: "resource identifier is empty".to_string(),
        });
    }
    if job.id.contains('\n') {
        return Err(DiffError::Computation {
            name: job.name.clone(),
            message: "resource identifier contains a line break".to_string(),
        });
    }

    Ok(diff_text(
        &job.before,
        &job.after,
        &job.id,
        job.options.compact_diff,
        context_lines,
    ))
}
