//! Collapsed regions between hunks and the controls that reveal them.
//!
//! All line ranges are in "before" (old file) coordinates, 1-based and
//! end-exclusive.

use super::parse::{Change, Hunk};
use std::ops::Range;

/// Gaps up to this size get a single "expand all" control.
pub const EXPAND_STEP: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapPosition {
    /// Above the first hunk.
    Leading,
    /// Between `hunks[prev]` and `hunks[next]`.
    Between { prev: usize, next: usize },
    /// Below the last hunk.
    Trailing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gap {
    pub position: GapPosition,
    pub lines: Range<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandDirection {
    /// Reveal lines directly above the next hunk.
    Up,
    /// Reveal lines directly below the previous hunk.
    Down,
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandControl {
    pub direction: ExpandDirection,
    pub lines: Range<u32>,
}

impl ExpandControl {
    pub fn len(&self) -> u32 {
        self.lines.end.saturating_sub(self.lines.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn label(&self) -> String {
        match self.direction {
            ExpandDirection::All => format!("Expand all {} lines", self.len()),
            ExpandDirection::Up | ExpandDirection::Down => format!("Expand {} lines", self.len()),
        }
    }
}

impl Gap {
    pub fn size(&self) -> u32 {
        self.lines.end.saturating_sub(self.lines.start)
    }

    /// Controls for this gap: one "all" control up to `step` lines, otherwise a
    /// capped control next to the nearer hunk plus the "all" control.
    pub fn controls(&self, step: u32) -> Vec<ExpandControl> {
        let size = self.size();
        if size == 0 {
            return Vec::new();
        }

        let all = ExpandControl {
            direction: ExpandDirection::All,
            lines: self.lines.clone(),
        };
        if size <= step {
            return vec![all];
        }

        let capped = match self.position {
            GapPosition::Leading => ExpandControl {
                direction: ExpandDirection::Up,
                lines: self.lines.end - step..self.lines.end,
            },
            GapPosition::Between { .. } | GapPosition::Trailing => ExpandControl {
                direction: ExpandDirection::Down,
                lines: self.lines.start..self.lines.start + step,
            },
        };
        vec![capped, all]
    }
}

/// Hidden regions of the before text around `hunks`.
///
/// With no hunks at all the whole file is one leading gap.
pub fn gaps(hunks: &[Hunk], total_lines: u32) -> Vec<Gap> {
    let end_of_file = total_lines + 1;
    let mut out = Vec::new();

    let Some(first) = hunks.first() else {
        if total_lines > 0 {
            out.push(Gap {
                position: GapPosition::Leading,
                lines: 1..end_of_file,
            });
        }
        return out;
    };

    out.push(Gap {
        position: GapPosition::Leading,
        lines: 1..first.old_range().start.max(1),
    });

    for (prev, pair) in hunks.windows(2).enumerate() {
        let start = pair[0].old_range().end;
        let end = pair[1].old_range().start.max(start);
        out.push(Gap {
            position: GapPosition::Between {
                prev,
                next: prev + 1,
            },
            lines: start..end,
        });
    }

    if let Some(last) = hunks.last() {
        let start = last.old_range().end;
        out.push(Gap {
            position: GapPosition::Trailing,
            lines: start..end_of_file.max(start),
        });
    }

    out.retain(|g| g.size() > 0);
    out
}

/// Offset (new - old) of unchanged lines around `old_line`.
fn unchanged_offset(hunks: &[Hunk], old_line: u32) -> i64 {
    let prev = hunks
        .iter()
        .filter(|h| h.old_range().end <= old_line)
        .max_by_key(|h| h.old_range().end);
    if let Some(h) = prev {
        return i64::from(h.new_range().end) - i64::from(h.old_range().end);
    }
    hunks
        .iter()
        .find(|h| h.old_range().start > old_line)
        .map(|h| i64::from(h.new_range().start) - i64::from(h.old_range().start))
        .unwrap_or(0)
}

fn covered(hunks: &[Hunk], old_line: u32) -> bool {
    hunks.iter().any(|h| h.old_range().contains(&old_line))
}

fn start_for(first: u32, len: u32) -> u32 {
    if len == 0 { first.saturating_sub(1) } else { first }
}

fn merge_contiguous(mut all: Vec<Hunk>) -> Vec<Hunk> {
    // Pure insertions (empty old side) sort before the line they precede.
    all.sort_by_key(|h| (h.old_range().start, h.old_lines > 0));

    let mut out: Vec<Hunk> = Vec::with_capacity(all.len());
    for hunk in all {
        if let Some(cur) = out.last_mut()
            && cur.old_range().end == hunk.old_range().start
            && cur.new_range().end == hunk.new_range().start
        {
            let old_first = cur.old_range().start;
            let new_first = cur.new_range().start;
            cur.old_lines += hunk.old_lines;
            cur.new_lines += hunk.new_lines;
            cur.old_start = start_for(old_first, cur.old_lines);
            cur.new_start = start_for(new_first, cur.new_lines);
            cur.changes.extend(hunk.changes);
            continue;
        }
        out.push(hunk);
    }
    out
}

/// Reveals before-text lines `start..end` as unchanged context and merges
/// hunks that become contiguous. The range is clamped to the before text;
/// lines already inside a hunk are left alone.
pub fn expand_from_raw_code(hunks: &[Hunk], before_text: &str, start: u32, end: u32) -> Vec<Hunk> {
    let source: Vec<&str> = before_text.lines().collect();
    let total = source.len() as u32;
    let start = start.max(1);
    let end = end.min(total + 1);
    if start >= end {
        return hunks.to_vec();
    }

    let mut all = hunks.to_vec();
    let mut line = start;
    while line < end {
        if covered(hunks, line) {
            line += 1;
            continue;
        }

        let first = line;
        while line < end && !covered(hunks, line) {
            line += 1;
        }

        let offset = unchanged_offset(hunks, first);
        let new_first = (i64::from(first) + offset).max(1) as u32;
        let len = line - first;
        let changes = (first..line)
            .enumerate()
            .map(|(i, old)| {
                Change::normal(source[(old - 1) as usize], old, new_first + i as u32)
            })
            .collect();

        all.push(Hunk {
            old_start: first,
            old_lines: len,
            new_start: new_first,
            new_lines: len,
            changes,
        });
    }

    merge_contiguous(all)
}
