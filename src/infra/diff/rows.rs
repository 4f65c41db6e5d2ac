//! Flattened row model for virtualized rendering of many file diffs.

use super::hunks::{EXPAND_STEP, ExpandControl, GapPosition, gaps};
use super::parse::Hunk;
use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKind {
    FileHeader { file: usize },
    Control { file: usize, control: ExpandControl },
    Line { file: usize, hunk: usize, change: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub kind: RowKind,
    pub height: f32,
}

/// What the layout needs to know about one file.
#[derive(Debug, Clone, Copy)]
pub struct FileRows<'a> {
    pub hunks: &'a [Hunk],
    /// Line count of the before text, used to size the trailing gap.
    pub total_lines: u32,
}

#[derive(Debug, Clone, Default)]
pub struct RowLayout {
    rows: Vec<Row>,
    /// `offsets[i]` is the top of row `i`; the last entry is the total height.
    offsets: Vec<f32>,
}

impl RowLayout {
    /// One header row per file, then for expanded files the expand controls of
    /// each gap followed by the lines of the hunk below it.
    pub fn build(
        files: &[FileRows<'_>],
        collapsed: &[bool],
        line_height: f32,
        header_height: f32,
    ) -> Self {
        let mut rows = Vec::new();
        for (file, source) in files.iter().enumerate() {
            rows.push(Row {
                kind: RowKind::FileHeader { file },
                height: header_height,
            });
            if collapsed.get(file).copied().unwrap_or(false) {
                continue;
            }

            // slots[i] holds the controls shown above hunk i; the last slot is
            // below the final hunk.
            let mut slots: Vec<Vec<ExpandControl>> = vec![Vec::new(); source.hunks.len() + 1];
            for gap in gaps(source.hunks, source.total_lines) {
                let slot = match gap.position {
                    GapPosition::Leading => 0,
                    GapPosition::Between { next, .. } => next,
                    GapPosition::Trailing => source.hunks.len(),
                };
                slots[slot].extend(gap.controls(EXPAND_STEP));
            }

            for (slot, controls) in slots.into_iter().enumerate() {
                rows.extend(controls.into_iter().map(|control| Row {
                    kind: RowKind::Control { file, control },
                    height: line_height,
                }));
                let Some(hunk) = source.hunks.get(slot) else {
                    continue;
                };
                rows.extend((0..hunk.changes.len()).map(|change| Row {
                    kind: RowKind::Line {
                        file,
                        hunk: slot,
                        change,
                    },
                    height: line_height,
                }));
            }
        }

        let mut layout = Self {
            rows,
            offsets: Vec::new(),
        };
        layout.recompute_offsets(0);
        layout
    }

    fn recompute_offsets(&mut self, from: usize) {
        self.offsets.truncate(from + 1);
        if self.offsets.is_empty() {
            self.offsets.push(0.0);
        }
        for idx in from..self.rows.len() {
            let next = self.offsets[idx] + self.rows[idx].height;
            self.offsets.push(next);
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, idx: usize) -> Option<&Row> {
        self.rows.get(idx)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_top(&self, idx: usize) -> Option<f32> {
        (idx < self.rows.len()).then(|| self.offsets[idx])
    }

    pub fn total_height(&self) -> f32 {
        self.offsets.last().copied().unwrap_or(0.0)
    }

    /// Replaces a row's estimated height with a measured one. Returns `false`
    /// for an unknown index or an unchanged height.
    pub fn set_row_height(&mut self, idx: usize, height: f32) -> bool {
        let Some(row) = self.rows.get_mut(idx) else {
            return false;
        };
        if row.height == height {
            return false;
        }
        row.height = height;
        self.recompute_offsets(idx);
        true
    }

    /// Rows intersecting `[scroll_top, scroll_top + viewport_height)`, widened by
    /// `overscan` rows on each side.
    pub fn visible_range(&self, scroll_top: f32, viewport_height: f32, overscan: usize) -> Range<usize> {
        let n = self.rows.len();
        if n == 0 {
            return 0..0;
        }
        let bottom = scroll_top + viewport_height.max(0.0);

        // First row whose bottom edge is below scroll_top.
        let first = self.offsets[1..].partition_point(|&end| end <= scroll_top);
        // First row whose top edge is at or past the viewport bottom.
        let last = self.offsets[..n].partition_point(|&top| top < bottom);

        let start = first.min(n - 1).saturating_sub(overscan);
        let end = last.max(first + 1).saturating_add(overscan).min(n);
        start..end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::diff::parse::parse_patch;
    use crate::infra::diff::text::diff_text;

    fn numbered(n: u32) -> String {
        (1..=n).map(|i| format!("line {i}\n")).collect()
    }

    fn two_hunks() -> Vec<Hunk> {
        let before = numbered(40);
        let after = before
            .replace("line 15\n", "line fifteen\n")
            .replace("line 30\n", "line thirty\n");
        parse_patch(&diff_text(&before, &after, "f", true, 2))
            .unwrap()
            .remove(0)
            .hunks
    }

    #[test]
    fn test_rows_interleave_controls_and_lines() {
        let hunks = two_hunks();
        let files = [FileRows {
            hunks: &hunks,
            total_lines: 40,
        }];
        let layout = RowLayout::build(&files, &[false], 20.0, 30.0);

        // header, leading gap (12 lines: up + all), 6 lines, between gap (10: all),
        // 6 lines, trailing gap (8: all)
        assert_eq!(layout.len(), 1 + 2 + 6 + 1 + 6 + 1);
        assert_eq!(layout.rows()[0].kind, RowKind::FileHeader { file: 0 });
        assert!(matches!(layout.rows()[1].kind, RowKind::Control { .. }));
        assert_eq!(
            layout.rows()[3].kind,
            RowKind::Line {
                file: 0,
                hunk: 0,
                change: 0
            }
        );
        assert!(matches!(layout.rows()[16].kind, RowKind::Control { .. }));
        assert_eq!(layout.total_height(), 30.0 + 16.0 * 20.0);
    }

    #[test]
    fn test_collapsed_file_shows_only_header() {
        let hunks = two_hunks();
        let files = [
            FileRows {
                hunks: &hunks,
                total_lines: 40,
            },
            FileRows {
                hunks: &hunks,
                total_lines: 40,
            },
        ];
        let layout = RowLayout::build(&files, &[true], 20.0, 30.0);
        assert_eq!(layout.rows()[1].kind, RowKind::FileHeader { file: 1 });
        assert_eq!(layout.len(), 1 + 17);
    }

    #[test]
    fn test_visible_range_and_remeasure() {
        let hunks = two_hunks();
        let files = [FileRows {
            hunks: &hunks,
            total_lines: 40,
        }];
        let mut layout = RowLayout::build(&files, &[false], 20.0, 20.0);

        assert_eq!(layout.visible_range(0.0, 60.0, 0), 0..3);
        assert_eq!(layout.visible_range(45.0, 20.0, 1), 1..5);
        assert_eq!(layout.visible_range(10_000.0, 100.0, 0), 16..17);

        assert!(layout.set_row_height(0, 100.0));
        assert!(!layout.set_row_height(0, 100.0));
        assert!(!layout.set_row_height(99, 1.0));
        assert_eq!(layout.row_top(1), Some(100.0));
        assert_eq!(layout.total_height(), 100.0 + 16.0 * 20.0);
        assert_eq!(layout.visible_range(0.0, 60.0, 0), 0..1);
    }

    #[test]
    fn test_empty_layout() {
        let layout = RowLayout::build(&[], &[], 20.0, 30.0);
        assert!(layout.is_empty());
        assert_eq!(layout.visible_range(0.0, 100.0, 3), 0..0);
        assert_eq!(layout.total_height(), 0.0);
    }
}
