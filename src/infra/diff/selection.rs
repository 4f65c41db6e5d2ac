//! Click / shift-click line selection across hunks.

use super::parse::{ChangeKey, Hunk};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    Empty,
    Single(ChangeKey),
    Range { start: ChangeKey, end: ChangeKey },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    start: Option<ChangeKey>,
    end: Option<ChangeKey>,
}

impl Selection {
    pub fn state(&self) -> SelectionState {
        match (self.start, self.end) {
            (Some(start), Some(end)) if start == end => SelectionState::Single(start),
            (Some(start), Some(end)) => SelectionState::Range { start, end },
            _ => SelectionState::Empty,
        }
    }

    pub fn click(&mut self, key: ChangeKey) {
        self.start = Some(key);
        self.end = Some(key);
    }

    /// Extends the selection to `key`; without a start it behaves like a click.
    pub fn shift_click(&mut self, key: ChangeKey) {
        if self.start.is_none() {
            self.click(key);
            return;
        }
        self.end = Some(key);
    }

    pub fn reset(&mut self) {
        self.start = None;
        self.end = None;
    }

    /// Selected keys in hunk scan order, both endpoints included.
    ///
    /// Membership follows the order lines appear in the hunks, not the numeric
    /// order of the keys.
    pub fn selected(&self, hunks: &[Hunk]) -> Vec<ChangeKey> {
        let (start, end) = match self.state() {
            SelectionState::Empty => return Vec::new(),
            SelectionState::Single(key) => return vec![key],
            SelectionState::Range { start, end } => (start, end),
        };

        let mut inside = false;
        let mut out = Vec::new();
        for change in hunks.iter().flat_map(|h| h.changes.iter()) {
            let key = change.key();
            if key == start || key == end {
                out.push(key);
                inside = !inside;
            } else if inside {
                out.push(key);
            }
        }
        out
    }

    pub fn contains(&self, hunks: &[Hunk], key: &ChangeKey) -> bool {
        self.selected(hunks).contains(key)
    }
}
