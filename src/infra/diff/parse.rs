//! Structured view of unified diff text: files, hunks and changes.

use crate::domain::DiffError;
use std::fmt;
use std::ops::Range;
use unidiff::PatchSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Insert,
    Delete,
    Normal,
}

/// Stable identity of a change within one file: `I<new>`, `D<old>` or `N<old>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChangeKey {
    Insert(u32),
    Delete(u32),
    Normal(u32),
}

impl fmt::Display for ChangeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKey::Insert(n) => write!(f, "I{n}"),
            ChangeKey::Delete(n) => write!(f, "D{n}"),
            ChangeKey::Normal(n) => write!(f, "N{n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub kind: ChangeKind,
    /// Line content without the leading marker and without the line break.
    pub content: String,
    pub old_line: Option<u32>,
    pub new_line: Option<u32>,
    /// Last line of its side with no line break after it.
    pub missing_newline: bool,
}

impl Change {
    pub fn normal(content: impl Into<String>, old_line: u32, new_line: u32) -> Self {
        Self {
            kind: ChangeKind::Normal,
            content: content.into(),
            old_line: Some(old_line),
            new_line: Some(new_line),
            missing_newline: false,
        }
    }

    pub fn key(&self) -> ChangeKey {
        match self.kind {
            ChangeKind::Insert => ChangeKey::Insert(self.new_line.unwrap_or_default()),
            ChangeKind::Delete => ChangeKey::Delete(self.old_line.unwrap_or_default()),
            ChangeKind::Normal => ChangeKey::Normal(self.old_line.unwrap_or_default()),
        }
    }

    pub fn is_change(&self) -> bool {
        self.kind != ChangeKind::Normal
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: u32,
    pub old_lines: u32,
    pub new_start: u32,
    pub new_lines: u32,
    pub changes: Vec<Change>,
}

fn side_range(start: u32, len: u32) -> Range<u32> {
    // A zero-length side names the line *after which* the hunk applies.
    let first = if len == 0 { start + 1 } else { start };
    first..first + len
}

impl Hunk {
    pub fn header(&self) -> String {
        format!(
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_lines, self.new_start, self.new_lines
        )
    }

    /// Lines of the old file covered by this hunk, 1-based, end-exclusive.
    pub fn old_range(&self) -> Range<u32> {
        side_range(self.old_start, self.old_lines)
    }

    pub fn new_range(&self) -> Range<u32> {
        side_range(self.new_start, self.new_lines)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePatch {
    pub old_path: String,
    pub new_path: String,
    pub hunks: Vec<Hunk>,
}

impl FilePatch {
    pub fn additions(&self) -> usize {
        self.count(ChangeKind::Insert)
    }

    pub fn deletions(&self) -> usize {
        self.count(ChangeKind::Delete)
    }

    fn count(&self, kind: ChangeKind) -> usize {
        self.hunks
            .iter()
            .flat_map(|h| h.changes.iter())
            .filter(|c| c.kind == kind)
            .count()
    }
}

fn strip_git_prefix(path: &str) -> String {
    path.strip_prefix("a/")
        .or_else(|| path.strip_prefix("b/"))
        .unwrap_or(path)
        .to_string()
}

fn is_marker(line: &unidiff::Line) -> bool {
    line.line_type == "\\"
}

/// Maps one parsed hunk into [`Hunk`]. `raw` is the patch split into lines;
/// a `\` line right after a body line flags it as unterminated.
fn build_hunk(hunk: &unidiff::Hunk, raw: &[&str]) -> Result<Hunk, DiffError> {
    let mut changes = Vec::with_capacity(hunk.len());
    for line in hunk.lines().iter().filter(|l| !is_marker(l)) {
        let kind = match line.line_type.as_str() {
            unidiff::LINE_TYPE_ADDED => ChangeKind::Insert,
            unidiff::LINE_TYPE_REMOVED => ChangeKind::Delete,
            _ => ChangeKind::Normal,
        };
        changes.push(Change {
            kind,
            content: line.value.clone(),
            old_line: line.source_line_no.map(|n| n as u32),
            new_line: line.target_line_no.map(|n| n as u32),
            missing_newline: raw
                .get(line.diff_line_no)
                .is_some_and(|next| next.starts_with('\\')),
        });
    }

    let out = Hunk {
        old_start: hunk.source_start as u32,
        old_lines: hunk.source_length as u32,
        new_start: hunk.target_start as u32,
        new_lines: hunk.target_length as u32,
        changes,
    };

    let old_seen = out.changes.iter().filter(|c| c.old_line.is_some()).count();
    let new_seen = out.changes.iter().filter(|c| c.new_line.is_some()).count();
    if old_seen != hunk.source_length || new_seen != hunk.target_length {
        return Err(DiffError::InvalidFormat(format!(
            "hunk {} has {old_seen}/{new_seen} body lines",
            out.header()
        )));
    }
    Ok(out)
}

/// Parses unified diff text into files. Empty input yields no files.
pub fn parse_patch(text: &str) -> Result<Vec<FilePatch>, DiffError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut patch = PatchSet::new();
    patch
        .parse(text)
        .map_err(|err| DiffError::InvalidFormat(err.to_string()))?;

    let raw: Vec<&str> = text.lines().collect();
    patch
        .files()
        .iter()
        .map(|file| {
            Ok(FilePatch {
                old_path: strip_git_prefix(&file.source_file),
                new_path: strip_git_prefix(&file.target_file),
                hunks: file
                    .hunks()
                    .iter()
                    .map(|hunk| build_hunk(hunk, &raw))
                    .collect::<Result<_, _>>()?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_HUNKS: &str = "diff --git a/file.txt b/file.txt
index 6829b8a2..4c565f1b 100644
--- a/file.txt
+++ b/file.txt
@@ -1,3 +1,3 @@
 line 1
-line 2
+line 2 changed
 line 3
@@ -10,3 +10,4 @@
 line 10
+line 10.5
 line 11
 line 12
";

    #[test]
    fn test_parse_two_hunks_with_line_numbers() {
        let files = parse_patch(TWO_HUNKS).unwrap();
        assert_eq!(files.len(), 1);
        let file = &files[0];
        assert_eq!(file.old_path, "file.txt");
        assert_eq!(file.new_path, "file.txt");
        assert_eq!(file.hunks.len(), 2);
        assert_eq!(file.additions(), 2);
        assert_eq!(file.deletions(), 1);

        let second = &file.hunks[1];
        assert_eq!(second.old_range(), 10..13);
        assert_eq!(second.new_range(), 10..14);
        let keys: Vec<String> = second.changes.iter().map(|c| c.key().to_string()).collect();
        assert_eq!(keys, vec!["N10", "I11", "N11", "N12"]);
        assert_eq!(second.changes[2].new_line, Some(12));
    }

    #[test]
    fn test_parse_short_header_and_empty_side() {
        let text = "diff --git a/n b/n\n--- a/n\n+++ b/n\n@@ -0,0 +1,2 @@\n+a\n+b\n";
        let files = parse_patch(text).unwrap();
        let hunk = &files[0].hunks[0];
        assert_eq!(hunk.old_range(), 1..1);
        assert_eq!(hunk.changes[1].key(), ChangeKey::Insert(2));

        let text = "diff --git a/s b/s\n--- a/s\n+++ b/s\n@@ -1 +1 @@\n-x\n+y\n";
        let hunk = &parse_patch(text).unwrap()[0].hunks[0];
        assert_eq!((hunk.old_lines, hunk.new_lines), (1, 1));
        assert_eq!(hunk.changes[1].key(), ChangeKey::Insert(1));
    }

    #[test]
    fn test_no_newline_markers_flag_their_line() {
        let text = "diff --git a/n b/n\n--- a/n\n+++ b/n\n@@ -1 +1,2 @@\n-a\n\\ No newline at end of file\n+a\n+b\n\\ No newline at end of file\n";
        let hunk = &parse_patch(text).unwrap()[0].hunks[0];
        let flags: Vec<_> = hunk
            .changes
            .iter()
            .map(|c| (c.key().to_string(), c.missing_newline))
            .collect();
        assert_eq!(
            flags,
            vec![
                ("D1".to_string(), true),
                ("I1".to_string(), false),
                ("I2".to_string(), true)
            ]
        );
    }

    #[test]
    fn test_body_lines_that_look_like_headers() {
        let text = "diff --git a/y b/y\n--- a/y\n+++ b/y\n@@ -1,2 +1,2 @@\n--- a\n+++ b\n-c\n+d\n";
        let files = parse_patch(text).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].deletions(), 2);
        assert_eq!(files[0].additions(), 2);

        let text = "diff --git a/y b/y\n--- a/y\n+++ b/y\n@@ -1,1 +1,1 @@\n--- a\n+++ b\n";
        let files = parse_patch(text).unwrap();
        assert_eq!(files[0].hunks[0].changes[0].content, "-- a");
        assert_eq!(files[0].hunks[0].changes[1].content, "++ b");
    }

    #[test]
    fn test_header_only_file_and_empty_input() {
        let text = "diff --git a/same b/same\nindex 6829b8a2..4c565f1b 100644\n--- a/same\n+++ b/same\n";
        let files = parse_patch(text).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].hunks.is_empty());
        assert!(parse_patch("").unwrap().is_empty());
    }

    #[test]
    fn test_truncated_hunk_is_rejected() {
        let text = "diff --git a/t b/t\n--- a/t\n+++ b/t\n@@ -1,3 +1,3 @@\n a\n";
        assert!(matches!(parse_patch(text), Err(DiffError::InvalidFormat(_))));

        let orphan = "@@ -1 +1 @@\n-x\n+y\n";
        assert!(matches!(parse_patch(orphan), Err(DiffError::InvalidFormat(_))));
    }

    #[test]
    fn test_multiple_files() {
        let text = format!("{TWO_HUNKS}diff --git a/other b/other\n--- a/other\n+++ b/other\n@@ -1 +1 @@\n-x\n+y\n");
        let files = parse_patch(&text).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[1].new_path, "other");
    }
}
