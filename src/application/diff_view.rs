//! Diff view session: one entry per managed resource, fed by the diff queue.

use crate::domain::{DiffError, DiffJob, DiffViewOptions, ResourceDiff};
use crate::infra::app_config::DiffConfig;
use crate::infra::diff::hunks::{EXPAND_STEP, ExpandControl, expand_from_raw_code, gaps};
use crate::infra::diff::parse::{ChangeKey, FilePatch, parse_patch};
use crate::infra::diff::queue::{DiffHandle, DiffQueue};
use crate::infra::diff::rows::{FileRows, RowLayout};
use crate::infra::diff::selection::Selection;
use crate::infra::diff::text::line_count;
use crate::infra::diff::tokens::{TokenCache, TokenTable, tokenize_with_cache};
use crate::infra::hash::hash_pair;

pub const LINE_HEIGHT: f32 = 18.0;
pub const HEADER_HEIGHT: f32 = 32.0;

/// A resolved diff, ready to render.
#[derive(Debug, Clone)]
pub struct FileView {
    pub patch: FilePatch,
    /// `None` when edit marks could not be computed.
    pub tokens: Option<TokenTable>,
    pub selection: Selection,
    total_lines: u32,
}

impl FileView {
    pub fn total_lines(&self) -> u32 {
        self.total_lines
    }
}

pub struct DiffEntry {
    pub job: DiffJob,
    pub collapsed: bool,
    pub file: Option<FileView>,
    pub error: Option<DiffError>,
    handle: Option<DiffHandle>,
    fingerprint: u64,
}

impl DiffEntry {
    fn new(job: DiffJob) -> Self {
        let fingerprint = hash_pair(&job.before, &job.after);
        Self {
            job,
            collapsed: false,
            file: None,
            error: None,
            handle: None,
            fingerprint,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.handle.is_some()
    }
}

pub struct DiffView {
    queue: DiffQueue,
    config: DiffConfig,
    options: DiffViewOptions,
    entries: Vec<DiffEntry>,
    cache: TokenCache,
}

impl DiffView {
    pub fn new(queue: DiffQueue, config: DiffConfig) -> Self {
        let options = config.view_options();
        Self {
            queue,
            config,
            options,
            entries: Vec::new(),
            cache: TokenCache::new(),
        }
    }

    pub fn options(&self) -> DiffViewOptions {
        self.options
    }

    pub fn entries(&self) -> &[DiffEntry] {
        &self.entries
    }

    pub fn entry(&self, idx: usize) -> Option<&DiffEntry> {
        self.entries.get(idx)
    }

    /// True once every entry has a result or an error.
    pub fn is_settled(&self) -> bool {
        self.entries.iter().all(|e| !e.is_pending())
    }

    /// Shows `resources`, reusing already computed diffs whose manifests and
    /// options did not change. Resources that cannot be normalized get an
    /// error entry.
    pub fn mount(&mut self, resources: &[ResourceDiff], options: DiffViewOptions) {
        self.queue.clear();
        let same_options = options == self.options;
        self.options = options;

        let mut previous = std::mem::take(&mut self.entries);
        for resource in resources {
            let job = match resource.to_job(self.config.normalize_options(), options) {
                Ok(job) => job,
                Err(err) => {
                    log::warn!("cannot render {}: {err}", resource.display_name());
                    let mut entry = DiffEntry::new(DiffJob::new(resource.display_name(), "", ""));
                    entry.job.is_hook = resource.hook;
                    entry.error = Some(err);
                    self.entries.push(entry);
                    continue;
                }
            };
            if self.config.changed_only && !job.is_hook && job.is_unchanged() {
                continue;
            }

            let mut entry = DiffEntry::new(job);
            if let Some(pos) = previous.iter().position(|p| p.job.id == entry.job.id) {
                let old = previous.swap_remove(pos);
                entry.collapsed = old.collapsed;
                if same_options && old.fingerprint == entry.fingerprint && old.file.is_some() {
                    entry.file = old.file;
                }
            }
            if entry.file.is_none() {
                entry.handle = Some(self.queue.enqueue(entry.job.clone()));
            }
            self.entries.push(entry);
        }
        self.queue.enable();
        log::debug!(
            "diff view mounted with {} entries, {} queued",
            self.entries.len(),
            self.queue.pending_len()
        );
    }

    /// Re-renders every entry under new options.
    pub fn set_options(&mut self, options: DiffViewOptions) {
        if options == self.options {
            return;
        }
        self.queue.clear();
        self.options = options;
        for entry in &mut self.entries {
            if entry.error.is_some() && entry.file.is_none() && entry.handle.is_none() {
                continue;
            }
            entry.job.options = options;
            entry.file = None;
            entry.error = None;
            entry.handle = Some(self.queue.enqueue(entry.job.clone()));
        }
        self.queue.enable();
    }

    /// Drops pending work and all entries.
    pub fn unmount(&mut self) {
        self.queue.clear();
        self.queue.disable();
        self.entries.clear();
    }

    /// Promotes settled handles into file views. Returns how many changed.
    pub fn poll(&mut self) -> usize {
        let mut promoted = 0;
        for entry in &mut self.entries {
            let Some(result) = entry.handle.as_ref().and_then(|h| h.try_result()) else {
                continue;
            };
            entry.handle = None;
            promoted += 1;
            match result.and_then(|text| first_file(&text)) {
                Ok(patch) => {
                    let tokens = tokenize_with_cache(
                        &patch.hunks,
                        self.config.edit_mark_mode,
                        &entry.job.before,
                        Some(&self.cache),
                    );
                    entry.file = Some(FileView {
                        patch,
                        tokens,
                        selection: Selection::default(),
                        total_lines: line_count(&entry.job.before) as u32,
                    });
                }
                Err(err) => entry.error = Some(err),
            }
        }
        promoted
    }

    fn file_mut(&mut self, idx: usize) -> Option<&mut FileView> {
        self.entries.get_mut(idx).and_then(|e| e.file.as_mut())
    }

    /// Reveals before-text lines `start..end` of entry `idx`. The selection is
    /// reset because change keys of revealed lines did not exist before.
    pub fn expand(&mut self, idx: usize, start: u32, end: u32) -> bool {
        let mode = self.config.edit_mark_mode;
        let cache = self.cache.clone();
        let Some(entry) = self.entries.get_mut(idx) else {
            return false;
        };
        let Some(file) = entry.file.as_mut() else {
            return false;
        };
        let hunks = expand_from_raw_code(&file.patch.hunks, &entry.job.before, start, end);
        if hunks == file.patch.hunks {
            return false;
        }
        file.tokens = tokenize_with_cache(&hunks, mode, &entry.job.before, Some(&cache));
        file.patch.hunks = hunks;
        file.selection.reset();
        true
    }

    pub fn controls(&self, idx: usize) -> Vec<ExpandControl> {
        let Some(file) = self.entries.get(idx).and_then(|e| e.file.as_ref()) else {
            return Vec::new();
        };
        gaps(&file.patch.hunks, file.total_lines)
            .iter()
            .flat_map(|gap| gap.controls(EXPAND_STEP))
            .collect()
    }

    pub fn click(&mut self, idx: usize, key: ChangeKey) {
        if let Some(file) = self.file_mut(idx) {
            file.selection.click(key);
        }
    }

    pub fn shift_click(&mut self, idx: usize, key: ChangeKey) {
        if let Some(file) = self.file_mut(idx) {
            file.selection.shift_click(key);
        }
    }

    pub fn selected(&self, idx: usize) -> Vec<ChangeKey> {
        self.entries
            .get(idx)
            .and_then(|e| e.file.as_ref())
            .map(|f| f.selection.selected(&f.patch.hunks))
            .unwrap_or_default()
    }

    pub fn toggle_collapsed(&mut self, idx: usize) {
        if let Some(entry) = self.entries.get_mut(idx) {
            entry.collapsed = !entry.collapsed;
        }
    }

    /// Row model over all entries; pending entries show only their header.
    pub fn layout(&self) -> RowLayout {
        let files: Vec<FileRows<'_>> = self
            .entries
            .iter()
            .map(|e| match &e.file {
                Some(file) => FileRows {
                    hunks: &file.patch.hunks,
                    total_lines: file.total_lines,
                },
                None => FileRows {
                    hunks: &[],
                    total_lines: 0,
                },
            })
            .collect();
        let collapsed: Vec<bool> = self.entries.iter().map(|e| e.collapsed).collect();
        RowLayout::build(&files, &collapsed, LINE_HEIGHT, HEADER_HEIGHT)
    }
}

fn first_file(text: &str) -> Result<FilePatch, DiffError> {
    parse_patch(text)?
        .into_iter()
        .next()
        .ok_or_else(|| DiffError::InvalidFormat("diff text has no file header".to_string()))
}
