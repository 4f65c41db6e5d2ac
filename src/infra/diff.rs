//! Client-side diff engine: text diffs, parsing, hunk expansion, edit marks,
//! selection, the time-sliced work queue and the row model used to virtualize
//! long diff views.

pub mod hunks;
pub mod normalize;
pub mod parse;
pub mod queue;
pub mod rows;
pub mod selection;
pub mod text;
pub mod tokens;

pub use hunks::{EXPAND_STEP, ExpandControl, ExpandDirection, Gap, GapPosition, expand_from_raw_code, gaps};
pub use normalize::{NormalizeOptions, manifest_yaml};
pub use parse::{Change, ChangeKey, ChangeKind, FilePatch, Hunk, parse_patch};
pub use queue::{DiffComputer, DiffHandle, DiffQueue, QueueConfig};
pub use rows::{FileRows, Row, RowKind, RowLayout};
pub use selection::{Selection, SelectionState};
pub use text::{DEFAULT_CONTEXT_LINES, compute_job, diff_text};
pub use tokens::{EditMarkMode, Token, TokenCache, TokenKind, TokenTable, tokenize};
