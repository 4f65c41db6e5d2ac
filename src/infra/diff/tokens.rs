//! Intra-line edit marking for rendered hunks.
//!
//! Plain-text only: every line becomes a list of tokens, and tokens inside a
//! replaced line pair are flagged as inserted or deleted characters.

use super::parse::{ChangeKey, ChangeKind, Hunk};
use crate::infra::hash::hash_pair;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};
use std::cell::RefCell;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::rc::Rc;
use std::sync::Arc;
use thiserror::Error;

const MAX_INLINE_LEN: usize = 600;
const MIN_BLOCK_SIMILARITY: f32 = 0.3;
const CACHE_CAPACITY: usize = 512;

/// Which changed lines qualify for intra-line marking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditMarkMode {
    /// Only a single deleted line directly replaced by a single inserted line.
    Line,
    /// Every deletion run paired line by line with the insertion run after it.
    #[default]
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Text,
    Insert,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

impl Token {
    fn text(text: &str) -> Self {
        Self {
            kind: TokenKind::Text,
            text: text.to_string(),
        }
    }
}

/// Tokens for every line of a hunk set, keyed by change key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenTable {
    lines: HashMap<ChangeKey, Arc<[Token]>>,
}

impl TokenTable {
    pub fn get(&self, key: &ChangeKey) -> Option<&[Token]> {
        self.lines.get(key).map(|t| t.as_ref())
    }

    /// True when the line carries at least one inserted or deleted span.
    pub fn is_marked(&self, key: &ChangeKey) -> bool {
        self.get(key)
            .is_some_and(|tokens| tokens.iter().any(|t| t.kind != TokenKind::Text))
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenizeError {
    #[error("hunk references line {line} but the source has {total} lines")]
    LineOutOfRange { line: u32, total: usize },

    #[error("hunk line {line} does not match the source text")]
    SourceMismatch { line: u32 },

    #[error("change without a line number")]
    MissingLineNumber,
}

type PairTokens = (Arc<[Token]>, Arc<[Token]>);

/// LRU of marked line pairs, keyed by an xxHash of (old, new). Clones share
/// one cache on the UI thread.
#[derive(Clone)]
pub struct TokenCache(Rc<RefCell<LruCache<u64, PairTokens>>>);

impl Default for TokenCache {
    fn default() -> Self {
        let capacity = NonZeroUsize::new(CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self(Rc::new(RefCell::new(LruCache::new(capacity))))
    }
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, key: u64) -> Option<PairTokens> {
        self.0.borrow_mut().get(&key).cloned()
    }

    fn insert(&self, key: u64, tokens: PairTokens) {
        self.0.borrow_mut().put(key, tokens);
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn push_coalesced(out: &mut Vec<Token>, kind: TokenKind, text: &str) {
    if let Some(last) = out.last_mut()
        && last.kind == kind
    {
        last.text.push_str(text);
        return;
    }
    out.push(Token {
        kind,
        text: text.to_string(),
    });
}

fn mark_pair(old: &str, new: &str) -> PairTokens {
    let diff = TextDiff::from_chars(old, new);
    let mut old_tokens = Vec::new();
    let mut new_tokens = Vec::new();

    for change in diff.iter_all_changes() {
        let value = change.value();
        match change.tag() {
            ChangeTag::Equal => {
                push_coalesced(&mut old_tokens, TokenKind::Text, value);
                push_coalesced(&mut new_tokens, TokenKind::Text, value);
            }
            ChangeTag::Delete => push_coalesced(&mut old_tokens, TokenKind::Delete, value),
            ChangeTag::Insert => push_coalesced(&mut new_tokens, TokenKind::Insert, value),
        }
    }

    (Arc::from(old_tokens), Arc::from(new_tokens))
}

fn mark_pair_cached(old: &str, new: &str, cache: Option<&TokenCache>) -> PairTokens {
    let Some(cache) = cache else {
        return mark_pair(old, new);
    };
    let key = hash_pair(old, new);
    if let Some(hit) = cache.get(key) {
        return hit;
    }
    let tokens = mark_pair(old, new);
    cache.insert(key, tokens.clone());
    tokens
}

fn can_mark(old: &str, new: &str) -> bool {
    old.len() <= MAX_INLINE_LEN && new.len() <= MAX_INLINE_LEN
}

fn check_source(source: &[&str], line: Option<u32>, content: &str) -> Result<(), TokenizeError> {
    let line = line.ok_or(TokenizeError::MissingLineNumber)?;
    let text = line
        .checked_sub(1)
        .and_then(|idx| source.get(idx as usize))
        .ok_or(TokenizeError::LineOutOfRange {
            line,
            total: source.len(),
        })?;
    if *text != content {
        return Err(TokenizeError::SourceMismatch { line });
    }
    Ok(())
}

/// Builds the token table, or explains why the hunks cannot be tokenized
/// against `before_text`.
pub fn try_tokenize(
    hunks: &[Hunk],
    mode: EditMarkMode,
    before_text: &str,
    cache: Option<&TokenCache>,
) -> Result<TokenTable, TokenizeError> {
    let source: Vec<&str> = before_text.lines().collect();
    let mut table = TokenTable::default();

    for hunk in hunks {
        let changes = &hunk.changes;
        let mut i = 0;
        while i < changes.len() {
            let change = &changes[i];
            if change.kind == ChangeKind::Normal {
                check_source(&source, change.old_line, &change.content)?;
                table
                    .lines
                    .insert(change.key(), Arc::from(vec![Token::text(&change.content)]));
                i += 1;
                continue;
            }

            let mut j = i;
            while j < changes.len() && changes[j].kind == ChangeKind::Delete {
                check_source(&source, changes[j].old_line, &changes[j].content)?;
                j += 1;
            }
            let mut k = j;
            while k < changes.len() && changes[k].kind == ChangeKind::Insert {
                k += 1;
            }

            let removed = &changes[i..j];
            let added = &changes[j..k];
            let paired = match mode {
                EditMarkMode::Line if removed.len() == 1 && added.len() == 1 => 1,
                EditMarkMode::Line => 0,
                EditMarkMode::Block => removed.len().min(added.len()),
            };

            for change in removed.iter().chain(added.iter()) {
                table
                    .lines
                    .insert(change.key(), Arc::from(vec![Token::text(&change.content)]));
            }

            for (old, new) in removed.iter().zip(added.iter()).take(paired) {
                if !can_mark(&old.content, &new.content) {
                    continue;
                }
                if mode == EditMarkMode::Block
                    && TextDiff::from_chars(old.content.as_str(), new.content.as_str()).ratio()
                        <= MIN_BLOCK_SIMILARITY
                {
                    continue;
                }
                let (old_tokens, new_tokens) = mark_pair_cached(&old.content, &new.content, cache);
                table.lines.insert(old.key(), old_tokens);
                table.lines.insert(new.key(), new_tokens);
            }

            i = k;
        }
    }

    Ok(table)
}

/// Token table for rendering, or `None` when tokenization is not possible;
/// the view then renders the diff without edit marks.
pub fn tokenize(hunks: &[Hunk], mode: EditMarkMode, before_text: &str) -> Option<TokenTable> {
    tokenize_with_cache(hunks, mode, before_text, None)
}

pub fn tokenize_with_cache(
    hunks: &[Hunk],
    mode: EditMarkMode,
    before_text: &str,
    cache: Option<&TokenCache>,
) -> Option<TokenTable> {
    match try_tokenize(hunks, mode, before_text, cache) {
        Ok(table) => Some(table),
        Err(err) => {
            log::debug!("edit marking skipped: {err}");
            None
        }
    }
}
