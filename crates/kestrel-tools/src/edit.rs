//! Text replacement tolerant of line-ending and whitespace drift.
//!
//! Tiers, first success wins:
//! 1. exact substring match on LF-normalized text
//! 2. line-window match after collapsing runs of spaces/tabs and trimming
//! 3. no match: a diagnostic pointing at the closest-looking file line

use std::fmt::Write;

/// Characters of the old text's first line quoted in a no-match diagnostic.
const DIAGNOSTIC_FRAGMENT_CHARS: usize = 20;
const DIAGNOSTIC_PREVIEW_CHARS: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    Crlf,
}

impl LineEnding {
    #[must_use]
    pub fn detect(text: &str) -> Self {
        if text.contains("\r\n") {
            Self::Crlf
        } else {
            Self::Lf
        }
    }

    fn restore(self, normalized: String) -> String {
        match self {
            Self::Lf => normalized,
            Self::Crlf => normalized.replace('\n', "\r\n"),
        }
    }
}

#[must_use]
pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// One edit against one file: the three input strings normalized to LF plus
/// the file's original line-ending convention.
#[derive(Debug)]
pub struct EditRequest {
    pub line_ending: LineEnding,
    pub file: String,
    pub old: String,
    pub new: String,
}

impl EditRequest {
    #[must_use]
    pub fn new(file_text: &str, old_text: &str, new_text: &str) -> Self {
        Self {
            line_ending: LineEnding::detect(file_text),
            file: normalize_line_endings(file_text),
            old: normalize_line_endings(old_text),
            new: normalize_line_endings(new_text),
        }
    }
}

/// Which tier produced the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Exact,
    Whitespace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Matched { result: String, tier: MatchTier },
    NoMatch { diagnostic: String },
}

impl EditOutcome {
    #[must_use]
    pub fn is_matched(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }
}

/// Replace the first occurrence of `old_text` in `file_text` with `new_text`.
#[must_use]
pub fn apply_edit(file_text: &str, old_text: &str, new_text: &str) -> EditOutcome {
    let req = EditRequest::new(file_text, old_text, new_text);
    if req.old.is_empty() {
        return EditOutcome::NoMatch {
            diagnostic: "old content is empty; nothing to match".to_owned(),
        };
    }

    if let Some(result) = replace_exact(&req.file, &req.old, &req.new) {
        return EditOutcome::Matched {
            result: req.line_ending.restore(result),
            tier: MatchTier::Exact,
        };
    }

    if let Some(result) = replace_whitespace_insensitive(&req.file, &req.old, &req.new) {
        tracing::debug!("edit matched after whitespace normalization");
        return EditOutcome::Matched {
            result: req.line_ending.restore(result),
            tier: MatchTier::Whitespace,
        };
    }

    EditOutcome::NoMatch {
        diagnostic: no_match_diagnostic(&req.file, &req.old),
    }
}

/// A single `{old, new}` pair of a multi-edit.
#[derive(Debug, Clone)]
pub struct EditPair {
    pub old: String,
    pub new: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiEditOutcome {
    pub result: String,
    pub applied: usize,
    pub requested: usize,
}

/// Apply each pair in order against a running copy using the exact tier only.
///
/// Pairs that do not match are skipped. Returns `None` when nothing applied.
#[must_use]
pub fn apply_multi_edit(file_text: &str, edits: &[EditPair]) -> Option<MultiEditOutcome> {
    let line_ending = LineEnding::detect(file_text);
    let mut current = normalize_line_endings(file_text);
    let mut applied = 0;

    for (i, edit) in edits.iter().enumerate() {
        let old = normalize_line_endings(&edit.old);
        let new = normalize_line_endings(&edit.new);
        if old.is_empty() {
            tracing::debug!(index = i, "skipping edit with empty old content");
            continue;
        }
        match replace_exact(&current, &old, &new) {
            Some(next) => {
                current = next;
                applied += 1;
            }
            None => tracing::debug!(index = i, "multi-edit entry did not match, skipped"),
        }
    }

    (applied > 0).then(|| MultiEditOutcome {
        result: line_ending.restore(current),
        applied,
        requested: edits.len(),
    })
}

fn replace_exact(file: &str, old: &str, new: &str) -> Option<String> {
    file.contains(old).then(|| file.replacen(old, new, 1))
}

fn collapse_whitespace(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_run = false;
    for c in line.trim().chars() {
        if c == ' ' || c == '\t' {
            if !in_run {
                out.push(' ');
            }
            in_run = true;
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}

fn replace_whitespace_insensitive(file: &str, old: &str, new: &str) -> Option<String> {
    let file_lines: Vec<&str> = file.split('\n').collect();
    let old_lines: Vec<String> = old
        .trim_end_matches('\n')
        .split('\n')
        .map(collapse_whitespace)
        .collect();
    if old_lines.len() > file_lines.len() {
        return None;
    }

    let collapsed: Vec<String> = file_lines.iter().map(|l| collapse_whitespace(l)).collect();
    let start = collapsed
        .windows(old_lines.len())
        .position(|window| window == old_lines.as_slice())?;
    let end = start + old_lines.len();

    let mut out: Vec<&str> = Vec::with_capacity(file_lines.len());
    out.extend_from_slice(&file_lines[..start]);
    let replacement = new.strip_suffix('\n').unwrap_or(new);
    out.push(replacement);
    out.extend_from_slice(&file_lines[end..]);
    Some(out.join("\n"))
}

fn no_match_diagnostic(file: &str, old: &str) -> String {
    let first_line = old.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    let fragment: String = first_line.chars().take(DIAGNOSTIC_FRAGMENT_CHARS).collect();
    let mut msg = format!("Could not find the text to replace. Searched for: \"{fragment}\"");

    let needle = fragment.to_lowercase();
    if needle.is_empty() {
        return msg;
    }
    if let Some((idx, line)) = file
        .lines()
        .enumerate()
        .find(|(_, line)| line.to_lowercase().contains(&needle))
    {
        let preview: String = line.trim().chars().take(DIAGNOSTIC_PREVIEW_CHARS).collect();
        let _ = write!(
            msg,
            "\nSimilar content at line {}: {preview}\nRe-read the file and copy the exact text, including indentation.",
            idx + 1
        );
    }
    msg
}
