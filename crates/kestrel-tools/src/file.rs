use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::Deserialize;
use similar::TextDiff;

use crate::edit::{EditOutcome, EditPair, apply_edit, apply_multi_edit};
use crate::executor::{ToolError, ToolResult};

const IGNORED_DIRS: &[&str] = &[".git", "target", "node_modules", ".hg", ".svn", "__pycache__"];

pub const LIST_LIMIT: usize = 200;
pub const SEARCH_LIMIT: usize = 100;
pub const FIND_LIMIT: usize = 200;
pub const TREE_LIMIT: usize = 500;
const DEFAULT_TREE_DEPTH: usize = 3;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReadFileParams {
    /// File path, relative to the working directory or absolute
    pub path: String,
    /// Number of lines to skip
    pub offset: Option<usize>,
    /// Maximum number of lines to return
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WriteFileParams {
    /// File path
    pub path: String,
    /// Full file content
    pub content: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EditFileParams {
    /// File path
    pub path: String,
    /// Text to find, copied from the file
    #[serde(alias = "oldContent", alias = "old_string", alias = "oldString")]
    pub old_content: String,
    /// Replacement text
    #[serde(alias = "newContent", alias = "new_string", alias = "newString")]
    pub new_content: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EditEntry {
    #[serde(alias = "oldContent", alias = "old_string", alias = "oldString")]
    pub old_content: String,
    #[serde(alias = "newContent", alias = "new_string", alias = "newString")]
    pub new_content: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MultiEditParams {
    /// File path
    pub path: String,
    /// Replacements applied in order; each must match exactly
    pub edits: Vec<EditEntry>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListFilesParams {
    /// Directory to list (default: working directory)
    pub path: Option<String>,
    /// Descend into subdirectories
    #[serde(default)]
    pub recursive: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchFilesParams {
    /// Regular expression
    pub pattern: String,
    /// File or directory to search (default: working directory)
    pub path: Option<String>,
    /// Match case (default: true)
    pub case_sensitive: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FindFilesParams {
    /// Glob pattern relative to the working directory, e.g. `src/**/*.rs`
    pub pattern: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TreeParams {
    /// Root directory (default: working directory)
    pub path: Option<String>,
    /// Maximum depth (default: 3)
    pub depth: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PathParams {
    /// Target path
    pub path: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TransferParams {
    /// Existing file or directory
    pub source: String,
    /// Target path
    pub destination: String,
}

/// Resolve `path` against `cwd`. No containment check is applied.
#[must_use]
pub fn resolve_path(cwd: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        cwd.join(p)
    }
}

fn display_relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn is_ignored(name: &str) -> bool {
    IGNORED_DIRS.contains(&name)
}

fn not_found(what: &'static str, path: &Path) -> ToolError {
    ToolError::NotFound {
        what,
        path: path.display().to_string(),
    }
}

fn read_existing(path: &Path) -> Result<String, ToolError> {
    if !path.is_file() {
        return Err(not_found("File", path));
    }
    Ok(std::fs::read_to_string(path)?)
}

/// Exact file text, or a line window of it with line endings kept.
///
/// # Errors
///
/// Returns `ToolError::NotFound` for a missing file, `ToolError::Io` otherwise.
pub fn read_file(path: &Path, offset: Option<usize>, limit: Option<usize>) -> Result<ToolResult, ToolError> {
    let content = read_existing(path)?;
    if offset.is_none() && limit.is_none() {
        return Ok(ToolResult::ok(content));
    }
    let selected: String = content
        .split_inclusive('\n')
        .skip(offset.unwrap_or(0))
        .take(limit.unwrap_or(usize::MAX))
        .collect();
    Ok(ToolResult::ok(selected))
}

/// Write `content`, creating parent directories.
///
/// # Errors
///
/// Returns `ToolError::Io` on filesystem failures.
pub fn write_file(path: &Path, content: &str) -> Result<ToolResult, ToolError> {
    let overwritten = path.exists();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    let verb = if overwritten { "Overwrote" } else { "Wrote" };
    Ok(
        ToolResult::ok(format!("{verb} {} bytes to {}", content.len(), path.display()))
            .with_detail("overwritten", overwritten),
    )
}

/// # Errors
///
/// Returns `ToolError::AlreadyExists` when `path` exists.
pub fn create_file(path: &Path, content: &str) -> Result<ToolResult, ToolError> {
    if path.exists() {
        return Err(ToolError::AlreadyExists {
            path: path.display().to_string(),
        });
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(ToolResult::ok(format!(
        "Created {} ({} bytes)",
        path.display(),
        content.len()
    )))
}

/// An edit computed in memory, waiting for confirmation before it is written.
#[derive(Debug)]
pub struct PendingEdit {
    pub path: PathBuf,
    pub original: String,
    pub updated: String,
    pub summary: String,
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl PendingEdit {
    #[must_use]
    pub fn diff(&self) -> String {
        diff_preview(&self.path, &self.original, &self.updated)
    }

    /// # Errors
    ///
    /// Returns `ToolError::Io` if the file cannot be written.
    pub fn commit(self) -> Result<ToolResult, ToolError> {
        std::fs::write(&self.path, &self.updated)?;
        let mut result = ToolResult::ok(self.summary);
        result.details = self.details;
        Ok(result)
    }
}

/// Run the fuzzy edit against the file on disk without writing.
///
/// # Errors
///
/// Returns `ToolError::NotFound` for a missing file and `ToolError::NoMatch`
/// with a diagnostic when the old text is not located.
pub fn plan_edit(path: &Path, old: &str, new: &str) -> Result<PendingEdit, ToolError> {
    let original = read_existing(path)?;
    match apply_edit(&original, old, new) {
        EditOutcome::Matched { result, tier } => {
            tracing::debug!(path = %path.display(), ?tier, "edit matched");
            let mut details = serde_json::Map::new();
            details.insert("match".to_owned(), format!("{tier:?}").to_lowercase().into());
            Ok(PendingEdit {
                path: path.to_path_buf(),
                summary: format!("Edited {}", path.display()),
                original,
                updated: result,
                details,
            })
        }
        EditOutcome::NoMatch { diagnostic } => Err(ToolError::NoMatch { diagnostic }),
    }
}

/// # Errors
///
/// Returns `ToolError::NoMatch` when none of the edits apply.
pub fn plan_multi_edit(path: &Path, edits: &[EditEntry]) -> Result<PendingEdit, ToolError> {
    let original = read_existing(path)?;
    let pairs: Vec<EditPair> = edits
        .iter()
        .map(|e| EditPair {
            old: e.old_content.clone(),
            new: e.new_content.clone(),
        })
        .collect();
    let outcome = apply_multi_edit(&original, &pairs).ok_or_else(|| ToolError::NoMatch {
        diagnostic: format!(
            "None of the {} edits matched {}; copy the exact text from the file",
            edits.len(),
            path.display()
        ),
    })?;

    let mut details = serde_json::Map::new();
    details.insert("applied".to_owned(), outcome.applied.into());
    details.insert("requested".to_owned(), outcome.requested.into());
    Ok(PendingEdit {
        path: path.to_path_buf(),
        summary: format!(
            "Applied {}/{} edits to {}",
            outcome.applied,
            outcome.requested,
            path.display()
        ),
        original,
        updated: outcome.result,
        details,
    })
}

/// Unified diff of `old` → `new` with three lines of context.
#[must_use]
pub fn diff_preview(path: &Path, old: &str, new: &str) -> String {
    let diff = TextDiff::from_lines(old, new);
    let mut hunks = String::new();
    for hunk in diff.unified_diff().context_radius(3).iter_hunks() {
        let _ = write!(hunks, "{hunk}");
    }
    if hunks.is_empty() {
        return String::new();
    }
    format!("--- {0}\n+++ {0}\n{hunks}", path.display())
}

/// # Errors
///
/// Returns `ToolError::NotFound` when `dir` is not a directory.
pub fn list_files(dir: &Path, recursive: bool) -> Result<ToolResult, ToolError> {
    if !dir.is_dir() {
        return Err(not_found("Directory", dir));
    }
    let mut entries = Vec::new();
    collect_entries(dir, dir, recursive, &mut entries)?;

    let truncated = entries.len() > LIST_LIMIT;
    entries.truncate(LIST_LIMIT);
    let count = entries.len();
    let mut out = entries.join("\n");
    if truncated {
        out.push_str("\n... (more entries not shown)");
    }
    if out.is_empty() {
        out = format!("{} is empty", dir.display());
    }
    Ok(ToolResult::ok(out)
        .with_detail("count", count)
        .with_detail("truncated", truncated))
}

/// Directory entries sorted by name. Symlinks report `is_dir` for their
/// target but are flagged so walkers never descend into them.
fn sorted_entries(dir: &Path) -> Result<Vec<(String, PathBuf, bool)>, ToolError> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)?
        .flatten()
        .map(|e| {
            let is_link = e.file_type().is_ok_and(|t| t.is_symlink());
            (e.file_name().to_string_lossy().into_owned(), e.path(), is_link)
        })
        .collect();
    entries.sort();
    Ok(entries)
}

/// Depth-first, stops once one entry past `LIST_LIMIT` is collected.
fn collect_entries(
    root: &Path,
    dir: &Path,
    recursive: bool,
    out: &mut Vec<String>,
) -> Result<(), ToolError> {
    for (name, path, is_link) in sorted_entries(dir)? {
        if out.len() > LIST_LIMIT {
            break;
        }
        let is_dir = path.is_dir();
        if is_dir && is_ignored(&name) {
            continue;
        }
        let rel = display_relative(root, &path);
        if is_dir {
            out.push(format!("{rel}/"));
            if recursive && !is_link {
                collect_entries(root, &path, recursive, out)?;
            }
        } else {
            out.push(rel);
        }
    }
    Ok(())
}

/// # Errors
///
/// Returns `ToolError::InvalidParams` for a bad regex and
/// `ToolError::NotFound` when `path` does not exist.
pub fn search_files(
    cwd: &Path,
    path: &Path,
    pattern: &str,
    case_sensitive: bool,
) -> Result<ToolResult, ToolError> {
    let regex = regex::RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .build()
        .map_err(|e| ToolError::invalid("search_files", e.to_string()))?;
    if !path.exists() {
        return Err(not_found("Path", path));
    }

    let mut results = Vec::new();
    grep_recursive(cwd, path, &regex, &mut results)?;
    let count = results.len();
    let summary = if results.is_empty() {
        format!("No matches for: {pattern}")
    } else if count >= SEARCH_LIMIT {
        format!("{}\n... (stopped at {SEARCH_LIMIT} matches)", results.join("\n"))
    } else {
        results.join("\n")
    };
    Ok(ToolResult::ok(summary).with_detail("count", count))
}

fn grep_recursive(
    cwd: &Path,
    path: &Path,
    regex: &regex::Regex,
    results: &mut Vec<String>,
) -> Result<(), ToolError> {
    if results.len() >= SEARCH_LIMIT {
        return Ok(());
    }
    if path.is_file() {
        if let Ok(content) = std::fs::read_to_string(path) {
            let shown = display_relative(cwd, path);
            for (i, line) in content.lines().enumerate() {
                if regex.is_match(line) {
                    results.push(format!("{shown}:{}: {line}", i + 1));
                    if results.len() >= SEARCH_LIMIT {
                        return Ok(());
                    }
                }
            }
        }
    } else if path.is_dir() {
        for (name, p, is_link) in sorted_entries(path)? {
            if name.starts_with('.') || is_ignored(&name) || (is_link && p.is_dir()) {
                continue;
            }
            grep_recursive(cwd, &p, regex, results)?;
        }
    }
    Ok(())
}

/// # Errors
///
/// Returns `ToolError::InvalidParams` for a malformed glob.
pub fn find_files(cwd: &Path, pattern: &str) -> Result<ToolResult, ToolError> {
    let full = if Path::new(pattern).is_absolute() {
        pattern.to_owned()
    } else {
        format!(
            "{}/{pattern}",
            glob::Pattern::escape(&cwd.display().to_string())
        )
    };
    let mut matches: Vec<String> = glob::glob(&full)
        .map_err(|e| ToolError::invalid("find_files", e.to_string()))?
        .filter_map(Result::ok)
        .filter(|p| {
            !p.components()
                .any(|c| is_ignored(&c.as_os_str().to_string_lossy()))
        })
        .map(|p| display_relative(cwd, &p))
        .collect();
    matches.sort();

    let total = matches.len();
    matches.truncate(FIND_LIMIT);
    let mut out = if matches.is_empty() {
        format!("No files matching: {pattern}")
    } else {
        matches.join("\n")
    };
    if total > FIND_LIMIT {
        let _ = write!(out, "\n... ({} more matches not shown)", total - FIND_LIMIT);
    }
    Ok(ToolResult::ok(out).with_detail("count", total))
}

/// # Errors
///
/// Returns `ToolError::NotFound` when `root` is not a directory.
pub fn tree(root: &Path, depth: Option<usize>) -> Result<ToolResult, ToolError> {
    if !root.is_dir() {
        return Err(not_found("Directory", root));
    }
    let depth = depth.unwrap_or(DEFAULT_TREE_DEPTH);
    let mut lines = vec![format!(
        "{}/",
        root.file_name()
            .map_or_else(|| root.display().to_string(), |n| n.to_string_lossy().into_owned())
    )];
    let mut count = 0;
    let truncated = walk_tree(root, 1, depth, &mut lines, &mut count)?;
    if truncated {
        lines.push(format!("... (stopped at {TREE_LIMIT} entries)"));
    }
    Ok(ToolResult::ok(lines.join("\n")).with_detail("count", count))
}

/// Returns `true` when the entry cap was hit.
fn walk_tree(
    dir: &Path,
    level: usize,
    max_depth: usize,
    lines: &mut Vec<String>,
    count: &mut usize,
) -> Result<bool, ToolError> {
    if level > max_depth {
        return Ok(false);
    }
    let indent = "  ".repeat(level);
    for (name, path, is_link) in sorted_entries(dir)? {
        let is_dir = path.is_dir();
        if is_dir && is_ignored(&name) {
            continue;
        }
        if *count >= TREE_LIMIT {
            return Ok(true);
        }
        *count += 1;
        if is_dir {
            lines.push(format!("{indent}{name}/"));
            if !is_link && walk_tree(&path, level + 1, max_depth, lines, count)? {
                return Ok(true);
            }
        } else {
            lines.push(format!("{indent}{name}"));
        }
    }
    Ok(false)
}

/// # Errors
///
/// Returns `ToolError::Io` on filesystem failures.
pub fn create_directory(path: &Path) -> Result<ToolResult, ToolError> {
    std::fs::create_dir_all(path)?;
    Ok(ToolResult::ok(format!("Created directory {}", path.display())))
}

/// Remove a file, or a directory recursively.
///
/// # Errors
///
/// Returns `ToolError::NotFound` when nothing exists at `path`.
pub fn delete_path(path: &Path) -> Result<ToolResult, ToolError> {
    if path.is_dir() {
        std::fs::remove_dir_all(path)?;
    } else if path.exists() {
        std::fs::remove_file(path)?;
    } else {
        return Err(not_found("Path", path));
    }
    Ok(ToolResult::ok(format!("Deleted {}", path.display())))
}

/// # Errors
///
/// Returns `ToolError::NotFound` when `source` is missing.
pub fn move_path(source: &Path, destination: &Path) -> Result<ToolResult, ToolError> {
    if !source.exists() {
        return Err(not_found("Path", source));
    }
    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::rename(source, destination)?;
    Ok(ToolResult::ok(format!(
        "Moved {} to {}",
        source.display(),
        destination.display()
    )))
}

/// Copy a file, or a directory tree.
///
/// # Errors
///
/// Returns `ToolError::NotFound` when `source` is missing.
pub fn copy_path(source: &Path, destination: &Path) -> Result<ToolResult, ToolError> {
    if !source.exists() {
        return Err(not_found("Path", source));
    }
    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let copied = if source.is_dir() {
        copy_dir_recursive(source, destination)?
    } else {
        std::fs::copy(source, destination)?;
        1
    };
    Ok(ToolResult::ok(format!(
        "Copied {} to {}",
        source.display(),
        destination.display()
    ))
    .with_detail("files", copied))
}

fn copy_dir_recursive(source: &Path, destination: &Path) -> Result<usize, ToolError> {
    std::fs::create_dir_all(destination)?;
    let mut copied = 0;
    for entry in std::fs::read_dir(source)?.flatten() {
        let from = entry.path();
        let to = destination.join(entry.file_name());
        if from.is_dir() {
            copied += copy_dir_recursive(&from, &to)?;
        } else {
            std::fs::copy(&from, &to)?;
            copied += 1;
        }
    }
    Ok(copied)
}
