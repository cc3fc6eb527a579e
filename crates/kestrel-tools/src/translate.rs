//! Bidirectional Unix <-> Windows command translation.

use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ToWindows,
    ToUnix,
}

impl Direction {
    /// Direction pointing at the shell conventions of the running host.
    #[must_use]
    pub fn toward_host() -> Self {
        if cfg!(windows) {
            Self::ToWindows
        } else {
            Self::ToUnix
        }
    }

    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::ToWindows => Self::ToUnix,
            Self::ToUnix => Self::ToWindows,
        }
    }
}

/// `(unix, windows, exact_only)`. Earlier rows win when a key repeats.
const BUILTIN_TABLE: &[(&str, &str, bool)] = &[
    ("ls", "dir", false),
    ("ls -la", "dir /a", false),
    ("ls -al", "dir /a", false),
    ("ls -a", "dir /a", false),
    ("ls -l", "dir", false),
    ("ls -r", "dir /s", false),
    ("cat", "type", false),
    ("rm", "del", false),
    ("rm -f", "del /f", false),
    ("rm -rf", "rmdir /s /q", false),
    ("rm -r", "rmdir /s /q", false),
    ("cp", "copy", false),
    ("cp -r", "xcopy /e /i", false),
    ("mv", "move", false),
    ("mkdir -p", "mkdir", false),
    ("touch", "type nul >", false),
    ("clear", "cls", false),
    ("pwd", "cd", true),
    ("grep", "findstr", false),
    ("grep -i", "findstr /i", false),
    ("grep -r", "findstr /s", false),
    ("grep -n", "findstr /n", false),
    ("which", "where", false),
    ("ps", "tasklist", false),
    ("kill", "taskkill /pid", false),
    ("env", "set", true),
    ("ifconfig", "ipconfig", false),
    ("uname", "ver", true),
    ("diff", "fc", false),
    ("date", "date /t", true),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMapping {
    pub unix: String,
    pub windows: String,
    /// Only the whole command translates; arguments are not carried over.
    pub exact_only: bool,
}

impl CommandMapping {
    #[must_use]
    pub fn new(unix: &str, windows: &str) -> Self {
        Self {
            unix: unix.to_owned(),
            windows: windows.to_owned(),
            exact_only: false,
        }
    }

    fn sides(&self, direction: Direction) -> (&str, &str) {
        match direction {
            Direction::ToWindows => (&self.unix, &self.windows),
            Direction::ToUnix => (&self.windows, &self.unix),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Translator {
    mappings: Vec<CommandMapping>,
}

impl Default for Translator {
    fn default() -> Self {
        Self::new(
            BUILTIN_TABLE
                .iter()
                .map(|&(unix, windows, exact_only)| CommandMapping {
                    exact_only,
                    ..CommandMapping::new(unix, windows)
                })
                .collect(),
        )
    }
}

impl Translator {
    #[must_use]
    pub fn new(mappings: Vec<CommandMapping>) -> Self {
        Self { mappings }
    }

    /// Translate `cmd` in `direction`, or `None` when no row applies.
    ///
    /// Tries an exact match of the whole command, then the longest
    /// multi-token key prefix, then the base command alone. Keys compare
    /// case-insensitively; trailing arguments are appended verbatim.
    #[must_use]
    pub fn translate(&self, cmd: &str, direction: Direction) -> Option<String> {
        let trimmed = cmd.trim();
        let tokens: Vec<String> = trimmed
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();
        if tokens.is_empty() {
            return None;
        }

        if let Some(target) = self.mappings.iter().find_map(|m| {
            let (key, target) = m.sides(direction);
            key_tokens(key).eq(tokens.iter().map(String::as_str)).then_some(target)
        }) {
            return Some(target.to_owned());
        }

        let prefixed = self
            .mappings
            .iter()
            .filter(|m| !m.exact_only)
            .filter_map(|m| {
                let (key, target) = m.sides(direction);
                let key: Vec<String> = key_tokens(key).collect();
                let matches = key.len() > 1
                    && key.len() < tokens.len()
                    && key.iter().zip(&tokens).all(|(k, t)| k == t);
                matches.then_some((key.len(), target))
            })
            .max_by_key(|(len, _)| *len);
        if let Some((len, target)) = prefixed {
            return Some(join_args(target, rest_after_tokens(trimmed, len)));
        }

        self.mappings
            .iter()
            .filter(|m| !m.exact_only)
            .find_map(|m| {
                let (key, target) = m.sides(direction);
                let mut key = key_tokens(key);
                let single = key.next().filter(|k| *k == tokens[0] && key.next().is_none());
                single.map(|_| target)
            })
            .map(|target| join_args(target, rest_after_tokens(trimmed, 1)))
    }
}

static BUILTIN: LazyLock<Translator> = LazyLock::new(Translator::default);

/// Translate with the built-in table.
#[must_use]
pub fn translate(cmd: &str, direction: Direction) -> Option<String> {
    BUILTIN.translate(cmd, direction)
}

fn key_tokens(key: &str) -> impl Iterator<Item = String> + '_ {
    key.split_whitespace().map(str::to_lowercase)
}

/// The remainder of `cmd` after skipping `n` whitespace-separated tokens,
/// with internal spacing and quoting untouched.
fn rest_after_tokens(cmd: &str, n: usize) -> &str {
    let mut rest = cmd;
    for _ in 0..n {
        rest = rest.trim_start();
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        rest = &rest[end..];
    }
    rest.trim()
}

fn join_args(target: &str, args: &str) -> String {
    if args.is_empty() {
        target.to_owned()
    } else {
        format!("{target} {args}")
    }
}
