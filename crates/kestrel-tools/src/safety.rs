//! Heuristic command risk classification.

/// Substrings signalling destructive or privilege-escalating intent.
const DANGEROUS_PATTERNS: &[&str] = &[
    "rm -rf",
    "rm -fr",
    "rm -r /",
    "rmdir /s",
    "rd /s",
    "del /s",
    "del /f",
    "remove-item -recurse",
    "format c:",
    "format-volume",
    "mkfs",
    "dd if=",
    "diskpart",
    ":(){ :|:& };:",
    "chmod 777",
    "chmod -r 777",
    "chown -r",
    "icacls",
    "takeown",
    "sudo ",
    "su root",
    "su -",
    "runas ",
    "kill -9",
    "killall",
    "pkill",
    "taskkill",
    "stop-process",
    "shutdown",
    "reboot",
    "halt",
    "poweroff",
    "restart-computer",
    "stop-computer",
    "| sh",
    "| bash",
    "|sh",
    "|bash",
    "invoke-expression",
    "iex ",
    "iex(",
    "> /dev/sd",
];

/// Prefixes of read-only or introspective commands.
const SAFE_PREFIXES: &[&str] = &[
    "ls",
    "dir",
    "pwd",
    "cd ",
    "echo",
    "cat ",
    "type ",
    "head ",
    "tail ",
    "less ",
    "more ",
    "wc ",
    "grep ",
    "rg ",
    "findstr ",
    "find ",
    "tree",
    "which ",
    "where ",
    "whoami",
    "hostname",
    "date",
    "uname",
    "printenv",
    "git status",
    "git diff",
    "git log",
    "git show",
    "git branch",
    "git remote -v",
    "cargo --version",
    "cargo check",
    "cargo tree",
    "rustc --version",
    "node --version",
    "node -v",
    "npm --version",
    "npm list",
    "npm ls",
    "python --version",
    "python3 --version",
    "get-childitem",
    "get-content",
    "get-location",
];

/// `find` actions that write, delete or run other programs.
const FIND_SIDE_EFFECTS: &[&str] = &[
    "-delete", "-exec", "-execdir", "-ok", "-okdir", "-fprint", "-fls",
];

/// Shell operators that chain, pipe or redirect; a safe prefix says nothing
/// about what follows them.
const COMPOUND_OPERATORS: &[&str] = &[";", "&", "|", ">", "<", "`", "$(", "\n"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandRisk {
    Dangerous,
    Safe,
    Unknown,
}

/// True if `cmd` contains any destructive pattern, case-insensitively.
#[must_use]
pub fn is_dangerous(cmd: &str) -> bool {
    let lower = cmd.to_lowercase();
    DANGEROUS_PATTERNS.iter().any(|p| lower.contains(p)) || has_recursive_rm(&lower)
}

/// `rm` with a recursive flag anywhere in its arguments: `rm -r`, `rm -R`,
/// `rm -v -r`, `rm --recursive`.
fn has_recursive_rm(lower: &str) -> bool {
    lower
        .split(|c: char| matches!(c, ';' | '&' | '|' | '\n' | '(' | ')'))
        .any(|segment| {
            let mut tokens = segment.split_whitespace();
            let is_rm = tokens
                .by_ref()
                .find(|t| *t != "sudo" && *t != "command" && !t.contains('='))
                .is_some_and(|program| program == "rm" || program.ends_with("/rm"));
            is_rm
                && tokens.take_while(|t| *t != "--").any(|t| {
                    t == "--recursive"
                        || (t.starts_with('-') && !t.starts_with("--") && t.contains('r'))
                })
        })
}

/// True if the trimmed, lowercased `cmd` starts with a read-only prefix and
/// is a single command with no side-effecting options.
#[must_use]
pub fn is_safe(cmd: &str) -> bool {
    let lower = cmd.trim().to_lowercase();
    if COMPOUND_OPERATORS.iter().any(|op| lower.contains(op)) {
        return false;
    }
    if lower.starts_with("find ")
        && lower
            .split_whitespace()
            .any(|t| FIND_SIDE_EFFECTS.contains(&t))
    {
        return false;
    }
    SAFE_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// Dangerous wins over safe: `ls; rm -rf /` is dangerous.
#[must_use]
pub fn classify(cmd: &str) -> CommandRisk {
    if is_dangerous(cmd) {
        CommandRisk::Dangerous
    } else if is_safe(cmd) {
        CommandRisk::Safe
    } else {
        CommandRisk::Unknown
    }
}
