use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use schemars::JsonSchema;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::config::ShellConfig;
use crate::executor::{ToolError, ToolEvent, ToolEventTx, ToolResult};
use crate::parser::SHELL_TOOL;
use crate::translate::{Direction, Translator};

/// Exit codes hosts use for "command not found": POSIX shells and `cmd.exe`.
const NOT_FOUND_EXIT_CODES: &[i32] = &[127, 9009];

const NOT_FOUND_PHRASES: &[&str] = &[
    "command not found",
    ": not found",
    "is not recognized as an internal or external command",
    "is not recognized as the name of a cmdlet",
    "commandnotfoundexception",
];

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RunCommandParams {
    /// Shell command line
    pub command: String,
    /// Working directory (default: session working directory)
    pub cwd: Option<String>,
    /// Timeout in milliseconds
    #[serde(alias = "timeoutMs")]
    pub timeout_ms: Option<u64>,
}

/// One attempt at running a shell command.
#[derive(Debug, Clone)]
pub struct CommandExecution {
    pub raw_command: String,
    pub translated_command: Option<String>,
    pub cwd: PathBuf,
    pub timeout: Duration,
    pub is_retry: bool,
}

impl CommandExecution {
    #[must_use]
    pub fn new(raw_command: impl Into<String>, cwd: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            raw_command: raw_command.into(),
            translated_command: None,
            cwd: cwd.into(),
            timeout,
            is_retry: false,
        }
    }

    /// The command line actually handed to the shell.
    #[must_use]
    pub fn effective_command(&self) -> &str {
        self.translated_command
            .as_deref()
            .unwrap_or(&self.raw_command)
    }
}

#[derive(Debug)]
struct Captured {
    output: String,
    stderr: String,
    exit_code: i32,
}

/// Runs commands through the host shell, translating between Unix and
/// Windows conventions and retrying once on "command not found".
#[derive(Debug)]
pub struct ShellExecutor {
    shell: Vec<String>,
    timeout: Duration,
    translator: Translator,
    tool_event_tx: Option<ToolEventTx>,
}

impl ShellExecutor {
    #[must_use]
    pub fn new(config: &ShellConfig) -> Self {
        let shell = if config.shell.is_empty() {
            host_shell()
        } else {
            config.shell.clone()
        };
        Self {
            shell,
            timeout: Duration::from_secs(config.timeout),
            translator: Translator::default(),
            tool_event_tx: None,
        }
    }

    #[must_use]
    pub fn with_tool_event_tx(mut self, tx: ToolEventTx) -> Self {
        self.tool_event_tx = Some(tx);
        self
    }

    #[must_use]
    pub fn with_translator(mut self, translator: Translator) -> Self {
        self.translator = translator;
        self
    }

    /// Default timeout applied when a call does not specify one.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `execution`, pre-translated toward the host once.
    ///
    /// A first attempt that fails with a "command not found" signature is
    /// retried exactly once with a re-translated command.
    pub async fn run(&self, mut execution: CommandExecution) -> ToolResult {
        execution.translated_command = self
            .translator
            .translate(&execution.raw_command, Direction::toward_host());

        let outcome = self.attempt(&execution).await;
        if !execution.is_retry
            && is_not_found(&outcome, &execution.cwd)
            && let Some(retry_command) = self.retry_command(&execution)
        {
            tracing::warn!(
                raw = %execution.raw_command,
                retry = %retry_command,
                "command not found, retrying with translation"
            );
            let retry = CommandExecution {
                translated_command: Some(retry_command),
                is_retry: true,
                ..execution
            };
            let outcome = self.attempt(&retry).await;
            return into_result(outcome, &retry).with_detail("retried", true);
        }

        into_result(outcome, &execution)
    }

    /// Re-translate the raw command toward the host, then the other way,
    /// keeping the first candidate that differs from what already ran.
    fn retry_command(&self, execution: &CommandExecution) -> Option<String> {
        let host = Direction::toward_host();
        let executed = execution.effective_command();
        [host, host.opposite()].into_iter().find_map(|direction| {
            self.translator
                .translate(&execution.raw_command, direction)
                .filter(|candidate| candidate != executed)
        })
    }

    async fn attempt(&self, execution: &CommandExecution) -> Result<Captured, ToolError> {
        let command = execution.effective_command();
        if let Some(ref tx) = self.tool_event_tx {
            let _ = tx.send(ToolEvent::Started {
                tool_name: SHELL_TOOL.to_owned(),
                command: command.to_owned(),
            });
        }

        let start = Instant::now();
        let outcome = self.spawn_and_collect(command, execution).await;
        tracing::info!(
            command,
            retry = execution.is_retry,
            elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            exit_code = outcome.as_ref().ok().map(|c| c.exit_code),
            "command finished"
        );

        if let Some(ref tx) = self.tool_event_tx {
            let _ = tx.send(ToolEvent::Completed {
                tool_name: SHELL_TOOL.to_owned(),
                command: command.to_owned(),
                success: matches!(outcome, Ok(ref c) if c.exit_code == 0),
            });
        }
        outcome
    }

    async fn spawn_and_collect(
        &self,
        command: &str,
        execution: &CommandExecution,
    ) -> Result<Captured, ToolError> {
        let (program, args) = self
            .shell
            .split_first()
            .ok_or_else(|| ToolError::Spawn(std::io::Error::other("no shell configured")))?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .arg(command)
            .current_dir(&execution.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group so a timeout can take down grandchildren too.
        #[cfg(unix)]
        cmd.process_group(0);
        let mut child = cmd.spawn().map_err(ToolError::Spawn)?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(ToolError::Spawn(std::io::Error::other(
                "child stdio was not piped",
            )));
        };

        let (line_tx, mut line_rx) = mpsc::channel::<Line>(64);
        forward_lines(stdout, line_tx.clone(), false);
        forward_lines(stderr, line_tx, true);

        let mut combined = String::new();
        let mut stderr_text = String::new();
        let deadline = tokio::time::Instant::now() + execution.timeout;
        let timed_out = || {
            #[allow(clippy::cast_possible_truncation)]
            let timeout_ms = execution.timeout.as_millis() as u64;
            ToolError::Timeout { timeout_ms }
        };

        loop {
            tokio::select! {
                line = line_rx.recv() => {
                    let Some(line) = line else { break };
                    if let Some(ref tx) = self.tool_event_tx {
                        let _ = tx.send(ToolEvent::OutputChunk {
                            tool_name: SHELL_TOOL.to_owned(),
                            command: command.to_owned(),
                            chunk: line.text.clone(),
                        });
                    }
                    if line.is_stderr {
                        stderr_text.push_str(&line.text);
                        combined.push_str("[stderr] ");
                    }
                    combined.push_str(&line.text);
                }
                () = tokio::time::sleep_until(deadline) => {
                    kill_process_tree(&mut child).await;
                    return Err(timed_out());
                }
            }
        }

        let status = match tokio::time::timeout_at(deadline, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                kill_process_tree(&mut child).await;
                return Err(timed_out());
            }
        };

        Ok(Captured {
            output: combined,
            stderr: stderr_text,
            exit_code: status.code().unwrap_or(-1),
        })
    }
}

#[derive(Debug)]
struct Line {
    text: String,
    is_stderr: bool,
}

fn forward_lines<R>(reader: R, tx: mpsc::Sender<Line>, is_stderr: bool)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("reading command output failed: {e}");
                    break;
                }
            }
            // Console code pages are not always UTF-8.
            let line = Line {
                text: String::from_utf8_lossy(&buf).into_owned(),
                is_stderr,
            };
            buf.clear();
            if tx.send(line).await.is_err() {
                break;
            }
        }
    });
}

/// Kill the child and everything it started.
async fn kill_process_tree(child: &mut Child) {
    if let Some(pid) = child.id() {
        #[cfg(unix)]
        {
            let _ = Command::new("kill")
                .arg("-KILL")
                .arg(format!("-{pid}"))
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;
        }
        #[cfg(windows)]
        {
            let _ = Command::new("taskkill")
                .args(["/PID", &pid.to_string(), "/T", "/F"])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;
        }
    }
    let _ = child.kill().await;
}

fn host_shell() -> Vec<String> {
    if cfg!(windows) {
        vec!["cmd".to_owned(), "/C".to_owned()]
    } else {
        vec!["sh".to_owned(), "-c".to_owned()]
    }
}

/// A spawn `NotFound` with a missing working directory is not a missing command.
fn is_not_found(outcome: &Result<Captured, ToolError>, cwd: &Path) -> bool {
    match outcome {
        Ok(captured) if captured.exit_code != 0 => {
            NOT_FOUND_EXIT_CODES.contains(&captured.exit_code)
                || looks_like_not_found(&captured.stderr)
        }
        Ok(_) => false,
        Err(ToolError::Spawn(e)) => e.kind() == std::io::ErrorKind::NotFound && cwd.is_dir(),
        Err(_) => false,
    }
}

fn looks_like_not_found(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    NOT_FOUND_PHRASES.iter().any(|p| lower.contains(p))
}

fn into_result(outcome: Result<Captured, ToolError>, execution: &CommandExecution) -> ToolResult {
    let result = match outcome {
        Ok(captured) if captured.exit_code == 0 => {
            let output = if captured.output.is_empty() {
                "(no output)".to_owned()
            } else {
                captured.output
            };
            ToolResult::ok(output).with_exit_code(0)
        }
        Ok(captured) => ToolResult::from(ToolError::ExitStatus {
            code: captured.exit_code,
            output: captured.output,
        }),
        Err(e) => {
            tracing::warn!(command = %execution.effective_command(), "command failed: {e}");
            ToolResult::from(e)
        }
    };
    match execution.translated_command {
        Some(ref translated) => result.with_detail("translated_command", translated.as_str()),
        None => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ToolErrorKind;
    use crate::translate::CommandMapping;

    fn executor() -> ShellExecutor {
        ShellExecutor::new(&ShellConfig::default())
    }

    fn exec(cmd: &str) -> CommandExecution {
        CommandExecution::new(cmd, std::env::temp_dir(), Duration::from_secs(10))
    }

    #[test]
    fn effective_command_prefers_translation() {
        let mut execution = exec("ls");
        assert_eq!(execution.effective_command(), "ls");
        execution.translated_command = Some("dir".into());
        assert_eq!(execution.effective_command(), "dir");
    }

    #[test]
    fn not_found_detection() {
        let cwd = std::env::temp_dir();
        let is_not_found = |outcome: &Result<Captured, ToolError>| is_not_found(outcome, &cwd);
        let captured = |code: i32, stderr: &str| -> Result<Captured, ToolError> {
            Ok(Captured {
                output: String::new(),
                stderr: stderr.to_owned(),
                exit_code: code,
            })
        };
        assert!(is_not_found(&captured(127, "")));
        assert!(is_not_found(&captured(9009, "")));
        assert!(is_not_found(&captured(
            1,
            "'ls' is not recognized as an internal or external command,"
        )));
        assert!(is_not_found(&captured(2, "sh: 1: frob: not found")));
        assert!(!is_not_found(&captured(1, "No such file or directory")));
        assert!(!is_not_found(&captured(0, "command not found")));
        assert!(is_not_found(&Err(ToolError::Spawn(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing"
        )))));
        assert!(!is_not_found(&Err(ToolError::Timeout { timeout_ms: 1 })));
    }

    #[test]
    fn spawn_not_found_in_missing_cwd_is_not_a_missing_command() {
        let missing = std::env::temp_dir().join("kestrel-no-such-dir-xyz");
        let outcome = Err(ToolError::Spawn(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        )));
        assert!(!is_not_found(&outcome, &missing));
    }

    #[test]
    fn config_shell_override() {
        let config = ShellConfig {
            timeout: 5,
            shell: vec!["bash".into(), "-c".into()],
        };
        let executor = ShellExecutor::new(&config);
        assert_eq!(executor.shell, vec!["bash", "-c"]);
        assert_eq!(executor.timeout(), Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_simple_command() {
        let result = executor().run(exec("echo hello")).await;
        assert!(result.success);
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.content.as_deref(), Some("hello\n"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_in_cwd() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let execution = CommandExecution::new("ls", dir.path(), Duration::from_secs(10));
        let result = executor().run(execution).await;
        assert!(result.content.unwrap().contains("marker.txt"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn windows_command_translated_on_unix() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let execution = CommandExecution::new("dir", dir.path(), Duration::from_secs(10));
        let result = executor().run(execution).await;
        assert!(result.success);
        assert!(result.content.unwrap().contains("marker.txt"));
        assert_eq!(result.details["translated_command"], "ls");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stderr_is_captured() {
        let result = executor().run(exec("echo oops 1>&2")).await;
        assert!(result.success);
        assert_eq!(result.content.as_deref(), Some("[stderr] oops\n"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn empty_output_placeholder() {
        let result = executor().run(exec("true")).await;
        assert_eq!(result.content.as_deref(), Some("(no output)"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_preserves_code() {
        let result = executor().run(exec("echo partial; exit 3")).await;
        assert!(!result.success);
        assert_eq!(result.exit_code, Some(3));
        assert_eq!(result.error_kind, Some(ToolErrorKind::ExitStatus));
        assert_eq!(result.content.as_deref(), Some("partial\n"));
        assert!(!result.details.contains_key("retried"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_kills_process() {
        let execution =
            CommandExecution::new("sleep 5", std::env::temp_dir(), Duration::from_millis(200));
        let start = Instant::now();
        let result = executor().run(execution).await;
        assert!(start.elapsed() < Duration::from_secs(4));
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Command timed out"));
        assert_eq!(result.error_kind, Some(ToolErrorKind::Timeout));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_cwd_is_not_retried() {
        let execution = CommandExecution::new(
            "ls",
            std::env::temp_dir().join("kestrel-no-such-dir-xyz"),
            Duration::from_secs(5),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = executor().with_tool_event_tx(tx).run(execution).await;
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ToolErrorKind::Spawn));
        assert!(!result.details.contains_key("retried"));

        let mut attempts = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, ToolEvent::Started { .. }) {
                attempts += 1;
            }
        }
        assert_eq!(attempts, 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn invalid_utf8_does_not_end_output() {
        let result = executor()
            .run(exec(r"printf 'a\377b\nafter\n'"))
            .await;
        assert!(result.success, "{result:?}");
        assert_eq!(result.content.as_deref(), Some("a\u{FFFD}b\nafter\n"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn invalid_utf8_followed_by_bulk_output_is_kept() {
        let result = executor()
            .run(exec(r"printf '\377\n'; seq 1 50000; echo END"))
            .await;
        assert!(result.success, "{result:?}");
        let content = result.content.unwrap();
        assert!(content.starts_with('\u{FFFD}'));
        assert!(content.ends_with("50000\nEND\n"));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn timeout_kills_grandchildren() {
        let dir = tempfile::tempdir().unwrap();
        let execution = CommandExecution::new(
            "sleep 47 & echo $! > sleeper.pid; wait",
            dir.path(),
            Duration::from_millis(300),
        );
        let result = executor().run(execution).await;
        assert_eq!(result.error_kind, Some(ToolErrorKind::Timeout));

        let pid = std::fs::read_to_string(dir.path().join("sleeper.pid")).unwrap();
        let stat = format!("/proc/{}/stat", pid.trim());
        let mut alive = true;
        for _ in 0..40 {
            // reaped, or a zombie waiting for its new parent
            alive = std::fs::read_to_string(&stat).is_ok_and(|s| {
                s.rsplit_once(')')
                    .is_some_and(|(_, rest)| !rest.trim_start().starts_with('Z'))
            });
            if !alive {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(!alive, "sleep {} survived the timeout", pid.trim());
    }

    #[tokio::test]
    async fn spawn_error_reported() {
        let config = ShellConfig {
            timeout: 5,
            shell: vec!["/nonexistent/kestrel-shell-xyz".into(), "-c".into()],
        };
        let result = ShellExecutor::new(&config).run(exec("echo hi")).await;
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ToolErrorKind::Spawn));
        assert!(result.error.unwrap().starts_with("Failed to start command"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn not_found_retries_once_with_translation() {
        let translator = Translator::new(vec![CommandMapping::new(
            "kestrel-missing-cmd-xyz",
            "echo recovered",
        )]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let executor = executor()
            .with_translator(translator)
            .with_tool_event_tx(tx);

        let result = executor.run(exec("kestrel-missing-cmd-xyz")).await;
        assert!(result.success, "{result:?}");
        assert_eq!(result.content.as_deref(), Some("recovered\n"));
        assert_eq!(result.details["retried"], true);
        assert_eq!(result.details["translated_command"], "echo recovered");

        let mut started = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ToolEvent::Started { command, .. } = event {
                started.push(command);
            }
        }
        assert_eq!(started, vec!["kestrel-missing-cmd-xyz", "echo recovered"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn retry_never_recurses() {
        let translator = Translator::new(vec![
            CommandMapping::new("kestrel-missing-a", "kestrel-missing-b"),
            CommandMapping::new("kestrel-missing-b", "kestrel-missing-c"),
        ]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let executor = executor()
            .with_translator(translator)
            .with_tool_event_tx(tx);

        let result = executor.run(exec("kestrel-missing-a")).await;
        assert!(!result.success);
        assert_eq!(result.exit_code, Some(127));
        assert_eq!(result.details["retried"], true);

        let mut attempts = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, ToolEvent::Started { .. }) {
                attempts += 1;
            }
        }
        assert_eq!(attempts, 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn not_found_without_translation_is_not_retried() {
        let result = executor().run(exec("kestrel-nonexistent-command-xyz")).await;
        assert!(!result.success);
        assert_eq!(result.exit_code, Some(127));
        assert!(!result.details.contains_key("retried"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn output_chunks_are_streamed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = executor()
            .with_tool_event_tx(tx)
            .run(exec("echo one; echo two"))
            .await;
        assert!(result.success);

        let mut chunks = Vec::new();
        let mut completed = None;
        while let Ok(event) = rx.try_recv() {
            match event {
                ToolEvent::OutputChunk { chunk, .. } => chunks.push(chunk),
                ToolEvent::Completed { success, .. } => completed = Some(success),
                ToolEvent::Started { .. } => {}
            }
        }
        assert_eq!(chunks, vec!["one\n", "two\n"]);
        assert_eq!(completed, Some(true));
    }
}
