//! Routes parsed invocations to their handlers.
//!
//! Every call returns a [`ToolResult`]; no error crosses this boundary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{Map, Value};

use crate::config::ToolsConfig;
use crate::executor::{ToolError, ToolEventTx, ToolInvocation, ToolResult, deserialize_params};
use crate::fetch::{FetchExecutor, FetchParams};
use crate::file::{
    self, EditFileParams, FindFilesParams, ListFilesParams, MultiEditParams, PathParams,
    ReadFileParams, SearchFilesParams, TransferParams, TreeParams, WriteFileParams, resolve_path,
};
use crate::git::{self, GitCommitParams, GitDiffParams, GitLogParams};
use crate::registry::ToolRegistry;
use crate::safety::{CommandRisk, classify};
use crate::shell::{CommandExecution, RunCommandParams, ShellExecutor};
use crate::todo::{self, TodoWriteParams};

/// Alternate argument spellings accepted from models, mapped to canonical names.
const ARGUMENT_ALIASES: &[(&str, &str)] = &[
    ("oldContent", "old_content"),
    ("old_string", "old_content"),
    ("oldString", "old_content"),
    ("newContent", "new_content"),
    ("new_string", "new_content"),
    ("newString", "new_content"),
    ("timeoutMs", "timeout_ms"),
    ("caseSensitive", "case_sensitive"),
    ("file_path", "path"),
    ("filePath", "path"),
];

/// Interactive yes/no gate consulted before side effects.
pub trait Confirm: Send {
    fn confirm(&mut self, prompt: &str) -> impl Future<Output = bool> + Send;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOptions {
    /// Skip generic confirmations. Dangerous commands still prompt.
    pub auto_approve: bool,
}

/// Validated arguments, one variant per built-in tool.
#[derive(Debug)]
pub enum ToolArguments {
    ReadFile(ReadFileParams),
    WriteFile(WriteFileParams),
    CreateFile(WriteFileParams),
    EditFile(EditFileParams),
    MultiEditFile(MultiEditParams),
    ListFiles(ListFilesParams),
    SearchFiles(SearchFilesParams),
    FindFiles(FindFilesParams),
    Tree(TreeParams),
    CreateDirectory(PathParams),
    DeleteFile(PathParams),
    MoveFile(TransferParams),
    CopyFile(TransferParams),
    RunCommand(RunCommandParams),
    GitStatus,
    GitDiff(GitDiffParams),
    GitLog(GitLogParams),
    GitCommit(GitCommitParams),
    FetchUrl(FetchParams),
    TodoWrite(TodoWriteParams),
}

impl ToolArguments {
    /// Check the tool exists and its required fields are present, then
    /// deserialize into the typed variant.
    ///
    /// # Errors
    ///
    /// `UnknownTool`, `MissingArgument`, or `InvalidParams`.
    pub fn from_invocation(
        registry: &ToolRegistry,
        call: &ToolInvocation,
    ) -> Result<Self, ToolError> {
        let name = call.name.as_str();
        if registry.find(name).is_none() {
            return Err(ToolError::UnknownTool {
                name: call.name.clone(),
            });
        }

        let args = normalize_aliases(&call.arguments);
        if let Some(field) = registry
            .required_fields(name)
            .into_iter()
            .find(|f| args.get(*f).is_none_or(Value::is_null))
        {
            return Err(ToolError::MissingArgument {
                field: field.to_owned(),
            });
        }

        Ok(match name {
            "read_file" => Self::ReadFile(deserialize_params(name, &args)?),
            "write_file" => Self::WriteFile(deserialize_params(name, &args)?),
            "create_file" => Self::CreateFile(deserialize_params(name, &args)?),
            "edit_file" => Self::EditFile(deserialize_params(name, &args)?),
            "multi_edit_file" => Self::MultiEditFile(deserialize_params(name, &args)?),
            "list_files" => Self::ListFiles(deserialize_params(name, &args)?),
            "search_files" => Self::SearchFiles(deserialize_params(name, &args)?),
            "find_files" => Self::FindFiles(deserialize_params(name, &args)?),
            "tree" => Self::Tree(deserialize_params(name, &args)?),
            "create_directory" => Self::CreateDirectory(deserialize_params(name, &args)?),
            "delete_file" => Self::DeleteFile(deserialize_params(name, &args)?),
            "move_file" => Self::MoveFile(deserialize_params(name, &args)?),
            "copy_file" => Self::CopyFile(deserialize_params(name, &args)?),
            "run_command" => Self::RunCommand(deserialize_params(name, &args)?),
            "git_status" => Self::GitStatus,
            "git_diff" => Self::GitDiff(deserialize_params(name, &args)?),
            "git_log" => Self::GitLog(deserialize_params(name, &args)?),
            "git_commit" => Self::GitCommit(deserialize_params(name, &args)?),
            "fetch_url" => Self::FetchUrl(deserialize_params(name, &args)?),
            "todo_write" => Self::TodoWrite(deserialize_params(name, &args)?),
            _ => {
                return Err(ToolError::UnknownTool {
                    name: call.name.clone(),
                });
            }
        })
    }
}

fn normalize_aliases(arguments: &Map<String, Value>) -> Map<String, Value> {
    let mut args = arguments.clone();
    for (alias, canonical) in ARGUMENT_ALIASES {
        if !args.contains_key(*canonical)
            && let Some(v) = args.remove(*alias)
        {
            args.insert((*canonical).to_owned(), v);
        }
    }
    args
}

/// Executes tool invocations against the filesystem, shell, git and network.
#[derive(Debug)]
pub struct ToolDispatcher {
    registry: ToolRegistry,
    shell: ShellExecutor,
    fetch: FetchExecutor,
    todo_dir: String,
}

impl ToolDispatcher {
    #[must_use]
    pub fn new(config: &ToolsConfig) -> Self {
        Self {
            registry: ToolRegistry::builtin(),
            shell: ShellExecutor::new(&config.shell),
            fetch: FetchExecutor::new(&config.fetch),
            todo_dir: config.todo.dir.clone(),
        }
    }

    #[must_use]
    pub fn with_tool_event_tx(mut self, tx: ToolEventTx) -> Self {
        self.shell = self.shell.with_tool_event_tx(tx);
        self
    }

    #[must_use]
    pub fn with_shell(mut self, shell: ShellExecutor) -> Self {
        self.shell = shell;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Validate and run one invocation with `cwd` as the base for relative paths.
    pub async fn execute<C: Confirm>(
        &self,
        call: &ToolInvocation,
        cwd: &Path,
        options: ExecuteOptions,
        confirm: &mut C,
    ) -> ToolResult {
        let outcome = match ToolArguments::from_invocation(&self.registry, call) {
            Ok(args) => self.run(args, cwd, options, confirm).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(result) => {
                tracing::info!(tool = %call.name, "tool succeeded");
                result
            }
            Err(e) => {
                tracing::warn!(tool = %call.label(), "tool failed: {e}");
                ToolResult::from(e)
            }
        }
    }

    async fn run<C: Confirm>(
        &self,
        args: ToolArguments,
        cwd: &Path,
        options: ExecuteOptions,
        confirm: &mut C,
    ) -> Result<ToolResult, ToolError> {
        let path = |p: &str| resolve_path(cwd, p);
        let path_or_cwd = |p: Option<&str>| p.map_or_else(|| cwd.to_path_buf(), |p| path(p));

        match args {
            ToolArguments::ReadFile(p) => file::read_file(&path(&p.path), p.offset, p.limit),
            ToolArguments::WriteFile(p) => {
                let target = path(&p.path);
                let verb = if target.exists() { "Overwrite" } else { "Write" };
                let prompt = format!("{verb} {} ({} bytes)?", target.display(), p.content.len());
                approve(confirm, options, &prompt).await?;
                file::write_file(&target, &p.content)
            }
            ToolArguments::CreateFile(p) => {
                let target = path(&p.path);
                if target.exists() {
                    return Err(ToolError::AlreadyExists {
                        path: target.display().to_string(),
                    });
                }
                approve(confirm, options, &format!("Create {}?", target.display())).await?;
                file::create_file(&target, &p.content)
            }
            ToolArguments::EditFile(p) => {
                let pending = file::plan_edit(&path(&p.path), &p.old_content, &p.new_content)?;
                let prompt = format!("Apply edit to {}?\n{}", pending.path.display(), pending.diff());
                approve(confirm, options, &prompt).await?;
                pending.commit()
            }
            ToolArguments::MultiEditFile(p) => {
                let pending = file::plan_multi_edit(&path(&p.path), &p.edits)?;
                let prompt = format!("Apply edits to {}?\n{}", pending.path.display(), pending.diff());
                approve(confirm, options, &prompt).await?;
                pending.commit()
            }
            ToolArguments::ListFiles(p) => {
                file::list_files(&path_or_cwd(p.path.as_deref()), p.recursive)
            }
            ToolArguments::SearchFiles(p) => file::search_files(
                cwd,
                &path_or_cwd(p.path.as_deref()),
                &p.pattern,
                p.case_sensitive.unwrap_or(true),
            ),
            ToolArguments::FindFiles(p) => file::find_files(cwd, &p.pattern),
            ToolArguments::Tree(p) => file::tree(&path_or_cwd(p.path.as_deref()), p.depth),
            ToolArguments::CreateDirectory(p) => file::create_directory(&path(&p.path)),
            ToolArguments::DeleteFile(p) => {
                let target = existing(path(&p.path))?;
                approve(confirm, options, &format!("Delete {}?", target.display())).await?;
                file::delete_path(&target)
            }
            ToolArguments::MoveFile(p) => {
                let (from, to) = (existing(path(&p.source))?, path(&p.destination));
                let prompt = format!("Move {} to {}?", from.display(), to.display());
                approve(confirm, options, &prompt).await?;
                file::move_path(&from, &to)
            }
            ToolArguments::CopyFile(p) => {
                let (from, to) = (existing(path(&p.source))?, path(&p.destination));
                let prompt = format!("Copy {} to {}?", from.display(), to.display());
                approve(confirm, options, &prompt).await?;
                file::copy_path(&from, &to)
            }
            ToolArguments::RunCommand(p) => self.run_command(p, cwd, options, confirm).await,
            ToolArguments::GitStatus => git::status(cwd).await,
            ToolArguments::GitDiff(p) => git::diff(cwd, p.staged, p.path.as_deref()).await,
            ToolArguments::GitLog(p) => git::log(cwd, p.count).await,
            ToolArguments::GitCommit(p) => {
                let prompt = format!("Commit all changes with message \"{}\"?", p.message);
                approve(confirm, options, &prompt).await?;
                git::commit(cwd, &p.message).await
            }
            ToolArguments::FetchUrl(p) => self.fetch.fetch(&p.url).await,
            ToolArguments::TodoWrite(p) => todo::write_todos(&path(&self.todo_dir), &p.todos),
        }
    }

    async fn run_command<C: Confirm>(
        &self,
        params: RunCommandParams,
        cwd: &Path,
        options: ExecuteOptions,
        confirm: &mut C,
    ) -> Result<ToolResult, ToolError> {
        let command = params.command;
        match classify(&command) {
            CommandRisk::Dangerous => {
                tracing::warn!(%command, "dangerous command requires confirmation");
                let prompt = format!("Potentially destructive command:\n  {command}\nRun it?");
                if !confirm.confirm(&prompt).await {
                    return Err(ToolError::Cancelled);
                }
            }
            CommandRisk::Safe => {}
            CommandRisk::Unknown => {
                approve(confirm, options, &format!("Run command:\n  {command}\n?")).await?;
            }
        }

        let workdir = params
            .cwd
            .as_deref()
            .map_or_else(|| cwd.to_path_buf(), |d| resolve_path(cwd, d));
        let timeout = params
            .timeout_ms
            .map_or_else(|| self.shell.timeout(), Duration::from_millis);
        let result = self
            .shell
            .run(CommandExecution::new(command, workdir, timeout))
            .await;
        Ok(result)
    }
}

async fn approve<C: Confirm>(
    confirm: &mut C,
    options: ExecuteOptions,
    prompt: &str,
) -> Result<(), ToolError> {
    if options.auto_approve || confirm.confirm(prompt).await {
        Ok(())
    } else {
        Err(ToolError::Cancelled)
    }
}

fn existing(path: PathBuf) -> Result<PathBuf, ToolError> {
    if path.exists() {
        Ok(path)
    } else {
        Err(ToolError::NotFound {
            what: "Path",
            path: path.display().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ToolErrorKind;
    use serde_json::json;
    use std::fs;

    struct Scripted {
        answer: bool,
        prompts: Vec<String>,
    }

    impl Scripted {
        fn answering(answer: bool) -> Self {
            Self {
                answer,
                prompts: Vec::new(),
            }
        }
    }

    impl Confirm for Scripted {
        fn confirm(&mut self, prompt: &str) -> impl Future<Output = bool> + Send {
            self.prompts.push(prompt.to_owned());
            let answer = self.answer;
            async move { answer }
        }
    }

    fn call(name: &str, args: Value) -> ToolInvocation {
        ToolInvocation::new(name, args.as_object().cloned().unwrap_or_default())
    }

    fn dispatcher() -> ToolDispatcher {
        ToolDispatcher::new(&ToolsConfig::default())
    }

    const AUTO: ExecuteOptions = ExecuteOptions { auto_approve: true };
    const ASK: ExecuteOptions = ExecuteOptions { auto_approve: false };

    #[tokio::test]
    async fn unknown_tool() {
        let dir = tempfile::tempdir().unwrap();
        let mut confirm = Scripted::answering(true);
        let result = dispatcher()
            .execute(&call("teleport", json!({})), dir.path(), AUTO, &mut confirm)
            .await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Unknown tool: teleport"));
        assert_eq!(result.error_kind, Some(ToolErrorKind::Validation));
    }

    #[tokio::test]
    async fn missing_required_argument_has_no_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let mut confirm = Scripted::answering(true);
        let result = dispatcher()
            .execute(
                &call("write_file", json!({"path": "a.txt"})),
                dir.path(),
                AUTO,
                &mut confirm,
            )
            .await;
        assert_eq!(result.error.as_deref(), Some("Missing required argument: content"));
        assert!(!dir.path().join("a.txt").exists());
        assert!(confirm.prompts.is_empty());
    }

    #[tokio::test]
    async fn null_counts_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut confirm = Scripted::answering(true);
        let result = dispatcher()
            .execute(&call("read_file", json!({"path": null})), dir.path(), AUTO, &mut confirm)
            .await;
        assert_eq!(result.error.as_deref(), Some("Missing required argument: path"));
    }

    #[tokio::test]
    async fn wrong_argument_type_is_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut confirm = Scripted::answering(true);
        let result = dispatcher()
            .execute(
                &call("read_file", json!({"path": "a", "offset": "ten"})),
                dir.path(),
                AUTO,
                &mut confirm,
            )
            .await;
        assert_eq!(result.error_kind, Some(ToolErrorKind::Validation));
        assert!(result.error.unwrap().starts_with("Invalid arguments for read_file"));
    }

    #[tokio::test]
    async fn write_then_read_relative_to_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher();
        let mut confirm = Scripted::answering(false);

        let write = d
            .execute(
                &call("write_file", json!({"path": "a.txt", "content": "x"})),
                dir.path(),
                AUTO,
                &mut confirm,
            )
            .await;
        assert!(write.success);
        assert_eq!(write.details["overwritten"], false);

        let read = d
            .execute(&call("read_file", json!({"path": "a.txt"})), dir.path(), AUTO, &mut confirm)
            .await;
        assert_eq!(read.content.as_deref(), Some("x"));
        assert!(confirm.prompts.is_empty());
    }

    #[tokio::test]
    async fn declined_write_is_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "old").unwrap();
        let mut confirm = Scripted::answering(false);
        let result = dispatcher()
            .execute(
                &call("write_file", json!({"path": "a.txt", "content": "new"})),
                dir.path(),
                ASK,
                &mut confirm,
            )
            .await;
        assert!(result.is_cancelled());
        assert_eq!(result.error.as_deref(), Some("Cancelled"));
        assert!(confirm.prompts[0].starts_with("Overwrite"));
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "old");
    }

    #[tokio::test]
    async fn create_file_refuses_existing_without_prompt() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "old").unwrap();
        let mut confirm = Scripted::answering(true);
        let result = dispatcher()
            .execute(
                &call("create_file", json!({"path": "a.txt", "content": "new"})),
                dir.path(),
                ASK,
                &mut confirm,
            )
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().ends_with("already exists"));
        assert!(confirm.prompts.is_empty());
    }

    #[tokio::test]
    async fn edit_prompt_shows_diff_and_accepts_aliases() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.rs"), "fn main() {\n    old();\n}\n").unwrap();
        let mut confirm = Scripted::answering(true);
        let result = dispatcher()
            .execute(
                &call(
                    "edit_file",
                    json!({"path": "main.rs", "old_string": "old();", "newContent": "new();"}),
                ),
                dir.path(),
                ASK,
                &mut confirm,
            )
            .await;
        assert!(result.success, "{result:?}");
        assert!(confirm.prompts[0].contains("-    old();"));
        assert!(confirm.prompts[0].contains("+    new();"));
        assert_eq!(
            fs::read_to_string(dir.path().join("main.rs")).unwrap(),
            "fn main() {\n    new();\n}\n"
        );
    }

    #[tokio::test]
    async fn edit_no_match_reports_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "alpha\n").unwrap();
        let mut confirm = Scripted::answering(true);
        let result = dispatcher()
            .execute(
                &call(
                    "edit_file",
                    json!({"path": "a.txt", "old_content": "omega", "new_content": "x"}),
                ),
                dir.path(),
                AUTO,
                &mut confirm,
            )
            .await;
        assert_eq!(result.error_kind, Some(ToolErrorKind::NoMatch));
        assert!(result.error.unwrap().contains("omega"));
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "alpha\n");
        assert!(confirm.prompts.is_empty());
    }

    #[tokio::test]
    async fn multi_edit_with_no_matches_leaves_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "alpha\n").unwrap();
        let mut confirm = Scripted::answering(true);
        let result = dispatcher()
            .execute(
                &call(
                    "multi_edit_file",
                    json!({"path": "a.txt", "edits": [
                        {"old_content": "omega", "new_content": "x"},
                        {"old_content": "delta", "new_content": "y"}
                    ]}),
                ),
                dir.path(),
                AUTO,
                &mut confirm,
            )
            .await;
        assert_eq!(result.error_kind, Some(ToolErrorKind::NoMatch));
        assert!(result.error.unwrap().contains("None of the 2 edits"));
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "alpha\n");
        assert!(confirm.prompts.is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut confirm = Scripted::answering(true);
        let result = dispatcher()
            .execute(&call("delete_file", json!({"path": "ghost"})), dir.path(), ASK, &mut confirm)
            .await;
        assert_eq!(result.error_kind, Some(ToolErrorKind::NotFound));
        assert!(confirm.prompts.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn dangerous_command_prompts_even_with_auto_approve() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("victim")).unwrap();
        let mut confirm = Scripted::answering(false);
        let result = dispatcher()
            .execute(
                &call("run_command", json!({"command": "rm -rf victim"})),
                dir.path(),
                AUTO,
                &mut confirm,
            )
            .await;
        assert!(result.is_cancelled());
        assert_eq!(confirm.prompts.len(), 1);
        assert!(confirm.prompts[0].contains("rm -rf victim"));
        assert!(dir.path().join("victim").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn recursive_rm_without_force_still_prompts() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("victim")).unwrap();
        let mut confirm = Scripted::answering(false);
        let result = dispatcher()
            .execute(
                &call("run_command", json!({"command": "rm -r victim"})),
                dir.path(),
                AUTO,
                &mut confirm,
            )
            .await;
        assert!(result.is_cancelled());
        assert_eq!(confirm.prompts.len(), 1);
        assert!(dir.path().join("victim").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn find_delete_is_confirmed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("keep.txt"), "").unwrap();
        let mut confirm = Scripted::answering(false);
        let result = dispatcher()
            .execute(
                &call("run_command", json!({"command": "find . -name '*.txt' -delete"})),
                dir.path(),
                ASK,
                &mut confirm,
            )
            .await;
        assert!(result.is_cancelled());
        assert_eq!(confirm.prompts.len(), 1);
        assert!(dir.path().join("keep.txt").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn safe_command_skips_prompt() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("seen.txt"), "").unwrap();
        let mut confirm = Scripted::answering(false);
        let result = dispatcher()
            .execute(&call("run_command", json!({"command": "ls"})), dir.path(), ASK, &mut confirm)
            .await;
        assert!(result.success);
        assert!(result.content.unwrap().contains("seen.txt"));
        assert!(confirm.prompts.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unknown_command_prompts_unless_auto_approved() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher();
        let cmd = call("run_command", json!({"command": "printf built"}));

        let mut decline = Scripted::answering(false);
        let result = d.execute(&cmd, dir.path(), ASK, &mut decline).await;
        assert!(result.is_cancelled());
        assert_eq!(decline.prompts.len(), 1);

        let mut untouched = Scripted::answering(false);
        let result = d.execute(&cmd, dir.path(), AUTO, &mut untouched).await;
        assert_eq!(result.content.as_deref(), Some("built"));
        assert!(untouched.prompts.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_command_honours_cwd_and_timeout_aliases() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/inner.txt"), "").unwrap();
        let mut confirm = Scripted::answering(true);
        let result = dispatcher()
            .execute(
                &call("run_command", json!({"command": "ls", "cwd": "sub", "timeoutMs": 5000})),
                dir.path(),
                AUTO,
                &mut confirm,
            )
            .await;
        assert!(result.content.unwrap().contains("inner.txt"));
    }

    #[tokio::test]
    async fn todo_write_lands_in_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let mut confirm = Scripted::answering(true);
        let result = dispatcher()
            .execute(
                &call(
                    "todo_write",
                    json!({"todos": [{"id": "1", "content": "a", "status": "pending"}]}),
                ),
                dir.path(),
                ASK,
                &mut confirm,
            )
            .await;
        assert!(result.success);
        assert!(dir.path().join(".kestrel/todos.json").exists());
        assert!(dir.path().join(".kestrel/TODO.md").exists());
    }

    #[test]
    fn alias_does_not_override_canonical() {
        let args = json!({"old_content": "keep", "old_string": "drop"});
        let normalized = normalize_aliases(args.as_object().unwrap());
        assert_eq!(normalized["old_content"], "keep");
    }
}
