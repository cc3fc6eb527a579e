use std::fmt::Write;

use crate::fetch::FetchParams;
use crate::file::{
    EditFileParams, FindFilesParams, ListFilesParams, MultiEditParams, PathParams,
    ReadFileParams, SearchFilesParams, TransferParams, TreeParams, WriteFileParams,
};
use crate::git::{GitCommitParams, GitDiffParams, GitLogParams, GitStatusParams};
use crate::shell::RunCommandParams;
use crate::todo::TodoWriteParams;

#[derive(Debug, Clone)]
pub struct ToolDef {
    pub id: &'static str,
    pub description: &'static str,
    pub schema: schemars::Schema,
}

#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDef>,
}

macro_rules! tool {
    ($id:literal, $desc:literal, $params:ty) => {
        ToolDef {
            id: $id,
            description: $desc,
            schema: schemars::schema_for!($params),
        }
    };
}

impl ToolRegistry {
    #[must_use]
    pub fn from_definitions(tools: Vec<ToolDef>) -> Self {
        Self { tools }
    }

    /// Every tool the dispatcher knows how to run.
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_definitions(vec![
            tool!("read_file", "Read a file and return its exact content", ReadFileParams),
            tool!("write_file", "Write a file, replacing any existing content", WriteFileParams),
            tool!("create_file", "Create a new file; fails if it already exists", WriteFileParams),
            tool!(
                "edit_file",
                "Replace the first occurrence of old_content with new_content; tolerant of whitespace and line-ending differences",
                EditFileParams
            ),
            tool!(
                "multi_edit_file",
                "Apply several exact replacements to one file in order",
                MultiEditParams
            ),
            tool!("list_files", "List directory entries", ListFilesParams),
            tool!("search_files", "Search file contents with a regular expression", SearchFilesParams),
            tool!("find_files", "Find files by glob pattern", FindFilesParams),
            tool!("tree", "Show the directory tree", TreeParams),
            tool!("create_directory", "Create a directory and its parents", PathParams),
            tool!("delete_file", "Delete a file or directory", PathParams),
            tool!("move_file", "Move or rename a file or directory", TransferParams),
            tool!("copy_file", "Copy a file or directory", TransferParams),
            tool!("run_command", "Run a shell command", RunCommandParams),
            tool!("git_status", "Show the current branch and changed files", GitStatusParams),
            tool!("git_diff", "Show uncommitted changes", GitDiffParams),
            tool!("git_log", "Show recent commits", GitLogParams),
            tool!("git_commit", "Stage all changes and commit", GitCommitParams),
            tool!("fetch_url", "Fetch a URL over HTTP(S) and return the body", FetchParams),
            tool!("todo_write", "Replace the task list for this session", TodoWriteParams),
        ])
    }

    #[must_use]
    pub fn tools(&self) -> &[ToolDef] {
        &self.tools
    }

    #[must_use]
    pub fn find(&self, id: &str) -> Option<&ToolDef> {
        self.tools.iter().find(|t| t.id == id)
    }

    /// Top-level fields the schema of `id` marks as required.
    #[must_use]
    pub fn required_fields(&self, id: &str) -> Vec<&str> {
        self.find(id)
            .and_then(|t| t.schema.as_object())
            .and_then(|obj| obj.get("required"))
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default()
    }

    /// Tool catalogue for the system prompt.
    #[must_use]
    pub fn format_for_prompt(&self) -> String {
        let mut out = String::from(
            "To use a tool, reply with a fenced JSON block:\n```json\n{\"tool\": \"<name>\", \"arguments\": {...}}\n```\nSeveral blocks run in order.\n\n<tools>\n",
        );
        for tool in &self.tools {
            format_tool(&mut out, tool);
        }
        out.push_str("</tools>");
        out
    }
}

fn format_tool(out: &mut String, tool: &ToolDef) {
    let _ = writeln!(out, "## {}", tool.id);
    let _ = writeln!(out, "{}", tool.description);
    format_schema_params(out, &tool.schema);
    out.push('\n');
}

/// Extract the primary type when schemars renders `Option<T>` as `"type": ["T", "null"]`
/// or `"anyOf": [{"type": "T"}, {"type": "null"}]`.
fn extract_non_null_type(obj: &serde_json::Map<String, serde_json::Value>) -> Option<&str> {
    if let Some(arr) = obj.get("type").and_then(|v| v.as_array()) {
        return arr.iter().filter_map(|v| v.as_str()).find(|t| *t != "null");
    }
    obj.get("anyOf")?
        .as_array()?
        .iter()
        .filter_map(|v| v.as_object())
        .filter_map(|o| o.get("type")?.as_str())
        .find(|t| *t != "null")
}

fn format_schema_params(out: &mut String, schema: &schemars::Schema) {
    let Some(obj) = schema.as_object() else {
        return;
    };
    let Some(serde_json::Value::Object(props)) = obj.get("properties") else {
        return;
    };
    if props.is_empty() {
        return;
    }

    let required: Vec<&str> = obj
        .get("required")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    let _ = writeln!(out, "Parameters:");
    for (name, prop) in props {
        let prop_obj = prop.as_object();
        let ty = prop_obj
            .and_then(|o| {
                o.get("type")
                    .and_then(|v| v.as_str())
                    .or_else(|| extract_non_null_type(o))
            })
            .unwrap_or("object");
        let desc = prop_obj
            .and_then(|o| o.get("description"))
            .and_then(|v| v.as_str())
            .unwrap_or("");
        let req = if required.contains(&name.as_str()) {
            "required"
        } else {
            "optional"
        };
        let _ = writeln!(out, "  - {name}: {desc} ({ty}, {req})");
    }
}
