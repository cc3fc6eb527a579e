use std::fmt::Write as _;
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

use crate::executor::{ToolError, ToolResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TodoPriority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TodoItem {
    /// Stable identifier
    #[serde(deserialize_with = "string_or_number")]
    #[schemars(with = "String")]
    pub id: String,
    /// Task description
    pub content: String,
    pub status: TodoStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TodoPriority>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TodoWriteParams {
    /// The complete task list; replaces any previous list
    pub todos: Vec<TodoItem>,
}

#[derive(Serialize)]
struct TodoFile<'a> {
    updated: String,
    todos: &'a [TodoItem],
}

fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }
    Ok(match Id::deserialize(d)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

/// Overwrite `<dir>/todos.json` and `<dir>/TODO.md` with `todos`.
///
/// # Errors
///
/// Returns `ToolError::Io` when the files cannot be written.
pub fn write_todos(dir: &Path, todos: &[TodoItem]) -> Result<ToolResult, ToolError> {
    std::fs::create_dir_all(dir)?;

    let file = TodoFile {
        updated: chrono::Utc::now().to_rfc3339(),
        todos,
    };
    let json = serde_json::to_string_pretty(&file)
        .map_err(|e| ToolError::Io(std::io::Error::other(e)))?;
    std::fs::write(dir.join("todos.json"), json)?;
    std::fs::write(dir.join("TODO.md"), render_markdown(todos))?;

    let done = todos
        .iter()
        .filter(|t| t.status == TodoStatus::Completed)
        .count();
    tracing::debug!(total = todos.len(), done, "todo list written");
    Ok(ToolResult::ok(format!(
        "Saved {} todos ({done} completed) to {}",
        todos.len(),
        dir.display()
    ))
    .with_detail("total", todos.len())
    .with_detail("completed", done))
}

fn render_markdown(todos: &[TodoItem]) -> String {
    let mut out = String::from("# TODO\n\n");
    for t in todos {
        let mark = if t.status == TodoStatus::Completed { 'x' } else { ' ' };
        let _ = write!(out, "- [{mark}] {}", t.content);
        if t.status == TodoStatus::InProgress {
            out.push_str(" (in progress)");
        }
        if let Some(p) = t.priority {
            let _ = write!(out, " [{}]", format!("{p:?}").to_lowercase());
        }
        out.push('\n');
    }
    out
}
