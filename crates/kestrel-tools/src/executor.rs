use serde::Serialize;
use serde_json::{Map, Value};

/// Structured tool invocation extracted from model output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl ToolInvocation {
    #[must_use]
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Short human-readable label, e.g. `run_command(ls -la)`.
    #[must_use]
    pub fn label(&self) -> String {
        let primary = ["path", "command", "url", "source", "pattern", "message"]
            .iter()
            .find_map(|k| self.arguments.get(*k).and_then(Value::as_str));
        match primary {
            Some(arg) => format!("{}({arg})", self.name),
            None => self.name.clone(),
        }
    }
}

/// Failure category carried by a failed [`ToolResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    Validation,
    NotFound,
    Cancelled,
    NoMatch,
    Timeout,
    ExitStatus,
    Spawn,
    Io,
    Network,
}

/// Outcome of a single tool invocation. Never mutated after it is returned.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ToolErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Tool-specific fields (`overwritten`, `applied`, `retried`, ...).
    #[serde(flatten, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

impl ToolResult {
    #[must_use]
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            success: true,
            content: Some(content.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failure(err: &ToolError) -> Self {
        let mut result = Self {
            success: false,
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
            ..Self::default()
        };
        if let ToolError::ExitStatus { code, output } = err {
            result.exit_code = Some(*code);
            if !output.is_empty() {
                result.content = Some(output.clone());
            }
        }
        result
    }

    #[must_use]
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_owned(), value.into());
        self
    }

    #[must_use]
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.error_kind == Some(ToolErrorKind::Cancelled)
    }

    /// Textual content worth feeding back to the model: only for successful
    /// results with non-empty content.
    #[must_use]
    pub fn reportable_content(&self) -> Option<&str> {
        if !self.success {
            return None;
        }
        self.content.as_deref().filter(|c| !c.trim().is_empty())
    }
}

impl From<ToolError> for ToolResult {
    fn from(err: ToolError) -> Self {
        Self::failure(&err)
    }
}

/// Truncate tool output that exceeds `max_chars` bytes using a head+tail split.
#[must_use]
pub fn truncate_tool_output(output: &str, max_chars: usize) -> String {
    if output.len() <= max_chars {
        return output.to_string();
    }

    let half = max_chars / 2;
    let head_end = floor_char_boundary(output, half);
    let tail_start = ceil_char_boundary(output, output.len() - half);
    let head = &output[..head_end];
    let tail = &output[tail_start..];
    let truncated = tail_start - head_end;

    format!(
        "{head}\n\n... [truncated {truncated} chars, showing first and last ~{half} chars] ...\n\n{tail}"
    )
}

/// Keep only the first `max_chars` bytes (on a char boundary), appending a marker.
#[must_use]
pub fn truncate_head(text: &str, max_chars: usize) -> String {
    if text.len() <= max_chars {
        return text.to_string();
    }
    let end = floor_char_boundary(text, max_chars);
    format!(
        "{}\n\n... [truncated {} chars]",
        &text[..end],
        text.len() - end
    )
}

pub(crate) fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    if idx >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

/// Event emitted during tool execution for real-time console updates.
#[derive(Debug, Clone)]
pub enum ToolEvent {
    Started {
        tool_name: String,
        command: String,
    },
    OutputChunk {
        tool_name: String,
        command: String,
        chunk: String,
    },
    Completed {
        tool_name: String,
        command: String,
        success: bool,
    },
}

pub type ToolEventTx = tokio::sync::mpsc::UnboundedSender<ToolEvent>;

/// Errors that can occur during tool execution.
///
/// These never cross the dispatcher boundary: each one is folded into a
/// failed [`ToolResult`] whose `error` is the `Display` text below.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Missing required argument: {field}")]
    MissingArgument { field: String },

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidParams { tool: String, message: String },

    #[error("{what} not found: {path}")]
    NotFound { what: &'static str, path: String },

    #[error("{path} already exists")]
    AlreadyExists { path: String },

    #[error("Cancelled")]
    Cancelled,

    #[error("{diagnostic}")]
    NoMatch { diagnostic: String },

    #[error("Command timed out")]
    Timeout { timeout_ms: u64 },

    #[error("Command exited with code {code}")]
    ExitStatus { code: i32, output: String },

    #[error("Failed to start command: {0}")]
    Spawn(std::io::Error),

    #[error("git {subcommand} failed: {message}")]
    Git { subcommand: String, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ToolError {
    #[must_use]
    pub fn kind(&self) -> ToolErrorKind {
        match self {
            Self::UnknownTool { .. }
            | Self::MissingArgument { .. }
            | Self::InvalidParams { .. }
            | Self::AlreadyExists { .. } => ToolErrorKind::Validation,
            Self::NotFound { .. } => ToolErrorKind::NotFound,
            Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound => ToolErrorKind::NotFound,
            Self::Io(_) => ToolErrorKind::Io,
            Self::Cancelled => ToolErrorKind::Cancelled,
            Self::NoMatch { .. } => ToolErrorKind::NoMatch,
            Self::Timeout { .. } => ToolErrorKind::Timeout,
            Self::ExitStatus { .. } | Self::Git { .. } => ToolErrorKind::ExitStatus,
            Self::Spawn(_) => ToolErrorKind::Spawn,
            Self::Http(_) | Self::HttpStatus { .. } => ToolErrorKind::Network,
        }
    }

    pub(crate) fn invalid(tool: &str, message: impl Into<String>) -> Self {
        Self::InvalidParams {
            tool: tool.to_owned(),
            message: message.into(),
        }
    }
}

/// Deserialize tool call arguments into a typed struct.
///
/// # Errors
///
/// Returns `ToolError::InvalidParams` when deserialization fails.
pub fn deserialize_params<T: serde::de::DeserializeOwned>(
    tool: &str,
    arguments: &Map<String, Value>,
) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(arguments.clone()))
        .map_err(|e| ToolError::invalid(tool, e.to_string()))
}
