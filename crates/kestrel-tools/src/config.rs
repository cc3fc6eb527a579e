use serde::Deserialize;

fn default_shell_timeout() -> u64 {
    30
}

fn default_fetch_timeout() -> u64 {
    15
}

fn default_max_chars() -> usize {
    20_000
}

fn default_todo_dir() -> String {
    ".kestrel".to_owned()
}

/// Top-level configuration for tool execution.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub shell: ShellConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub todo: TodoConfig,
}

/// Shell configuration: default timeout in seconds and an optional shell
/// override such as `["bash", "-c"]`. Empty means `sh -c` / `cmd /C`.
#[derive(Debug, Clone, Deserialize)]
pub struct ShellConfig {
    #[serde(default = "default_shell_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub shell: Vec<String>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            timeout: default_shell_timeout(),
            shell: Vec::new(),
        }
    }
}

/// Configuration for the `fetch_url` tool.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_timeout")]
    pub timeout: u64,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: default_fetch_timeout(),
            max_chars: default_max_chars(),
        }
    }
}

/// Where `todo_write` keeps its files, relative to the working directory.
#[derive(Debug, Clone, Deserialize)]
pub struct TodoConfig {
    #[serde(default = "default_todo_dir")]
    pub dir: String,
}

impl Default for TodoConfig {
    fn default() -> Self {
        Self {
            dir: default_todo_dir(),
        }
    }
}
