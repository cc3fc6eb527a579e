//! Extraction of tool invocations from raw model output.
//!
//! Models encode "call this tool" in several ways depending on family and
//! prompt. Each encoding is handled by an independent extractor that scans
//! the whole response; results are concatenated in a fixed format order.
//!
//! 1. Fenced code block holding `{"tool": ..., "arguments": {...}}`
//! 2. Inline `TOOL_CALL:` marker followed by the same object
//! 3. Bare `{"tool": ..., "arguments": ...}` objects anywhere else in the text
//! 4. `<function_call>{"name": ..., "arguments": ...}</function_call>`
//! 5. `to=container.exec` followed by `{"cmd": [...]}` (mapped to `run_command`)
//! 6. `to=browser.<tool>` followed by `{tool, arguments}` or a bare arguments object
//!
//! Extraction is total: malformed candidates are dropped, never reported.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::executor::ToolInvocation;

/// Invocation name used for shell commands coming from container exec markers.
pub const SHELL_TOOL: &str = "run_command";

static FENCED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)```").unwrap());
static INLINE_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:TOOL_CALL:|\[TOOL_CALL\])").unwrap());
static BARE_JSON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\{\s*"(?:tool|arguments)"\s*:"#).unwrap());
static FUNCTION_CALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<function_call>(.*?)</function_call>").unwrap());
static CONTAINER_EXEC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"to=container\.exec\b").unwrap());
static BROWSER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"to=browser\.([A-Za-z_][A-Za-z0-9_]*)").unwrap());

/// Max distance between a provider marker and the JSON payload it introduces.
const MARKER_PAYLOAD_GAP: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Format {
    Fenced,
    InlineMarker,
    BareJson,
    FunctionCall,
    ContainerExec,
    Browser,
}

struct Found {
    call: ToolInvocation,
    span: Range<usize>,
}

type Extractor = fn(&str) -> Vec<Found>;

/// Extractors that recognise an explicit wrapper. Bare JSON runs afterwards
/// over the text left unclaimed by these.
const WRAPPED_FORMATS: &[(Format, Extractor)] = &[
    (Format::Fenced, extract_fenced),
    (Format::InlineMarker, extract_inline_marker),
    (Format::FunctionCall, extract_function_call),
    (Format::ContainerExec, extract_container_exec),
    (Format::Browser, extract_browser),
];

/// Parse every tool invocation found in `text`, in format order and, within a
/// format, in order of appearance.
#[must_use]
pub fn parse_tool_calls(text: &str) -> Vec<ToolInvocation> {
    let mut by_format: Vec<(Format, Vec<Found>)> = WRAPPED_FORMATS
        .iter()
        .map(|(format, extract)| (*format, extract(text)))
        .collect();

    let claimed: Vec<Range<usize>> = by_format
        .iter()
        .flat_map(|(_, found)| found.iter().map(|f| f.span.clone()))
        .collect();
    let residual = mask_spans(text, &claimed);
    by_format.push((Format::BareJson, extract_bare_json(&residual)));
    by_format.sort_by_key(|(format, _)| *format);

    let mut calls = Vec::new();
    for (format, found) in by_format {
        if !found.is_empty() {
            tracing::debug!(?format, count = found.len(), "tool call format matched");
        }
        calls.extend(found.into_iter().map(|f| f.call));
    }
    calls
}

fn extract_fenced(text: &str) -> Vec<Found> {
    FENCED_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let body = caps.get(1)?.as_str().trim();
            let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(body) else {
                return None;
            };
            Some(Found {
                call: tool_shape(obj)?,
                span: whole.range(),
            })
        })
        .collect()
}

fn extract_inline_marker(text: &str) -> Vec<Found> {
    INLINE_MARKER_RE
        .find_iter(text)
        .filter_map(|m| {
            let start = m.end() + leading_whitespace(&text[m.end()..]);
            if !text[start..].starts_with('{') {
                return None;
            }
            let (obj, end) = json_object_at(text, start)?;
            Some(Found {
                call: tool_shape(obj)?,
                span: m.start()..end,
            })
        })
        .collect()
}

fn extract_bare_json(text: &str) -> Vec<Found> {
    let mut found = Vec::new();
    let mut consumed = 0;
    for m in BARE_JSON_RE.find_iter(text) {
        if m.start() < consumed {
            continue;
        }
        let Some((obj, end)) = json_object_at(text, m.start()) else {
            continue;
        };
        if let Some(call) = tool_shape(obj) {
            found.push(Found {
                call,
                span: m.start()..end,
            });
            consumed = end;
        }
    }
    found
}

fn extract_function_call(text: &str) -> Vec<Found> {
    FUNCTION_CALL_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let body = caps.get(1)?.as_str().trim();
            let Ok(Value::Object(mut obj)) = serde_json::from_str::<Value>(body) else {
                return None;
            };
            let name = obj.remove("name")?.as_str()?.to_owned();
            let arguments = arguments_object(obj.remove("arguments"))?;
            Some(Found {
                call: ToolInvocation::new(name, arguments),
                span: whole.range(),
            })
        })
        .collect()
}

fn extract_container_exec(text: &str) -> Vec<Found> {
    CONTAINER_EXEC_RE
        .find_iter(text)
        .filter_map(|m| {
            let (mut obj, end) = json_after_marker(text, m.end())?;
            let Some(Value::Array(cmd)) = obj.remove("cmd") else {
                return None;
            };
            let command = cmd.last()?.as_str()?.to_owned();

            let mut arguments = Map::new();
            arguments.insert("command".into(), Value::String(command));
            if let Some(workdir) = obj.remove("workdir").filter(Value::is_string) {
                arguments.insert("cwd".into(), workdir);
            }
            if let Some(timeout) = obj.remove("timeout").filter(Value::is_u64) {
                arguments.insert("timeout_ms".into(), timeout);
            }
            Some(Found {
                call: ToolInvocation::new(SHELL_TOOL, arguments),
                span: m.start()..end,
            })
        })
        .collect()
}

fn extract_browser(text: &str) -> Vec<Found> {
    BROWSER_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let marker_tool = caps.get(1)?.as_str();
            let (obj, end) = json_after_marker(text, whole.end())?;
            let call = if obj.get("tool").is_some_and(Value::is_string) {
                tool_shape(obj)?
            } else {
                ToolInvocation::new(marker_tool, obj)
            };
            Some(Found {
                call,
                span: whole.start()..end,
            })
        })
        .collect()
}

/// Accept `{"tool": "<name>", "arguments": {...}}`; `arguments` may be absent
/// or a JSON-encoded string.
fn tool_shape(mut obj: Map<String, Value>) -> Option<ToolInvocation> {
    let name = obj.remove("tool")?.as_str()?.trim().to_owned();
    if name.is_empty() {
        return None;
    }
    let arguments = arguments_object(obj.remove("arguments"))?;
    Some(ToolInvocation::new(name, arguments))
}

fn arguments_object(value: Option<Value>) -> Option<Map<String, Value>> {
    match value {
        None | Some(Value::Null) => Some(Map::new()),
        Some(Value::Object(map)) => Some(map),
        Some(Value::String(encoded)) => match serde_json::from_str::<Value>(&encoded) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        },
        Some(_) => None,
    }
}

/// Parse one JSON object starting exactly at byte `start`; returns it with the
/// byte offset just past its closing brace.
fn json_object_at(text: &str, start: usize) -> Option<(Map<String, Value>, usize)> {
    let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
    match stream.next() {
        Some(Ok(Value::Object(obj))) => Some((obj, start + stream.byte_offset())),
        _ => None,
    }
}

/// Provider markers may be followed by channel tokens before the payload,
/// e.g. `to=container.exec <|constrain|>json<|message|>{...}`.
fn json_after_marker(text: &str, marker_end: usize) -> Option<(Map<String, Value>, usize)> {
    let window_end = crate::executor::floor_char_boundary(text, marker_end + MARKER_PAYLOAD_GAP);
    let brace = text[marker_end..window_end].find('{')?;
    json_object_at(text, marker_end + brace)
}

fn leading_whitespace(s: &str) -> usize {
    s.len() - s.trim_start().len()
}

fn mask_spans(text: &str, spans: &[Range<usize>]) -> String {
    if spans.is_empty() {
        return text.to_owned();
    }
    let mut bytes = text.as_bytes().to_vec();
    for span in spans {
        bytes[span.clone()].fill(b' ');
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn single(text: &str) -> ToolInvocation {
        let calls = parse_tool_calls(text);
        assert_eq!(calls.len(), 1, "expected one call, got {calls:?}");
        calls.into_iter().next().unwrap()
    }

    #[test]
    fn fenced_json_block() {
        let text = "I'll read it.\n```json\n{\"tool\": \"read_file\", \"arguments\": {\"path\": \"src/main.rs\"}}\n```\nDone.";
        let call = single(text);
        assert_eq!(call.name, "read_file");
        assert_eq!(call.arguments.get("path"), Some(&json!("src/main.rs")));
    }

    #[test]
    fn fenced_block_without_language() {
        let text = "```\n{\"tool\": \"git_status\", \"arguments\": {}}\n```";
        assert_eq!(single(text).name, "git_status");
    }

    #[test]
    fn fenced_block_preserves_exact_arguments() {
        let args = json!({"path": "a.txt", "content": "line1\nline2", "nested": {"n": [1, 2]}});
        let text = format!(
            "```json\n{}\n```",
            json!({"tool": "write_file", "arguments": args})
        );
        let call = single(&text);
        assert_eq!(Value::Object(call.arguments), args);
    }

    #[test]
    fn non_tool_fenced_json_ignored() {
        let text = "```json\n{\"name\": \"package\", \"version\": \"1.0.0\"}\n```";
        assert!(parse_tool_calls(text).is_empty());
    }

    #[test]
    fn inline_marker() {
        let text = "TOOL_CALL: {\"tool\": \"list_files\", \"arguments\": {\"path\": \".\"}}";
        let call = single(text);
        assert_eq!(call.name, "list_files");
    }

    #[test]
    fn bracket_inline_marker() {
        let text = "[TOOL_CALL] {\"tool\": \"tree\", \"arguments\": {\"depth\": 2}}";
        let call = single(text);
        assert_eq!(call.arguments.get("depth"), Some(&json!(2)));
    }

    #[test]
    fn bare_json() {
        let text = "Sure thing: {\"tool\": \"git_log\", \"arguments\": {\"count\": 3}} and that's it.";
        let call = single(text);
        assert_eq!(call.name, "git_log");
    }

    #[test]
    fn bare_json_arguments_first() {
        let text = "{\"arguments\": {\"path\": \"x\"}, \"tool\": \"delete_file\"}";
        assert_eq!(single(text).name, "delete_file");
    }

    #[test]
    fn bare_json_with_braces_in_strings() {
        let text = r#"{"tool": "write_file", "arguments": {"path": "a.rs", "content": "fn main() { println!(\"}\"); }"}}"#;
        let call = single(text);
        assert_eq!(
            call.arguments.get("content"),
            Some(&json!("fn main() { println!(\"}\"); }"))
        );
    }

    #[test]
    fn function_call_tag() {
        let text = "<function_call>{\"name\": \"read_file\", \"arguments\": {\"path\": \"README.md\"}}</function_call>";
        let call = single(text);
        assert_eq!(call.name, "read_file");
        assert_eq!(call.arguments.get("path"), Some(&json!("README.md")));
    }

    #[test]
    fn function_call_with_string_arguments() {
        let text = r#"<function_call>{"name": "read_file", "arguments": "{\"path\": \"a\"}"}</function_call>"#;
        assert_eq!(single(text).arguments.get("path"), Some(&json!("a")));
    }

    #[test]
    fn container_exec_marker() {
        let text = "<|channel|>commentary to=container.exec <|constrain|>json<|message|>{\"cmd\": [\"bash\", \"-lc\", \"ls -la\"], \"workdir\": \"/tmp\"}<|call|>";
        let call = single(text);
        assert_eq!(call.name, SHELL_TOOL);
        assert_eq!(call.arguments.get("command"), Some(&json!("ls -la")));
        assert_eq!(call.arguments.get("cwd"), Some(&json!("/tmp")));
    }

    #[test]
    fn browser_marker_bare_arguments() {
        let text = "to=browser.fetch_url <|message|>{\"url\": \"https://example.com\"}";
        let call = single(text);
        assert_eq!(call.name, "fetch_url");
        assert_eq!(call.arguments.get("url"), Some(&json!("https://example.com")));
    }

    #[test]
    fn browser_marker_with_tool_payload() {
        let text = "to=browser.open {\"tool\": \"fetch_url\", \"arguments\": {\"url\": \"https://a.b\"}}";
        let call = single(text);
        assert_eq!(call.name, "fetch_url");
    }

    #[test]
    fn broken_json_yields_nothing_for_every_format() {
        let broken = [
            "```json\n{\"tool\": \"read_file\", \"arguments\": {\"path\": \n```",
            "TOOL_CALL: {\"tool\": \"read_file\", \"arguments\": {",
            "{\"tool\": \"read_file\", \"arguments\": {\"path\": \"a\"",
            "<function_call>{\"name\": \"read_file\", \"arguments\": }</function_call>",
            "to=container.exec {\"cmd\": [\"bash\", \"-lc\", \"ls\"",
            "to=browser.search {\"query\": ",
        ];
        for text in broken {
            assert!(parse_tool_calls(text).is_empty(), "parsed: {text}");
        }
    }

    #[test]
    fn container_exec_requires_cmd_array() {
        let text = "to=container.exec {\"cmd\": \"ls\"}";
        assert!(parse_tool_calls(text).is_empty());
    }

    #[test]
    fn multiple_calls_in_order() {
        let text = "```json\n{\"tool\": \"write_file\", \"arguments\": {\"path\": \"a\", \"content\": \"x\"}}\n```\nthen\n```json\n{\"tool\": \"read_file\", \"arguments\": {\"path\": \"a\"}}\n```";
        let calls = parse_tool_calls(text);
        let names: Vec<_> = calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["write_file", "read_file"]);
    }

    #[test]
    fn mixed_formats_concatenate_in_format_order() {
        let text = "<function_call>{\"name\": \"git_status\", \"arguments\": {}}</function_call>\n\
                    {\"tool\": \"git_log\", \"arguments\": {}}\n\
                    ```json\n{\"tool\": \"read_file\", \"arguments\": {\"path\": \"a\"}}\n```";
        let names: Vec<_> = parse_tool_calls(text).into_iter().map(|c| c.name).collect();
        assert_eq!(names, ["read_file", "git_log", "git_status"]);
    }

    #[test]
    fn duplicates_across_formats_are_kept() {
        let text = "<function_call>{\"name\": \"git_status\", \"arguments\": {}}</function_call>\n\
                    TOOL_CALL: {\"tool\": \"git_status\", \"arguments\": {}}";
        assert_eq!(parse_tool_calls(text).len(), 2);
    }

    #[test]
    fn one_bad_candidate_does_not_hide_others() {
        let text = "```json\n{\"tool\": broken}\n```\n```json\n{\"tool\": \"tree\", \"arguments\": {}}\n```";
        assert_eq!(single(text).name, "tree");
    }

    #[test]
    fn plain_text_has_no_calls() {
        assert!(parse_tool_calls("Nothing to do here, the code looks fine.").is_empty());
        assert!(parse_tool_calls("").is_empty());
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn parser_is_total(text in "\\PC{0,200}") {
            let _ = parse_tool_calls(&text);
        }

        #[test]
        fn parser_survives_truncated_calls(cut in 0usize..90) {
            let full = "TOOL_CALL: {\"tool\": \"read_file\", \"arguments\": {\"path\": \"é.txt\"}} ```json\n";
            let end = crate::executor::floor_char_boundary(full, cut);
            let calls = parse_tool_calls(&full[..end]);
            prop_assert!(calls.len() <= 1);
        }
    }
}
