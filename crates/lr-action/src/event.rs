// event.rs — The tool-event input record.
//
// One ToolEvent per pipeline run, deserialized from the host's JSON with
// every field defaulted: a missing key is never an error (malformed input
// is handled permissively, not rejected).

use serde::{Deserialize, Serialize};

/// The known tool vocabulary, plus `Other` for anything the host grows
/// later (MCP tools, custom connectors). Matching on this enum instead of
/// raw strings keeps new tool names a compile-time decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolKind {
    Read,
    Write,
    Edit,
    Bash,
    Glob,
    Grep,
    WebSearch,
    WebFetch,
    Task,
    Other,
}

impl ToolKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "Read" => ToolKind::Read,
            "Write" => ToolKind::Write,
            "Edit" => ToolKind::Edit,
            "Bash" => ToolKind::Bash,
            "Glob" => ToolKind::Glob,
            "Grep" => ToolKind::Grep,
            "WebSearch" => ToolKind::WebSearch,
            "WebFetch" => ToolKind::WebFetch,
            "Task" => ToolKind::Task,
            _ => ToolKind::Other,
        }
    }

    /// Tools that write files — the only ones subject to path-level
    /// permission rules and file-based gates.
    pub fn is_write(self) -> bool {
        matches!(self, ToolKind::Write | ToolKind::Edit)
    }
}

/// The opaque keyed bag of tool parameters. Only the keys the pipeline
/// inspects are modeled; everything else rides along in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolInput {
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub new_string: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ToolInput {
    /// The text being written: Write sends `content`, Edit sends `new_string`.
    pub fn written_text(&self) -> &str {
        self.content
            .as_deref()
            .or(self.new_string.as_deref())
            .unwrap_or("")
    }

    /// Target path normalized to forward slashes, lowercased for matching.
    pub fn path_lower(&self) -> String {
        self.file_path
            .as_deref()
            .unwrap_or("")
            .replace('\\', "/")
            .to_lowercase()
    }
}

/// One host event — the input to a single pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolEvent {
    #[serde(default)]
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: ToolInput,
    /// Tool output; hosts send either a plain string or structured JSON.
    #[serde(default)]
    pub tool_output: serde_json::Value,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub agent_role: Option<String>,
}

impl ToolEvent {
    pub fn tool_kind(&self) -> ToolKind {
        ToolKind::from_name(&self.tool_name)
    }

    /// Tool output as text. Non-string outputs are serialized; the
    /// classifier only peeks at the head, so size doesn't matter here.
    pub fn output_text(&self) -> String {
        match &self.tool_output {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// Truncate to `max_len` characters, appending "..." when cut.
/// Operates on char boundaries so multi-byte text never panics.
pub fn truncate_chars(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let head: String = text.chars().take(max_len.saturating_sub(3)).collect();
    format!("{head}...")
}

/// Human-readable one-line summary of a tool input for action records.
pub fn summarize_input(input: &ToolInput, max_len: usize) -> String {
    let mut parts = Vec::new();
    if let Some(path) = &input.file_path {
        parts.push(format!("file: {path}"));
    }
    if let Some(cmd) = &input.command {
        parts.push(format!("cmd: {cmd}"));
    }
    if let Some(query) = &input.query {
        parts.push(format!("query: {query}"));
    }
    if let Some(pattern) = &input.pattern {
        parts.push(format!("pattern: {pattern}"));
    }
    if let Some(url) = &input.url {
        parts.push(format!("url: {url}"));
    }
    if let Some(content) = &input.content {
        parts.push(format!("content: {}", truncate_chars(content, 100)));
    }
    if let Some(edit) = &input.new_string {
        parts.push(format!("edit: {}", truncate_chars(edit, 100)));
    }
    truncate_chars(&parts.join(" | "), max_len)
}

/// Summary of tool output keeping both the head and the tail for context.
pub fn summarize_output(output: &str, max_len: usize) -> String {
    let total = output.chars().count();
    if total <= max_len {
        return output.to_string();
    }
    let head_len = max_len * 7 / 10;
    let tail_len = max_len.saturating_sub(head_len + 5);
    let head: String = output.chars().take(head_len).collect();
    let tail: String = output.chars().skip(total - tail_len).collect();
    format!("{head} ... {tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_deserializes_with_all_fields_missing() {
        let event: ToolEvent = serde_json::from_str("{}").unwrap();
        assert_eq!(event.tool_name, "");
        assert!(event.session_id.is_empty());
        assert!(event.agent_role.is_none());
        assert_eq!(event.tool_kind(), ToolKind::Other);
    }

    #[test]
    fn unknown_input_keys_are_preserved_in_extra() {
        let event: ToolEvent = serde_json::from_str(
            r#"{"tool_name":"Write","tool_input":{"file_path":"a.md","encoding":"utf-8"}}"#,
        )
        .unwrap();
        assert_eq!(event.tool_input.file_path.as_deref(), Some("a.md"));
        assert!(event.tool_input.extra.contains_key("encoding"));
    }

    #[test]
    fn structured_output_becomes_text() {
        let event: ToolEvent =
            serde_json::from_str(r#"{"tool_output":{"lines":3,"ok":true}}"#).unwrap();
        assert!(event.output_text().contains("\"lines\":3"));
    }

    #[test]
    fn written_text_prefers_content_over_new_string() {
        let input = ToolInput {
            content: Some("whole file".to_string()),
            new_string: Some("patch".to_string()),
            ..Default::default()
        };
        assert_eq!(input.written_text(), "whole file");
    }

    #[test]
    fn path_lower_normalizes_separators() {
        let input = ToolInput {
            file_path: Some("Results\\FINDINGS.md".to_string()),
            ..Default::default()
        };
        assert_eq!(input.path_lower(), "results/findings.md");
    }

    #[test]
    fn tool_kind_write_class() {
        assert!(ToolKind::Write.is_write());
        assert!(ToolKind::Edit.is_write());
        assert!(!ToolKind::Read.is_write());
        assert!(!ToolKind::Bash.is_write());
    }

    #[test]
    fn input_summary_joins_known_fields() {
        let input = ToolInput {
            file_path: Some("src/train.py".to_string()),
            content: Some("model.fit(X, y)".to_string()),
            ..Default::default()
        };
        let summary = summarize_input(&input, 200);
        assert!(summary.starts_with("file: src/train.py | content: model.fit"));
    }

    #[test]
    fn output_summary_keeps_head_and_tail() {
        let long = "a".repeat(300) + "TAIL";
        let summary = summarize_output(&long, 100);
        assert!(summary.chars().count() <= 100);
        assert!(summary.contains(" ... "));
        assert!(summary.ends_with("TAIL"));
    }

    #[test]
    fn truncate_is_char_safe() {
        let text = "αβγδε".repeat(100);
        let cut = truncate_chars(&text, 10);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 10);
    }
}
