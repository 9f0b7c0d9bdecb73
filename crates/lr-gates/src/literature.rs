// literature.rs — Literature Gate (L-1+).
//
// Before a research-direction artifact can be created, at least one
// bibliographic search must be on record for the session. The gate only
// needs an existence count; the detector in lr-action is responsible for
// getting searches onto the record in the first place (including the one
// happening in this very invocation — it is appended before gates run).

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use lr_action::{ToolInput, ToolKind};
use lr_store::Store;

use crate::outcome::{GateId, GateOutcome};

static DIRECTION_CONTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)##\s*research\s+direction|"node_type"\s*:\s*"direction"|node_type:\s*direction"#)
        .unwrap()
});

/// Whether a write creates a research-direction artifact.
///
/// Path conventions: a `direction` file with a document extension, or
/// anything under an `01-direction*` directory. Content markers: a
/// direction heading or a structural `node_type: direction` declaration.
pub fn is_direction_node(input: &ToolInput) -> bool {
    let path = input.path_lower();

    if path.contains("direction") && (path.ends_with(".md") || path.ends_with(".json")) {
        return true;
    }
    if path.contains("01-direction") {
        return true;
    }

    DIRECTION_CONTENT.is_match(input.written_text())
}

/// Evaluate the Literature Gate for one invocation.
///
/// Applies only when the invocation creates a direction node. Requires
/// one recorded literature search in the session; store unavailability
/// degrades to pass-with-warning.
pub fn evaluate(
    store: &Store,
    project_root: &Path,
    session_id: &str,
    tool: ToolKind,
    input: &ToolInput,
) -> Option<GateOutcome> {
    if !tool.is_write() || !is_direction_node(input) {
        return None;
    }
    if session_id.is_empty() {
        // Can't attribute history without a session; nothing to enforce.
        return None;
    }

    let count = match store.literature_search_count(session_id) {
        Ok(count) => count,
        Err(err) => {
            tracing::warn!(session_id, error = %err, "store unavailable, literature gate skipped");
            return Some(GateOutcome::warn(
                GateId::Literature,
                "Store unavailable — literature gate check skipped.",
            ));
        }
    };

    if count > 0 {
        return Some(
            GateOutcome::pass(GateId::Literature)
                .with_details(serde_json::json!({ "searches": count })),
        );
    }

    let message = format!(
        "GATE L-1+ FAIL: No literature search recorded for this session.\n\
         You must perform a bibliographic search before defining a research direction.\n\
         {}\
         Acceptable modalities: WebSearch with scientific terms, an MCP literature \
         server, or explicit paper reading (DOI/PMID). Run one, then retry.",
        domain_hint(project_root)
    );
    Some(GateOutcome::fail(GateId::Literature, message))
}

/// Load the optional domain-hint document for a friendlier failure
/// message. Looked up at `.labrail/domain.json`, then `domain.json`,
/// under the project root. Any problem falls back to a generic tip.
fn domain_hint(project_root: &Path) -> String {
    for candidate in [
        project_root.join(".labrail").join("domain.json"),
        project_root.join("domain.json"),
    ] {
        let Ok(raw) = std::fs::read_to_string(&candidate) else {
            continue;
        };
        let Ok(config) = serde_json::from_str::<serde_json::Value>(&raw) else {
            continue;
        };
        if let Some(primary) = config["literature"]["primary"].as_array() {
            let sources: Vec<&str> = primary.iter().filter_map(|v| v.as_str()).collect();
            if !sources.is_empty() {
                let domain = config["domain"].as_str().unwrap_or("unknown");
                return format!(
                    "Recommended sources for domain \"{domain}\": {}.\n",
                    sources.join(", ")
                );
            }
        }
    }
    "Tip: use WebSearch with domain-specific terms, or query a literature database.\n".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lr_store::{LiteratureSearch, SearchLayer};
    use tempfile::tempdir;

    fn direction_write() -> ToolInput {
        ToolInput {
            file_path: Some("01-directions/direction-03.md".to_string()),
            content: Some("## Research Direction\nInvestigate tau kinetics.".to_string()),
            ..Default::default()
        }
    }

    // ── Direction-node detection ─────────────────────────────────

    #[test]
    fn direction_paths_are_detected() {
        assert!(is_direction_node(&ToolInput {
            file_path: Some("01-directions/new.md".to_string()),
            ..Default::default()
        }));
        assert!(is_direction_node(&ToolInput {
            file_path: Some("notes/direction-2.json".to_string()),
            ..Default::default()
        }));
        // Document extensions only — a direction.py script is not a node.
        assert!(!is_direction_node(&ToolInput {
            file_path: Some("src/direction.py".to_string()),
            ..Default::default()
        }));
    }

    #[test]
    fn direction_content_markers_are_detected() {
        assert!(is_direction_node(&ToolInput {
            file_path: Some("notes.md".to_string()),
            content: Some("## Research Direction\n...".to_string()),
            ..Default::default()
        }));
        assert!(is_direction_node(&ToolInput {
            file_path: Some("tree.json".to_string()),
            content: Some(r#"{"node_type": "direction", "title": "x"}"#.to_string()),
            ..Default::default()
        }));
        assert!(!is_direction_node(&ToolInput {
            file_path: Some("notes.md".to_string()),
            content: Some("## Results so far".to_string()),
            ..Default::default()
        }));
    }

    // ── Gate evaluation ──────────────────────────────────────────

    #[test]
    fn blocks_direction_without_prior_search() {
        let dir = tempdir().unwrap();
        let store = Store::in_memory().unwrap();

        let outcome = evaluate(&store, dir.path(), "s1", ToolKind::Write, &direction_write())
            .unwrap();
        assert!(outcome.is_fail());
        let message = outcome.message.unwrap();
        assert!(message.contains("GATE L-1+ FAIL"));
        assert!(message.contains("WebSearch"));
    }

    #[test]
    fn passes_once_a_search_is_on_record() {
        let dir = tempdir().unwrap();
        let store = Store::in_memory().unwrap();
        store
            .insert_literature_search(&LiteratureSearch::new(
                "s1",
                "tau propagation review",
                vec!["websearch".to_string()],
                SearchLayer::Websearch,
            ))
            .unwrap();

        let outcome = evaluate(&store, dir.path(), "s1", ToolKind::Write, &direction_write())
            .unwrap();
        assert_eq!(outcome.status, lr_store::GateStatus::Pass);
    }

    #[test]
    fn searches_in_other_sessions_do_not_count() {
        let dir = tempdir().unwrap();
        let store = Store::in_memory().unwrap();
        store
            .insert_literature_search(&LiteratureSearch::new(
                "other-session",
                "q",
                vec![],
                SearchLayer::Mcp,
            ))
            .unwrap();

        let outcome = evaluate(&store, dir.path(), "s1", ToolKind::Write, &direction_write())
            .unwrap();
        assert!(outcome.is_fail());
    }

    #[test]
    fn gate_skips_non_direction_writes() {
        let dir = tempdir().unwrap();
        let store = Store::in_memory().unwrap();
        assert!(evaluate(
            &store,
            dir.path(),
            "s1",
            ToolKind::Write,
            &ToolInput {
                file_path: Some("src/analysis.py".to_string()),
                ..Default::default()
            }
        )
        .is_none());
        assert!(evaluate(&store, dir.path(), "s1", ToolKind::Read, &direction_write()).is_none());
    }

    #[test]
    fn domain_hint_enriches_the_failure_message() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".labrail")).unwrap();
        std::fs::write(
            dir.path().join(".labrail").join("domain.json"),
            r#"{"domain": "neurodegeneration", "literature": {"primary": ["PubMed", "bioRxiv"]}}"#,
        )
        .unwrap();
        let store = Store::in_memory().unwrap();

        let outcome = evaluate(&store, dir.path(), "s1", ToolKind::Write, &direction_write())
            .unwrap();
        let message = outcome.message.unwrap();
        assert!(message.contains("neurodegeneration"));
        assert!(message.contains("PubMed, bioRxiv"));
    }
}
