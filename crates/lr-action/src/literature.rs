// literature.rs — Literature-search detection.
//
// Four independent signals mark an invocation as a bibliographic search:
//   1. WebSearch whose query matches scientific-term patterns
//   2. WebFetch whose target is a known scholarly domain
//   3. Read whose output contains a DOI/PMID-shaped token
//   4. A tool whose own name looks like a literature tool (MCP servers)
//
// A hit produces a LiteratureSearch record the engine appends to the store
// *before* gate evaluation, so the very search that satisfies the
// literature gate counts within the same invocation.

use std::sync::LazyLock;

use regex::Regex;

use lr_store::{LiteratureSearch, SearchLayer};

use crate::event::{ToolEvent, ToolKind};
use crate::SUMMARY_MAX_CHARS;

/// Scholarly domains and bibliographic phrasing. One alternation keeps the
/// table greppable; additions go at the end.
static SCIENTIFIC_PATTERNS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)pubmed|biorxiv|medrxiv|arxiv|doi\.org|pmid|pmc\d|scholar\.google|semantic.?scholar|openalex|inspire-?hep|ieee.?xplore|scopus|ncbi\.nlm\.nih|nature\.com|science\.org|cell\.com|plos|springer|wiley|systematic.?review|meta.?analysis|prior.?art|literature.?search|bibliography",
    )
    .unwrap()
});

/// DOI/PMID-shaped tokens in read content.
static DOI_PMID_PATTERNS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)10\.\d{4,9}/\S+|PMID:\s*\d+|pubmed\.ncbi[^\s]*/\d+|doi\.org/10\.\d{4,9}")
        .unwrap()
});

/// Tool names that are literature tools in their own right.
static LITERATURE_TOOL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)pubmed|scholar|arxiv|biorxiv|literature|citation").unwrap());

/// Whether text matches the scientific-source/phrasing table.
pub fn is_scientific_text(text: &str) -> bool {
    !text.is_empty() && SCIENTIFIC_PATTERNS.is_match(text)
}

/// Whether text contains a DOI- or PMID-shaped token.
pub fn contains_doi_or_pmid(text: &str) -> bool {
    DOI_PMID_PATTERNS.is_match(text)
}

/// Extract the host name from a URL, without scheme, www. prefix, or port.
/// Hand-rolled: the inputs here are tool parameters, not adversarial URLs.
fn host_of(url: &str) -> String {
    let rest = url.split("://").nth(1).unwrap_or(url);
    let host = rest.split('/').next().unwrap_or("");
    let host = host.split(':').next().unwrap_or("");
    let host = host.strip_prefix("www.").unwrap_or(host);
    if host.is_empty() {
        "unknown".to_string()
    } else {
        host.to_string()
    }
}

fn truncate(text: &str) -> String {
    crate::event::truncate_chars(text, SUMMARY_MAX_CHARS)
}

/// Detect whether this invocation constitutes a literature search and
/// build the record for it. Returns `None` for everything else.
pub fn detect(event: &ToolEvent) -> Option<LiteratureSearch> {
    let session_id = &event.session_id;
    if session_id.is_empty() {
        return None;
    }

    match event.tool_kind() {
        ToolKind::WebSearch => {
            let query = event.tool_input.query.as_deref().unwrap_or("");
            if is_scientific_text(query) {
                return Some(LiteratureSearch::new(
                    session_id,
                    truncate(query),
                    vec!["websearch".to_string()],
                    SearchLayer::Websearch,
                ));
            }
        }
        ToolKind::WebFetch => {
            let url = event.tool_input.url.as_deref().unwrap_or("");
            if is_scientific_text(url) {
                return Some(LiteratureSearch::new(
                    session_id,
                    truncate(url),
                    vec![host_of(url)],
                    SearchLayer::Websearch,
                ));
            }
        }
        ToolKind::Read => {
            let output = event.output_text();
            if contains_doi_or_pmid(&output) {
                let path = event
                    .tool_input
                    .file_path
                    .as_deref()
                    .unwrap_or("unknown");
                return Some(LiteratureSearch::new(
                    session_id,
                    truncate(path),
                    vec!["local_paper".to_string()],
                    SearchLayer::Manual,
                ));
            }
        }
        _ => {}
    }

    // MCP-based literature tools, recognized by name alone.
    if LITERATURE_TOOL_NAME.is_match(&event.tool_name) {
        let query = serde_json::to_string(&event.tool_input).unwrap_or_default();
        return Some(LiteratureSearch::new(
            session_id,
            truncate(&query),
            vec![event.tool_name.to_lowercase()],
            SearchLayer::Mcp,
        ));
    }

    None
}
