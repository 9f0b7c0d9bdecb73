// sync.rs — Data-Sync Gate (DQ4).
//
// A findings document must report numbers that trace back to its
// companion structured-data source. The bar is deliberately lenient:
// some reported numbers are legitimately derived (deltas, percentages,
// rounded values), so the gate only fails when the large majority of
// significant numbers have no counterpart in the source.
//
// The thresholds and transforms are empirically chosen, so they live in
// SyncConfig rather than being hard-coded.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use lr_action::{ToolInput, ToolKind};

use crate::outcome::{GateId, GateOutcome};

/// Tunables for the sync check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Fail only when more than this fraction of significant numbers
    /// has no counterpart in the source.
    pub max_mismatch_ratio: f64,
    /// ... and at least this many mismatches exist.
    pub min_mismatches: usize,
    /// Absolute tolerance for number comparison.
    pub abs_tolerance: f64,
    /// Relative tolerance for number comparison.
    pub rel_tolerance: f64,
    /// Integers with absolute value at or below this are treated as
    /// formatting (section numbers, list indices) and ignored.
    pub small_int_threshold: i64,
    /// Cap on mismatches reported in the failure message.
    pub max_reported: usize,
    /// Whether percentage transforms (×100 / ÷100) count as matches.
    pub percent_transforms: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_mismatch_ratio: 0.7,
            min_mismatches: 3,
            abs_tolerance: 0.01,
            rel_tolerance: 0.01,
            small_int_threshold: 10,
            max_reported: 10,
            percent_transforms: true,
        }
    }
}

/// A significant number found in prose, with its surrounding context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumberToken {
    pub value: f64,
    pub context: String,
}

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+\.?\d*(?:[eE][+-]?\d+)?").unwrap());
static DATE_SHAPE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}-\d{2}-").unwrap());
static FINDINGS_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)finding|result").unwrap());

/// Evaluate the Data-Sync Gate for one invocation.
///
/// Returns `None` when the gate doesn't apply (not a findings-document
/// write). Applies to paths containing `FINDINGS` and ending in `.md`.
pub fn evaluate(tool: ToolKind, input: &ToolInput, config: &SyncConfig) -> Option<GateOutcome> {
    if !tool.is_write() {
        return None;
    }
    let path = input.file_path.as_deref()?;
    if !path.contains("FINDINGS") || !path.ends_with(".md") {
        return None;
    }

    let Some(json_path) = find_json_source(Path::new(path)) else {
        // No companion found — the gate is not enforceable here.
        return Some(GateOutcome::warn(
            GateId::Dq4,
            format!("No JSON source found for {path}. Sync check skipped."),
        ));
    };

    let raw = match std::fs::read_to_string(&json_path) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::warn!(path = %json_path.display(), error = %err, "cannot read JSON source");
            return Some(GateOutcome::warn(
                GateId::Dq4,
                format!("Cannot read JSON source {}. Sync check skipped.", json_path.display()),
            ));
        }
    };
    let json: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(json) => json,
        Err(err) => {
            tracing::warn!(path = %json_path.display(), error = %err, "malformed JSON source");
            return Some(GateOutcome::warn(
                GateId::Dq4,
                format!("Malformed JSON source {}. Sync check skipped.", json_path.display()),
            ));
        }
    };

    let prose = input.written_text();
    let tokens = extract_significant_numbers(prose, config);
    if tokens.is_empty() {
        return Some(
            GateOutcome::pass(GateId::Dq4).with_details(serde_json::json!({ "checked": 0 })),
        );
    }

    let mut source_numbers = Vec::new();
    flatten_numbers(&json, config, &mut source_numbers);

    let mismatches: Vec<&NumberToken> = tokens
        .iter()
        .filter(|token| {
            !source_numbers
                .iter()
                .any(|candidate| approx_match(token.value, *candidate, config))
        })
        .collect();

    let ratio = mismatches.len() as f64 / tokens.len() as f64;
    if ratio > config.max_mismatch_ratio && mismatches.len() >= config.min_mismatches {
        let reported: Vec<&NumberToken> =
            mismatches.iter().take(config.max_reported).copied().collect();
        let listing = reported
            .iter()
            .map(|m| format!("  {} in \"{}\"", m.value, m.context))
            .collect::<Vec<_>>()
            .join("\n");
        let message = format!(
            "GATE DQ4 FAIL: findings numbers do not match the JSON source.\n\
             {} mismatch(es) detected:\n{listing}\n\n\
             Fix the numbers in the findings document to match the JSON data, then retry.",
            mismatches.len()
        );
        return Some(
            GateOutcome::fail(GateId::Dq4, message).with_details(serde_json::json!({
                "checked": tokens.len(),
                "mismatches": reported,
                "source": json_path.display().to_string(),
            })),
        );
    }

    Some(
        GateOutcome::pass(GateId::Dq4).with_details(serde_json::json!({
            "checked": tokens.len(),
            "mismatches": mismatches.len(),
            "source": json_path.display().to_string(),
        })),
    )
}

/// Locate the companion JSON source for a findings document.
///
/// Search order:
///   1. Same directory, same base name with `.json` extension
///   2. `findings.json` / `results.json` / `data.json` in the same directory
///   3. Sibling `data/` directory, same base name
///   4. Parent's `04-results/` directory: a single JSON file, or one whose
///      name mentions findings/results
pub fn find_json_source(md_path: &Path) -> Option<PathBuf> {
    let dir = md_path.parent()?;
    let base = md_path.file_stem()?.to_str()?;

    let same_dir = dir.join(format!("{base}.json"));
    if same_dir.exists() {
        return Some(same_dir);
    }

    for name in ["findings.json", "results.json", "data.json"] {
        let candidate = dir.join(name);
        if candidate.exists() {
            return Some(candidate);
        }
    }

    let sibling = dir.join("data").join(format!("{base}.json"));
    if sibling.exists() {
        return Some(sibling);
    }

    let results_dir = dir.parent().map(|p| p.join("04-results"))?;
    if results_dir.is_dir() {
        let mut json_files: Vec<PathBuf> = std::fs::read_dir(&results_dir)
            .ok()?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        json_files.sort();
        if json_files.len() == 1 {
            return json_files.into_iter().next();
        }
        return json_files.into_iter().find(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| FINDINGS_NAME.is_match(name))
        });
    }

    None
}

/// Extract significant numbers from prose, with ±20 chars of context.
///
/// Skipped: numbers directly preceded by `#`, `-`, or another digit
/// (section markers, ranges, tails of larger tokens), integers at or
/// below the smallness threshold, and date-shaped neighborhoods.
pub fn extract_significant_numbers(text: &str, config: &SyncConfig) -> Vec<NumberToken> {
    let bytes = text.as_bytes();
    let mut results = Vec::new();

    for m in NUMBER.find_iter(text) {
        let Ok(value) = m.as_str().parse::<f64>() else {
            continue;
        };
        if !value.is_finite() {
            continue;
        }

        // Emulated lookbehind: (?<![#\d-])
        if m.start() > 0 {
            let prev = bytes[m.start() - 1];
            if prev == b'#' || prev == b'-' || prev.is_ascii_digit() {
                continue;
            }
        }

        // Small integers are list markers and section numbers.
        if value.fract() == 0.0 && value.abs() <= config.small_int_threshold as f64 {
            continue;
        }

        // Date-shaped neighborhood (2024-01-…).
        let window_start = m.start().saturating_sub(10);
        let window_end = (m.end() + 10).min(text.len());
        let window = slice_at_char_boundaries(text, window_start, window_end);
        if DATE_SHAPE.is_match(window) {
            continue;
        }

        let ctx_start = m.start().saturating_sub(20);
        let ctx_end = (m.end() + 20).min(text.len());
        let context = slice_at_char_boundaries(text, ctx_start, ctx_end)
            .replace('\n', " ")
            .trim()
            .to_string();

        results.push(NumberToken { value, context });
    }

    results
}

/// Slice on the nearest char boundaries at or inside [start, end].
fn slice_at_char_boundaries(text: &str, mut start: usize, mut end: usize) -> &str {
    while start < text.len() && !text.is_char_boundary(start) {
        start += 1;
    }
    while end > start && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[start..end]
}

/// Recursively collect every numeric value from a JSON structure, plus
/// its common representational variants: rounded to 2 and 3 decimals,
/// and (when enabled) the percentage transforms — ×100 for proportions
/// in [0, 1] and ÷100 for percentage-scaled values in [1, 100].
pub fn flatten_numbers(value: &serde_json::Value, config: &SyncConfig, out: &mut Vec<f64>) {
    match value {
        serde_json::Value::Number(n) => {
            if let Some(v) = n.as_f64() {
                if v.is_finite() {
                    out.push(v);
                    out.push((v * 100.0).round() / 100.0);
                    out.push((v * 1000.0).round() / 1000.0);
                    if config.percent_transforms {
                        if (0.0..=1.0).contains(&v) {
                            out.push(v * 100.0);
                        }
                        if (1.0..=100.0).contains(&v) {
                            out.push(v / 100.0);
                        }
                    }
                }
            }
        }
        serde_json::Value::String(s) => {
            // Quoted numbers in the source still count.
            if let Ok(v) = s.trim().parse::<f64>() {
                if v.is_finite() {
                    out.push(v);
                }
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                flatten_numbers(item, config, out);
            }
        }
        serde_json::Value::Object(map) => {
            for item in map.values() {
                flatten_numbers(item, config, out);
            }
        }
        serde_json::Value::Bool(_) | serde_json::Value::Null => {}
    }
}

/// Combined absolute/relative tolerance comparison.
pub fn approx_match(a: f64, b: f64, config: &SyncConfig) -> bool {
    if a == b {
        return true;
    }
    let diff = (a - b).abs();
    if diff < config.abs_tolerance {
        return true;
    }
    let max_abs = a.abs().max(b.abs());
    max_abs > 0.0 && diff / max_abs < config.rel_tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn cfg() -> SyncConfig {
        SyncConfig::default()
    }

    fn findings_input(path: &str, content: &str) -> ToolInput {
        ToolInput {
            file_path: Some(path.to_string()),
            content: Some(content.to_string()),
            ..Default::default()
        }
    }

    // ── Number extraction ────────────────────────────────────────

    #[test]
    fn extracts_decimals_with_context() {
        let tokens =
            extract_significant_numbers("The model reached an AUC of 0.853 on held-out data.", &cfg());
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].value, 0.853);
        assert!(tokens[0].context.contains("AUC of 0.853"));
    }

    #[test]
    fn skips_small_integers_and_section_markers() {
        let tokens = extract_significant_numbers("## 2. Results\n1. first item\n3 runs total", &cfg());
        assert!(tokens.is_empty());
    }

    #[test]
    fn keeps_large_integers() {
        let tokens = extract_significant_numbers("We processed 1542 samples.", &cfg());
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].value, 1542.0);
    }

    #[test]
    fn skips_date_shaped_numbers() {
        let tokens = extract_significant_numbers("Collected on 2024-03-18 at the site.", &cfg());
        assert!(tokens.is_empty());
    }

    #[test]
    fn skips_range_tails() {
        // "12-45": the 45 is directly preceded by '-', a range tail.
        let tokens = extract_significant_numbers("ages 12-45 included", &cfg());
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].value, 12.0);
    }

    #[test]
    fn scientific_notation_is_parsed() {
        let tokens = extract_significant_numbers("p-value of 3.2e-5 overall", &cfg());
        assert_eq!(tokens.len(), 1);
        assert!((tokens[0].value - 3.2e-5).abs() < 1e-12);
    }

    // ── Flattening and matching ──────────────────────────────────

    #[test]
    fn flatten_includes_rounded_variants() {
        let mut out = Vec::new();
        flatten_numbers(&serde_json::json!({"auc": 0.85314}), &cfg(), &mut out);
        assert!(out.iter().any(|v| (*v - 0.85314).abs() < 1e-12));
        assert!(out.iter().any(|v| (*v - 0.85).abs() < 1e-12));
        assert!(out.iter().any(|v| (*v - 0.853).abs() < 1e-12));
    }

    #[test]
    fn flatten_parses_quoted_numbers() {
        let mut out = Vec::new();
        flatten_numbers(&serde_json::json!({"n": "1542"}), &cfg(), &mut out);
        assert!(out.contains(&1542.0));
    }

    #[test]
    fn percentage_transform_scales_both_ways() {
        // Prose says 0.853, source holds the percentage-scaled 85.3.
        let mut out = Vec::new();
        flatten_numbers(&serde_json::json!({"auc_pct": 85.3}), &cfg(), &mut out);
        assert!(out.iter().any(|v| approx_match(0.853, *v, &cfg())));

        // And the other way: prose says 85.3, source holds 0.853.
        let mut out = Vec::new();
        flatten_numbers(&serde_json::json!({"auc": 0.853}), &cfg(), &mut out);
        assert!(out.iter().any(|v| approx_match(85.3, *v, &cfg())));
    }

    #[test]
    fn approx_match_tolerances() {
        let config = cfg();
        assert!(approx_match(1.0, 1.0, &config));
        assert!(approx_match(0.853, 0.8531, &config)); // abs < 0.01
        assert!(approx_match(1000.0, 1005.0, &config)); // rel < 1%
        assert!(!approx_match(1000.0, 1100.0, &config));
        assert!(!approx_match(0.1, 0.5, &config));
    }

    // ── Companion search ─────────────────────────────────────────

    #[test]
    fn companion_same_basename_wins() {
        let dir = tempdir().unwrap();
        let md = dir.path().join("FINDINGS.md");
        fs::write(&md, "x").unwrap();
        fs::write(dir.path().join("FINDINGS.json"), "{}").unwrap();
        fs::write(dir.path().join("results.json"), "{}").unwrap();

        assert_eq!(find_json_source(&md).unwrap(), dir.path().join("FINDINGS.json"));
    }

    #[test]
    fn companion_falls_back_to_conventional_names() {
        let dir = tempdir().unwrap();
        let md = dir.path().join("FINDINGS.md");
        fs::write(&md, "x").unwrap();
        fs::write(dir.path().join("results.json"), "{}").unwrap();

        assert_eq!(find_json_source(&md).unwrap(), dir.path().join("results.json"));
    }

    #[test]
    fn companion_found_in_sibling_data_dir() {
        let dir = tempdir().unwrap();
        let md = dir.path().join("FINDINGS.md");
        fs::write(&md, "x").unwrap();
        fs::create_dir(dir.path().join("data")).unwrap();
        fs::write(dir.path().join("data").join("FINDINGS.json"), "{}").unwrap();

        assert_eq!(
            find_json_source(&md).unwrap(),
            dir.path().join("data").join("FINDINGS.json")
        );
    }

    #[test]
    fn companion_found_in_parent_results_dir() {
        let dir = tempdir().unwrap();
        let docs = dir.path().join("docs");
        fs::create_dir(&docs).unwrap();
        let md = docs.join("FINDINGS.md");
        fs::write(&md, "x").unwrap();
        let results = dir.path().join("04-results");
        fs::create_dir(&results).unwrap();
        fs::write(results.join("run-findings.json"), "{}").unwrap();
        fs::write(results.join("config.json"), "{}").unwrap();

        assert_eq!(find_json_source(&md).unwrap(), results.join("run-findings.json"));
    }

    #[test]
    fn no_companion_is_none() {
        let dir = tempdir().unwrap();
        let md = dir.path().join("FINDINGS.md");
        fs::write(&md, "x").unwrap();
        assert!(find_json_source(&md).is_none());
    }

    // ── Gate evaluation ──────────────────────────────────────────

    #[test]
    fn gate_skips_non_findings_writes() {
        assert!(evaluate(ToolKind::Write, &findings_input("notes.md", "0.99"), &cfg()).is_none());
        assert!(evaluate(ToolKind::Read, &findings_input("FINDINGS.md", ""), &cfg()).is_none());
    }

    #[test]
    fn gate_warns_without_companion() {
        let dir = tempdir().unwrap();
        let md = dir.path().join("FINDINGS.md");
        let outcome = evaluate(
            ToolKind::Write,
            &findings_input(md.to_str().unwrap(), "AUC 0.99"),
            &cfg(),
        )
        .unwrap();
        assert_eq!(outcome.status, lr_store::GateStatus::Warn);
    }

    #[test]
    fn verbatim_numbers_round_trip_passes() {
        let dir = tempdir().unwrap();
        let md = dir.path().join("FINDINGS.md");
        fs::write(
            dir.path().join("FINDINGS.json"),
            r#"{"auc": 0.853, "n_samples": 1542, "f1": 0.77}"#,
        )
        .unwrap();

        let prose = "AUC was 0.853 across 1542 samples with F1 of 0.77.";
        let outcome = evaluate(
            ToolKind::Write,
            &findings_input(md.to_str().unwrap(), prose),
            &cfg(),
        )
        .unwrap();
        assert_eq!(outcome.status, lr_store::GateStatus::Pass);
    }

    #[test]
    fn fabricated_numbers_fail() {
        let dir = tempdir().unwrap();
        let md = dir.path().join("FINDINGS.md");
        fs::write(dir.path().join("FINDINGS.json"), r#"{"auc": 0.853}"#).unwrap();

        let prose = "Accuracy 99.9, recall 88.8, precision 77.7, N = 123456.";
        let outcome = evaluate(
            ToolKind::Write,
            &findings_input(md.to_str().unwrap(), prose),
            &cfg(),
        )
        .unwrap();
        assert!(outcome.is_fail());
        let message = outcome.message.unwrap();
        assert!(message.contains("GATE DQ4 FAIL"));
        assert!(message.contains("mismatch"));
    }

    #[test]
    fn minority_of_derived_numbers_is_tolerated() {
        let dir = tempdir().unwrap();
        let md = dir.path().join("FINDINGS.md");
        fs::write(
            dir.path().join("FINDINGS.json"),
            r#"{"auc": 0.853, "n": 1542, "f1": 0.77, "recall": 0.81}"#,
        )
        .unwrap();

        // Four source numbers plus one derived value: ratio 0.2, below the bar.
        let prose = "AUC 0.853, N 1542, F1 0.77, recall 0.81, and a derived gap of 43.7.";
        let outcome = evaluate(
            ToolKind::Write,
            &findings_input(md.to_str().unwrap(), prose),
            &cfg(),
        )
        .unwrap();
        assert_eq!(outcome.status, lr_store::GateStatus::Pass);
    }

    #[test]
    fn malformed_companion_warns_instead_of_failing() {
        let dir = tempdir().unwrap();
        let md = dir.path().join("FINDINGS.md");
        fs::write(dir.path().join("FINDINGS.json"), "{not json").unwrap();

        let outcome = evaluate(
            ToolKind::Write,
            &findings_input(md.to_str().unwrap(), "value 12.34"),
            &cfg(),
        )
        .unwrap();
        assert_eq!(outcome.status, lr_store::GateStatus::Warn);
    }
}
