// observer.rs — Periodic health checks.
//
// Triggered when the session's action count is a positive multiple of the
// configured interval. Five independent heuristics, each producing zero
// or more alerts:
//
//   1. Stale STATE.md          — WARN past a threshold, HALT past 3×
//   2. Findings/JSON desync    — document mtime ahead of its source
//   3. Orphaned data files     — data never referenced by code or docs
//   4. Design-execution drift  — declared phase vs dominant action type
//   5. Literature staleness    — many actions, zero recorded searches
//
// Every alert is persisted individually: one failed insert is isolated
// to that insert and never aborts the rest of the batch.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::SystemTime;

use regex::Regex;
use serde::{Deserialize, Serialize};

use lr_gates::find_json_source;
use lr_store::{Alert, AlertLevel, Store};

use crate::phase;

static FINDINGS_DOC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)FINDINGS.*\.md$").unwrap());
static DATA_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(csv|tsv|parquet|h5|hdf5|json|xlsx)$").unwrap());
static CODE_FILE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\.(py|r|jl|ipynb)$").unwrap());
static DOC_FILE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\.(md|yaml|yml)$").unwrap());

/// Tunables for the observer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserverConfig {
    /// Run the checks every N actions.
    pub interval: u64,
    /// STATE.md age (hours) that triggers a WARN; 3× triggers a HALT.
    pub state_stale_hours: f64,
    /// Minutes a findings document may lead its JSON source before WARN.
    pub desync_margin_min: f64,
    /// More than this many unreferenced data files triggers a WARN.
    pub orphan_threshold: usize,
    /// Actions without a single literature search before WARN.
    pub lit_staleness_actions: u64,
    /// How many grouped action types to consider for phase drift.
    pub recent_action_types: usize,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            interval: 10,
            state_stale_hours: 24.0,
            desync_margin_min: 30.0,
            orphan_threshold: 3,
            lit_staleness_actions: 30,
            recent_action_types: 5,
        }
    }
}

/// What one observer pass produced.
#[derive(Debug, Clone, Default)]
pub struct ObserverOutcome {
    /// Whether the checks actually ran this invocation.
    pub triggered: bool,
    pub alerts: Vec<Alert>,
    /// The first HALT-level alert, when one was raised.
    pub halt: Option<Alert>,
}

/// Run the observer if this invocation lands on the sampling interval.
///
/// Alerts are persisted before the outcome is returned, so a HALT that
/// blocks the run is already on record for the next session to explain
/// the stop.
pub fn run_if_due(
    store: &Store,
    project_root: &Path,
    session_id: &str,
    config: &ObserverConfig,
) -> ObserverOutcome {
    if session_id.is_empty() || config.interval == 0 {
        return ObserverOutcome::default();
    }

    let count = match store.action_count(session_id) {
        Ok(count) => count,
        Err(err) => {
            tracing::warn!(error = %err, "cannot read action count, observer skipped");
            return ObserverOutcome::default();
        }
    };
    if count == 0 || count % config.interval != 0 {
        return ObserverOutcome::default();
    }

    let alerts = run_checks(store, project_root, session_id, config);

    for alert in &alerts {
        // Per-insert isolation: one failed write never drops the batch.
        if let Err(err) = store.insert_alert(alert) {
            tracing::warn!(error = %err, level = %alert.level, "failed to persist observer alert");
        }
    }

    let halt = alerts
        .iter()
        .find(|alert| alert.level == AlertLevel::Halt)
        .cloned();

    ObserverOutcome {
        triggered: true,
        alerts,
        halt,
    }
}

/// Run all five heuristics unconditionally. Exposed separately so the
/// sampling rule and the checks can be tested independently.
pub fn run_checks(
    store: &Store,
    project_root: &Path,
    session_id: &str,
    config: &ObserverConfig,
) -> Vec<Alert> {
    let project = project_root.display().to_string();
    let mut alerts = Vec::new();

    check_state_staleness(project_root, &project, config, &mut alerts);
    check_findings_desync(project_root, &project, config, &mut alerts);
    check_orphaned_data(project_root, &project, config, &mut alerts);
    check_phase_drift(store, project_root, &project, session_id, config, &mut alerts);
    check_literature_staleness(store, &project, session_id, config, &mut alerts);

    alerts
}

// ── Check 1: STATE.md staleness ──────────────────────────────────

fn state_file(project_root: &Path) -> Option<PathBuf> {
    [
        project_root.join(".labrail").join("STATE.md"),
        project_root.join("STATE.md"),
    ]
    .into_iter()
    .find(|path| path.exists())
}

fn check_state_staleness(
    project_root: &Path,
    project: &str,
    config: &ObserverConfig,
    alerts: &mut Vec<Alert>,
) {
    let Some(path) = state_file(project_root) else {
        return;
    };
    let Some(age_hours) = file_age_hours(&path) else {
        return;
    };

    if age_hours > config.state_stale_hours * 3.0 {
        alerts.push(Alert::new(
            project,
            AlertLevel::Halt,
            format!(
                "STATE.md has not been updated in {} hours (>{:.0}h limit). The project state \
                 is severely stale. Update STATE.md before continuing.",
                age_hours.round(),
                config.state_stale_hours * 3.0
            ),
        ));
    } else if age_hours > config.state_stale_hours {
        alerts.push(Alert::new(
            project,
            AlertLevel::Warn,
            format!(
                "STATE.md has not been updated in {} hours. Consider updating it to reflect \
                 current progress.",
                age_hours.round()
            ),
        ));
    }
}

// ── Check 2: findings/JSON desync ────────────────────────────────

fn check_findings_desync(
    project_root: &Path,
    project: &str,
    config: &ObserverConfig,
    alerts: &mut Vec<Alert>,
) {
    for findings in find_files_matching(project_root, &FINDINGS_DOC, 3) {
        let Some(json_path) = find_json_source(&findings) else {
            continue;
        };
        let (Some(doc_mtime), Some(json_mtime)) = (mtime(&findings), mtime(&json_path)) else {
            continue;
        };
        let Ok(lead) = doc_mtime.duration_since(json_mtime) else {
            continue; // source is newer, nothing to flag
        };
        let lead_min = lead.as_secs_f64() / 60.0;
        if lead_min > config.desync_margin_min {
            alerts.push(Alert::new(
                project,
                AlertLevel::Warn,
                format!(
                    "{} is {} minutes newer than its JSON source ({}). Possible desync — verify \
                     the numbers still match.",
                    file_name(&findings),
                    lead_min.round(),
                    file_name(&json_path),
                ),
            ));
        }
    }
}

// ── Check 3: orphaned data files ─────────────────────────────────

fn check_orphaned_data(
    project_root: &Path,
    project: &str,
    config: &ObserverConfig,
    alerts: &mut Vec<Alert>,
) {
    let data_dir = project_root.join("02-data");
    let Ok(entries) = std::fs::read_dir(&data_dir) else {
        return;
    };
    let data_files: Vec<String> = entries
        .flatten()
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| DATA_FILE.is_match(name))
        .collect();
    if data_files.is_empty() {
        return;
    }

    let mut referencing = String::new();
    let mut sources = find_files_matching(project_root, &CODE_FILE, 5);
    sources.extend(find_files_matching(project_root, &DOC_FILE, 3));
    for source in sources {
        if let Ok(content) = std::fs::read_to_string(&source) {
            referencing.push_str(&content);
            referencing.push('\n');
        }
    }

    let orphaned: Vec<&String> = data_files
        .iter()
        .filter(|name| !referencing.contains(name.as_str()))
        .collect();

    if orphaned.len() > config.orphan_threshold {
        let sample: Vec<&str> = orphaned.iter().take(5).map(|s| s.as_str()).collect();
        let ellipsis = if orphaned.len() > 5 { "..." } else { "" };
        alerts.push(Alert::new(
            project,
            AlertLevel::Warn,
            format!(
                "{} data files in 02-data/ are not referenced by any code or docs: {}{ellipsis}. \
                 Clean them up or document them.",
                orphaned.len(),
                sample.join(", "),
            ),
        ));
    }
}

// ── Check 4: design-execution drift ──────────────────────────────

fn check_phase_drift(
    store: &Store,
    project_root: &Path,
    project: &str,
    session_id: &str,
    config: &ObserverConfig,
    alerts: &mut Vec<Alert>,
) {
    let Some(state_path) = state_file(project_root) else {
        return;
    };
    let Ok(state_content) = std::fs::read_to_string(&state_path) else {
        return;
    };
    let Some(declared) = phase::extract_phase(&state_content) else {
        return;
    };
    let recent = match store.action_type_counts(session_id, config.recent_action_types) {
        Ok(recent) => recent,
        Err(err) => {
            tracing::warn!(error = %err, "cannot read action types, drift check skipped");
            return;
        }
    };
    if let Some(message) = phase::detect_drift(&declared, &recent) {
        alerts.push(Alert::new(project, AlertLevel::Warn, message));
    }
}

// ── Check 5: literature staleness ────────────────────────────────

fn check_literature_staleness(
    store: &Store,
    project: &str,
    session_id: &str,
    config: &ObserverConfig,
    alerts: &mut Vec<Alert>,
) {
    let actions = match store.action_count(session_id) {
        Ok(actions) => actions,
        Err(_) => return,
    };
    let searches = match store.literature_search_count(session_id) {
        Ok(searches) => searches,
        Err(_) => return,
    };

    if actions >= config.lit_staleness_actions && searches == 0 {
        alerts.push(Alert::new(
            project,
            AlertLevel::Warn,
            format!(
                "No literature searches in {actions} actions. Stale knowledge risk — search \
                 for recent relevant papers.",
            ),
        ));
    }
}

// ── Filesystem helpers ───────────────────────────────────────────

/// Bounded-depth walk collecting files whose names match the pattern.
/// Hidden directories (except .labrail), build trees, and caches are
/// skipped.
fn find_files_matching(root: &Path, pattern: &Regex, max_depth: usize) -> Vec<PathBuf> {
    let mut results = Vec::new();
    walk(root, pattern, 0, max_depth, &mut results);
    results
}

fn walk(dir: &Path, pattern: &Regex, depth: usize, max_depth: usize, results: &mut Vec<PathBuf>) {
    if depth > max_depth {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if path.is_dir() {
            if name.starts_with('.') && name != ".labrail" {
                continue;
            }
            if matches!(name, "node_modules" | "__pycache__" | "target") {
                continue;
            }
            walk(&path, pattern, depth + 1, max_depth, results);
        } else if pattern.is_match(name) {
            results.push(path);
        }
    }
}

fn mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

fn file_age_hours(path: &Path) -> Option<f64> {
    let modified = mtime(path)?;
    let age = SystemTime::now().duration_since(modified).ok()?;
    Some(age.as_secs_f64() / 3600.0)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("?")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lr_store::ActionRecord;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    fn add_actions(store: &Store, session: &str, action_type: &str, n: usize) {
        for _ in 0..n {
            store
                .insert_action(&ActionRecord::new(session, action_type, "Bash"))
                .unwrap();
        }
    }

    // ── Sampling rule ────────────────────────────────────────────

    #[test]
    fn observer_only_runs_on_interval_multiples() {
        let dir = tempdir().unwrap();
        let store = Store::in_memory().unwrap();
        let config = ObserverConfig::default();

        add_actions(&store, "s1", "SEARCH", 7);
        assert!(!run_if_due(&store, dir.path(), "s1", &config).triggered);

        add_actions(&store, "s1", "SEARCH", 3); // now 10
        assert!(run_if_due(&store, dir.path(), "s1", &config).triggered);
    }

    #[test]
    fn observer_skips_empty_sessions() {
        let dir = tempdir().unwrap();
        let store = Store::in_memory().unwrap();
        let outcome = run_if_due(&store, dir.path(), "s1", &ObserverConfig::default());
        assert!(!outcome.triggered);
        assert!(outcome.alerts.is_empty());
    }

    // ── Check 1: staleness ───────────────────────────────────────

    #[test]
    fn stale_state_escalates_to_halt() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("STATE.md"), "## Phase: EXPLORATION\n").unwrap();
        std::thread::sleep(Duration::from_millis(30));

        let store = Store::in_memory().unwrap();
        // Zero threshold: any age is past 3× the limit.
        let config = ObserverConfig {
            state_stale_hours: 0.0,
            ..Default::default()
        };
        let alerts = run_checks(&store, dir.path(), "s1", &config);
        let halt = alerts.iter().find(|a| a.level == AlertLevel::Halt);
        assert!(halt.is_some());
        assert!(halt.unwrap().message.contains("STATE.md"));
    }

    #[test]
    fn fresh_state_raises_nothing() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("STATE.md"), "## Phase: EXPLORATION\n").unwrap();

        let store = Store::in_memory().unwrap();
        let alerts = run_checks(&store, dir.path(), "s1", &ObserverConfig::default());
        assert!(alerts.iter().all(|a| !a.message.contains("not been updated")));
    }

    // ── Check 2: desync ──────────────────────────────────────────

    #[test]
    fn findings_newer_than_source_warns() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("FINDINGS.json"), "{}").unwrap();
        std::thread::sleep(Duration::from_millis(30));
        fs::write(dir.path().join("FINDINGS.md"), "# findings").unwrap();

        let store = Store::in_memory().unwrap();
        let config = ObserverConfig {
            desync_margin_min: 0.0,
            ..Default::default()
        };
        let alerts = run_checks(&store, dir.path(), "s1", &config);
        assert!(alerts.iter().any(|a| a.message.contains("newer than its JSON source")));
    }

    #[test]
    fn source_newer_than_findings_is_fine() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("FINDINGS.md"), "# findings").unwrap();
        std::thread::sleep(Duration::from_millis(30));
        fs::write(dir.path().join("FINDINGS.json"), "{}").unwrap();

        let store = Store::in_memory().unwrap();
        let config = ObserverConfig {
            desync_margin_min: 0.0,
            ..Default::default()
        };
        let alerts = run_checks(&store, dir.path(), "s1", &config);
        assert!(alerts.iter().all(|a| !a.message.contains("newer than its JSON source")));
    }

    // ── Check 3: orphans ─────────────────────────────────────────

    #[test]
    fn unreferenced_data_files_warn_past_threshold() {
        let dir = tempdir().unwrap();
        let data = dir.path().join("02-data");
        fs::create_dir(&data).unwrap();
        for i in 0..5 {
            fs::write(data.join(format!("orphan-{i}.csv")), "a,b\n").unwrap();
        }
        // One referenced file.
        fs::write(data.join("used.csv"), "a,b\n").unwrap();
        fs::write(dir.path().join("analysis.py"), "load('02-data/used.csv')").unwrap();

        let store = Store::in_memory().unwrap();
        let alerts = run_checks(&store, dir.path(), "s1", &ObserverConfig::default());
        let orphan_alert = alerts.iter().find(|a| a.message.contains("not referenced"));
        assert!(orphan_alert.is_some());
        assert!(orphan_alert.unwrap().message.contains("5 data files"));
    }

    #[test]
    fn referenced_data_raises_nothing() {
        let dir = tempdir().unwrap();
        let data = dir.path().join("02-data");
        fs::create_dir(&data).unwrap();
        fs::write(data.join("cohort.csv"), "a,b\n").unwrap();
        fs::write(dir.path().join("analysis.py"), "pd.read_csv('02-data/cohort.csv')").unwrap();

        let store = Store::in_memory().unwrap();
        let alerts = run_checks(&store, dir.path(), "s1", &ObserverConfig::default());
        assert!(alerts.iter().all(|a| !a.message.contains("not referenced")));
    }

    // ── Check 4: phase drift ─────────────────────────────────────

    #[test]
    fn phase_drift_warns_on_unexpected_majority() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("STATE.md"), "## Phase: WRITING\n").unwrap();

        let store = Store::in_memory().unwrap();
        add_actions(&store, "s1", "MODEL_TRAIN", 8);
        add_actions(&store, "s1", "SEARCH", 2);

        let alerts = run_checks(&store, dir.path(), "s1", &ObserverConfig::default());
        assert!(alerts.iter().any(|a| a.message.contains("Design-execution drift")));
    }

    #[test]
    fn aligned_phase_raises_nothing() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("STATE.md"), "## Phase: TRAINING\n").unwrap();

        let store = Store::in_memory().unwrap();
        add_actions(&store, "s1", "MODEL_TRAIN", 8);

        let alerts = run_checks(&store, dir.path(), "s1", &ObserverConfig::default());
        assert!(alerts.iter().all(|a| !a.message.contains("drift")));
    }

    // ── Check 5: literature staleness ────────────────────────────

    #[test]
    fn literature_staleness_fires_exactly_at_the_triggering_multiple() {
        let dir = tempdir().unwrap();
        let store = Store::in_memory().unwrap();
        let config = ObserverConfig::default();

        // 10 and 20 actions: observer runs, but the staleness bar (30)
        // hasn't been reached — no alert yet.
        add_actions(&store, "s1", "CODE_WRITE", 10);
        let outcome = run_if_due(&store, dir.path(), "s1", &config);
        assert!(outcome.triggered);
        assert!(outcome.alerts.iter().all(|a| !a.message.contains("literature")));

        add_actions(&store, "s1", "CODE_WRITE", 10);
        let outcome = run_if_due(&store, dir.path(), "s1", &config);
        assert!(outcome.alerts.iter().all(|a| !a.message.contains("literature")));

        // At 30 actions with zero searches: exactly one warning.
        add_actions(&store, "s1", "CODE_WRITE", 10);
        let outcome = run_if_due(&store, dir.path(), "s1", &config);
        let lit_alerts: Vec<_> = outcome
            .alerts
            .iter()
            .filter(|a| a.message.contains("literature"))
            .collect();
        assert_eq!(lit_alerts.len(), 1);
        assert_eq!(lit_alerts[0].level, AlertLevel::Warn);
    }

    #[test]
    fn literature_staleness_quiet_when_searches_exist() {
        let dir = tempdir().unwrap();
        let store = Store::in_memory().unwrap();
        add_actions(&store, "s1", "CODE_WRITE", 30);
        store
            .insert_literature_search(&lr_store::LiteratureSearch::new(
                "s1",
                "q",
                vec![],
                lr_store::SearchLayer::Websearch,
            ))
            .unwrap();

        let alerts = run_checks(&store, dir.path(), "s1", &ObserverConfig::default());
        assert!(alerts.iter().all(|a| !a.message.contains("literature")));
    }

    // ── Persistence ──────────────────────────────────────────────

    #[test]
    fn triggered_alerts_are_persisted() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("STATE.md"), "x").unwrap();
        std::thread::sleep(Duration::from_millis(30));

        let store = Store::in_memory().unwrap();
        add_actions(&store, "s1", "CODE_WRITE", 10);
        let config = ObserverConfig {
            state_stale_hours: 0.0,
            ..Default::default()
        };

        let outcome = run_if_due(&store, dir.path(), "s1", &config);
        assert!(outcome.halt.is_some());

        let project = dir.path().display().to_string();
        let persisted = store.unresolved_alerts(&project).unwrap();
        assert!(!persisted.is_empty());
        assert!(persisted.iter().any(|a| a.level == AlertLevel::Halt));
    }
}
