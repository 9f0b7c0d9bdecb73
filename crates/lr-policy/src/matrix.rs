// matrix.rs — Role permission matrix and evaluation.
//
// Evaluation order (each step terminal on a hit):
//   1. No role at all → solo mode, always permitted.
//   2. Unrecognized role → permitted (fail open; logged).
//   3. Tool not in the role's allow-list → violation.
//   4. Write-class tools with a target path:
//      a. literal deny-file substrings
//      b. glob deny patterns
//      c. exclusive write scope (when configured, the ONLY writable paths)
//
// The matrix is built once into an immutable value and passed into the
// engine; nothing here reads ambient state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use lr_action::{ToolInput, ToolKind};

use crate::glob::GlobPattern;

/// The closed set of team-mode roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Researcher,
    Reviewer2,
    Judge,
    Serendipity,
    Lead,
    Experimenter,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Researcher => "researcher",
            Role::Reviewer2 => "reviewer2",
            Role::Judge => "judge",
            Role::Serendipity => "serendipity",
            Role::Lead => "lead",
            Role::Experimenter => "experimenter",
        }
    }

    /// Parse a role name, case-insensitively. Unknown names yield `None`,
    /// which callers treat as fail-open.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "researcher" => Some(Role::Researcher),
            "reviewer2" => Some(Role::Reviewer2),
            "judge" => Some(Role::Judge),
            "serendipity" => Some(Role::Serendipity),
            "lead" => Some(Role::Lead),
            "experimenter" => Some(Role::Experimenter),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Permission configuration for one role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRule {
    /// Tools this role may invoke at all.
    pub allow: Vec<ToolKind>,
    /// Literal path substrings this role may never write to.
    pub deny_files: Vec<String>,
    /// Glob patterns this role may never write to.
    pub deny_patterns: Vec<String>,
    /// When set, the ONLY paths this role may write to — an exclusive
    /// jail for roles whose legitimate output is a single directory.
    pub write_scope: Option<Vec<String>>,
}

/// A denied action, with enough context for a useful error message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Violation {
    /// What was attempted, e.g. "write to CLAIM-LEDGER.md".
    pub action: String,
    /// Why it was denied.
    pub reason: String,
    /// Which role(s) could legitimately do this.
    pub required_role: String,
}

/// The full role → rule mapping.
#[derive(Debug, Clone)]
pub struct PermissionMatrix {
    rules: HashMap<Role, PermissionRule>,
}

impl PermissionMatrix {
    pub fn new(rules: HashMap<Role, PermissionRule>) -> Self {
        Self { rules }
    }

    pub fn rule(&self, role: Role) -> Option<&PermissionRule> {
        self.rules.get(&role)
    }

    /// Evaluate a tool invocation for a role. `None` means permitted.
    pub fn check(
        &self,
        agent_role: Option<&str>,
        tool_name: &str,
        input: &ToolInput,
    ) -> Option<Violation> {
        // Solo mode: no restrictions.
        let role_name = agent_role?;

        let Some(role) = Role::parse(role_name) else {
            // Unknown role — fail open so an unexpected host configuration
            // doesn't brick the agent. The role still appears in the log.
            tracing::warn!(role = role_name, "unknown agent role, permitting");
            return None;
        };
        let rule = self.rules.get(&role)?;

        let tool = ToolKind::from_name(tool_name);

        // 1. Tool allow-list.
        if !rule.allow.contains(&tool) {
            return Some(Violation {
                action: format!("use tool {tool_name}"),
                reason: format!("Tool {tool_name} not in allowed list for {role}"),
                required_role: "researcher or lead".to_string(),
            });
        }

        // 2. File-level write restrictions apply to write-class tools only.
        if tool.is_write() {
            if let Some(file_path) = input.file_path.as_deref() {
                let normalized = file_path.replace('\\', "/");

                // 2a. Literal deny substrings.
                for denied in &rule.deny_files {
                    if normalized.contains(denied.as_str()) {
                        return Some(Violation {
                            action: format!("write to {denied}"),
                            reason: format!("Agent {role} cannot write to {denied}"),
                            required_role: suggest_role_for_path(denied),
                        });
                    }
                }

                // 2b. Deny glob patterns.
                for pattern in &rule.deny_patterns {
                    if GlobPattern::compile(pattern).is_match(&normalized) {
                        return Some(Violation {
                            action: format!("write to {file_path}"),
                            reason: format!("Pattern {pattern} denied for {role}"),
                            required_role: "owner of that directory".to_string(),
                        });
                    }
                }

                // 2c. Exclusive write scope.
                if let Some(scope) = &rule.write_scope {
                    let allowed = scope.iter().any(|dir| normalized.contains(dir.as_str()));
                    if !allowed {
                        return Some(Violation {
                            action: format!("write to {file_path}"),
                            reason: format!(
                                "Agent {role} can only write to: {}",
                                scope.join(", ")
                            ),
                            required_role: "researcher or lead".to_string(),
                        });
                    }
                }
            }
        }

        None
    }
}

impl Default for PermissionMatrix {
    /// The standard team-mode matrix.
    fn default() -> Self {
        use ToolKind::*;

        let mut rules = HashMap::new();
        rules.insert(
            Role::Researcher,
            PermissionRule {
                allow: vec![Read, Write, Edit, Bash, Glob, Grep, WebSearch, WebFetch],
                deny_files: vec![],
                // Can write anywhere except reviewer reports.
                deny_patterns: vec!["05-reviewer2/*-report.yaml".to_string()],
                write_scope: None,
            },
        );
        rules.insert(
            Role::Reviewer2,
            PermissionRule {
                allow: vec![Read, Glob, Grep, WebSearch, WebFetch, Write, Edit],
                // Cannot touch the ledger, and only writes inside its own dir.
                deny_files: vec!["CLAIM-LEDGER.md".to_string()],
                deny_patterns: vec![],
                write_scope: Some(vec!["05-reviewer2/".to_string()]),
            },
        );
        rules.insert(
            Role::Judge,
            PermissionRule {
                allow: vec![Read, Glob, Grep],
                deny_files: vec!["CLAIM-LEDGER.md".to_string(), "05-reviewer2/*".to_string()],
                deny_patterns: vec![],
                write_scope: Some(vec!["05-reviewer2/judge-reports/".to_string()]),
            },
        );
        rules.insert(
            Role::Serendipity,
            PermissionRule {
                allow: vec![Read, Glob, Grep, WebSearch, WebFetch, Write],
                deny_files: vec!["CLAIM-LEDGER.md".to_string()],
                deny_patterns: vec![],
                write_scope: Some(vec!["SERENDIPITY.md".to_string()]),
            },
        );
        rules.insert(
            Role::Lead,
            PermissionRule {
                // Lead coordinates everything.
                allow: vec![Read, Glob, Grep, Write, Edit, Task],
                deny_files: vec![],
                deny_patterns: vec![],
                write_scope: None,
            },
        );
        rules.insert(
            Role::Experimenter,
            PermissionRule {
                allow: vec![Read, Write, Edit, Bash, Glob, Grep],
                deny_files: vec!["CLAIM-LEDGER.md".to_string(), "05-reviewer2/".to_string()],
                deny_patterns: vec![],
                write_scope: None,
            },
        );

        Self { rules }
    }
}

/// Evaluate against the default matrix. `None` means permitted.
pub fn check_permission(
    agent_role: Option<&str>,
    tool_name: &str,
    input: &ToolInput,
) -> Option<Violation> {
    PermissionMatrix::default().check(agent_role, tool_name, input)
}

/// Suggest which role should perform an action on a given path.
/// Keyed on the denied path's nature; feeds the violation message.
fn suggest_role_for_path(path: &str) -> String {
    if path.contains("CLAIM-LEDGER") {
        return "researcher (for CLAIM-LEDGER), lead (for coordination)".to_string();
    }
    if path.contains("05-reviewer2") {
        return "reviewer2 (for R2 reports), judge (for judge reports)".to_string();
    }
    "researcher or lead".to_string()
}

/// Resolve an agent role from an explicit value or, failing that, from
/// keywords in the prompt. Defaults to Researcher.
pub fn identify_role(explicit: Option<&str>, prompt: &str) -> Role {
    if let Some(role) = explicit.and_then(Role::parse) {
        return role;
    }

    let lower = prompt.to_lowercase();
    if lower.contains("reviewer") || lower.contains("r2") {
        return Role::Reviewer2;
    }
    if lower.contains("serendipity") || lower.contains("scanner") {
        return Role::Serendipity;
    }
    if lower.contains("judge") || lower.contains("r3") {
        return Role::Judge;
    }
    if lower.contains("experiment") {
        return Role::Experimenter;
    }
    if lower.contains("lead") || lower.contains("orchestrat") {
        return Role::Lead;
    }

    Role::Researcher
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_to(path: &str) -> ToolInput {
        ToolInput {
            file_path: Some(path.to_string()),
            ..Default::default()
        }
    }

    // ── Solo / unknown role fail-open ────────────────────────────

    #[test]
    fn null_role_is_always_permitted() {
        let matrix = PermissionMatrix::default();
        assert!(matrix.check(None, "Write", &write_to("CLAIM-LEDGER.md")).is_none());
        assert!(matrix.check(None, "Bash", &ToolInput::default()).is_none());
        assert!(matrix.check(None, "mcp__anything", &ToolInput::default()).is_none());
    }

    #[test]
    fn unknown_role_fails_open() {
        let matrix = PermissionMatrix::default();
        assert!(matrix
            .check(Some("archivist"), "Write", &write_to("CLAIM-LEDGER.md"))
            .is_none());
    }

    // ── Tool allow-list ──────────────────────────────────────────

    #[test]
    fn judge_cannot_use_bash() {
        let violation = PermissionMatrix::default()
            .check(Some("judge"), "Bash", &ToolInput::default())
            .unwrap();
        assert_eq!(violation.action, "use tool Bash");
        assert!(violation.reason.contains("not in allowed list for judge"));
    }

    #[test]
    fn researcher_can_use_all_standard_tools() {
        let matrix = PermissionMatrix::default();
        for tool in ["Read", "Write", "Edit", "Bash", "Glob", "Grep", "WebSearch", "WebFetch"] {
            assert!(
                matrix.check(Some("researcher"), tool, &ToolInput::default()).is_none(),
                "researcher should be allowed {tool}"
            );
        }
    }

    #[test]
    fn mcp_tools_are_not_in_any_allow_list() {
        let violation = PermissionMatrix::default()
            .check(Some("reviewer2"), "mcp__pubmed__search", &ToolInput::default())
            .unwrap();
        assert!(violation.reason.contains("not in allowed list"));
    }

    // ── Deny files ───────────────────────────────────────────────

    #[test]
    fn reviewer2_cannot_write_the_ledger() {
        // The deny-file rule fires regardless of the write-scope
        // configuration (it is checked first).
        let violation = PermissionMatrix::default()
            .check(Some("reviewer2"), "Write", &write_to("project/CLAIM-LEDGER.md"))
            .unwrap();
        assert_eq!(violation.action, "write to CLAIM-LEDGER.md");
        assert!(violation.reason.contains("cannot write to CLAIM-LEDGER.md"));
        assert!(violation.required_role.contains("researcher"));
    }

    #[test]
    fn deny_files_only_gate_write_class_tools() {
        // Reading the ledger is fine; only writes are restricted.
        assert!(PermissionMatrix::default()
            .check(Some("reviewer2"), "Read", &write_to("CLAIM-LEDGER.md"))
            .is_none());
    }

    // ── Deny patterns ────────────────────────────────────────────

    #[test]
    fn researcher_cannot_write_r2_reports() {
        let violation = PermissionMatrix::default()
            .check(
                Some("researcher"),
                "Write",
                &write_to("05-reviewer2/claim-c101-report.yaml"),
            )
            .unwrap();
        assert!(violation.reason.contains("05-reviewer2/*-report.yaml"));
        assert_eq!(violation.required_role, "owner of that directory");
    }

    #[test]
    fn researcher_can_write_elsewhere() {
        assert!(PermissionMatrix::default()
            .check(Some("researcher"), "Write", &write_to("04-results/FINDINGS.md"))
            .is_none());
    }

    // ── Write scope jail ─────────────────────────────────────────

    #[test]
    fn reviewer2_outside_scope_is_blocked() {
        let violation = PermissionMatrix::default()
            .check(Some("reviewer2"), "Write", &write_to("src/analysis.py"))
            .unwrap();
        assert!(violation.reason.contains("can only write to: 05-reviewer2/"));
    }

    #[test]
    fn reviewer2_inside_scope_is_permitted() {
        assert!(PermissionMatrix::default()
            .check(Some("reviewer2"), "Write", &write_to("05-reviewer2/notes.md"))
            .is_none());
    }

    #[test]
    fn serendipity_is_jailed_to_one_file() {
        let matrix = PermissionMatrix::default();
        assert!(matrix
            .check(Some("serendipity"), "Write", &write_to("SERENDIPITY.md"))
            .is_none());
        assert!(matrix
            .check(Some("serendipity"), "Write", &write_to("notes/other.md"))
            .is_some());
    }

    #[test]
    fn role_names_are_case_insensitive() {
        assert!(PermissionMatrix::default()
            .check(Some("Reviewer2"), "Write", &write_to("CLAIM-LEDGER.md"))
            .is_some());
    }

    #[test]
    fn write_without_path_is_permitted() {
        // No target path — nothing for the file rules to evaluate.
        assert!(PermissionMatrix::default()
            .check(Some("reviewer2"), "Write", &ToolInput::default())
            .is_none());
    }

    // ── Role identification ──────────────────────────────────────

    #[test]
    fn explicit_role_wins_over_prompt() {
        assert_eq!(identify_role(Some("judge"), "please review this"), Role::Judge);
    }

    #[test]
    fn prompt_keywords_infer_roles() {
        assert_eq!(identify_role(None, "You are Reviewer 2. Be harsh."), Role::Reviewer2);
        assert_eq!(identify_role(None, "serendipity scan of the corpus"), Role::Serendipity);
        assert_eq!(identify_role(None, "run the next experiment"), Role::Experimenter);
        assert_eq!(identify_role(None, "orchestrate the team"), Role::Lead);
    }

    #[test]
    fn default_role_is_researcher() {
        assert_eq!(identify_role(None, "analyze the dataset"), Role::Researcher);
        assert_eq!(identify_role(Some("unknown-role"), ""), Role::Researcher);
    }
}
