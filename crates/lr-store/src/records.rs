// records.rs — Row types shared across the enforcement pipeline.
//
// Each struct maps 1:1 onto a table in schema.sql-equivalent DDL (see
// store.rs). Enums that are persisted as TEXT columns implement both
// serde (SCREAMING_SNAKE_CASE, matching the stored form) and
// Display/parse so the SQL layer and the JSON layer agree on spelling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one gate evaluation attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateStatus {
    Pass,
    Warn,
    Fail,
}

impl GateStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GateStatus::Pass => "PASS",
            GateStatus::Warn => "WARN",
            GateStatus::Fail => "FAIL",
        }
    }
}

impl std::fmt::Display for GateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which search modality produced a literature record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchLayer {
    Websearch,
    Manual,
    Mcp,
}

impl SearchLayer {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchLayer::Websearch => "WEBSEARCH",
            SearchLayer::Manual => "MANUAL",
            SearchLayer::Mcp => "MCP",
        }
    }
}

impl std::fmt::Display for SearchLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claim lifecycle event kinds. The lifecycle of a claim is reconstructed
/// by replaying its events in timestamp order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimEventType {
    Created,
    Promoted,
    Killed,
    Disputed,
    Verified,
    R2Reviewed,
}

impl ClaimEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            ClaimEventType::Created => "CREATED",
            ClaimEventType::Promoted => "PROMOTED",
            ClaimEventType::Killed => "KILLED",
            ClaimEventType::Disputed => "DISPUTED",
            ClaimEventType::Verified => "VERIFIED",
            ClaimEventType::R2Reviewed => "R2_REVIEWED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATED" => Some(ClaimEventType::Created),
            "PROMOTED" => Some(ClaimEventType::Promoted),
            "KILLED" => Some(ClaimEventType::Killed),
            "DISPUTED" => Some(ClaimEventType::Disputed),
            "VERIFIED" => Some(ClaimEventType::Verified),
            "R2_REVIEWED" => Some(ClaimEventType::R2Reviewed),
            _ => None,
        }
    }
}

impl std::fmt::Display for ClaimEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of an observer alert.
///
/// Ordering matters: `Halt > Warn > Info`, so `max()` over a batch of
/// alerts yields the one that decides the run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertLevel {
    Info,
    Warn,
    Halt,
}

impl AlertLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertLevel::Info => "INFO",
            AlertLevel::Warn => "WARN",
            AlertLevel::Halt => "HALT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INFO" => Some(AlertLevel::Info),
            "WARN" => Some(AlertLevel::Warn),
            "HALT" => Some(AlertLevel::Halt),
            _ => None,
        }
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified agent action — a row in `action_records`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    /// Classification tag, e.g. "MODEL_TRAIN" (see lr-action's ActionType).
    pub action_type: String,
    pub tool_name: String,
    pub input_summary: Option<String>,
    pub output_summary: Option<String>,
    pub agent_role: Option<String>,
    /// PASS/WARN/FAIL when a gate evaluated this same invocation.
    pub gate_result: Option<GateStatus>,
}

impl ActionRecord {
    pub fn new(
        session_id: impl Into<String>,
        action_type: impl Into<String>,
        tool_name: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp: Utc::now(),
            action_type: action_type.into(),
            tool_name: tool_name.into(),
            input_summary: None,
            output_summary: None,
            agent_role: None,
            gate_result: None,
        }
    }

    pub fn with_input_summary(mut self, summary: impl Into<String>) -> Self {
        self.input_summary = Some(summary.into());
        self
    }

    pub fn with_output_summary(mut self, summary: impl Into<String>) -> Self {
        self.output_summary = Some(summary.into());
        self
    }

    pub fn with_agent_role(mut self, role: impl Into<String>) -> Self {
        self.agent_role = Some(role.into());
        self
    }

    pub fn with_gate_result(mut self, status: GateStatus) -> Self {
        self.gate_result = Some(status);
        self
    }
}

/// One gate evaluation attempt — a row in `gate_checks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateCheck {
    pub session_id: String,
    /// Gate identifier, e.g. "DQ4", "DC0", "L-1+".
    pub gate_id: String,
    pub claim_id: Option<String>,
    pub status: GateStatus,
    pub checks_passed: u32,
    pub checks_warned: u32,
    pub checks_failed: u32,
    /// Free-form diagnostics (mismatch lists, missing gates, counts).
    pub details: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl GateCheck {
    pub fn new(session_id: impl Into<String>, gate_id: impl Into<String>, status: GateStatus) -> Self {
        let (p, w, f) = match status {
            GateStatus::Pass => (1, 0, 0),
            GateStatus::Warn => (0, 1, 0),
            GateStatus::Fail => (0, 0, 1),
        };
        Self {
            session_id: session_id.into(),
            gate_id: gate_id.into(),
            claim_id: None,
            status,
            checks_passed: p,
            checks_warned: w,
            checks_failed: f,
            details: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_claim_id(mut self, claim_id: impl Into<String>) -> Self {
        self.claim_id = Some(claim_id.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// One claim lifecycle event — a row in `claim_events`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimEvent {
    pub claim_id: String,
    pub session_id: String,
    pub event_type: ClaimEventType,
    pub old_status: Option<String>,
    pub new_status: Option<String>,
    pub confidence: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl ClaimEvent {
    pub fn new(
        claim_id: impl Into<String>,
        session_id: impl Into<String>,
        event_type: ClaimEventType,
    ) -> Self {
        Self {
            claim_id: claim_id.into(),
            session_id: session_id.into(),
            event_type,
            old_status: None,
            new_status: None,
            confidence: None,
            timestamp: Utc::now(),
        }
    }
}

/// One recorded bibliographic search — a row in `literature_searches`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiteratureSearch {
    pub session_id: String,
    /// Query or URL, already truncated by the detector.
    pub query: String,
    /// Ordered source names (domain, tool name, "websearch", ...).
    pub sources: Vec<String>,
    pub search_layer: SearchLayer,
    pub timestamp: DateTime<Utc>,
}

impl LiteratureSearch {
    pub fn new(
        session_id: impl Into<String>,
        query: impl Into<String>,
        sources: Vec<String>,
        search_layer: SearchLayer,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            query: query.into(),
            sources,
            search_layer,
            timestamp: Utc::now(),
        }
    }
}

/// One observer alert — a row in `observer_alerts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub project_path: String,
    pub level: AlertLevel,
    pub message: String,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(
        project_path: impl Into<String>,
        level: AlertLevel,
        message: impl Into<String>,
    ) -> Self {
        Self {
            project_path: project_path.into(),
            level,
            message: message.into(),
            resolved: false,
            created_at: Utc::now(),
        }
    }
}

/// Aggregate counters written back to a session row when it ends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionTotals {
    pub total_actions: Option<u64>,
    pub claims_created: Option<u64>,
    pub claims_killed: Option<u64>,
    pub gates_passed: Option<u64>,
    pub gates_failed: Option<u64>,
}
