// outcome.rs — Gate identifiers and evaluation outcomes.

use serde::{Deserialize, Serialize};

use lr_store::{GateCheck, GateStatus};

/// The closed set of gate identifiers.
///
/// DQ1–DQ4 are the data-quality checklist, DC0 is design compliance,
/// L-1+ is the pre-direction literature requirement, and CLAIM_GATE is
/// the aggregate ledger check that audits a claim's whole checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateId {
    Dq1,
    Dq2,
    Dq3,
    Dq4,
    Dc0,
    Literature,
    ClaimGate,
}

impl GateId {
    pub fn as_str(self) -> &'static str {
        match self {
            GateId::Dq1 => "DQ1",
            GateId::Dq2 => "DQ2",
            GateId::Dq3 => "DQ3",
            GateId::Dq4 => "DQ4",
            GateId::Dc0 => "DC0",
            GateId::Literature => "L-1+",
            GateId::ClaimGate => "CLAIM_GATE",
        }
    }
}

impl std::fmt::Display for GateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of evaluating one gate against one invocation.
///
/// `message` carries the remediation text shown to the agent on Fail
/// (and the degradation note on Warn); `details` is the structured
/// diagnostic payload persisted with the gate-check row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateOutcome {
    pub gate: GateId,
    pub status: GateStatus,
    pub claim_id: Option<String>,
    pub message: Option<String>,
    pub details: serde_json::Value,
}

impl GateOutcome {
    pub fn pass(gate: GateId) -> Self {
        Self {
            gate,
            status: GateStatus::Pass,
            claim_id: None,
            message: None,
            details: serde_json::Value::Null,
        }
    }

    pub fn warn(gate: GateId, message: impl Into<String>) -> Self {
        Self {
            gate,
            status: GateStatus::Warn,
            claim_id: None,
            message: Some(message.into()),
            details: serde_json::Value::Null,
        }
    }

    pub fn fail(gate: GateId, message: impl Into<String>) -> Self {
        Self {
            gate,
            status: GateStatus::Fail,
            claim_id: None,
            message: Some(message.into()),
            details: serde_json::Value::Null,
        }
    }

    pub fn with_claim_id(mut self, claim_id: impl Into<String>) -> Self {
        self.claim_id = Some(claim_id.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn is_fail(&self) -> bool {
        self.status == GateStatus::Fail
    }

    /// Convert to the persistable gate-check row.
    pub fn to_check(&self, session_id: &str) -> GateCheck {
        let mut check = GateCheck::new(session_id, self.gate.as_str(), self.status);
        if let Some(claim_id) = &self.claim_id {
            check = check.with_claim_id(claim_id.clone());
        }
        if !self.details.is_null() {
            check = check.with_details(self.details.clone());
        }
        check
    }
}
