// claims.rs — Claim-Prerequisite Gate.
//
// A claim may only be written to the ledger once every gate in its tier's
// checklist has a PASS on record. The tier is encoded in the claim id:
//
//   C0xx → observational (tier 0) — DQ4 + DC0
//   C1xx → analytical    (tier 1) — adds DQ1
//   C2xx → model-based   (tier 2) — adds DQ1 + DQ2
//   C3xx → calibrated    (tier 3) — adds DQ1 + DQ2 + DQ3
//   CLAIM-N → legacy format, treated as tier 1
//
// Checklists grow monotonically with tier: each tier's set is a superset
// of the one below it.

use std::sync::LazyLock;

use regex::Regex;

use lr_action::{ToolInput, ToolKind};
use lr_store::Store;

use crate::outcome::{GateId, GateOutcome};

/// Gates every claim needs, regardless of tier.
const BASE_CLAIM_GATES: [GateId; 2] = [GateId::Dq4, GateId::Dc0];

static COMPACT_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bC(\d{3})\b").unwrap());
static LEGACY_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bCLAIM-(\d+)\b").unwrap());
static COMPACT_TIER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^C(\d)\d{2}$").unwrap());
static LEGACY_FULL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^CLAIM-\d+$").unwrap());

/// Extract the first claim identifier from arbitrary content.
/// Compact format (C101) is preferred over legacy (CLAIM-42).
pub fn extract_claim_id(content: &str) -> Option<String> {
    if content.is_empty() {
        return None;
    }
    if let Some(m) = COMPACT_ID.find(content) {
        return Some(m.as_str().to_string());
    }
    LEGACY_ID.find(content).map(|m| m.as_str().to_string())
}

/// The tier encoded in a claim id, when one can be read off it.
/// Legacy ids are tier 1; digits above 3 fall back to tier 1.
pub fn claim_tier(claim_id: &str) -> Option<u8> {
    if let Some(caps) = COMPACT_TIER.captures(claim_id) {
        let digit: u8 = caps[1].parse().ok()?;
        return Some(if digit <= 3 { digit } else { 1 });
    }
    if LEGACY_FULL.is_match(claim_id) {
        return Some(1);
    }
    None
}

/// The gate checklist a claim must pass before entering the ledger.
/// An unparseable id gets the base set.
pub fn required_gates(claim_id: &str) -> Vec<GateId> {
    let mut gates = BASE_CLAIM_GATES.to_vec();
    match claim_tier(claim_id) {
        Some(tier) => {
            if tier >= 1 {
                gates.push(GateId::Dq1);
            }
            if tier >= 2 {
                gates.push(GateId::Dq2);
            }
            if tier >= 3 {
                gates.push(GateId::Dq3);
            }
        }
        None => {}
    }
    gates
}

/// Evaluate the Claim-Prerequisite Gate for one invocation.
///
/// Applies when a write targets the claim ledger and a claim id can be
/// extracted from the written content. Store unavailability degrades to
/// pass-with-warning — never to a block.
pub fn evaluate(store: &Store, tool: ToolKind, input: &ToolInput) -> Option<GateOutcome> {
    if !tool.is_write() {
        return None;
    }
    let path = input.file_path.as_deref()?;
    if !path.contains("CLAIM-LEDGER") {
        return None;
    }
    let claim_id = extract_claim_id(input.written_text())?;

    let required = required_gates(&claim_id);
    let passed = match store.passed_gate_ids(&claim_id) {
        Ok(passed) => passed,
        Err(err) => {
            tracing::warn!(%claim_id, error = %err, "store unavailable, claim gate skipped");
            return Some(
                GateOutcome::warn(
                    GateId::ClaimGate,
                    "Store unavailable — claim gate check skipped.",
                )
                .with_claim_id(claim_id),
            );
        }
    };

    let missing: Vec<GateId> = required
        .iter()
        .copied()
        .filter(|gate| !passed.iter().any(|id| id == gate.as_str()))
        .collect();

    if missing.is_empty() {
        return Some(
            GateOutcome::pass(GateId::ClaimGate)
                .with_claim_id(claim_id)
                .with_details(serde_json::json!({
                    "required": required.iter().map(|g| g.as_str()).collect::<Vec<_>>(),
                    "passed": passed,
                })),
        );
    }

    let missing_names: Vec<&str> = missing.iter().map(|gate| gate.as_str()).collect();
    let message = format!(
        "GATE FAIL: Cannot write claim {claim_id} to the ledger.\n\
         Missing prerequisite gates: {}\n\
         Fix: run the missing gate checks first, then update the ledger.",
        missing_names.join(", ")
    );
    Some(
        GateOutcome::fail(GateId::ClaimGate, message)
            .with_claim_id(claim_id)
            .with_details(serde_json::json!({
                "required": required.iter().map(|g| g.as_str()).collect::<Vec<_>>(),
                "missing": missing_names,
                "passed": passed,
            })),
    )
}
