// engine.rs — The pipeline.
//
// Stage order, each terminal on its own kind of hit:
//
//   0. session upsert            (infra only — action records need a session row)
//   1. literature detection      (append before gates: the search being made
//                                 right now already satisfies the gate)
//   2. gates: data-sync → claim-prerequisite → literature
//                                (first FAIL → Block; every attempt logged)
//   3. permission matrix         (violation → Block)
//   4. action logging            (best-effort, never blocks)
//   5. periodic observer         (HALT → Block; WARNs surfaced)
//
// The engine never retries and holds no state between runs; everything is
// re-derived from the store.

use std::path::{Path, PathBuf};

use lr_action::{classify, detect, summarize_input, summarize_output, ToolEvent, SUMMARY_MAX_CHARS};
use lr_gates::{claims, literature, sync, GateOutcome, SyncConfig};
use lr_observer::{run_if_due, ObserverConfig};
use lr_policy::PermissionMatrix;
use lr_store::{ActionRecord, AlertLevel, ClaimEvent, ClaimEventType, GateStatus, Store};

use crate::decision::{Decision, InfraError};

/// Immutable engine configuration, loaded once at startup and passed in.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root of the mediated project workspace.
    pub project_root: PathBuf,
    /// Location of the SQLite store.
    pub db_path: PathBuf,
    pub matrix: PermissionMatrix,
    pub sync: SyncConfig,
    pub observer: ObserverConfig,
}

impl EngineConfig {
    /// Standard `.labrail/` layout under a project root.
    pub fn for_project(project_root: impl AsRef<Path>) -> Self {
        let root = project_root.as_ref().to_path_buf();
        let db_path = root.join(".labrail").join("labrail.db");
        Self {
            project_root: root,
            db_path,
            matrix: PermissionMatrix::default(),
            sync: SyncConfig::default(),
            observer: ObserverConfig::default(),
        }
    }
}

/// The decision orchestrator. One instance per process; one `evaluate`
/// call per host event.
pub struct Engine {
    store: Store,
    config: EngineConfig,
}

impl Engine {
    pub fn new(store: Store, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Run the full pipeline for one event. Infallible by construction:
    /// every internal error path lands in `Allow { warnings }`.
    pub fn evaluate(&self, event: &ToolEvent) -> Decision {
        let mut warnings = Vec::new();
        let tool = event.tool_kind();
        let session_id = event.session_id.as_str();
        let project_root = self.config.project_root.clone();

        // ── 0. Session upsert ────────────────────────────────────
        if !session_id.is_empty() {
            self.note_infra(
                self.store
                    .ensure_session(session_id, &project_root.display().to_string()),
                "session upsert failed",
                &mut warnings,
            );
        }

        // ── 1. Literature detection — appended before gates run, so
        //       the search in this very invocation already counts ─────
        if let Some(record) = detect(event) {
            self.note_infra(
                self.store.insert_literature_search(&record),
                "literature search not recorded",
                &mut warnings,
            );
        }

        // ── 2. Gates, in order; first FAIL is terminal ───────────
        // Evaluated lazily: a failed gate means the later ones are never
        // attempted, and so never logged.
        let mut last_gate_status: Option<GateStatus> = None;
        for stage in 0..3 {
            let outcome = match stage {
                0 => sync::evaluate(tool, &event.tool_input, &self.config.sync),
                1 => claims::evaluate(&self.store, tool, &event.tool_input),
                _ => literature::evaluate(
                    &self.store,
                    &project_root,
                    session_id,
                    tool,
                    &event.tool_input,
                ),
            };
            let Some(outcome) = outcome else {
                continue;
            };
            self.record_gate(&outcome, session_id, &mut warnings);
            last_gate_status = Some(outcome.status);

            match outcome.status {
                GateStatus::Fail => {
                    let reason = outcome
                        .message
                        .unwrap_or_else(|| format!("GATE {} FAIL", outcome.gate));
                    return Decision::Block { reason };
                }
                GateStatus::Warn => {
                    if let Some(message) = &outcome.message {
                        warnings.push(format!("[{}] {message}", outcome.gate));
                    }
                }
                GateStatus::Pass => {}
            }
        }

        // ── 3. Permission matrix ─────────────────────────────────
        if let Some(violation) =
            self.config
                .matrix
                .check(event.agent_role.as_deref(), &event.tool_name, &event.tool_input)
        {
            let role = event.agent_role.as_deref().unwrap_or("unknown");
            return Decision::Block {
                reason: format!(
                    "PERMISSION DENIED: Agent \"{role}\" cannot {}.\n\
                     Reason: {}\n\
                     Required role: {}",
                    violation.action, violation.reason, violation.required_role
                ),
            };
        }

        // ── 4. Action logging (best-effort) ──────────────────────
        if !session_id.is_empty() {
            if let Some(action_type) = classify(&event.tool_name, &event.tool_input, &event.output_text()) {
                let mut record = ActionRecord::new(session_id, action_type.as_str(), &event.tool_name)
                    .with_input_summary(summarize_input(&event.tool_input, SUMMARY_MAX_CHARS))
                    .with_output_summary(summarize_output(&event.output_text(), SUMMARY_MAX_CHARS));
                if let Some(role) = &event.agent_role {
                    record = record.with_agent_role(role.clone());
                }
                if let Some(status) = last_gate_status {
                    record = record.with_gate_result(status);
                }
                self.note_infra(
                    self.store.insert_action(&record),
                    "action not recorded",
                    &mut warnings,
                );
            }
        }

        // ── 5. Periodic observer ─────────────────────────────────
        let outcome = run_if_due(&self.store, &project_root, session_id, &self.config.observer);
        for alert in &outcome.alerts {
            if alert.level == AlertLevel::Warn {
                warnings.push(format!("[OBSERVER] {}", alert.message));
            }
        }
        if let Some(halt) = outcome.halt {
            return Decision::Block {
                reason: format!("OBSERVER HALT: {}", halt.message),
            };
        }

        Decision::Allow { warnings }
    }

    /// Persist a gate outcome. A claim-bearing check is preceded by a
    /// CREATED lifecycle event on first sight of the claim, so every
    /// audited claim id resolves through claim_events replay.
    fn record_gate(&self, outcome: &GateOutcome, session_id: &str, warnings: &mut Vec<String>) {
        if session_id.is_empty() {
            return;
        }

        if let Some(claim_id) = &outcome.claim_id {
            match self.store.has_claim_events(claim_id) {
                Ok(false) => {
                    self.note_infra(
                        self.store.insert_claim_event(&ClaimEvent::new(
                            claim_id.clone(),
                            session_id,
                            ClaimEventType::Created,
                        )),
                        "claim event not recorded",
                        warnings,
                    );
                }
                Ok(true) => {}
                Err(err) => {
                    tracing::warn!(%claim_id, error = %err, "claim event lookup failed");
                }
            }
        }

        self.note_infra(
            self.store.insert_gate_check(&outcome.to_check(session_id)),
            "gate check not recorded",
            warnings,
        );
    }

    /// Fold an infrastructure error into a warning — the structural form
    /// of "never block on our own bugs". Nothing that goes through here
    /// can ever become a Block.
    fn note_infra<E: Into<InfraError>>(
        &self,
        result: Result<(), E>,
        context: &str,
        warnings: &mut Vec<String>,
    ) {
        if let Err(err) = result {
            let err: InfraError = err.into();
            tracing::warn!(error = %err, "{context}");
            warnings.push(format!("{context}: {err}"));
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}
