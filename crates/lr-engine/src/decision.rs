// decision.rs — Decision types and the infrastructure/policy divide.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Infrastructure failures inside a pipeline stage. These are never
/// decisions: the orchestrator folds them into warnings on Allow.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error(transparent)]
    Store(#[from] lr_store::StoreError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// The final verdict for one tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// The action proceeds. Warnings are diagnostics (degraded gates,
    /// WARN-level alerts) the host may surface without blocking.
    Allow { warnings: Vec<String> },
    /// The action is rejected, with a remediation message.
    Block { reason: String },
}

impl Decision {
    pub fn allow() -> Self {
        Decision::Allow {
            warnings: Vec::new(),
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(self, Decision::Block { .. })
    }

    /// Exit-code contract: 0 = allow, 2 = block. 1 is reserved for
    /// adapter-level failures and never produced by the engine.
    pub fn exit_code(&self) -> i32 {
        match self {
            Decision::Allow { .. } => 0,
            Decision::Block { .. } => 2,
        }
    }
}

/// The wire form of a decision, written to stdout by the adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    #[serde(rename = "exitCode")]
    pub exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

impl From<&Decision> for DecisionRecord {
    fn from(decision: &Decision) -> Self {
        match decision {
            Decision::Allow { .. } => DecisionRecord {
                exit_code: 0,
                stderr: None,
            },
            Decision::Block { reason } => DecisionRecord {
                exit_code: 2,
                stderr: Some(reason.clone()),
            },
        }
    }
}
