//! # lr-engine
//!
//! The decision orchestrator: one pipeline run per host event, sequencing
//! literature detection → gate evaluation → permission check → action
//! logging → periodic observer into a single allow/block decision.
//!
//! ## The one invariant that matters
//!
//! **Fail open on infrastructure, fail closed on policy.** A gate that
//! cannot read its companion file, a store that cannot be queried, a
//! malformed input record — all of these degrade to Allow with a recorded
//! warning. Only an explicitly detected rule breach (gate FAIL, permission
//! violation, HALT alert) produces Block. The stage signatures make this
//! structural: infrastructure errors are folded into warnings by the
//! orchestrator, and nothing else can construct a Block.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use lr_engine::{Engine, EngineConfig};
//! use lr_action::ToolEvent;
//! use lr_store::Store;
//!
//! let config = EngineConfig::for_project("/work/project");
//! let store = Store::open(&config.db_path).unwrap();
//! let engine = Engine::new(store, config);
//!
//! let event: ToolEvent = serde_json::from_str(r#"{"tool_name":"Bash"}"#).unwrap();
//! let decision = engine.evaluate(&event);
//! std::process::exit(decision.exit_code());
//! ```

pub mod decision;
pub mod engine;

pub use decision::{Decision, DecisionRecord, InfraError};
pub use engine::{Engine, EngineConfig};
