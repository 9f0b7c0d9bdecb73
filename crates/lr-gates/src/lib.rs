//! # lr-gates
//!
//! The three process-quality gates evaluated on every write-class tool
//! invocation, in order:
//!
//! 1. **Data-Sync** — numbers reported in a findings document must trace
//!    back to the companion structured-data source.
//! 2. **Claim-Prerequisite** — a claim may only enter the ledger once the
//!    gate checklist for its tier has passed.
//! 3. **Literature** — a research-direction artifact requires at least one
//!    recorded bibliographic search in the session.
//!
//! Each gate is an independent function of the invocation plus queried
//! history. Infrastructure problems (missing companion file, malformed
//! JSON, unavailable store) degrade the affected gate to pass-with-warning;
//! only an explicitly detected rule breach produces a Fail.

pub mod claims;
pub mod literature;
pub mod outcome;
pub mod sync;

pub use claims::{claim_tier, extract_claim_id, required_gates};
pub use literature::is_direction_node;
pub use outcome::{GateId, GateOutcome};
pub use sync::{find_json_source, SyncConfig};
