//! # lr-store
//!
//! Persistent store for labrail: sessions, action records, gate-check
//! results, claim lifecycle events, literature searches, and observer
//! alerts, backed by a single SQLite database in WAL mode.
//!
//! Every table is append-only except `sessions` (mutated once at session
//! end) and `observer_alerts.resolved` (flipped externally). All queries
//! tolerate an absent table by treating it as "no history yet" — the
//! enforcement pipeline must never fail because the store is younger than
//! the code asking questions of it.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use lr_store::{Store, ActionRecord};
//!
//! let store = Store::open("/tmp/labrail.db").unwrap();
//! store.ensure_session("session-1", "/work/project").unwrap();
//! store.insert_action(&ActionRecord::new("session-1", "MODEL_TRAIN", "Bash")).unwrap();
//! assert_eq!(store.action_count("session-1").unwrap(), 1);
//! ```

pub mod error;
pub mod records;
pub mod store;

pub use error::StoreError;
pub use records::{
    ActionRecord, Alert, AlertLevel, ClaimEvent, ClaimEventType, GateCheck, GateStatus,
    LiteratureSearch, SearchLayer, SessionTotals,
};
pub use store::Store;
