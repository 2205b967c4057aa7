//! In-memory stores for a due-diligence analysis run.
//!
//! Facts and gaps live in the [`FactStore`], findings in the
//! [`ReasoningStore`], and the edges between them in the
//! [`DependencyTracker`]. [`AnalysisSession`] wires the three together with
//! cost estimation and the inventory view, and is the usual entry point.

mod dependency;
mod fact_store;
mod inventory;
mod reasoning_store;
mod session;
mod snapshot;
mod summary;
mod updater;
mod validation;

pub use dependency::{
    Dependency, DependencyTracker, FlagOutcome, ItemRef, ItemType, Relationship, ReviewStatus,
    StaleFilter, StaleItem, TrackerSnapshot,
};
pub use fact_store::{FactLedger, FactStore, SequenceMark};
pub use inventory::{
    InventoryItem, InventorySnapshot, InventoryStore, NameMatchReconciler, Reconciler,
    Reconciliation, TriageCandidate,
};
pub use reasoning_store::{DEFAULT_HASH_LEN, ReasoningStore, WriteOutcome, Written};
pub use session::{AnalysisSession, SessionOptions};
pub use snapshot::{SNAPSHOT_VERSION, Snapshot, SnapshotError};
pub use summary::StoreSummary;
pub use updater::{
    ChangeType, DomainOutcome, InventoryUpdater, PropagationContext, PropagationError,
    PropagationReport,
};
pub use validation::{parse_raw_gap, validate_payload, validate_raw_payload};
