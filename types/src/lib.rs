//! Core record types for the diligence store.
//!
//! Facts, gaps and the four finding variants, their identifiers, the closed
//! vocabularies they draw from and the cost value types. Pure data with
//! validating constructors: no IO, no locking, no clocks. Everything that
//! enters a store passes through a constructor in this crate, including
//! records restored from a snapshot.

mod cost;
mod error;
mod fact;
mod finding;
mod ids;
mod vocab;

pub use cost::{BuildUpInputs, CostBuildUp, CostRange};
pub use error::ValidationError;
pub use fact::{Evidence, Fact, FactDetails, FactInput, Gap, GapInput};
pub use finding::{
    Finding, FindingCore, FindingInput, FindingPayload, Recommendation, RecommendationInput,
    Risk, RiskInput, StrategicConsideration, StrategicConsiderationInput, WorkItem,
    WorkItemInput, check_citations, infer_entity,
};
pub use ids::{ContentKey, FactId, FindingId, GapId, normalize_title};
pub use vocab::{
    ActionType, Confidence, CostBucket, Domain, Entity, EstimationMethod, FactStatus,
    FindingKind, Importance, OwnerType, Phase, Priority, Severity, StrategicLens, UnitKind,
    Urgency,
};
