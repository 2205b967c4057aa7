//! Cost estimation for integration work.
//!
//! Two layers share this crate. The anchor layer prices a single work item
//! from a catalogued reference cost ([`CostEstimator`]) and rolls many work
//! items up by phase, domain and owner ([`CostAggregator`]). The activity
//! layer prices a whole deal scenario from deal type, industry and headline
//! quantities ([`ActivityCatalog`]).

mod activities;
mod aggregate;
mod anchors;
mod estimator;

pub use activities::{
    Activity, ActivityCatalog, ActivityCost, ActivityLine, Calibration, CalibrationError,
    Complexity, DealType, QuantityDriver, Scenario, ScenarioEstimate, ScenarioQuantities,
};
pub use aggregate::{CostAggregator, CostSource, CostSummary, ItemCost};
pub use anchors::{AnchorCatalog, CatalogError, CostAnchor, ResolvedTier, TierSource};
pub use estimator::{CostEstimator, Estimate, EstimateRequest};
