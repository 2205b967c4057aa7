//! Cost precedence and estimator arithmetic seen through the session.

use std::sync::Arc;

use diligence_cost::{AnchorCatalog, CostEstimator, CostSource, Estimate, EstimateRequest};
use diligence_types::{
    BuildUpInputs, CostBucket, CostBuildUp, Domain, EstimationMethod, FindingInput, OwnerType,
    Phase, Priority, WorkItemInput,
};

use crate::common::{target_fact, vmware_deal};

#[test]
fn build_up_beats_bucket_in_aggregation() {
    let mut deal = vmware_deal();
    let bucket_only = deal.session.cost_summary();
    assert_eq!(bucket_only.items[0].source, CostSource::CostRange);
    assert_eq!(bucket_only.total, CostBucket::From100kTo500k.range());

    deal.session
        .estimate_and_attach(&deal.work_item, &EstimateRequest::new("server_refresh", 40))
        .unwrap();
    let priced = deal.session.cost_summary();
    assert_eq!(priced.items[0].source, CostSource::CostBuildup);
    assert_eq!(priced.total.low(), 320_000.0);
    assert_eq!(priced.total.high(), 600_000.0);
    assert_eq!(priced.count_by_source(CostSource::CostBuildup), 1);
}

#[test]
fn precomputed_build_up_is_accepted_on_create() {
    let mut session = diligence_store::AnalysisSession::default();
    let fact = session
        .create_fact(target_fact(Domain::IdentityAccess, "mfa", "No MFA for 300 users"))
        .unwrap();
    let buildup = CostBuildUp::compute(BuildUpInputs {
        anchor_key: "mfa_rollout".to_string(),
        anchor_name: "MFA rollout".to_string(),
        method: EstimationMethod::PerUnit,
        quantity: 300,
        unit_label: "user".to_string(),
        unit_cost: diligence_types::CostRange::new(20.0, 60.0),
        assumptions: vec!["all users in scope".to_string()],
        source_facts: vec![fact.clone()],
        confidence: diligence_types::Confidence::Medium,
        size_tier: None,
        scale_factor: 1.0,
        notes: None,
    })
    .unwrap();

    let id = session
        .create_work_item(WorkItemInput {
            finding: FindingInput::new(Domain::IdentityAccess, "Roll out MFA", vec![fact]),
            phase: Phase::Day1,
            priority: Priority::Critical,
            owner_type: OwnerType::Target,
            cost_estimate: CostBucket::Under25k,
            cost_buildup: Some(buildup),
            triggered_by: Vec::new(),
        })
        .unwrap()
        .id;

    let summary = session.cost_summary();
    assert_eq!(summary.items[0].id, id);
    assert_eq!(summary.total.low(), 6_000.0);
    assert_eq!(summary.total.high(), 18_000.0);
}

#[test]
fn per_unit_totals_are_linear_in_quantity() {
    let estimator = CostEstimator::new(Arc::new(AnchorCatalog::builtin()));
    let one = estimator.estimate(&EstimateRequest::new("mfa_rollout", 1)).unwrap();
    let five = estimator.estimate(&EstimateRequest::new("mfa_rollout", 5)).unwrap();
    let (one, five) = (one.buildup().unwrap(), five.buildup().unwrap());
    assert!((five.total_low() - 5.0 * one.total_low()).abs() < 1e-9);
    assert!((five.total_high() - 5.0 * one.total_high()).abs() < 1e-9);
}

#[test]
fn unknown_anchor_is_an_empty_result() {
    let estimator = CostEstimator::new(Arc::new(AnchorCatalog::builtin()));
    assert_eq!(
        estimator.estimate(&EstimateRequest::new("warp_drive", 3)).unwrap(),
        Estimate::NoMatch {
            anchor_key: "warp_drive".to_string()
        }
    );
}
