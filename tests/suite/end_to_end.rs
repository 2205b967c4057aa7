//! The VMware walk-through: fact → risk → priced work item → rollup.

use diligence_cost::{CostSource, EstimateRequest};
use diligence_store::{AnalysisSession, validate_raw_payload};
use diligence_types::{
    CostBucket, Domain, Entity, FindingInput, OwnerType, Phase, Priority, RiskInput, Severity,
    WorkItemInput,
};
use serde_json::json;

use crate::common::target_fact;

#[test]
fn vmware_risk_to_costed_rollup() {
    let mut session = AnalysisSession::default();
    let fact = session
        .create_fact(target_fact(Domain::Infrastructure, "hypervisor", "VMware 6.7, EOL Oct 2022"))
        .unwrap();
    assert_eq!(fact.to_string(), "F-TGT-INFRA-001");

    let risk = session
        .create_risk(RiskInput {
            finding: FindingInput::new(Domain::Infrastructure, "End-of-life hypervisor", vec![fact.clone()]),
            severity: Severity::High,
            mitigation: None,
        })
        .unwrap();
    assert_eq!(risk.entity, Entity::Target);

    let work_item = session
        .create_work_item(WorkItemInput {
            finding: FindingInput::new(Domain::Infrastructure, "Refresh hypervisor hosts", vec![fact.clone()]),
            phase: Phase::Day100,
            priority: Priority::High,
            owner_type: OwnerType::Buyer,
            cost_estimate: CostBucket::From25kTo100k,
            cost_buildup: None,
            triggered_by: vec![risk.id.clone()],
        })
        .unwrap()
        .id;

    let estimate = session
        .estimate_and_attach(
            &work_item,
            &EstimateRequest::new("server_refresh", 1).source_facts([fact]),
        )
        .unwrap();
    let total = estimate.buildup().unwrap().total();

    let summary = session.summary();
    assert_eq!(summary.cost.by_domain[&Domain::Infrastructure], total);
    assert_eq!(summary.cost.by_phase[&Phase::Day100], total);
    assert_eq!(summary.cost.items[0].source, CostSource::CostBuildup);
    assert_eq!(summary.risks_by_severity[&Severity::High], 1);
}

#[test]
fn restated_work_item_keeps_its_identifier() {
    let mut deal = crate::common::vmware_deal();
    let again = deal
        .session
        .create_work_item(WorkItemInput {
            finding: FindingInput::new(
                Domain::Infrastructure,
                "migrate hosts to buyer HYPERVISOR.",
                vec![deal.hypervisor.clone()],
            ),
            phase: Phase::Day1,
            priority: Priority::Low,
            owner_type: OwnerType::Buyer,
            cost_estimate: CostBucket::Under25k,
            cost_buildup: None,
            triggered_by: Vec::new(),
        })
        .unwrap();
    assert_eq!(again.id, deal.work_item);
    assert_eq!(deal.session.reasoning().len(), 2);
    // The new citation is tracked like the original ones.
    let cited: Vec<_> = deal
        .session
        .tracker()
        .dependents_of(&deal.hypervisor)
        .into_iter()
        .map(|dependency| dependency.item.item_id)
        .collect();
    assert!(cited.contains(&deal.work_item.to_string()));
}

#[test]
fn raw_tool_payload_goes_through_the_same_rules() {
    let deal = crate::common::vmware_deal();
    let err = validate_raw_payload(
        "risk",
        &json!({
            "domain": "infrastructure",
            "title": "Hyper-V licensing shortfall",
            "cited_fact_ids": [deal.buyer_standard.to_string()],
            "severity": "medium",
        }),
        Some(deal.session.facts()),
    )
    .unwrap_err();
    assert_eq!(err.code(), "ENTITY_ANCHOR_VIOLATION");
    assert_eq!(
        err.suggestion().as_deref(),
        Some("cite at least one target-entity fact")
    );

    let err = validate_raw_payload(
        "work_item",
        &json!({
            "domain": "infrastructure",
            "title": "Migrate",
            "cited_fact_ids": [deal.hosts.to_string()],
            "phase": "Day_100",
            "priority": "high",
            "owner_type": "seller",
            "cost_estimate": "under_25k",
        }),
        Some(deal.session.facts()),
    )
    .unwrap_err();
    assert_eq!(err.code(), "INVALID_ENUM");
}
