//! Shared fixtures: a small carve-out analysis built through the session.

#![allow(dead_code)]

use diligence_store::AnalysisSession;
use diligence_types::{
    CostBucket, Domain, Entity, Evidence, FactDetails, FactId, FactInput, FactStatus,
    FindingId, FindingInput, OwnerType, Phase, Priority, RiskInput, Severity, WorkItemInput,
};

pub struct VmwareDeal {
    pub session: AnalysisSession,
    /// Target runs vSphere 6.7.
    pub hypervisor: FactId,
    /// Target has 40 physical hosts.
    pub hosts: FactId,
    /// Buyer standardizes on Hyper-V.
    pub buyer_standard: FactId,
    pub risk: FindingId,
    pub work_item: FindingId,
}

pub fn target_fact(domain: Domain, category: &str, claim: &str) -> FactInput {
    FactInput::new(domain, Entity::Target, category, claim)
        .evidence(Evidence::quoted(claim, "Target IT overview"))
}

pub fn vmware_deal() -> VmwareDeal {
    let mut session = AnalysisSession::default();

    let hypervisor = session
        .create_fact(
            target_fact(Domain::Infrastructure, "hypervisor", "VMware vSphere 6.7, end of support Oct 2022")
                .details(FactDetails::Application {
                    name: "VMware vSphere".to_string(),
                    vendor: Some("VMware".to_string()),
                    version: Some("6.7".to_string()),
                    hosting: Some("on_prem".to_string()),
                    user_count: None,
                }),
        )
        .unwrap();
    let hosts = session
        .create_fact(target_fact(Domain::Infrastructure, "compute", "40 physical ESXi hosts"))
        .unwrap();
    let buyer_standard = session
        .create_fact(
            FactInput::new(Domain::Infrastructure, Entity::Buyer, "hypervisor", "Buyer standard is Hyper-V")
                .status(FactStatus::Partial),
        )
        .unwrap();

    let risk = session
        .create_risk(RiskInput {
            finding: FindingInput::new(
                Domain::Infrastructure,
                "Unsupported hypervisor",
                vec![hypervisor.clone(), buyer_standard.clone()],
            )
            .description("vSphere 6.7 is past end of general support"),
            severity: Severity::High,
            mitigation: Some("Upgrade or migrate before Day 100".to_string()),
        })
        .unwrap()
        .id;

    let work_item = session
        .create_work_item(WorkItemInput {
            finding: FindingInput::new(
                Domain::Infrastructure,
                "Migrate hosts to buyer hypervisor",
                vec![hosts.clone(), buyer_standard.clone()],
            ),
            phase: Phase::Day100,
            priority: Priority::High,
            owner_type: OwnerType::Buyer,
            cost_estimate: CostBucket::From100kTo500k,
            cost_buildup: None,
            triggered_by: vec![risk.clone()],
        })
        .unwrap()
        .id;

    VmwareDeal {
        session,
        hypervisor,
        hosts,
        buyer_standard,
        risk,
        work_item,
    }
}
