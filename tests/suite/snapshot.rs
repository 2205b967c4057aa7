//! Whole-session persistence.

use diligence_cost::EstimateRequest;
use diligence_store::{AnalysisSession, ChangeType, SessionOptions, Snapshot, SnapshotError, StaleFilter};
use serde_json::Value;
use tempfile::tempdir;

use crate::common::vmware_deal;

#[test]
fn session_round_trips_through_disk() {
    let mut deal = vmware_deal();
    deal.session
        .estimate_and_attach(
            &deal.work_item,
            &EstimateRequest::new("server_refresh", 40)
                .assumption("hosts refreshed one for one")
                .source_facts([deal.hosts.clone()]),
        )
        .unwrap();
    deal.session.propagate(&[deal.hypervisor.clone()], ChangeType::Modified);

    let dir = tempdir().unwrap();
    let path = dir.path().join("analysis.json");
    deal.session.save(&path).unwrap();

    let restored = AnalysisSession::load(&path, &SessionOptions::default()).unwrap();
    assert_eq!(restored.snapshot(), deal.session.snapshot());
    assert_eq!(
        restored.stale_items(StaleFilter::Pending),
        deal.session.stale_items(StaleFilter::Pending)
    );
    assert_eq!(restored.cost_summary(), deal.session.cost_summary());
}

#[test]
fn restored_session_continues_sequences() {
    let deal = vmware_deal();
    let snapshot = deal.session.snapshot();
    let mut restored = AnalysisSession::from_snapshot(snapshot, &SessionOptions::default()).unwrap();
    let next = restored
        .create_fact(crate::common::target_fact(
            diligence_types::Domain::Infrastructure,
            "storage",
            "NetApp FAS8200",
        ))
        .unwrap();
    assert_eq!(next.to_string(), "F-TGT-INFRA-003");
}

#[test]
fn tampered_snapshot_is_rejected() {
    let deal = vmware_deal();
    let mut value: Value = serde_json::to_value(deal.session.snapshot()).unwrap();

    // Strip the target citation from the risk, leaving it buyer-only.
    let buyer = deal.buyer_standard.to_string();
    for finding in value["findings"].as_array_mut().unwrap() {
        if finding["kind"] == "risk" {
            finding["cited_facts"] = serde_json::json!([buyer]);
        }
    }

    let text = serde_json::to_string(&value).unwrap();
    assert!(Snapshot::from_json(&text).is_err());
}

#[test]
fn citations_must_resolve_on_load() {
    let deal = vmware_deal();
    let mut snapshot = deal.session.snapshot();
    snapshot.facts.retain(|fact| fact.id() != &deal.hosts);

    let err = AnalysisSession::from_snapshot(snapshot, &SessionOptions::default()).unwrap_err();
    match err {
        SnapshotError::Invalid(inner) => assert_eq!(inner.code(), "NOT_FOUND"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn deleted_citation_survives_reload() {
    let mut deal = vmware_deal();
    deal.session.delete_fact(&deal.hosts).unwrap();

    let dir = tempdir().unwrap();
    let path = dir.path().join("analysis.json");
    deal.session.save(&path).unwrap();

    let restored = AnalysisSession::load(&path, &SessionOptions::default()).unwrap();
    assert_eq!(restored.snapshot(), deal.session.snapshot());
    assert!(restored.facts().fact(&deal.hosts).is_none());
    assert!(restored.facts().was_deleted(&deal.hosts));
    let work_item = restored.reasoning().get(&deal.work_item).unwrap();
    assert!(work_item.cited_facts().contains(&deal.hosts));
    assert_eq!(
        restored.stale_items(StaleFilter::Pending),
        deal.session.stale_items(StaleFilter::Pending)
    );
}

#[test]
fn deleted_identifiers_stay_retired_after_reload() {
    let mut deal = vmware_deal();
    deal.session.delete_fact(&deal.hosts).unwrap();

    let mut restored =
        AnalysisSession::from_snapshot(deal.session.snapshot(), &SessionOptions::default()).unwrap();
    let next = restored
        .create_fact(crate::common::target_fact(
            diligence_types::Domain::Infrastructure,
            "compute",
            "38 physical ESXi hosts",
        ))
        .unwrap();
    assert_ne!(next, deal.hosts);
    assert_eq!(next.to_string(), "F-TGT-INFRA-003");
}
