//! Fact revisions and deletions flowing into stale flags and the inventory.

use std::collections::BTreeMap;

use diligence_store::{ChangeType, ItemRef, ItemType, ReviewStatus, StaleFilter};
use diligence_types::{Domain, Entity, FactDetails};

use crate::common::{target_fact, vmware_deal};

#[test]
fn revising_a_cited_fact_flags_risk_and_remediation() {
    let mut deal = vmware_deal();
    let (revised, report) = deal
        .session
        .revise_fact(
            &deal.hypervisor,
            target_fact(Domain::Infrastructure, "hypervisor", "VMware vSphere 7.0 U3, supported"),
        )
        .unwrap();

    assert!(report.is_clean());
    assert_eq!(report.change_type, ChangeType::Modified);
    assert_eq!(report.stale_risks, 1);
    // The work item cites other facts but is triggered by the stale risk.
    assert_eq!(report.stale_work_items, 1);

    let work_item = deal
        .session
        .tracker()
        .stale_item(&ItemRef::finding(&deal.work_item))
        .unwrap();
    assert!(work_item.changed_facts.contains(&deal.hypervisor));
    assert_eq!(deal.session.facts().latest_version(&deal.hypervisor), revised);
}

#[test]
fn repeated_changes_accumulate_on_one_flag() {
    let mut deal = vmware_deal();
    let hypervisor = deal.hypervisor.clone();
    let buyer = deal.buyer_standard.clone();
    deal.session.propagate(&[hypervisor.clone()], ChangeType::Modified);
    deal.session.propagate(&[buyer.clone()], ChangeType::Modified);

    let risk_flags: Vec<_> = deal
        .session
        .stale_items(StaleFilter::All)
        .into_iter()
        .filter(|flag| flag.item.item_type == ItemType::Risk)
        .collect();
    assert_eq!(risk_flags.len(), 1);
    assert_eq!(risk_flags[0].changed_facts, [hypervisor, buyer].into_iter().collect());
}

#[test]
fn review_then_new_change_reopens() {
    let mut deal = vmware_deal();
    let risk = ItemRef::finding(&deal.risk);
    let hosts = deal.hosts.clone();
    let hypervisor = deal.hypervisor.clone();

    deal.session.propagate(&[hypervisor], ChangeType::Modified);
    deal.session.mark_reviewed(&risk).unwrap();
    assert_eq!(
        deal.session.tracker().stale_item(&risk).unwrap().status,
        ReviewStatus::Reviewed
    );

    // hosts only supports the work item, so the reviewed risk stays closed.
    deal.session.propagate(&[hosts], ChangeType::Modified);
    assert!(!deal.session.tracker().is_stale(&risk));

    deal.session.propagate(&[deal.buyer_standard.clone()], ChangeType::Modified);
    assert!(deal.session.tracker().is_stale(&risk));
    assert!(deal.session.clear_stale_flag(&risk).is_some());
}

#[test]
fn inventory_is_reconciled_and_unmatched_facts_wait_in_triage() {
    let mut deal = vmware_deal();
    let item = deal
        .session
        .add_inventory_item(Domain::Infrastructure, Entity::Target, "vmware vsphere", BTreeMap::new())
        .unwrap();

    let crm = deal
        .session
        .create_fact(
            target_fact(Domain::Applications, "crm", "Salesforce Sales Cloud, 120 seats").details(
                FactDetails::Application {
                    name: "Salesforce".to_string(),
                    vendor: Some("Salesforce".to_string()),
                    version: None,
                    hosting: Some("saas".to_string()),
                    user_count: Some(120),
                },
            ),
        )
        .unwrap();

    let report = deal
        .session
        .propagate(&[deal.hypervisor.clone(), crm.clone()], ChangeType::Added);
    assert_eq!(report.by_domain[&Domain::Infrastructure].updated, 1);
    assert_eq!(report.by_domain[&Domain::Applications].added, 1);

    let stored = deal.session.inventory().item(&item).unwrap();
    assert_eq!(stored.attributes["version"], "6.7");
    assert_eq!(deal.session.inventory().items().count(), 1);

    let accepted = deal.session.accept_candidate(&crm).unwrap();
    assert_eq!(accepted, "INV-APP-001");
    assert_eq!(
        deal.session.tracker().dependencies_of(&ItemRef::inventory(accepted))[0].fact_id,
        crm
    );
}

#[test]
fn deleting_a_fact_flags_without_cascading() {
    let mut deal = vmware_deal();
    let (removed, report) = deal.session.delete_fact(&deal.hosts.clone()).unwrap();

    assert_eq!(removed.id(), &deal.hosts);
    assert_eq!(report.change_type, ChangeType::Removed);
    assert_eq!(report.stale_work_items, 1);
    // The work item still cites the deleted fact.
    let work_item = deal.session.reasoning().get(&deal.work_item).unwrap();
    assert!(work_item.cited_facts().contains(&deal.hosts));
    assert_eq!(
        deal.session.stale_items(StaleFilter::Pending).len(),
        1
    );
}
