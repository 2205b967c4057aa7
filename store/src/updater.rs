//! Inventory Updater - end-to-end propagation of fact changes.
//!
//! For a batch of changed facts: group by domain (parsed from the fact
//! identifiers), reconcile each domain against the inventory view, then flag
//! every dependent finding stale, following work items triggered by a stale
//! risk. A failing domain is recorded and skipped; it never stops the
//! others or the staleness pass.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use diligence_types::{Domain, FactId, FindingId};
use serde::Serialize;
use thiserror::Error;

use crate::dependency::{DependencyTracker, ItemRef, ItemType, Relationship};
use crate::fact_store::FactStore;
use crate::inventory::{InventoryStore, NameMatchReconciler, Reconciler, Reconciliation, TriageCandidate};
use crate::reasoning_store::ReasoningStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Modified,
    Removed,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeType::Added => "added",
            ChangeType::Modified => "modified",
            ChangeType::Removed => "removed",
        })
    }
}

/// One domain's reconciliation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{domain}: {message}")]
pub struct PropagationError {
    pub domain: Domain,
    pub message: String,
}

/// Per-domain counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DomainOutcome {
    /// Facts queued for triage as candidate new inventory entries.
    pub added: usize,
    /// Inventory items merged with or detached from a changed fact.
    pub updated: usize,
    /// Items flagged stale because of this domain's facts.
    pub flagged: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropagationReport {
    pub change_type: ChangeType,
    pub by_domain: BTreeMap<Domain, DomainOutcome>,
    pub stale_risks: usize,
    pub stale_work_items: usize,
    /// Every item flagged by this run, in order.
    pub flagged: Vec<ItemRef>,
    pub errors: Vec<PropagationError>,
}

impl PropagationReport {
    fn new(change_type: ChangeType) -> Self {
        Self {
            change_type,
            by_domain: BTreeMap::new(),
            stale_risks: 0,
            stale_work_items: 0,
            flagged: Vec::new(),
            errors: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Stores a propagation run reads and writes.
pub struct PropagationContext<'a> {
    pub facts: &'a FactStore,
    pub reasoning: &'a ReasoningStore,
    pub inventory: &'a mut InventoryStore,
    pub tracker: &'a DependencyTracker,
}

pub struct InventoryUpdater {
    reconcilers: BTreeMap<Domain, Box<dyn Reconciler>>,
    fallback: Box<dyn Reconciler>,
}

impl Default for InventoryUpdater {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InventoryUpdater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InventoryUpdater")
            .field("custom_domains", &self.reconcilers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl InventoryUpdater {
    /// Name matching in every domain.
    #[must_use]
    pub fn new() -> Self {
        Self {
            reconcilers: BTreeMap::new(),
            fallback: Box::new(NameMatchReconciler),
        }
    }

    #[must_use]
    pub fn with_reconciler(mut self, domain: Domain, reconciler: impl Reconciler + 'static) -> Self {
        self.reconcilers.insert(domain, Box::new(reconciler));
        self
    }

    fn reconciler(&self, domain: Domain) -> &dyn Reconciler {
        self.reconcilers
            .get(&domain)
            .map_or(self.fallback.as_ref(), Box::as_ref)
    }

    pub fn propagate(
        &self,
        ctx: PropagationContext<'_>,
        changed: &[FactId],
        change_type: ChangeType,
    ) -> PropagationReport {
        let PropagationContext {
            facts,
            reasoning,
            inventory,
            tracker,
        } = ctx;
        let mut report = PropagationReport::new(change_type);

        let mut by_domain: BTreeMap<Domain, Vec<&FactId>> = BTreeMap::new();
        for id in changed {
            by_domain.entry(id.domain()).or_default().push(id);
        }

        let mut fresh_edges: Vec<(FactId, ItemRef)> = Vec::new();
        for (domain, ids) in &by_domain {
            let outcome = report.by_domain.entry(*domain).or_default();
            match self.reconcile_domain(facts, inventory, *domain, ids, change_type) {
                Ok((counts, edges)) => {
                    *outcome = counts;
                    fresh_edges.extend(edges);
                }
                Err(message) => {
                    tracing::warn!(%domain, %message, "Inventory reconciliation failed");
                    report.errors.push(PropagationError {
                        domain: *domain,
                        message,
                    });
                }
            }
        }

        let mut seen: BTreeSet<ItemRef> = BTreeSet::new();
        let mut stale_risks: Vec<FindingId> = Vec::new();
        for (domain, ids) in &by_domain {
            for id in ids {
                let reason = format!("fact {id} {change_type}");
                for item in tracker.flag_affected_by_fact_change(id, &reason) {
                    if !seen.insert(item.clone()) {
                        continue;
                    }
                    if let Some(outcome) = report.by_domain.get_mut(domain) {
                        outcome.flagged += 1;
                    }
                    if item.item_type == ItemType::Risk {
                        if let Ok(risk) = FindingId::parse(&item.item_id) {
                            stale_risks.push(risk);
                        }
                    }
                    report.flagged.push(item);
                }
            }
        }

        // Work items remediating a stale risk are stale too.
        for risk in &stale_risks {
            let changed_facts: Vec<FactId> = tracker
                .stale_item(&ItemRef::finding(risk))
                .map(|flag| flag.changed_facts.into_iter().collect())
                .unwrap_or_default();
            for item in reasoning.triggered_by(risk) {
                let item_ref = ItemRef::finding(item.id());
                tracker.flag_stale(
                    &item_ref,
                    &format!("triggering risk {risk} is stale"),
                    changed_facts.iter().cloned(),
                );
                if seen.insert(item_ref.clone()) {
                    report.flagged.push(item_ref);
                }
            }
        }

        // Registered last so the new edges are not flagged by this same run.
        for (fact_id, item) in fresh_edges {
            if let Err(err) = tracker.register(&fact_id, &item, Relationship::Supports, 1.0) {
                report.errors.push(PropagationError {
                    domain: fact_id.domain(),
                    message: err.to_string(),
                });
            }
        }

        report.stale_risks = seen.iter().filter(|i| i.item_type == ItemType::Risk).count();
        report.stale_work_items = seen
            .iter()
            .filter(|i| i.item_type == ItemType::WorkItem)
            .count();

        tracing::info!(
            %change_type,
            facts = changed.len(),
            flagged = report.flagged.len(),
            errors = report.errors.len(),
            "Propagated fact changes"
        );
        report
    }

    /// All-or-nothing per domain: the inventory is only replaced when every
    /// fact in the domain reconciled.
    fn reconcile_domain(
        &self,
        facts: &FactStore,
        inventory: &mut InventoryStore,
        domain: Domain,
        ids: &[&FactId],
        change_type: ChangeType,
    ) -> Result<(DomainOutcome, Vec<(FactId, ItemRef)>), String> {
        let mut working = inventory.clone();
        let mut edges = Vec::new();
        let mut counts = DomainOutcome::default();

        for id in ids {
            if change_type == ChangeType::Removed {
                counts.updated += working.detach_fact(id).len();
                continue;
            }
            let current = facts.latest_version(id);
            let fact = facts
                .fact(&current)
                .ok_or_else(|| format!("changed fact {current} is not in the store"))?;
            match self.reconciler(domain).reconcile(fact, &working)? {
                Reconciliation::Matched { item_id } => {
                    working
                        .merge_fact(&item_id, fact)
                        .map_err(|err| err.to_string())?;
                    edges.push((current.clone(), ItemRef::inventory(item_id)));
                    counts.updated += 1;
                }
                Reconciliation::Unmatched { name, reason } => {
                    if working.queue_candidate(TriageCandidate {
                        fact_id: current.clone(),
                        domain,
                        name,
                        reason,
                    }) {
                        counts.added += 1;
                    }
                }
                Reconciliation::Skipped => {}
            }
        }

        *inventory = working;
        Ok((counts, edges))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diligence_types::{
        CostBucket, Entity, Evidence, Fact, FactDetails, FactInput, FindingInput, OwnerType,
        Phase, Priority, RiskInput, Severity, WorkItemInput,
    };

    use crate::dependency::StaleFilter;

    struct Fixture {
        facts: FactStore,
        reasoning: ReasoningStore,
        inventory: InventoryStore,
        tracker: DependencyTracker,
        erp: FactId,
        firewall: FactId,
        risk: FindingId,
        work_item: FindingId,
    }

    fn erp_input(version: &str) -> FactInput {
        FactInput::new(
            Domain::Applications,
            Entity::Target,
            "erp",
            format!("SAP ECC {version} in production"),
        )
        .details(FactDetails::Application {
            name: "SAP ECC".to_string(),
            vendor: Some("SAP".to_string()),
            version: Some(version.to_string()),
            hosting: None,
            user_count: None,
        })
        .evidence(Evidence::quoted("SAP ECC", "Application inventory"))
    }

    fn fixture() -> Fixture {
        let mut facts = FactStore::new();
        let erp = facts.create_fact(erp_input("6.0")).unwrap();
        let firewall = facts
            .create_fact(
                FactInput::new(Domain::Network, Entity::Target, "firewall", "ASA 5500 at HQ")
                    .details(FactDetails::General)
                    .evidence(Evidence::quoted("Cisco ASA", "Network diagram")),
            )
            .unwrap();

        let mut reasoning = ReasoningStore::default();
        let risk = reasoning
            .create_risk(
                RiskInput {
                    finding: FindingInput::new(Domain::Applications, "ERP end of support", vec![erp.clone()]),
                    severity: Severity::High,
                    mitigation: None,
                },
                &facts,
            )
            .unwrap()
            .id;
        let work_item = reasoning
            .create_work_item(
                WorkItemInput {
                    finding: FindingInput::new(Domain::Network, "Segment ERP traffic", vec![firewall.clone()]),
                    phase: Phase::Day100,
                    priority: Priority::High,
                    owner_type: OwnerType::Buyer,
                    cost_estimate: CostBucket::From100kTo500k,
                    cost_buildup: None,
                    triggered_by: vec![risk.clone()],
                },
                &facts,
            )
            .unwrap()
            .id;

        let tracker = DependencyTracker::new();
        tracker
            .register(&erp, &ItemRef::finding(&risk), Relationship::Supports, 1.0)
            .unwrap();
        tracker
            .register(&firewall, &ItemRef::finding(&work_item), Relationship::Supports, 1.0)
            .unwrap();

        let mut inventory = InventoryStore::new();
        inventory
            .add_item(Domain::Applications, Entity::Target, "SAP ECC", BTreeMap::new())
            .unwrap();

        Fixture {
            facts,
            reasoning,
            inventory,
            tracker,
            erp,
            firewall,
            risk,
            work_item,
        }
    }

    fn run(fx: &mut Fixture, updater: &InventoryUpdater, changed: &[FactId], change: ChangeType) -> PropagationReport {
        updater.propagate(
            PropagationContext {
                facts: &fx.facts,
                reasoning: &fx.reasoning,
                inventory: &mut fx.inventory,
                tracker: &fx.tracker,
            },
            changed,
            change,
        )
    }

    #[test]
    fn revision_merges_inventory_and_flags_triggered_work_items() {
        let mut fx = fixture();
        let revised = fx.facts.revise_fact(&fx.erp, erp_input("6.0 EHP8")).unwrap();
        let erp = fx.erp.clone();

        let report = run(&mut fx, &InventoryUpdater::new(), &[erp], ChangeType::Modified);

        assert!(report.is_clean());
        assert_eq!(report.by_domain[&Domain::Applications].updated, 1);
        assert_eq!(report.by_domain[&Domain::Applications].flagged, 1);
        assert_eq!(report.stale_risks, 1);
        assert_eq!(report.stale_work_items, 1);
        assert!(fx.tracker.is_stale(&ItemRef::finding(&fx.risk)));
        assert!(fx.tracker.is_stale(&ItemRef::finding(&fx.work_item)));

        let item = fx.inventory.item("INV-APP-001").unwrap();
        assert_eq!(item.attributes["version"], "6.0 EHP8");
        assert!(item.source_fact_ids.contains(&revised));
        assert_eq!(
            fx.tracker.dependents_of(&revised)[0].item,
            ItemRef::inventory("INV-APP-001")
        );
        assert!(!fx.tracker.is_stale(&ItemRef::inventory("INV-APP-001")));
    }

    #[test]
    fn unmatched_fact_is_queued_not_created() {
        let mut fx = fixture();
        let crm = fx
            .facts
            .create_fact(
                FactInput::new(Domain::Applications, Entity::Target, "crm", "Salesforce org")
                    .details(FactDetails::Application {
                        name: "Salesforce".to_string(),
                        vendor: None,
                        version: None,
                        hosting: Some("SaaS".to_string()),
                        user_count: Some(120),
                    })
                    .evidence(Evidence::quoted("Salesforce", "Application inventory")),
            )
            .unwrap();

        let report = run(&mut fx, &InventoryUpdater::new(), &[crm.clone()], ChangeType::Added);

        assert_eq!(report.by_domain[&Domain::Applications].added, 1);
        assert_eq!(report.stale_risks, 0);
        assert_eq!(fx.inventory.items().count(), 1);
        assert_eq!(fx.inventory.triage().next().unwrap().fact_id, crm);
    }

    struct Broken;

    impl Reconciler for Broken {
        fn reconcile(&self, _fact: &Fact, _inventory: &InventoryStore) -> Result<Reconciliation, String> {
            Err("site register unavailable".to_string())
        }
    }

    #[test]
    fn one_failing_domain_does_not_stop_the_others() {
        let mut fx = fixture();
        let updater = InventoryUpdater::new().with_reconciler(Domain::Network, Broken);
        let changed = [fx.erp.clone(), fx.firewall.clone()];

        let report = run(&mut fx, &updater, &changed, ChangeType::Modified);

        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].domain, Domain::Network);
        assert_eq!(report.errors[0].to_string(), "network: site register unavailable");
        assert_eq!(report.by_domain[&Domain::Applications].updated, 1);
        // Staleness still runs for the failed domain.
        assert!(fx.tracker.is_stale(&ItemRef::finding(&fx.work_item)));
        assert_eq!(report.stale_work_items, 1);
    }

    #[test]
    fn removal_detaches_inventory_sources() {
        let mut fx = fixture();
        let erp = fx.erp.clone();
        run(&mut fx, &InventoryUpdater::new(), &[erp.clone()], ChangeType::Modified);
        assert!(fx.inventory.item("INV-APP-001").unwrap().source_fact_ids.contains(&erp));

        fx.facts.delete_fact(&erp);
        let report = run(&mut fx, &InventoryUpdater::new(), &[erp.clone()], ChangeType::Removed);

        assert_eq!(report.by_domain[&Domain::Applications].updated, 1);
        assert!(fx.inventory.item("INV-APP-001").unwrap().source_fact_ids.is_empty());
        let flags = fx.tracker.stale_items(StaleFilter::Pending);
        assert!(flags.iter().any(|flag| flag.reason == format!("fact {erp} removed")));
    }
}
