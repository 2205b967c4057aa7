//! Read-only rollups over a session's stores.

use std::collections::BTreeMap;

use diligence_cost::{CostAggregator, CostSummary};
use diligence_types::{Domain, Entity, FindingKind, Phase, Severity};
use serde::Serialize;

use crate::dependency::{DependencyTracker, StaleFilter};
use crate::fact_store::FactStore;
use crate::inventory::InventoryStore;
use crate::reasoning_store::ReasoningStore;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreSummary {
    pub facts: usize,
    pub gaps: usize,
    pub facts_by_domain: BTreeMap<Domain, usize>,
    pub facts_by_entity: BTreeMap<Entity, usize>,
    pub gaps_by_domain: BTreeMap<Domain, usize>,
    pub findings_by_kind: BTreeMap<FindingKind, usize>,
    pub risks_by_severity: BTreeMap<Severity, usize>,
    pub work_items_by_phase: BTreeMap<Phase, usize>,
    pub cost: CostSummary,
    pub stale_pending: usize,
    pub stale_reviewed: usize,
    pub triage_pending: usize,
}

fn tally<K: Ord>(keys: impl IntoIterator<Item = K>) -> BTreeMap<K, usize> {
    let mut counts = BTreeMap::new();
    for key in keys {
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

impl StoreSummary {
    #[must_use]
    pub fn collect(
        facts: &FactStore,
        reasoning: &ReasoningStore,
        tracker: &DependencyTracker,
        inventory: &InventoryStore,
        aggregator: &CostAggregator,
    ) -> Self {
        Self {
            facts: facts.fact_count(),
            gaps: facts.gap_count(),
            facts_by_domain: tally(facts.facts().map(|fact| fact.domain())),
            facts_by_entity: tally(facts.facts().map(|fact| fact.entity())),
            gaps_by_domain: tally(facts.gaps().map(|gap| gap.domain())),
            findings_by_kind: tally(reasoning.findings().map(|finding| finding.kind())),
            risks_by_severity: tally(
                reasoning
                    .findings()
                    .filter_map(|finding| finding.as_risk())
                    .map(|risk| risk.severity()),
            ),
            work_items_by_phase: tally(reasoning.work_items().map(|item| item.phase())),
            cost: aggregator.aggregate(reasoning.work_items()),
            stale_pending: tracker.stale_items(StaleFilter::Pending).len(),
            stale_reviewed: tracker.stale_items(StaleFilter::Reviewed).len(),
            triage_pending: inventory.triage_len(),
        }
    }

    #[must_use]
    pub fn findings(&self) -> usize {
        self.findings_by_kind.values().sum()
    }
}
