//! Work item cost roll-up.
//!
//! Each item resolves on its own: a computed [`CostBuildUp`] wins over the
//! coarse bucket whenever one is attached. Low and high are summed
//! independently across every dimension.
//!
//! [`CostBuildUp`]: diligence_types::CostBuildUp

use std::collections::BTreeMap;

use diligence_types::{CostRange, Domain, FindingId, OwnerType, Phase, WorkItem};
use serde::Serialize;

/// Where an item's figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CostSource {
    CostBuildup,
    CostRange,
}

impl CostSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            CostSource::CostBuildup => "cost_buildup",
            CostSource::CostRange => "cost_range",
        }
    }
}

/// One work item's resolved cost.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemCost {
    pub id: FindingId,
    pub title: String,
    pub domain: Domain,
    pub phase: Phase,
    pub owner_type: OwnerType,
    pub cost: CostRange,
    pub source: CostSource,
    pub anchor_key: Option<String>,
}

impl ItemCost {
    #[must_use]
    pub fn resolve(item: &WorkItem) -> Self {
        let (cost, source, anchor_key) = match item.cost_buildup() {
            Some(buildup) => (
                buildup.total(),
                CostSource::CostBuildup,
                Some(buildup.anchor_key().to_string()),
            ),
            None => (item.cost_estimate().range(), CostSource::CostRange, None),
        };
        Self {
            id: item.id().clone(),
            title: item.title().to_string(),
            domain: item.domain(),
            phase: item.phase(),
            owner_type: item.owner_type(),
            cost,
            source,
            anchor_key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CostSummary {
    pub total: CostRange,
    pub by_phase: BTreeMap<Phase, CostRange>,
    pub by_domain: BTreeMap<Domain, CostRange>,
    pub by_owner: BTreeMap<OwnerType, CostRange>,
    pub items: Vec<ItemCost>,
    /// Highest-cost items by high estimate, descending.
    pub top_drivers: Vec<ItemCost>,
}

impl CostSummary {
    #[must_use]
    pub fn count_by_source(&self, source: CostSource) -> usize {
        self.items.iter().filter(|item| item.source == source).count()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CostAggregator {
    top_n: usize,
}

impl Default for CostAggregator {
    fn default() -> Self {
        Self { top_n: 10 }
    }
}

impl CostAggregator {
    #[must_use]
    pub const fn new(top_n: usize) -> Self {
        Self { top_n }
    }

    pub fn aggregate<'a>(&self, items: impl IntoIterator<Item = &'a WorkItem>) -> CostSummary {
        let mut summary = CostSummary::default();
        for item in items {
            let resolved = ItemCost::resolve(item);
            summary.total += resolved.cost;
            *summary.by_phase.entry(resolved.phase).or_default() += resolved.cost;
            *summary.by_domain.entry(resolved.domain).or_default() += resolved.cost;
            *summary.by_owner.entry(resolved.owner_type).or_default() += resolved.cost;
            summary.items.push(resolved);
        }

        let mut ranked = summary.items.clone();
        ranked.sort_by(|a, b| {
            b.cost
                .high()
                .total_cmp(&a.cost.high())
                .then_with(|| a.id.cmp(&b.id))
        });
        ranked.truncate(self.top_n);
        summary.top_drivers = ranked;

        tracing::debug!(
            items = summary.items.len(),
            total_low = summary.total.low(),
            total_high = summary.total.high(),
            "Aggregated work item costs"
        );
        summary
    }
}
