//! One analysis run: every store wired together.
//!
//! [`AnalysisSession`] is the write path callers are expected to use. It
//! keeps the dependency graph in step with the stores: citing a fact
//! registers a `supports` edge, pricing a work item from facts registers
//! `informs` edges, and revising or deleting a fact runs propagation so
//! dependents are flagged for review.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use diligence_cost::{
    AnchorCatalog, CostAggregator, CostEstimator, CostSummary, Estimate, EstimateRequest,
};
use diligence_types::{
    Domain, Entity, Fact, FactId, FactInput, FindingId, FindingPayload, GapId, GapInput,
    RecommendationInput, RiskInput, StrategicConsiderationInput, ValidationError, WorkItemInput,
};

use crate::dependency::{DependencyTracker, ItemRef, Relationship, StaleFilter, StaleItem};
use crate::fact_store::FactStore;
use crate::inventory::InventoryStore;
use crate::reasoning_store::{DEFAULT_HASH_LEN, ReasoningStore, WriteOutcome, Written};
use crate::snapshot::{SNAPSHOT_VERSION, Snapshot, SnapshotError};
use crate::summary::StoreSummary;
use crate::updater::{ChangeType, InventoryUpdater, PropagationContext, PropagationReport};

/// Strength of the edge from a cited fact to the citing finding.
const CITATION_STRENGTH: f64 = 1.0;
/// Strength of the edge from a build-up's source fact to the work item.
const COST_SOURCE_STRENGTH: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub id_hash_len: usize,
    pub catalog: Arc<AnchorCatalog>,
    pub default_scale_factor: f64,
    pub top_drivers: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            id_hash_len: DEFAULT_HASH_LEN,
            catalog: Arc::new(AnchorCatalog::builtin()),
            default_scale_factor: 1.0,
            top_drivers: 10,
        }
    }
}

#[derive(Debug)]
pub struct AnalysisSession {
    facts: FactStore,
    reasoning: ReasoningStore,
    tracker: DependencyTracker,
    inventory: InventoryStore,
    estimator: CostEstimator,
    aggregator: CostAggregator,
    updater: InventoryUpdater,
}

impl Default for AnalysisSession {
    fn default() -> Self {
        Self::new(SessionOptions::default())
    }
}

impl AnalysisSession {
    #[must_use]
    pub fn new(options: SessionOptions) -> Self {
        Self::from_parts(
            FactStore::new(),
            ReasoningStore::new(options.id_hash_len),
            DependencyTracker::new(),
            InventoryStore::new(),
            &options,
        )
    }

    fn from_parts(
        facts: FactStore,
        reasoning: ReasoningStore,
        tracker: DependencyTracker,
        inventory: InventoryStore,
        options: &SessionOptions,
    ) -> Self {
        Self {
            facts,
            reasoning,
            tracker,
            inventory,
            estimator: CostEstimator::new(Arc::clone(&options.catalog))
                .with_default_scale_factor(options.default_scale_factor),
            aggregator: CostAggregator::new(options.top_drivers),
            updater: InventoryUpdater::new(),
        }
    }

    /// Swap the updater, e.g. to install a domain-specific reconciler.
    #[must_use]
    pub fn with_updater(mut self, updater: InventoryUpdater) -> Self {
        self.updater = updater;
        self
    }

    #[must_use]
    pub fn facts(&self) -> &FactStore {
        &self.facts
    }

    #[must_use]
    pub fn reasoning(&self) -> &ReasoningStore {
        &self.reasoning
    }

    #[must_use]
    pub fn tracker(&self) -> &DependencyTracker {
        &self.tracker
    }

    #[must_use]
    pub fn inventory(&self) -> &InventoryStore {
        &self.inventory
    }

    #[must_use]
    pub fn estimator(&self) -> &CostEstimator {
        &self.estimator
    }

    // --- facts and gaps ---

    pub fn create_fact(&mut self, input: FactInput) -> Result<FactId, ValidationError> {
        self.facts.create_fact(input)
    }

    /// Store a correction of `previous` and flag everything that depended
    /// on it.
    pub fn revise_fact(
        &mut self,
        previous: &FactId,
        input: FactInput,
    ) -> Result<(FactId, PropagationReport), ValidationError> {
        let id = self.facts.revise_fact(previous, input)?;
        let report = self.propagate(std::slice::from_ref(previous), ChangeType::Modified);
        Ok((id, report))
    }

    /// Delete a fact and flag its dependents. Findings citing it are left
    /// as they are.
    pub fn delete_fact(&mut self, id: &FactId) -> Result<(Fact, PropagationReport), ValidationError> {
        let removed = self
            .facts
            .delete_fact(id)
            .ok_or_else(|| ValidationError::not_found("fact", id.to_string()))?;
        let report = self.propagate(std::slice::from_ref(id), ChangeType::Removed);
        Ok((removed, report))
    }

    pub fn create_gap(&mut self, input: GapInput) -> Result<GapId, ValidationError> {
        self.facts.create_gap(input)
    }

    // --- findings ---

    /// Validate and store a finding, then register a `supports` edge from
    /// every citation the stored record gained.
    pub fn create_finding(&mut self, payload: FindingPayload) -> Result<Written, ValidationError> {
        let cited = payload.finding().cited_facts.clone();
        let buildup_sources: Vec<FactId> = match &payload {
            FindingPayload::WorkItem(input) => input
                .cost_buildup
                .as_ref()
                .map(|buildup| buildup.source_facts().to_vec())
                .unwrap_or_default(),
            _ => Vec::new(),
        };

        let written = self.reasoning.create(payload, &self.facts)?;
        let item = ItemRef::finding(&written.id);
        for fact_id in written.new_citations(&cited) {
            self.tracker
                .register(fact_id, &item, Relationship::Supports, CITATION_STRENGTH)?;
        }
        let priced = matches!(
            written.outcome,
            WriteOutcome::Created
                | WriteOutcome::Merged {
                    attached_buildup: true,
                    ..
                }
        );
        if priced {
            self.register_cost_sources(&item, &buildup_sources);
        }
        Ok(written)
    }

    pub fn create_risk(&mut self, input: RiskInput) -> Result<Written, ValidationError> {
        self.create_finding(FindingPayload::Risk(input))
    }

    pub fn create_work_item(&mut self, input: WorkItemInput) -> Result<Written, ValidationError> {
        self.create_finding(FindingPayload::WorkItem(input))
    }

    pub fn create_strategic_consideration(
        &mut self,
        input: StrategicConsiderationInput,
    ) -> Result<Written, ValidationError> {
        self.create_finding(FindingPayload::StrategicConsideration(input))
    }

    pub fn create_recommendation(
        &mut self,
        input: RecommendationInput,
    ) -> Result<Written, ValidationError> {
        self.create_finding(FindingPayload::Recommendation(input))
    }

    /// Source facts that are not in the store get no edge; a build-up may
    /// cite context the store never saw. An existing edge (usually a
    /// citation) is left as it is.
    fn register_cost_sources(&self, item: &ItemRef, sources: &[FactId]) {
        let linked: BTreeSet<FactId> = self
            .tracker
            .dependencies_of(item)
            .into_iter()
            .map(|dependency| dependency.fact_id)
            .collect();
        for fact_id in sources {
            if linked.contains(fact_id) {
                continue;
            }
            if !self.facts.contains_fact(fact_id) {
                tracing::debug!(fact_id = %fact_id, item = %item, "Skipping unknown cost source");
                continue;
            }
            if let Err(err) =
                self.tracker
                    .register(fact_id, item, Relationship::Informs, COST_SOURCE_STRENGTH)
            {
                tracing::warn!(error = %err, "Failed to register cost source");
            }
        }
    }

    // --- cost ---

    /// Price `request` and attach the build-up to work item `id`.
    ///
    /// An anchor miss leaves the work item on its cost bucket and returns
    /// [`Estimate::NoMatch`].
    pub fn estimate_and_attach(
        &mut self,
        id: &FindingId,
        request: &EstimateRequest,
    ) -> Result<Estimate, ValidationError> {
        let finding = self.reasoning.require(id)?;
        if finding.as_work_item().is_none() {
            return Err(ValidationError::missing_with_hint(
                "finding_id",
                format!("{id} is not a work item"),
                "cost build-ups attach to work items only",
            ));
        }
        let estimate = self.estimator.estimate(request)?;
        if let Estimate::Matched(buildup) = &estimate {
            self.reasoning.attach_cost_buildup(id, buildup.clone())?;
            self.register_cost_sources(&ItemRef::finding(id), buildup.source_facts());
        }
        Ok(estimate)
    }

    #[must_use]
    pub fn cost_summary(&self) -> CostSummary {
        self.aggregator.aggregate(self.reasoning.work_items())
    }

    #[must_use]
    pub fn summary(&self) -> StoreSummary {
        StoreSummary::collect(
            &self.facts,
            &self.reasoning,
            &self.tracker,
            &self.inventory,
            &self.aggregator,
        )
    }

    // --- staleness ---

    pub fn propagate(&mut self, changed: &[FactId], change_type: ChangeType) -> PropagationReport {
        self.updater.propagate(
            PropagationContext {
                facts: &self.facts,
                reasoning: &self.reasoning,
                inventory: &mut self.inventory,
                tracker: &self.tracker,
            },
            changed,
            change_type,
        )
    }

    pub fn mark_reviewed(&self, item: &ItemRef) -> Result<(), ValidationError> {
        self.tracker.mark_reviewed(item)
    }

    pub fn clear_stale_flag(&self, item: &ItemRef) -> Option<StaleItem> {
        self.tracker.clear_stale_flag(item)
    }

    #[must_use]
    pub fn stale_items(&self, filter: StaleFilter) -> Vec<StaleItem> {
        self.tracker.stale_items(filter)
    }

    // --- inventory ---

    pub fn add_inventory_item(
        &mut self,
        domain: Domain,
        entity: Entity,
        name: &str,
        attributes: BTreeMap<String, String>,
    ) -> Result<String, ValidationError> {
        self.inventory.add_item(domain, entity, name, attributes)
    }

    /// Promote a triage candidate and link its fact to the new item.
    pub fn accept_candidate(&mut self, fact_id: &FactId) -> Result<String, ValidationError> {
        let id = self.inventory.accept_candidate(fact_id, &self.facts)?;
        self.tracker.register(
            fact_id,
            &ItemRef::inventory(id.clone()),
            Relationship::Supports,
            CITATION_STRENGTH,
        )?;
        Ok(id)
    }

    // --- persistence ---

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            id_hash_len: self.reasoning.hash_len(),
            facts: self.facts.facts().cloned().collect(),
            gaps: self.facts.gaps().cloned().collect(),
            findings: self.reasoning.findings().cloned().collect(),
            ledger: self.facts.ledger(),
            tracker: self.tracker.snapshot(),
            inventory: self.inventory.snapshot(),
        }
    }

    /// Rebuild a session. The snapshot's identifier length wins over the
    /// configured one so stored identifiers keep matching new writes.
    pub fn from_snapshot(snapshot: Snapshot, options: &SessionOptions) -> Result<Self, SnapshotError> {
        if snapshot.id_hash_len != options.id_hash_len {
            tracing::info!(
                snapshot = snapshot.id_hash_len,
                configured = options.id_hash_len,
                "Using identifier length recorded in snapshot"
            );
        }
        let facts = FactStore::from_records(snapshot.facts, snapshot.gaps, snapshot.ledger)?;
        let reasoning = ReasoningStore::from_findings(snapshot.id_hash_len, snapshot.findings, &facts)?;
        let tracker = DependencyTracker::from_snapshot(snapshot.tracker)?;
        let inventory = InventoryStore::from_snapshot(snapshot.inventory)?;
        Ok(Self::from_parts(facts, reasoning, tracker, inventory, options))
    }

    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        self.snapshot().save(path)
    }

    pub fn load(path: &Path, options: &SessionOptions) -> Result<Self, SnapshotError> {
        Self::from_snapshot(Snapshot::load(path)?, options)
    }
}
