//! Reasoning Store - findings keyed by content-derived identifiers.
//!
//! A finding's identifier is a short hash of its content key (variant,
//! domain, normalized title and, for work items, owner type). Independent
//! callers describing the same conclusion therefore converge on one record
//! instead of forking near-duplicates. A content-key index sits beside the
//! identifiers so that two *different* keys hashing to the same identifier
//! are refused with `ID_COLLISION` rather than overwriting each other.

use std::collections::BTreeMap;

use diligence_types::{
    ContentKey, CostBuildUp, Entity, FactId, Finding, FindingId, FindingPayload,
    RecommendationInput, RiskInput, StrategicConsiderationInput, ValidationError, WorkItem,
    WorkItemInput,
};

use crate::fact_store::FactStore;
use crate::validation::validate_payload;

/// Digest length used when none is configured.
pub const DEFAULT_HASH_LEN: usize = FindingId::MIN_DIGEST_LEN;

/// What a create call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    /// The content key already existed. The first record is kept; only
    /// citations it did not already hold are added, plus the incoming cost
    /// build-up when the stored work item had none.
    Merged {
        added_citations: Vec<FactId>,
        attached_buildup: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Written {
    pub id: FindingId,
    pub entity: Entity,
    pub outcome: WriteOutcome,
}

impl Written {
    /// Citations that are new on the stored record after this write.
    #[must_use]
    pub fn new_citations<'a>(&'a self, payload_citations: &'a [FactId]) -> &'a [FactId] {
        match &self.outcome {
            WriteOutcome::Created => payload_citations,
            WriteOutcome::Merged {
                added_citations, ..
            } => added_citations,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReasoningStore {
    findings: BTreeMap<FindingId, Finding>,
    by_key: BTreeMap<ContentKey, FindingId>,
    hash_len: usize,
}

impl Default for ReasoningStore {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_LEN)
    }
}

impl ReasoningStore {
    /// `hash_len` is clamped to the supported digest range.
    #[must_use]
    pub fn new(hash_len: usize) -> Self {
        let clamped = hash_len.clamp(FindingId::MIN_DIGEST_LEN, FindingId::MAX_DIGEST_LEN);
        if clamped != hash_len {
            tracing::warn!(requested = hash_len, using = clamped, "Clamped identifier hash length");
        }
        Self {
            findings: BTreeMap::new(),
            by_key: BTreeMap::new(),
            hash_len: clamped,
        }
    }

    #[must_use]
    pub const fn hash_len(&self) -> usize {
        self.hash_len
    }

    /// Validate and store a finding of any variant.
    ///
    /// Nothing is written unless every check passes: required fields, the
    /// entity anchor rule, existence of each cited fact and triggering risk,
    /// and identifier uniqueness.
    pub fn create(
        &mut self,
        payload: FindingPayload,
        facts: &FactStore,
    ) -> Result<Written, ValidationError> {
        let result = self.try_create(payload, facts);
        if let Err(err) = &result {
            tracing::warn!(code = err.code(), error = %err, "Rejected finding");
        }
        result
    }

    fn try_create(
        &mut self,
        payload: FindingPayload,
        facts: &FactStore,
    ) -> Result<Written, ValidationError> {
        let entity = validate_payload(&payload, facts)?;
        if let FindingPayload::WorkItem(input) = &payload {
            for risk in &input.triggered_by {
                if !self.findings.contains_key(risk) {
                    return Err(ValidationError::not_found("risk", risk.to_string()));
                }
            }
        }

        let key = payload.content_key();
        if let Some(existing) = self.by_key.get(&key).cloned() {
            let finding = self
                .findings
                .get_mut(&existing)
                .ok_or_else(|| ValidationError::not_found("finding", existing.to_string()))?;

            // An incoming build-up must price an unpriced item or match the
            // stored one.
            let mut attached_buildup = false;
            if let FindingPayload::WorkItem(WorkItemInput {
                cost_buildup: Some(incoming),
                ..
            }) = &payload
            {
                let current = finding
                    .as_work_item()
                    .and_then(WorkItem::cost_buildup)
                    .cloned();
                match current {
                    Some(current) if current != *incoming => {
                        return Err(ValidationError::missing_with_hint(
                            "cost_buildup",
                            format!("{existing} is already priced with a different build-up"),
                            "re-price the existing work item with estimate_and_attach",
                        ));
                    }
                    Some(_) => {}
                    None => {
                        finding.set_cost_buildup(incoming.clone())?;
                        attached_buildup = true;
                    }
                }
            }

            let added = finding.absorb_citations(&payload.finding().cited_facts);
            tracing::debug!(
                finding_id = %existing,
                added = added.len(),
                attached_buildup,
                "Converged duplicate finding"
            );
            return Ok(Written {
                id: existing,
                entity: finding.entity(),
                outcome: WriteOutcome::Merged {
                    added_citations: added,
                    attached_buildup,
                },
            });
        }

        let id = FindingId::derive(payload.kind(), &key, self.hash_len);
        if let Some(occupant) = self.findings.get(&id) {
            return Err(ValidationError::IdCollision {
                id: id.to_string(),
                existing_key: occupant.content_key().to_string(),
                incoming_key: key.to_string(),
            });
        }

        let finding = Finding::build(id.clone(), payload)?;
        tracing::debug!(finding_id = %id, kind = %finding.kind(), %entity, "Stored finding");
        self.findings.insert(id.clone(), finding);
        self.by_key.insert(key, id.clone());
        Ok(Written {
            id,
            entity,
            outcome: WriteOutcome::Created,
        })
    }

    pub fn create_risk(
        &mut self,
        input: RiskInput,
        facts: &FactStore,
    ) -> Result<Written, ValidationError> {
        self.create(FindingPayload::Risk(input), facts)
    }

    pub fn create_work_item(
        &mut self,
        input: WorkItemInput,
        facts: &FactStore,
    ) -> Result<Written, ValidationError> {
        self.create(FindingPayload::WorkItem(input), facts)
    }

    pub fn create_strategic_consideration(
        &mut self,
        input: StrategicConsiderationInput,
        facts: &FactStore,
    ) -> Result<Written, ValidationError> {
        self.create(FindingPayload::StrategicConsideration(input), facts)
    }

    pub fn create_recommendation(
        &mut self,
        input: RecommendationInput,
        facts: &FactStore,
    ) -> Result<Written, ValidationError> {
        self.create(FindingPayload::Recommendation(input), facts)
    }

    /// Replace a work item's build-up. The build-up is recomputed by the
    /// caller; nothing here edits one in place.
    pub fn attach_cost_buildup(
        &mut self,
        id: &FindingId,
        buildup: CostBuildUp,
    ) -> Result<(), ValidationError> {
        let finding = self
            .findings
            .get_mut(id)
            .ok_or_else(|| ValidationError::not_found("finding", id.to_string()))?;
        finding.set_cost_buildup(buildup)?;
        tracing::debug!(finding_id = %id, "Attached cost build-up");
        Ok(())
    }

    #[must_use]
    pub fn get(&self, id: &FindingId) -> Option<&Finding> {
        self.findings.get(id)
    }

    pub fn require(&self, id: &FindingId) -> Result<&Finding, ValidationError> {
        self.findings
            .get(id)
            .ok_or_else(|| ValidationError::not_found("finding", id.to_string()))
    }

    /// Every finding, in identifier order.
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.values()
    }

    pub fn work_items(&self) -> impl Iterator<Item = &WorkItem> {
        self.findings.values().filter_map(Finding::as_work_item)
    }

    /// Work items remediating `risk`.
    pub fn triggered_by<'a>(&'a self, risk: &'a FindingId) -> impl Iterator<Item = &'a WorkItem> {
        self.work_items()
            .filter(move |item| item.triggered_by().contains(risk))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.findings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    /// Rebuild a store from already-validated findings.
    ///
    /// Each citation must name a fact that is stored in `facts` or was
    /// deleted from it; deletes do not cascade to citing findings.
    /// Identifiers keep whatever digest length they were written with.
    pub fn from_findings(
        hash_len: usize,
        findings: impl IntoIterator<Item = Finding>,
        facts: &FactStore,
    ) -> Result<Self, ValidationError> {
        let mut store = Self::new(hash_len);
        for finding in findings {
            for cited in finding.cited_facts() {
                if !facts.contains_fact(cited) && !facts.was_deleted(cited) {
                    return Err(ValidationError::not_found("fact", cited.to_string()));
                }
            }
            let key = finding.content_key();
            let id = finding.id().clone();
            if let Some(existing) = store.by_key.get(&key) {
                return Err(ValidationError::IdCollision {
                    id: id.to_string(),
                    existing_key: format!("{key} (as {existing})"),
                    incoming_key: key.to_string(),
                });
            }
            if let Some(occupant) = store.findings.get(&id) {
                return Err(ValidationError::IdCollision {
                    id: id.to_string(),
                    existing_key: occupant.content_key().to_string(),
                    incoming_key: key.to_string(),
                });
            }
            store.by_key.insert(key, id.clone());
            store.findings.insert(id, finding);
        }
        for item in store.work_items() {
            for risk in item.triggered_by() {
                store.require(risk)?;
            }
        }
        Ok(store)
    }
}
