//! Fact Store - facts and gaps with stable, self-describing identifiers.
//!
//! Identifiers embed the owning entity and domain (`F-TGT-INFRA-007`), so
//! other components recover both by parsing, never by lookup. Sequences are
//! per (entity, domain) and never reused, not even after a delete.
//!
//! Fact content is immutable once stored. A correction is a new fact that
//! supersedes the old one ([`FactStore::revise_fact`]); the old record stays
//! in place so existing citations keep resolving. Deleted fact identifiers
//! are remembered for the same reason.

use std::collections::{BTreeMap, BTreeSet};

use diligence_types::{
    Domain, Entity, Fact, FactId, FactInput, Gap, GapId, GapInput, ValidationError,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone)]
pub struct FactStore {
    facts: BTreeMap<FactId, Fact>,
    gaps: BTreeMap<GapId, Gap>,
    fact_sequences: BTreeMap<(Entity, Domain), u32>,
    gap_sequences: BTreeMap<(Entity, Domain), u32>,
    /// old → replacement
    superseded_by: BTreeMap<FactId, FactId>,
    deleted_facts: BTreeSet<FactId>,
}

/// Last sequence issued for one (entity, domain).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceMark {
    pub entity: Entity,
    pub domain: Domain,
    pub last: u32,
}

/// Store bookkeeping that the records alone do not carry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactLedger {
    #[serde(default)]
    pub deleted_facts: Vec<FactId>,
    #[serde(default)]
    pub fact_sequences: Vec<SequenceMark>,
    #[serde(default)]
    pub gap_sequences: Vec<SequenceMark>,
}

fn marks(sequences: &BTreeMap<(Entity, Domain), u32>) -> Vec<SequenceMark> {
    sequences
        .iter()
        .map(|(&(entity, domain), &last)| SequenceMark {
            entity,
            domain,
            last,
        })
        .collect()
}

fn raise(
    sequences: &mut BTreeMap<(Entity, Domain), u32>,
    entity: Entity,
    domain: Domain,
    seen: u32,
) {
    let seq = sequences.entry((entity, domain)).or_insert(0);
    *seq = (*seq).max(seen);
}

impl FactStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_fact_id(&mut self, entity: Entity, domain: Domain) -> FactId {
        let seq = self.fact_sequences.entry((entity, domain)).or_insert(0);
        *seq += 1;
        FactId::new(entity, domain, *seq)
    }

    fn next_gap_id(&mut self, entity: Entity, domain: Domain) -> GapId {
        let seq = self.gap_sequences.entry((entity, domain)).or_insert(0);
        *seq += 1;
        GapId::new(entity, domain, *seq)
    }

    /// Store a new fact.
    ///
    /// Validation runs before an identifier is minted, so a rejected write
    /// consumes no sequence number.
    pub fn create_fact(&mut self, input: FactInput) -> Result<FactId, ValidationError> {
        if let Err(err) = input.validate() {
            tracing::warn!(code = err.code(), error = %err, "Rejected fact");
            return Err(err);
        }
        let id = self.next_fact_id(input.entity, input.domain);
        let fact = Fact::new(id.clone(), input)?;
        tracing::debug!(fact_id = %id, category = fact.category(), "Stored fact");
        self.facts.insert(id.clone(), fact);
        Ok(id)
    }

    /// Store `input` as the replacement for `previous`.
    ///
    /// The replacement must describe the same entity and domain; moving an
    /// observation between them is a delete plus a create. Revising a fact
    /// that was already revised is rejected: revise the newest version.
    pub fn revise_fact(
        &mut self,
        previous: &FactId,
        input: FactInput,
    ) -> Result<FactId, ValidationError> {
        if !self.facts.contains_key(previous) {
            return Err(ValidationError::not_found("fact", previous.to_string()));
        }
        if let Some(newer) = self.superseded_by.get(previous) {
            return Err(ValidationError::missing_with_hint(
                "supersedes",
                format!("{previous} was already revised by {newer}"),
                format!("revise {} instead", self.latest_version(previous)),
            ));
        }
        if input.entity != previous.entity() || input.domain != previous.domain() {
            return Err(ValidationError::missing(
                "entity",
                format!(
                    "a revision of {previous} must stay {}/{}",
                    previous.entity(),
                    previous.domain()
                ),
            ));
        }
        input.validate()?;

        let id = self.next_fact_id(input.entity, input.domain);
        let fact = Fact::revising(id.clone(), input, previous.clone())?;
        tracing::debug!(fact_id = %id, supersedes = %previous, "Stored fact revision");
        self.facts.insert(id.clone(), fact);
        self.superseded_by.insert(previous.clone(), id.clone());
        Ok(id)
    }

    pub fn create_gap(&mut self, input: GapInput) -> Result<GapId, ValidationError> {
        let entity = match input.validate() {
            Ok(entity) => entity,
            Err(err) => {
                tracing::warn!(code = err.code(), error = %err, "Rejected gap");
                return Err(err);
            }
        };
        let id = self.next_gap_id(entity, input.domain);
        let gap = Gap::new(id.clone(), input)?;
        tracing::debug!(gap_id = %id, importance = %gap.importance(), "Stored gap");
        self.gaps.insert(id.clone(), gap);
        Ok(id)
    }

    #[must_use]
    pub fn fact(&self, id: &FactId) -> Option<&Fact> {
        self.facts.get(id)
    }

    /// Like [`FactStore::fact`], but a miss is a `NOT_FOUND` error.
    pub fn require_fact(&self, id: &FactId) -> Result<&Fact, ValidationError> {
        self.facts
            .get(id)
            .ok_or_else(|| ValidationError::not_found("fact", id.to_string()))
    }

    #[must_use]
    pub fn contains_fact(&self, id: &FactId) -> bool {
        self.facts.contains_key(id)
    }

    #[must_use]
    pub fn was_deleted(&self, id: &FactId) -> bool {
        self.deleted_facts.contains(id)
    }

    #[must_use]
    pub fn gap(&self, id: &GapId) -> Option<&Gap> {
        self.gaps.get(id)
    }

    /// Facts in identifier order.
    pub fn facts(&self) -> impl Iterator<Item = &Fact> {
        self.facts.values()
    }

    pub fn gaps(&self) -> impl Iterator<Item = &Gap> {
        self.gaps.values()
    }

    #[must_use]
    pub fn fact_count(&self) -> usize {
        self.facts.len()
    }

    #[must_use]
    pub fn gap_count(&self) -> usize {
        self.gaps.len()
    }

    #[must_use]
    pub fn superseded_by(&self, id: &FactId) -> Option<&FactId> {
        self.superseded_by.get(id)
    }

    /// Newest revision in `id`'s chain, or `id` itself.
    #[must_use]
    pub fn latest_version(&self, id: &FactId) -> FactId {
        let mut current = id;
        // Chains are acyclic: a replacement always has a higher sequence.
        while let Some(next) = self.superseded_by.get(current) {
            current = next;
        }
        current.clone()
    }

    /// Remove a fact. Nothing citing it is touched; use the updater to
    /// flag dependents for review.
    pub fn delete_fact(&mut self, id: &FactId) -> Option<Fact> {
        let removed = self.facts.remove(id)?;
        self.superseded_by.remove(id);
        self.superseded_by.retain(|_, newer| newer != id);
        self.deleted_facts.insert(id.clone());
        tracing::debug!(fact_id = %id, "Deleted fact");
        Some(removed)
    }

    pub fn delete_gap(&mut self, id: &GapId) -> Option<Gap> {
        let removed = self.gaps.remove(id)?;
        tracing::debug!(gap_id = %id, "Deleted gap");
        Some(removed)
    }

    #[must_use]
    pub fn ledger(&self) -> FactLedger {
        FactLedger {
            deleted_facts: self.deleted_facts.iter().cloned().collect(),
            fact_sequences: marks(&self.fact_sequences),
            gap_sequences: marks(&self.gap_sequences),
        }
    }

    /// Rebuild a store from already-validated records.
    ///
    /// Sequence counters resume after the higher of the recorded mark and
    /// the highest restored or deleted sequence, so a restored store never
    /// reissues an identifier.
    pub fn from_records(
        facts: impl IntoIterator<Item = Fact>,
        gaps: impl IntoIterator<Item = Gap>,
        ledger: FactLedger,
    ) -> Result<Self, ValidationError> {
        let mut store = Self::new();
        for mark in ledger.fact_sequences {
            raise(&mut store.fact_sequences, mark.entity, mark.domain, mark.last);
        }
        for mark in ledger.gap_sequences {
            raise(&mut store.gap_sequences, mark.entity, mark.domain, mark.last);
        }
        for fact in facts {
            let id = fact.id().clone();
            raise(&mut store.fact_sequences, id.entity(), id.domain(), id.sequence());
            if let Some(previous) = fact.supersedes() {
                store.superseded_by.insert(previous.clone(), id.clone());
            }
            if store.facts.insert(id.clone(), fact).is_some() {
                return Err(ValidationError::missing(
                    "facts",
                    format!("duplicate fact identifier {id}"),
                ));
            }
        }
        for id in ledger.deleted_facts {
            if store.facts.contains_key(&id) {
                return Err(ValidationError::missing(
                    "deleted_facts",
                    format!("{id} is both stored and deleted"),
                ));
            }
            raise(&mut store.fact_sequences, id.entity(), id.domain(), id.sequence());
            store.deleted_facts.insert(id);
        }
        for gap in gaps {
            let id = gap.id().clone();
            raise(&mut store.gap_sequences, id.entity(), id.domain(), id.sequence());
            if store.gaps.insert(id.clone(), gap).is_some() {
                return Err(ValidationError::missing(
                    "gaps",
                    format!("duplicate gap identifier {id}"),
                ));
            }
        }
        Ok(store)
    }
}
