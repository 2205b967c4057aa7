//! Inventory view reconciled from facts.
//!
//! Inventory items (applications, servers, sites, ...) are only ever created
//! by a human: either seeded directly or accepted from the triage queue.
//! Reconciliation merges new fact attributes into an existing item; a fact
//! that matches nothing becomes a [`TriageCandidate`].

use std::collections::{BTreeMap, BTreeSet};

use diligence_types::{Domain, Entity, Fact, FactId, ValidationError};
use serde::{Deserialize, Serialize};

use crate::fact_store::FactStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: String,
    pub domain: Domain,
    pub entity: Entity,
    pub name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub source_fact_ids: BTreeSet<FactId>,
}

impl InventoryItem {
    fn matches_name(&self, name: &str) -> bool {
        self.name.trim().eq_ignore_ascii_case(name.trim())
    }
}

/// A fact that matched no inventory item, waiting for a human decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageCandidate {
    pub fact_id: FactId,
    pub domain: Domain,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    #[serde(default)]
    pub items: Vec<InventoryItem>,
    #[serde(default)]
    pub triage: Vec<TriageCandidate>,
}

#[derive(Debug, Clone, Default)]
pub struct InventoryStore {
    items: BTreeMap<String, InventoryItem>,
    sequences: BTreeMap<Domain, u32>,
    triage: BTreeMap<FactId, TriageCandidate>,
}

impl InventoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self, domain: Domain) -> String {
        let seq = self.sequences.entry(domain).or_insert(0);
        *seq += 1;
        format!("INV-{}-{:03}", domain.code(), *seq)
    }

    /// Seed a human-confirmed item.
    pub fn add_item(
        &mut self,
        domain: Domain,
        entity: Entity,
        name: &str,
        attributes: BTreeMap<String, String>,
    ) -> Result<String, ValidationError> {
        if name.trim().is_empty() {
            return Err(ValidationError::missing("name", "inventory items need a name"));
        }
        let id = self.next_id(domain);
        tracing::debug!(item_id = %id, name, "Added inventory item");
        self.items.insert(
            id.clone(),
            InventoryItem {
                id: id.clone(),
                domain,
                entity,
                name: name.trim().to_string(),
                attributes,
                source_fact_ids: BTreeSet::new(),
            },
        );
        Ok(id)
    }

    #[must_use]
    pub fn item(&self, id: &str) -> Option<&InventoryItem> {
        self.items.get(id)
    }

    pub fn items(&self) -> impl Iterator<Item = &InventoryItem> {
        self.items.values()
    }

    /// Items named `name` (case-insensitive) in `domain` for `entity`.
    #[must_use]
    pub fn find_by_name(&self, domain: Domain, entity: Entity, name: &str) -> Vec<&InventoryItem> {
        self.items
            .values()
            .filter(|item| item.domain == domain && item.entity == entity && item.matches_name(name))
            .collect()
    }

    /// Fold `fact`'s detail attributes into item `id`. Returns the number of
    /// attributes that changed.
    pub fn merge_fact(&mut self, id: &str, fact: &Fact) -> Result<usize, ValidationError> {
        let item = self
            .items
            .get_mut(id)
            .ok_or_else(|| ValidationError::not_found("inventory item", id))?;
        let mut changed = 0;
        for (key, value) in fact.details().attributes() {
            if item.attributes.get(&key) != Some(&value) {
                item.attributes.insert(key, value);
                changed += 1;
            }
        }
        item.source_fact_ids.insert(fact.id().clone());
        Ok(changed)
    }

    /// Unlink a removed fact from every item that cited it. Returns the
    /// affected item ids.
    pub fn detach_fact(&mut self, fact_id: &FactId) -> Vec<String> {
        self.items
            .values_mut()
            .filter_map(|item| item.source_fact_ids.remove(fact_id).then(|| item.id.clone()))
            .collect()
    }

    /// Queue a candidate. A fact is queued at most once.
    pub fn queue_candidate(&mut self, candidate: TriageCandidate) -> bool {
        if self.triage.contains_key(&candidate.fact_id) {
            return false;
        }
        tracing::debug!(fact_id = %candidate.fact_id, name = %candidate.name, "Queued triage candidate");
        self.triage.insert(candidate.fact_id.clone(), candidate);
        true
    }

    pub fn triage(&self) -> impl Iterator<Item = &TriageCandidate> {
        self.triage.values()
    }

    #[must_use]
    pub fn triage_len(&self) -> usize {
        self.triage.len()
    }

    /// Turn a triage candidate into a real item seeded from its fact.
    pub fn accept_candidate(
        &mut self,
        fact_id: &FactId,
        facts: &FactStore,
    ) -> Result<String, ValidationError> {
        let candidate = self
            .triage
            .get(fact_id)
            .ok_or_else(|| ValidationError::not_found("triage candidate", fact_id.to_string()))?;
        let fact = facts.require_fact(fact_id)?;
        let name = candidate.name.clone();
        let id = self.add_item(fact.domain(), fact.entity(), &name, BTreeMap::new())?;
        self.merge_fact(&id, fact)?;
        self.triage.remove(fact_id);
        Ok(id)
    }

    pub fn dismiss_candidate(&mut self, fact_id: &FactId) -> Option<TriageCandidate> {
        self.triage.remove(fact_id)
    }

    #[must_use]
    pub fn snapshot(&self) -> InventorySnapshot {
        InventorySnapshot {
            items: self.items.values().cloned().collect(),
            triage: self.triage.values().cloned().collect(),
        }
    }

    pub fn from_snapshot(snapshot: InventorySnapshot) -> Result<Self, ValidationError> {
        let mut store = Self::new();
        for item in snapshot.items {
            let seq = item
                .id
                .rsplit('-')
                .next()
                .and_then(|digits| digits.parse::<u32>().ok())
                .ok_or_else(|| {
                    ValidationError::missing("inventory.id", format!("malformed id {}", item.id))
                })?;
            let counter = store.sequences.entry(item.domain).or_insert(0);
            *counter = (*counter).max(seq);
            if store.items.insert(item.id.clone(), item).is_some() {
                return Err(ValidationError::missing("inventory.id", "duplicate inventory id"));
            }
        }
        for candidate in snapshot.triage {
            store.triage.insert(candidate.fact_id.clone(), candidate);
        }
        Ok(store)
    }
}

/// What a reconciler concluded for one fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    Matched { item_id: String },
    Unmatched { name: String, reason: String },
    /// The fact carries nothing an inventory item is keyed on.
    Skipped,
}

/// Per-domain matching strategy from a fact to an inventory item.
pub trait Reconciler: Send + Sync {
    fn reconcile(&self, fact: &Fact, inventory: &InventoryStore) -> Result<Reconciliation, String>;
}

/// Matches on the fact's detail name, case-insensitively, within the same
/// domain and entity. Two equally named items is an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameMatchReconciler;

impl Reconciler for NameMatchReconciler {
    fn reconcile(&self, fact: &Fact, inventory: &InventoryStore) -> Result<Reconciliation, String> {
        let Some(name) = fact.details().name() else {
            return Ok(Reconciliation::Skipped);
        };
        match inventory.find_by_name(fact.domain(), fact.entity(), name).as_slice() {
            [] => Ok(Reconciliation::Unmatched {
                name: name.to_string(),
                reason: format!("no {} inventory item named {name:?}", fact.domain()),
            }),
            [item] => Ok(Reconciliation::Matched {
                item_id: item.id.clone(),
            }),
            many => Err(format!(
                "{} inventory items named {name:?}: {}",
                many.len(),
                many.iter().map(|item| item.id.as_str()).collect::<Vec<_>>().join(", ")
            )),
        }
    }
}
