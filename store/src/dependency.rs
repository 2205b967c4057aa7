//! Dependency Tracker - fact → item edges and stale flags.
//!
//! Both inverted indices and the stale-flag table live in one
//! [`TrackerState`] behind one mutex, so a reader never observes an edge in
//! one index without its pair in the other. The tracker holds identifiers
//! only; it owns neither facts nor findings.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use diligence_types::{FactId, FindingId, FindingKind, ValidationError};
use serde::{Deserialize, Serialize};

/// Kind of record that can depend on a fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Risk,
    WorkItem,
    StrategicConsideration,
    Recommendation,
    InventoryItem,
}

impl ItemType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ItemType::Risk => "risk",
            ItemType::WorkItem => "work_item",
            ItemType::StrategicConsideration => "strategic_consideration",
            ItemType::Recommendation => "recommendation",
            ItemType::InventoryItem => "inventory_item",
        }
    }
}

impl From<FindingKind> for ItemType {
    fn from(kind: FindingKind) -> Self {
        match kind {
            FindingKind::Risk => ItemType::Risk,
            FindingKind::WorkItem => ItemType::WorkItem,
            FindingKind::StrategicConsideration => ItemType::StrategicConsideration,
            FindingKind::Recommendation => ItemType::Recommendation,
        }
    }
}

/// (item type, item id) pair. Ordered by type, then id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemRef {
    pub item_type: ItemType,
    pub item_id: String,
}

impl ItemRef {
    #[must_use]
    pub fn new(item_type: ItemType, item_id: impl Into<String>) -> Self {
        Self {
            item_type,
            item_id: item_id.into(),
        }
    }

    #[must_use]
    pub fn finding(id: &FindingId) -> Self {
        Self::new(id.kind().into(), id.to_string())
    }

    #[must_use]
    pub fn inventory(id: impl Into<String>) -> Self {
        Self::new(ItemType::InventoryItem, id)
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.item_type.as_str(), self.item_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    Supports,
    Contradicts,
    Informs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub fact_id: FactId,
    pub item: ItemRef,
    pub relationship: Relationship,
    /// 0.0..=1.0
    pub strength: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Reviewed,
}

/// An item whose supporting evidence changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaleItem {
    pub item: ItemRef,
    pub reason: String,
    pub changed_facts: BTreeSet<FactId>,
    #[serde(default)]
    pub status: ReviewStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StaleFilter {
    #[default]
    All,
    Pending,
    Reviewed,
}

impl StaleFilter {
    const fn admits(self, status: ReviewStatus) -> bool {
        match self {
            StaleFilter::All => true,
            StaleFilter::Pending => matches!(status, ReviewStatus::Pending),
            StaleFilter::Reviewed => matches!(status, ReviewStatus::Reviewed),
        }
    }
}

/// Result of a stale-flag upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagOutcome {
    Created,
    /// Merged into an existing flag. Re-flagging a reviewed item reopens it.
    Merged,
}

#[derive(Debug, Default)]
struct TrackerState {
    by_fact: BTreeMap<FactId, BTreeMap<ItemRef, Dependency>>,
    by_item: BTreeMap<ItemRef, BTreeMap<FactId, Dependency>>,
    stale: BTreeMap<ItemRef, StaleItem>,
}

impl TrackerState {
    fn insert_edge(&mut self, dependency: Dependency) -> bool {
        let is_new = self
            .by_item
            .entry(dependency.item.clone())
            .or_default()
            .insert(dependency.fact_id.clone(), dependency.clone())
            .is_none();
        self.by_fact
            .entry(dependency.fact_id.clone())
            .or_default()
            .insert(dependency.item.clone(), dependency);
        is_new
    }

    fn upsert_flag(
        &mut self,
        item: &ItemRef,
        reason: &str,
        changed: impl IntoIterator<Item = FactId>,
    ) -> FlagOutcome {
        match self.stale.get_mut(item) {
            Some(existing) => {
                existing.changed_facts.extend(changed);
                if existing.reason != reason {
                    existing.reason = reason.to_string();
                }
                existing.status = ReviewStatus::Pending;
                FlagOutcome::Merged
            }
            None => {
                self.stale.insert(
                    item.clone(),
                    StaleItem {
                        item: item.clone(),
                        reason: reason.to_string(),
                        changed_facts: changed.into_iter().collect(),
                        status: ReviewStatus::Pending,
                    },
                );
                FlagOutcome::Created
            }
        }
    }
}

/// Edge export for snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub stale_items: Vec<StaleItem>,
}

#[derive(Debug, Default)]
pub struct DependencyTracker {
    state: Mutex<TrackerState>,
}

fn check_strength(strength: f64) -> Result<f64, ValidationError> {
    if strength.is_finite() && (0.0..=1.0).contains(&strength) {
        Ok(strength)
    } else {
        Err(ValidationError::missing(
            "strength",
            format!("must be between 0.0 and 1.0 (got {strength})"),
        ))
    }
}

impl DependencyTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        // Every mutation completes before releasing the guard, so a poisoned
        // state is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record that `item` depends on `fact_id`. Registering an existing
    /// (fact, item) pair updates its relationship and strength in place.
    /// Returns whether the edge is new.
    pub fn register(
        &self,
        fact_id: &FactId,
        item: &ItemRef,
        relationship: Relationship,
        strength: f64,
    ) -> Result<bool, ValidationError> {
        let strength = check_strength(strength)?;
        let is_new = self.lock().insert_edge(Dependency {
            fact_id: fact_id.clone(),
            item: item.clone(),
            relationship,
            strength,
        });
        if is_new {
            tracing::debug!(fact_id = %fact_id, item = %item, "Registered dependency");
        }
        Ok(is_new)
    }

    #[must_use]
    pub fn dependents_of(&self, fact_id: &FactId) -> Vec<Dependency> {
        self.lock()
            .by_fact
            .get(fact_id)
            .map(|items| items.values().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn dependencies_of(&self, item: &ItemRef) -> Vec<Dependency> {
        self.lock()
            .by_item
            .get(item)
            .map(|facts| facts.values().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.lock().by_item.values().map(BTreeMap::len).sum()
    }

    /// Flag `item` for review. Idempotent: an existing flag absorbs the new
    /// changed facts instead of producing a second record.
    pub fn flag_stale(
        &self,
        item: &ItemRef,
        reason: &str,
        changed_facts: impl IntoIterator<Item = FactId>,
    ) -> FlagOutcome {
        let outcome = self.lock().upsert_flag(item, reason, changed_facts);
        tracing::debug!(item = %item, ?outcome, "Flagged item stale");
        outcome
    }

    /// Flag every dependent of `fact_id`. Returns the flagged items.
    pub fn flag_affected_by_fact_change(&self, fact_id: &FactId, reason: &str) -> Vec<ItemRef> {
        let mut state = self.lock();
        let items: Vec<ItemRef> = state
            .by_fact
            .get(fact_id)
            .map(|items| items.keys().cloned().collect())
            .unwrap_or_default();
        for item in &items {
            state.upsert_flag(item, reason, [fact_id.clone()]);
        }
        drop(state);
        if !items.is_empty() {
            tracing::debug!(fact_id = %fact_id, flagged = items.len(), "Flagged dependents stale");
        }
        items
    }

    pub fn mark_reviewed(&self, item: &ItemRef) -> Result<(), ValidationError> {
        let mut state = self.lock();
        let flag = state
            .stale
            .get_mut(item)
            .ok_or_else(|| ValidationError::not_found("stale item", item.to_string()))?;
        flag.status = ReviewStatus::Reviewed;
        tracing::debug!(item = %item, "Marked stale item reviewed");
        Ok(())
    }

    /// Remove a flag, reviewed or not.
    pub fn clear_stale_flag(&self, item: &ItemRef) -> Option<StaleItem> {
        let removed = self.lock().stale.remove(item);
        if removed.is_some() {
            tracing::debug!(item = %item, "Cleared stale flag");
        }
        removed
    }

    #[must_use]
    pub fn is_stale(&self, item: &ItemRef) -> bool {
        self.lock()
            .stale
            .get(item)
            .is_some_and(|flag| flag.status == ReviewStatus::Pending)
    }

    #[must_use]
    pub fn stale_item(&self, item: &ItemRef) -> Option<StaleItem> {
        self.lock().stale.get(item).cloned()
    }

    /// Flags admitted by `filter`, sorted by item type then id.
    #[must_use]
    pub fn stale_items(&self, filter: StaleFilter) -> Vec<StaleItem> {
        self.lock()
            .stale
            .values()
            .filter(|flag| filter.admits(flag.status))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn snapshot(&self) -> TrackerSnapshot {
        let state = self.lock();
        TrackerSnapshot {
            dependencies: state
                .by_item
                .values()
                .flat_map(BTreeMap::values)
                .cloned()
                .collect(),
            stale_items: state.stale.values().cloned().collect(),
        }
    }

    pub fn from_snapshot(snapshot: TrackerSnapshot) -> Result<Self, ValidationError> {
        let mut state = TrackerState::default();
        for dependency in snapshot.dependencies {
            check_strength(dependency.strength)?;
            state.insert_edge(dependency);
        }
        for flag in snapshot.stale_items {
            state.stale.insert(flag.item.clone(), flag);
        }
        Ok(Self {
            state: Mutex::new(state),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use diligence_types::{Domain, Entity};

    fn fact(seq: u32) -> FactId {
        FactId::new(Entity::Target, Domain::Infrastructure, seq)
    }

    fn risk(id: &str) -> ItemRef {
        ItemRef::new(ItemType::Risk, id)
    }

    #[test]
    fn register_populates_both_indices() {
        let tracker = DependencyTracker::new();
        assert!(tracker.register(&fact(1), &risk("R-aaaa0001"), Relationship::Supports, 1.0).unwrap());
        assert!(!tracker.register(&fact(1), &risk("R-aaaa0001"), Relationship::Informs, 0.4).unwrap());

        let dependents = tracker.dependents_of(&fact(1));
        assert_eq!(dependents.len(), 1);
        assert_eq!(dependents[0].relationship, Relationship::Informs);

        let dependencies = tracker.dependencies_of(&risk("R-aaaa0001"));
        assert_eq!(dependencies.len(), 1);
        assert_eq!(dependencies[0].strength, 0.4);
        assert_eq!(tracker.edge_count(), 1);
    }

    #[test]
    fn strength_out_of_range_is_rejected() {
        let tracker = DependencyTracker::new();
        let err = tracker
            .register(&fact(1), &risk("R-aaaa0001"), Relationship::Supports, 1.5)
            .unwrap_err();
        assert_eq!(err.code(), "SCHEMA_ERROR");
        assert_eq!(tracker.edge_count(), 0);
    }

    #[test]
    fn repeated_flags_merge_into_one_record() {
        let tracker = DependencyTracker::new();
        let item = risk("R-aaaa0001");
        assert_eq!(
            tracker.flag_stale(&item, "fact changed", [fact(1), fact(2)]),
            FlagOutcome::Created
        );
        assert_eq!(
            tracker.flag_stale(&item, "fact changed", [fact(2), fact(3)]),
            FlagOutcome::Merged
        );

        let flags = tracker.stale_items(StaleFilter::All);
        assert_eq!(flags.len(), 1);
        assert_eq!(
            flags[0].changed_facts,
            [fact(1), fact(2), fact(3)].into_iter().collect()
        );
    }

    #[test]
    fn fact_change_flags_every_dependent() {
        let tracker = DependencyTracker::new();
        tracker.register(&fact(1), &risk("R-aaaa0001"), Relationship::Supports, 1.0).unwrap();
        tracker
            .register(&fact(1), &ItemRef::new(ItemType::WorkItem, "WI-bbbb0002"), Relationship::Supports, 1.0)
            .unwrap();
        tracker.register(&fact(2), &risk("R-cccc0003"), Relationship::Supports, 1.0).unwrap();

        let flagged = tracker.flag_affected_by_fact_change(&fact(1), "claim revised");
        assert_eq!(flagged.len(), 2);
        assert!(tracker.is_stale(&risk("R-aaaa0001")));
        assert!(!tracker.is_stale(&risk("R-cccc0003")));
        assert!(tracker.flag_affected_by_fact_change(&fact(9), "noop").is_empty());
    }

    #[test]
    fn review_loop_keeps_audit_trail_until_cleared() {
        let tracker = DependencyTracker::new();
        let item = risk("R-aaaa0001");
        tracker.flag_stale(&item, "fact changed", [fact(1)]);
        tracker.mark_reviewed(&item).unwrap();

        assert!(!tracker.is_stale(&item));
        assert_eq!(tracker.stale_items(StaleFilter::Pending).len(), 0);
        assert_eq!(tracker.stale_items(StaleFilter::Reviewed).len(), 1);

        tracker.flag_stale(&item, "fact changed again", [fact(2)]);
        assert!(tracker.is_stale(&item));

        assert!(tracker.clear_stale_flag(&item).is_some());
        assert!(tracker.stale_items(StaleFilter::All).is_empty());
        assert_eq!(tracker.mark_reviewed(&item).unwrap_err().code(), "NOT_FOUND");
    }

    #[test]
    fn stale_items_are_sorted_by_type_then_id() {
        let tracker = DependencyTracker::new();
        tracker.flag_stale(&ItemRef::new(ItemType::WorkItem, "WI-00000001"), "x", [fact(1)]);
        tracker.flag_stale(&risk("R-ffffffff"), "x", [fact(1)]);
        tracker.flag_stale(&risk("R-00000000"), "x", [fact(1)]);

        let order: Vec<String> = tracker
            .stale_items(StaleFilter::All)
            .into_iter()
            .map(|flag| flag.item.item_id)
            .collect();
        assert_eq!(order, ["R-00000000", "R-ffffffff", "WI-00000001"]);
    }

    #[test]
    fn concurrent_registration_keeps_indices_paired() {
        let tracker = Arc::new(DependencyTracker::new());
        let handles: Vec<_> = (0..8u32)
            .map(|worker| {
                let tracker = Arc::clone(&tracker);
                thread::spawn(move || {
                    for seq in 1..=25 {
                        let item = ItemRef::new(ItemType::Risk, format!("R-{worker:08x}"));
                        tracker
                            .register(&fact(seq), &item, Relationship::Supports, 1.0)
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tracker.edge_count(), 200);
        let from_facts: usize = (1..=25).map(|seq| tracker.dependents_of(&fact(seq)).len()).sum();
        assert_eq!(from_facts, 200);
    }

    #[test]
    fn snapshot_round_trips() {
        let tracker = DependencyTracker::new();
        tracker.register(&fact(1), &risk("R-aaaa0001"), Relationship::Contradicts, 0.7).unwrap();
        tracker.flag_stale(&risk("R-aaaa0001"), "fact changed", [fact(1)]);

        let snapshot = tracker.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: TrackerSnapshot = serde_json::from_str(&json).unwrap();
        let restored = DependencyTracker::from_snapshot(back).unwrap();
        assert_eq!(restored.snapshot(), snapshot);
    }
}
