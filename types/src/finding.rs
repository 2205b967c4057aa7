//! Findings: risks, work items, strategic considerations, recommendations.
//!
//! Every finding cites at least one fact and must be anchored on the target:
//! a citation set made only of buyer facts is rejected. The owning entity is
//! never supplied by the caller; it is inferred from the citations, which is
//! possible from the fact identifiers alone.

use serde::{Deserialize, Serialize};

use crate::{
    ActionType, Confidence, ContentKey, CostBucket, CostBuildUp, Domain, Entity, FactId,
    FindingId, FindingKind, OwnerType, Phase, Priority, Severity, StrategicLens, Urgency,
    ValidationError,
};

/// Owning entity implied by a citation set.
///
/// Target wins whenever any cited fact is target-owned; buyer only when all
/// are buyer-owned; target when nothing was cited.
#[must_use]
pub fn infer_entity(cited: &[FactId]) -> Entity {
    if cited.is_empty() || cited.iter().any(|id| id.entity() == Entity::Target) {
        Entity::Target
    } else {
        Entity::Buyer
    }
}

/// Citation checks shared by creation, pre-flight validation and snapshot
/// restore: non-empty, then the entity anchor rule.
pub fn check_citations(cited: &[FactId]) -> Result<Entity, ValidationError> {
    if cited.is_empty() {
        return Err(ValidationError::missing_with_hint(
            "cited_fact_ids",
            "a finding must cite at least one fact",
            "cite the fact identifiers this conclusion rests on",
        ));
    }
    let entity = infer_entity(cited);
    if entity == Entity::Buyer {
        return Err(ValidationError::EntityAnchorViolation {
            buyer_facts: cited.iter().map(ToString::to_string).collect(),
        });
    }
    Ok(entity)
}

fn dedupe(ids: Vec<FactId>) -> Vec<FactId> {
    let mut out: Vec<FactId> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

/// Fields shared by every finding payload.
#[derive(Debug, Clone, PartialEq)]
pub struct FindingInput {
    pub domain: Domain,
    pub title: String,
    pub description: String,
    pub cited_facts: Vec<FactId>,
    pub confidence: Confidence,
    pub reasoning: String,
}

impl FindingInput {
    #[must_use]
    pub fn new(domain: Domain, title: impl Into<String>, cited_facts: Vec<FactId>) -> Self {
        Self {
            domain,
            title: title.into(),
            description: String::new(),
            cited_facts,
            confidence: Confidence::Medium,
            reasoning: String::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskInput {
    pub finding: FindingInput,
    pub severity: Severity,
    pub mitigation: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkItemInput {
    pub finding: FindingInput,
    pub phase: Phase,
    pub priority: Priority,
    pub owner_type: OwnerType,
    pub cost_estimate: CostBucket,
    pub cost_buildup: Option<CostBuildUp>,
    /// Risks this work item remediates.
    pub triggered_by: Vec<FindingId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategicConsiderationInput {
    pub finding: FindingInput,
    pub lens: StrategicLens,
    pub implication: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationInput {
    pub finding: FindingInput,
    pub action_type: ActionType,
    pub urgency: Urgency,
}

/// A finding write request of any variant.
#[derive(Debug, Clone, PartialEq)]
pub enum FindingPayload {
    Risk(RiskInput),
    WorkItem(WorkItemInput),
    StrategicConsideration(StrategicConsiderationInput),
    Recommendation(RecommendationInput),
}

impl FindingPayload {
    #[must_use]
    pub const fn kind(&self) -> FindingKind {
        match self {
            FindingPayload::Risk(_) => FindingKind::Risk,
            FindingPayload::WorkItem(_) => FindingKind::WorkItem,
            FindingPayload::StrategicConsideration(_) => FindingKind::StrategicConsideration,
            FindingPayload::Recommendation(_) => FindingKind::Recommendation,
        }
    }

    #[must_use]
    pub fn finding(&self) -> &FindingInput {
        match self {
            FindingPayload::Risk(input) => &input.finding,
            FindingPayload::WorkItem(input) => &input.finding,
            FindingPayload::StrategicConsideration(input) => &input.finding,
            FindingPayload::Recommendation(input) => &input.finding,
        }
    }

    /// Owner type, which only work items carry and which is part of their identity.
    #[must_use]
    pub fn owner_type(&self) -> Option<OwnerType> {
        match self {
            FindingPayload::WorkItem(input) => Some(input.owner_type),
            _ => None,
        }
    }

    #[must_use]
    pub fn content_key(&self) -> ContentKey {
        let finding = self.finding();
        ContentKey::new(self.kind(), finding.domain, &finding.title, self.owner_type())
    }

    /// Local checks that need no store: required text, citations, anchor rule.
    /// Returns the inferred owning entity.
    pub fn validate(&self) -> Result<Entity, ValidationError> {
        let finding = self.finding();
        if finding.title.trim().is_empty() {
            return Err(ValidationError::missing("title", "must not be empty"));
        }
        match self {
            FindingPayload::StrategicConsideration(input) if input.implication.trim().is_empty() => {
                return Err(ValidationError::missing("implication", "must not be empty"));
            }
            FindingPayload::WorkItem(input)
                if input.triggered_by.iter().any(|id| id.kind() != FindingKind::Risk) =>
            {
                return Err(ValidationError::missing_with_hint(
                    "triggered_by",
                    "work items can only be triggered by risks",
                    "reference R- identifiers",
                ));
            }
            _ => {}
        }
        check_citations(&finding.cited_facts)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FindingCore {
    id: FindingId,
    domain: Domain,
    entity: Entity,
    title: String,
    description: String,
    cited_facts: Vec<FactId>,
    confidence: Confidence,
    reasoning: String,
}

impl FindingCore {
    fn from_input(id: FindingId, entity: Entity, input: FindingInput) -> Self {
        Self {
            id,
            domain: input.domain,
            entity,
            title: input.title,
            description: input.description,
            cited_facts: dedupe(input.cited_facts),
            confidence: input.confidence,
            reasoning: input.reasoning,
        }
    }

    fn into_input(self) -> FindingInput {
        FindingInput {
            domain: self.domain,
            title: self.title,
            description: self.description,
            cited_facts: self.cited_facts,
            confidence: self.confidence,
            reasoning: self.reasoning,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Risk {
    #[serde(flatten)]
    core: FindingCore,
    severity: Severity,
    mitigation: Option<String>,
}

impl Risk {
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.severity
    }

    #[must_use]
    pub fn mitigation(&self) -> Option<&str> {
        self.mitigation.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkItem {
    #[serde(flatten)]
    core: FindingCore,
    phase: Phase,
    priority: Priority,
    owner_type: OwnerType,
    cost_estimate: CostBucket,
    cost_buildup: Option<CostBuildUp>,
    triggered_by: Vec<FindingId>,
}

impl WorkItem {
    #[must_use]
    pub fn id(&self) -> &FindingId {
        &self.core.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.core.title
    }

    #[must_use]
    pub const fn domain(&self) -> Domain {
        self.core.domain
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    #[must_use]
    pub const fn owner_type(&self) -> OwnerType {
        self.owner_type
    }

    #[must_use]
    pub const fn cost_estimate(&self) -> CostBucket {
        self.cost_estimate
    }

    #[must_use]
    pub fn cost_buildup(&self) -> Option<&CostBuildUp> {
        self.cost_buildup.as_ref()
    }

    #[must_use]
    pub fn triggered_by(&self) -> &[FindingId] {
        &self.triggered_by
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategicConsideration {
    #[serde(flatten)]
    core: FindingCore,
    lens: StrategicLens,
    implication: String,
}

impl StrategicConsideration {
    #[must_use]
    pub const fn lens(&self) -> StrategicLens {
        self.lens
    }

    #[must_use]
    pub fn implication(&self) -> &str {
        &self.implication
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    #[serde(flatten)]
    core: FindingCore,
    action_type: ActionType,
    urgency: Urgency,
}

impl Recommendation {
    #[must_use]
    pub const fn action_type(&self) -> ActionType {
        self.action_type
    }

    #[must_use]
    pub const fn urgency(&self) -> Urgency {
        self.urgency
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", try_from = "FindingRecord")]
pub enum Finding {
    Risk(Risk),
    WorkItem(WorkItem),
    StrategicConsideration(StrategicConsideration),
    Recommendation(Recommendation),
}

impl Finding {
    /// Build a finding under `id` from a payload, running the local checks.
    ///
    /// The caller is responsible for `id` being the payload's derived
    /// identifier and for the cited facts existing.
    pub fn build(id: FindingId, payload: FindingPayload) -> Result<Self, ValidationError> {
        let entity = payload.validate()?;
        if id.kind() != payload.kind() {
            return Err(ValidationError::missing(
                "finding_id",
                format!("{id} is not a {} identifier", payload.kind()),
            ));
        }
        Ok(match payload {
            FindingPayload::Risk(input) => Finding::Risk(Risk {
                core: FindingCore::from_input(id, entity, input.finding),
                severity: input.severity,
                mitigation: input.mitigation,
            }),
            FindingPayload::WorkItem(input) => Finding::WorkItem(WorkItem {
                core: FindingCore::from_input(id, entity, input.finding),
                phase: input.phase,
                priority: input.priority,
                owner_type: input.owner_type,
                cost_estimate: input.cost_estimate,
                cost_buildup: input.cost_buildup,
                triggered_by: input.triggered_by,
            }),
            FindingPayload::StrategicConsideration(input) => {
                Finding::StrategicConsideration(StrategicConsideration {
                    core: FindingCore::from_input(id, entity, input.finding),
                    lens: input.lens,
                    implication: input.implication,
                })
            }
            FindingPayload::Recommendation(input) => Finding::Recommendation(Recommendation {
                core: FindingCore::from_input(id, entity, input.finding),
                action_type: input.action_type,
                urgency: input.urgency,
            }),
        })
    }

    fn core(&self) -> &FindingCore {
        match self {
            Finding::Risk(f) => &f.core,
            Finding::WorkItem(f) => &f.core,
            Finding::StrategicConsideration(f) => &f.core,
            Finding::Recommendation(f) => &f.core,
        }
    }

    fn core_mut(&mut self) -> &mut FindingCore {
        match self {
            Finding::Risk(f) => &mut f.core,
            Finding::WorkItem(f) => &mut f.core,
            Finding::StrategicConsideration(f) => &mut f.core,
            Finding::Recommendation(f) => &mut f.core,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> FindingKind {
        match self {
            Finding::Risk(_) => FindingKind::Risk,
            Finding::WorkItem(_) => FindingKind::WorkItem,
            Finding::StrategicConsideration(_) => FindingKind::StrategicConsideration,
            Finding::Recommendation(_) => FindingKind::Recommendation,
        }
    }

    #[must_use]
    pub fn id(&self) -> &FindingId {
        &self.core().id
    }

    #[must_use]
    pub fn domain(&self) -> Domain {
        self.core().domain
    }

    #[must_use]
    pub fn entity(&self) -> Entity {
        self.core().entity
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.core().title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.core().description
    }

    #[must_use]
    pub fn cited_facts(&self) -> &[FactId] {
        &self.core().cited_facts
    }

    #[must_use]
    pub fn confidence(&self) -> Confidence {
        self.core().confidence
    }

    #[must_use]
    pub fn reasoning(&self) -> &str {
        &self.core().reasoning
    }

    #[must_use]
    pub fn owner_type(&self) -> Option<OwnerType> {
        match self {
            Finding::WorkItem(item) => Some(item.owner_type),
            _ => None,
        }
    }

    #[must_use]
    pub fn content_key(&self) -> ContentKey {
        ContentKey::new(self.kind(), self.domain(), self.title(), self.owner_type())
    }

    #[must_use]
    pub fn as_risk(&self) -> Option<&Risk> {
        match self {
            Finding::Risk(risk) => Some(risk),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_work_item(&self) -> Option<&WorkItem> {
        match self {
            Finding::WorkItem(item) => Some(item),
            _ => None,
        }
    }

    /// Add citations from a converging duplicate write. Returns the facts
    /// that were not already cited.
    ///
    /// Adding citations can only add target anchoring, never remove it.
    pub fn absorb_citations(&mut self, cited: &[FactId]) -> Vec<FactId> {
        let core = self.core_mut();
        let mut added = Vec::new();
        for id in cited {
            if !core.cited_facts.contains(id) {
                core.cited_facts.push(id.clone());
                added.push(id.clone());
            }
        }
        added
    }

    /// Replace a work item's cost build-up with a freshly computed one.
    pub fn set_cost_buildup(&mut self, buildup: CostBuildUp) -> Result<(), ValidationError> {
        match self {
            Finding::WorkItem(item) => {
                item.cost_buildup = Some(buildup);
                Ok(())
            }
            other => Err(ValidationError::missing(
                "cost_buildup",
                format!("{} is a {}, only work items carry cost build-ups", other.id(), other.kind()),
            )),
        }
    }

    /// The payload this finding would be recreated from.
    #[must_use]
    pub fn to_payload(&self) -> FindingPayload {
        match self.clone() {
            Finding::Risk(f) => FindingPayload::Risk(RiskInput {
                finding: f.core.into_input(),
                severity: f.severity,
                mitigation: f.mitigation,
            }),
            Finding::WorkItem(f) => FindingPayload::WorkItem(WorkItemInput {
                finding: f.core.into_input(),
                phase: f.phase,
                priority: f.priority,
                owner_type: f.owner_type,
                cost_estimate: f.cost_estimate,
                cost_buildup: f.cost_buildup,
                triggered_by: f.triggered_by,
            }),
            Finding::StrategicConsideration(f) => {
                FindingPayload::StrategicConsideration(StrategicConsiderationInput {
                    finding: f.core.into_input(),
                    lens: f.lens,
                    implication: f.implication,
                })
            }
            Finding::Recommendation(f) => FindingPayload::Recommendation(RecommendationInput {
                finding: f.core.into_input(),
                action_type: f.action_type,
                urgency: f.urgency,
            }),
        }
    }
}

// ── Wire form ────────────────────────────────────────────────

#[derive(Deserialize)]
struct CoreRecord {
    id: FindingId,
    domain: Domain,
    #[serde(default)]
    entity: Option<Entity>,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    cited_facts: Vec<FactId>,
    #[serde(default = "default_confidence")]
    confidence: Confidence,
    #[serde(default)]
    reasoning: String,
}

fn default_confidence() -> Confidence {
    Confidence::Medium
}

impl CoreRecord {
    fn split(self) -> (FindingId, Option<Entity>, FindingInput) {
        (
            self.id,
            self.entity,
            FindingInput {
                domain: self.domain,
                title: self.title,
                description: self.description,
                cited_facts: self.cited_facts,
                confidence: self.confidence,
                reasoning: self.reasoning,
            },
        )
    }
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum FindingRecord {
    Risk {
        #[serde(flatten)]
        core: CoreRecord,
        severity: Severity,
        #[serde(default)]
        mitigation: Option<String>,
    },
    WorkItem {
        #[serde(flatten)]
        core: CoreRecord,
        phase: Phase,
        priority: Priority,
        owner_type: OwnerType,
        cost_estimate: CostBucket,
        #[serde(default)]
        cost_buildup: Option<CostBuildUp>,
        #[serde(default)]
        triggered_by: Vec<FindingId>,
    },
    StrategicConsideration {
        #[serde(flatten)]
        core: CoreRecord,
        lens: StrategicLens,
        implication: String,
    },
    Recommendation {
        #[serde(flatten)]
        core: CoreRecord,
        action_type: ActionType,
        urgency: Urgency,
    },
}

impl TryFrom<FindingRecord> for Finding {
    type Error = ValidationError;

    fn try_from(record: FindingRecord) -> Result<Self, Self::Error> {
        let (id, stored_entity, payload) = match record {
            FindingRecord::Risk {
                core,
                severity,
                mitigation,
            } => {
                let (id, entity, finding) = core.split();
                let payload = FindingPayload::Risk(RiskInput {
                    finding,
                    severity,
                    mitigation,
                });
                (id, entity, payload)
            }
            FindingRecord::WorkItem {
                core,
                phase,
                priority,
                owner_type,
                cost_estimate,
                cost_buildup,
                triggered_by,
            } => {
                let (id, entity, finding) = core.split();
                let payload = FindingPayload::WorkItem(WorkItemInput {
                    finding,
                    phase,
                    priority,
                    owner_type,
                    cost_estimate,
                    cost_buildup,
                    triggered_by,
                });
                (id, entity, payload)
            }
            FindingRecord::StrategicConsideration {
                core,
                lens,
                implication,
            } => {
                let (id, entity, finding) = core.split();
                let payload = FindingPayload::StrategicConsideration(StrategicConsiderationInput {
                    finding,
                    lens,
                    implication,
                });
                (id, entity, payload)
            }
            FindingRecord::Recommendation {
                core,
                action_type,
                urgency,
            } => {
                let (id, entity, finding) = core.split();
                let payload = FindingPayload::Recommendation(RecommendationInput {
                    finding,
                    action_type,
                    urgency,
                });
                (id, entity, payload)
            }
        };

        if !id.matches(&payload.content_key()) {
            return Err(ValidationError::missing(
                "finding_id",
                format!("{id} is not the identifier derived from its content"),
            ));
        }
        let finding = Finding::build(id, payload)?;
        if let Some(entity) = stored_entity.filter(|entity| *entity != finding.entity()) {
            return Err(ValidationError::missing(
                "entity",
                format!(
                    "{} records entity {entity} but its citations imply {}",
                    finding.id(),
                    finding.entity()
                ),
            ));
        }
        Ok(finding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target_fact() -> FactId {
        FactId::new(Entity::Target, Domain::Infrastructure, 1)
    }

    fn buyer_fact() -> FactId {
        FactId::new(Entity::Buyer, Domain::Infrastructure, 1)
    }

    fn risk(cited: Vec<FactId>) -> FindingPayload {
        FindingPayload::Risk(RiskInput {
            finding: FindingInput::new(Domain::Infrastructure, "Unsupported hypervisor", cited)
                .description("vSphere 6.7 is out of support")
                .confidence(Confidence::High),
            severity: Severity::High,
            mitigation: None,
        })
    }

    fn derived_id(payload: &FindingPayload) -> FindingId {
        FindingId::derive(payload.kind(), &payload.content_key(), 8)
    }

    #[test]
    fn entity_inference_prefers_target() {
        assert_eq!(infer_entity(&[target_fact()]), Entity::Target);
        assert_eq!(infer_entity(&[buyer_fact()]), Entity::Buyer);
        assert_eq!(infer_entity(&[buyer_fact(), target_fact()]), Entity::Target);
        assert_eq!(infer_entity(&[]), Entity::Target);
    }

    #[test]
    fn buyer_only_citations_violate_anchor_rule() {
        let err = risk(vec![buyer_fact()]).validate().unwrap_err();
        assert_eq!(err.code(), "ENTITY_ANCHOR_VIOLATION");

        let ok = risk(vec![buyer_fact(), target_fact()]).validate().unwrap();
        assert_eq!(ok, Entity::Target);
    }

    #[test]
    fn empty_citations_are_a_schema_error() {
        let err = risk(vec![]).validate().unwrap_err();
        assert_eq!(err.code(), "SCHEMA_ERROR");
    }

    #[test]
    fn build_dedupes_citations() {
        let payload = risk(vec![target_fact(), target_fact()]);
        let finding = Finding::build(derived_id(&payload), payload).unwrap();
        assert_eq!(finding.cited_facts(), &[target_fact()]);
        assert_eq!(finding.entity(), Entity::Target);
    }

    #[test]
    fn cost_buildup_only_attaches_to_work_items() {
        let payload = risk(vec![target_fact()]);
        let mut finding = Finding::build(derived_id(&payload), payload).unwrap();
        let buildup = CostBuildUp::compute(crate::BuildUpInputs {
            anchor_key: "server_refresh".to_string(),
            anchor_name: "Server refresh".to_string(),
            method: crate::EstimationMethod::PerUnit,
            quantity: 1,
            unit_label: "server".to_string(),
            unit_cost: crate::CostRange::new(1.0, 2.0),
            assumptions: Vec::new(),
            source_facts: Vec::new(),
            confidence: Confidence::Medium,
            size_tier: None,
            scale_factor: 1.0,
            notes: None,
        })
        .unwrap();
        assert!(finding.set_cost_buildup(buildup).is_err());
    }

    #[test]
    fn serialized_finding_restores_through_constructor() {
        let payload = risk(vec![target_fact(), buyer_fact()]);
        let finding = Finding::build(derived_id(&payload), payload).unwrap();
        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["kind"], "risk");
        assert_eq!(json["entity"], "target");

        let back: Finding = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back, finding);

        let mut renamed = json.clone();
        renamed["title"] = "Something else".into();
        assert!(serde_json::from_value::<Finding>(renamed).is_err());

        let mut ungrounded = json;
        ungrounded["cited_facts"] = serde_json::json!(["F-BYR-INFRA-001"]);
        assert!(serde_json::from_value::<Finding>(ungrounded).is_err());
    }

    #[test]
    fn work_items_must_be_triggered_by_risks() {
        let key = ContentKey::new(FindingKind::Recommendation, Domain::Network, "x", None);
        let not_a_risk = FindingId::derive(FindingKind::Recommendation, &key, 8);
        let payload = FindingPayload::WorkItem(WorkItemInput {
            finding: FindingInput::new(Domain::Network, "Segment OT network", vec![target_fact()]),
            phase: Phase::Day100,
            priority: Priority::High,
            owner_type: OwnerType::Buyer,
            cost_estimate: CostBucket::From100kTo500k,
            cost_buildup: None,
            triggered_by: vec![not_a_risk],
        });
        assert_eq!(payload.validate().unwrap_err().code(), "SCHEMA_ERROR");
    }
}
