//! Facts and gaps.
//!
//! A [`Fact`] is an atomic observation backed by quoted evidence; a [`Gap`]
//! records that expected information is missing. Both are immutable once
//! built. Revising a fact means writing a new one that names its
//! predecessor in `supersedes`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Domain, Entity, FactId, FactStatus, GapId, Importance, ValidationError};

/// Quoted source text and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Evidence {
    #[serde(default)]
    pub exact_quote: String,
    #[serde(default)]
    pub source_section: String,
}

impl Evidence {
    #[must_use]
    pub fn quoted(exact_quote: impl Into<String>, source_section: impl Into<String>) -> Self {
        Self {
            exact_quote: exact_quote.into(),
            source_section: source_section.into(),
        }
    }

    #[must_use]
    pub fn has_quote(&self) -> bool {
        !self.exact_quote.trim().is_empty()
    }
}

/// Category-specific fields the rest of the system relies on.
///
/// Free-form vendor data belongs in [`Fact::additional`], not here.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FactDetails {
    Application {
        name: String,
        vendor: Option<String>,
        version: Option<String>,
        hosting: Option<String>,
        user_count: Option<u32>,
    },
    Server {
        name: String,
        os: Option<String>,
        version: Option<String>,
        environment: Option<String>,
    },
    Site {
        name: String,
        location: Option<String>,
    },
    SecurityControl {
        name: String,
        vendor: Option<String>,
    },
    IdentitySystem {
        name: String,
        vendor: Option<String>,
    },
    Team {
        name: String,
        headcount: Option<u32>,
    },
    #[default]
    General,
}

impl FactDetails {
    /// Name used to match the fact against inventory records.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            FactDetails::Application { name, .. }
            | FactDetails::Server { name, .. }
            | FactDetails::Site { name, .. }
            | FactDetails::SecurityControl { name, .. }
            | FactDetails::IdentitySystem { name, .. }
            | FactDetails::Team { name, .. } => Some(name.as_str()),
            FactDetails::General => None,
        }
    }

    /// The populated fields other than the name, rendered as text.
    #[must_use]
    pub fn attributes(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        let mut put = |key: &str, value: Option<String>| {
            if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
                out.insert(key.to_string(), value);
            }
        };
        match self {
            FactDetails::Application {
                vendor,
                version,
                hosting,
                user_count,
                ..
            } => {
                put("vendor", vendor.clone());
                put("version", version.clone());
                put("hosting", hosting.clone());
                put("user_count", user_count.map(|n| n.to_string()));
            }
            FactDetails::Server {
                os,
                version,
                environment,
                ..
            } => {
                put("os", os.clone());
                put("version", version.clone());
                put("environment", environment.clone());
            }
            FactDetails::Site { location, .. } => put("location", location.clone()),
            FactDetails::SecurityControl { vendor, .. }
            | FactDetails::IdentitySystem { vendor, .. } => put("vendor", vendor.clone()),
            FactDetails::Team { headcount, .. } => {
                put("headcount", headcount.map(|n| n.to_string()));
            }
            FactDetails::General => {}
        }
        out
    }

    fn validate(&self) -> Result<(), ValidationError> {
        match self.name() {
            Some(name) if name.trim().is_empty() => Err(ValidationError::missing(
                "details.name",
                "named fact details need a non-empty name",
            )),
            _ => Ok(()),
        }
    }
}

/// Write request for a new fact.
#[derive(Debug, Clone, PartialEq)]
pub struct FactInput {
    pub domain: Domain,
    pub entity: Entity,
    pub category: String,
    pub claim: String,
    pub details: FactDetails,
    pub additional: BTreeMap<String, Value>,
    pub status: FactStatus,
    pub evidence: Evidence,
}

impl FactInput {
    #[must_use]
    pub fn new(
        domain: Domain,
        entity: Entity,
        category: impl Into<String>,
        claim: impl Into<String>,
    ) -> Self {
        Self {
            domain,
            entity,
            category: category.into(),
            claim: claim.into(),
            details: FactDetails::General,
            additional: BTreeMap::new(),
            status: FactStatus::Documented,
            evidence: Evidence::default(),
        }
    }

    pub fn details(mut self, details: FactDetails) -> Self {
        self.details = details;
        self
    }

    pub fn status(mut self, status: FactStatus) -> Self {
        self.status = status;
        self
    }

    pub fn evidence(mut self, evidence: Evidence) -> Self {
        self.evidence = evidence;
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.additional.insert(key.into(), value.into());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.category.trim().is_empty() {
            return Err(ValidationError::missing("category", "must not be empty"));
        }
        if self.claim.trim().is_empty() {
            return Err(ValidationError::missing("claim", "must not be empty"));
        }
        if self.status == FactStatus::Documented && !self.evidence.has_quote() {
            return Err(ValidationError::missing_with_hint(
                "evidence.exact_quote",
                "a documented fact must quote its source",
                "supply the quoted source text, or mark the fact partial",
            ));
        }
        self.details.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FactRecord")]
pub struct Fact {
    id: FactId,
    domain: Domain,
    entity: Entity,
    category: String,
    claim: String,
    details: FactDetails,
    additional: BTreeMap<String, Value>,
    status: FactStatus,
    evidence: Evidence,
    supersedes: Option<FactId>,
}

impl Fact {
    pub fn new(id: FactId, input: FactInput) -> Result<Self, ValidationError> {
        Self::build(id, input, None)
    }

    /// A fact that replaces `previous`.
    pub fn revising(id: FactId, input: FactInput, previous: FactId) -> Result<Self, ValidationError> {
        Self::build(id, input, Some(previous))
    }

    fn build(
        id: FactId,
        input: FactInput,
        supersedes: Option<FactId>,
    ) -> Result<Self, ValidationError> {
        input.validate()?;
        if id.domain() != input.domain || id.entity() != input.entity {
            return Err(ValidationError::missing(
                "fact_id",
                format!(
                    "{id} does not encode {}/{}",
                    input.entity, input.domain
                ),
            ));
        }
        Ok(Self {
            id,
            domain: input.domain,
            entity: input.entity,
            category: input.category,
            claim: input.claim,
            details: input.details,
            additional: input.additional,
            status: input.status,
            evidence: input.evidence,
            supersedes,
        })
    }

    #[must_use]
    pub fn id(&self) -> &FactId {
        &self.id
    }

    #[must_use]
    pub const fn domain(&self) -> Domain {
        self.domain
    }

    #[must_use]
    pub const fn entity(&self) -> Entity {
        self.entity
    }

    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    #[must_use]
    pub fn claim(&self) -> &str {
        &self.claim
    }

    #[must_use]
    pub fn details(&self) -> &FactDetails {
        &self.details
    }

    #[must_use]
    pub fn additional(&self) -> &BTreeMap<String, Value> {
        &self.additional
    }

    #[must_use]
    pub const fn status(&self) -> FactStatus {
        self.status
    }

    #[must_use]
    pub fn evidence(&self) -> &Evidence {
        &self.evidence
    }

    #[must_use]
    pub fn supersedes(&self) -> Option<&FactId> {
        self.supersedes.as_ref()
    }
}

#[derive(Deserialize)]
struct FactRecord {
    id: FactId,
    #[serde(default)]
    domain: Option<Domain>,
    #[serde(default)]
    entity: Option<Entity>,
    category: String,
    claim: String,
    #[serde(default)]
    details: FactDetails,
    #[serde(default)]
    additional: BTreeMap<String, Value>,
    status: FactStatus,
    #[serde(default)]
    evidence: Evidence,
    #[serde(default)]
    supersedes: Option<FactId>,
}

impl TryFrom<FactRecord> for Fact {
    type Error = ValidationError;

    fn try_from(record: FactRecord) -> Result<Self, Self::Error> {
        let input = FactInput {
            domain: record.domain.unwrap_or(record.id.domain()),
            entity: record.entity.unwrap_or(record.id.entity()),
            category: record.category,
            claim: record.claim,
            details: record.details,
            additional: record.additional,
            status: record.status,
            evidence: record.evidence,
        };
        Fact::build(record.id, input, record.supersedes)
    }
}

/// Write request for a new gap. The entity is mandatory: a gap cites no
/// facts, so there is nothing to infer it from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapInput {
    pub domain: Domain,
    pub entity: Option<Entity>,
    pub category: String,
    pub description: String,
    pub importance: Importance,
}

impl GapInput {
    #[must_use]
    pub fn new(
        domain: Domain,
        entity: Entity,
        category: impl Into<String>,
        description: impl Into<String>,
        importance: Importance,
    ) -> Self {
        Self {
            domain,
            entity: Some(entity),
            category: category.into(),
            description: description.into(),
            importance,
        }
    }

    pub fn validate(&self) -> Result<Entity, ValidationError> {
        let entity = self.entity.ok_or_else(|| {
            ValidationError::missing_with_hint(
                "entity",
                "a gap must name the entity it concerns",
                "pass entity=target or entity=buyer",
            )
        })?;
        if self.category.trim().is_empty() {
            return Err(ValidationError::missing("category", "must not be empty"));
        }
        if self.description.trim().is_empty() {
            return Err(ValidationError::missing("description", "must not be empty"));
        }
        Ok(entity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GapRecord")]
pub struct Gap {
    id: GapId,
    domain: Domain,
    entity: Entity,
    category: String,
    description: String,
    importance: Importance,
}

impl Gap {
    pub fn new(id: GapId, input: GapInput) -> Result<Self, ValidationError> {
        let entity = input.validate()?;
        if id.domain() != input.domain || id.entity() != entity {
            return Err(ValidationError::missing(
                "gap_id",
                format!("{id} does not encode {entity}/{}", input.domain),
            ));
        }
        Ok(Self {
            id,
            domain: input.domain,
            entity,
            category: input.category,
            description: input.description,
            importance: input.importance,
        })
    }

    #[must_use]
    pub fn id(&self) -> &GapId {
        &self.id
    }

    #[must_use]
    pub const fn domain(&self) -> Domain {
        self.domain
    }

    #[must_use]
    pub const fn entity(&self) -> Entity {
        self.entity
    }

    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub const fn importance(&self) -> Importance {
        self.importance
    }
}

#[derive(Deserialize)]
struct GapRecord {
    id: GapId,
    #[serde(default)]
    domain: Option<Domain>,
    #[serde(default)]
    entity: Option<Entity>,
    category: String,
    description: String,
    #[serde(default = "default_importance")]
    importance: Importance,
}

fn default_importance() -> Importance {
    Importance::Medium
}

impl TryFrom<GapRecord> for Gap {
    type Error = ValidationError;

    fn try_from(record: GapRecord) -> Result<Self, Self::Error> {
        let input = GapInput {
            domain: record.domain.unwrap_or(record.id.domain()),
            entity: Some(record.entity.unwrap_or(record.id.entity())),
            category: record.category,
            description: record.description,
            importance: record.importance,
        };
        Gap::new(record.id, input)
    }
}
