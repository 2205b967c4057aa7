//! Side-effect-free pre-flight checks.
//!
//! [`validate_payload`] runs every check the Reasoning Store runs on
//! create except identifier uniqueness, and writes nothing.
//! [`validate_raw_payload`] first lifts an untyped JSON tool payload into a
//! typed [`FindingPayload`], reporting the first missing field or
//! out-of-vocabulary value it meets.

use std::str::FromStr;

use diligence_types::{
    Confidence, CostBucket, CostBuildUp, Domain, Entity, FactId, FindingId, FindingInput,
    FindingKind, FindingPayload, GapInput, Importance, RecommendationInput, RiskInput,
    StrategicConsiderationInput, ValidationError, WorkItemInput,
};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::fact_store::FactStore;

/// Local checks plus existence of every cited fact. Returns the inferred
/// owning entity.
pub fn validate_payload(
    payload: &FindingPayload,
    facts: &FactStore,
) -> Result<Entity, ValidationError> {
    let entity = payload.validate()?;
    for cited in &payload.finding().cited_facts {
        facts.require_fact(cited)?;
    }
    Ok(entity)
}

/// Parse and validate a raw finding payload of `kind`
/// (`risk`, `work_item`, `strategic_consideration`, `recommendation`).
///
/// With `facts`, citations must also resolve; without, only the local rules
/// run. Work item triggers are checked for shape, not existence.
pub fn validate_raw_payload(
    kind: &str,
    raw: &Value,
    facts: Option<&FactStore>,
) -> Result<FindingPayload, ValidationError> {
    let kind = FindingKind::parse(kind)?;
    let obj = raw
        .as_object()
        .ok_or_else(|| ValidationError::missing("payload", "expected a JSON object"))?;
    let payload = parse_finding(kind, obj)?;
    match facts {
        Some(facts) => validate_payload(&payload, facts)?,
        None => payload.validate()?,
    };
    Ok(payload)
}

/// Parse a raw gap payload. The entity must be present and be `target` or
/// `buyer`.
pub fn parse_raw_gap(raw: &Value) -> Result<GapInput, ValidationError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| ValidationError::missing("payload", "expected a JSON object"))?;
    let entity = match optional_str(obj, "entity")? {
        Some(text) => Some(Entity::parse(text)?),
        None => None,
    };
    let input = GapInput {
        domain: required_enum(obj, "domain")?,
        entity,
        category: required_str(obj, "category")?.to_string(),
        description: required_str(obj, "description")?.to_string(),
        importance: optional_enum(obj, "importance")?.unwrap_or(Importance::Medium),
    };
    input.validate()?;
    Ok(input)
}

fn parse_finding(
    kind: FindingKind,
    obj: &Map<String, Value>,
) -> Result<FindingPayload, ValidationError> {
    let finding = FindingInput {
        domain: required_enum::<Domain>(obj, "domain")?,
        title: required_str(obj, "title")?.to_string(),
        description: optional_str(obj, "description")?.unwrap_or_default().to_string(),
        cited_facts: id_list(obj, "cited_fact_ids", FactId::parse)?,
        confidence: optional_enum(obj, "confidence")?.unwrap_or(Confidence::Medium),
        reasoning: optional_str(obj, "reasoning")?.unwrap_or_default().to_string(),
    };

    Ok(match kind {
        FindingKind::Risk => FindingPayload::Risk(RiskInput {
            finding,
            severity: required_enum(obj, "severity")?,
            mitigation: optional_str(obj, "mitigation")?.map(str::to_string),
        }),
        FindingKind::WorkItem => FindingPayload::WorkItem(WorkItemInput {
            finding,
            phase: required_enum(obj, "phase")?,
            priority: required_enum(obj, "priority")?,
            owner_type: required_enum(obj, "owner_type")?,
            cost_estimate: required_enum::<CostBucket>(obj, "cost_estimate")?,
            cost_buildup: match obj.get("cost_buildup") {
                None | Some(Value::Null) => None,
                Some(value) => Some(parse_buildup(value)?),
            },
            triggered_by: id_list(obj, "triggered_by", FindingId::parse)?,
        }),
        FindingKind::StrategicConsideration => {
            FindingPayload::StrategicConsideration(StrategicConsiderationInput {
                finding,
                lens: required_enum(obj, "lens")?,
                implication: required_str(obj, "implication")?.to_string(),
            })
        }
        FindingKind::Recommendation => FindingPayload::Recommendation(RecommendationInput {
            finding,
            action_type: required_enum(obj, "action_type")?,
            urgency: required_enum(obj, "urgency")?,
        }),
    })
}

fn parse_buildup(value: &Value) -> Result<CostBuildUp, ValidationError> {
    CostBuildUp::deserialize(value)
        .map_err(|err| ValidationError::missing("cost_buildup", err.to_string()))
}

fn optional_str<'a>(
    obj: &'a Map<String, Value>,
    field: &'static str,
) -> Result<Option<&'a str>, ValidationError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.as_str())),
        Some(_) => Err(ValidationError::missing(field, "expected a string")),
    }
}

fn required_str<'a>(
    obj: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, ValidationError> {
    match optional_str(obj, field)? {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(ValidationError::missing(field, "is required")),
    }
}

fn optional_enum<T>(
    obj: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<T>, ValidationError>
where
    T: FromStr<Err = ValidationError>,
{
    optional_str(obj, field)?.map(T::from_str).transpose()
}

fn required_enum<T>(obj: &Map<String, Value>, field: &'static str) -> Result<T, ValidationError>
where
    T: FromStr<Err = ValidationError>,
{
    T::from_str(required_str(obj, field)?)
}

fn id_list<T>(
    obj: &Map<String, Value>,
    field: &'static str,
    parse: fn(&str) -> Result<T, ValidationError>,
) -> Result<Vec<T>, ValidationError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .ok_or_else(|| ValidationError::missing(field, "expected identifier strings"))
                    .and_then(parse)
            })
            .collect(),
        Some(_) => Err(ValidationError::missing(field, "expected a list of identifiers")),
    }
}
