//! Record identifiers.
//!
//! Fact and gap identifiers embed the owning entity and domain
//! (`F-TGT-INFRA-001`) so that any component holding only the identifier can
//! recover both without a table lookup. Finding identifiers are a short
//! digest of the finding's normalized content (`WI-3f09a1c2`), so independent
//! writers describing the same finding converge on one identifier.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Domain, Entity, FindingKind, OwnerType, ValidationError};

fn parse_scoped(
    raw: &str,
    prefix: &str,
    field: &'static str,
) -> Result<(Entity, Domain, u32), ValidationError> {
    let malformed = || {
        ValidationError::missing_with_hint(
            field,
            format!("malformed identifier {raw:?}"),
            format!("expected {prefix}-<TGT|BYR>-<DOMAIN>-<NNN>"),
        )
    };

    let rest = raw
        .strip_prefix(prefix)
        .and_then(|r| r.strip_prefix('-'))
        .ok_or_else(malformed)?;
    let mut parts = rest.splitn(3, '-');
    let entity = parts
        .next()
        .and_then(Entity::from_code)
        .ok_or_else(malformed)?;
    let domain = parts
        .next()
        .and_then(Domain::from_code)
        .ok_or_else(malformed)?;
    let digits = parts.next().ok_or_else(malformed)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    let sequence: u32 = digits.parse().map_err(|_| malformed())?;
    if sequence == 0 {
        return Err(malformed());
    }
    Ok((entity, domain, sequence))
}

/// Identifier of a [`Fact`](crate::Fact): `F-<entity>-<domain>-<seq>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FactId {
    entity: Entity,
    domain: Domain,
    sequence: u32,
}

impl FactId {
    const PREFIX: &'static str = "F";

    #[must_use]
    pub fn new(entity: Entity, domain: Domain, sequence: u32) -> Self {
        Self {
            entity,
            domain,
            sequence: sequence.max(1),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let (entity, domain, sequence) = parse_scoped(raw.trim(), Self::PREFIX, "fact_id")?;
        Ok(Self {
            entity,
            domain,
            sequence,
        })
    }

    #[must_use]
    pub const fn entity(&self) -> Entity {
        self.entity
    }

    #[must_use]
    pub const fn domain(&self) -> Domain {
        self.domain
    }

    #[must_use]
    pub const fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl fmt::Display for FactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{:03}",
            Self::PREFIX,
            self.entity.code(),
            self.domain.code(),
            self.sequence
        )
    }
}

impl TryFrom<String> for FactId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FactId> for String {
    fn from(value: FactId) -> Self {
        value.to_string()
    }
}

/// Identifier of a [`Gap`](crate::Gap): `G-<entity>-<domain>-<seq>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GapId {
    entity: Entity,
    domain: Domain,
    sequence: u32,
}

impl GapId {
    const PREFIX: &'static str = "G";

    #[must_use]
    pub fn new(entity: Entity, domain: Domain, sequence: u32) -> Self {
        Self {
            entity,
            domain,
            sequence: sequence.max(1),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let (entity, domain, sequence) = parse_scoped(raw.trim(), Self::PREFIX, "gap_id")?;
        Ok(Self {
            entity,
            domain,
            sequence,
        })
    }

    #[must_use]
    pub const fn entity(&self) -> Entity {
        self.entity
    }

    #[must_use]
    pub const fn domain(&self) -> Domain {
        self.domain
    }

    #[must_use]
    pub const fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl fmt::Display for GapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{:03}",
            Self::PREFIX,
            self.entity.code(),
            self.domain.code(),
            self.sequence
        )
    }
}

impl TryFrom<String> for GapId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<GapId> for String {
    fn from(value: GapId) -> Self {
        value.to_string()
    }
}

/// Lowercase, strip punctuation, collapse whitespace.
#[must_use]
pub fn normalize_title(title: &str) -> String {
    let mapped: String = title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized content a finding identifier is derived from.
///
/// Two payloads with equal keys are "the same" finding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentKey(String);

impl ContentKey {
    #[must_use]
    pub fn new(kind: FindingKind, domain: Domain, title: &str, owner: Option<OwnerType>) -> Self {
        let mut key = format!(
            "{}|{}|{}",
            kind.prefix(),
            domain.as_str(),
            normalize_title(title)
        );
        if let Some(owner) = owner {
            key.push('|');
            key.push_str(owner.as_str());
        }
        Self(key)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a [`Finding`](crate::Finding): `<prefix>-<hex digest>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FindingId {
    kind: FindingKind,
    digest: String,
}

impl FindingId {
    pub const MIN_DIGEST_LEN: usize = 8;
    pub const MAX_DIGEST_LEN: usize = 64;

    /// Derive the identifier for `key`, keeping `digest_len` hex characters.
    ///
    /// `digest_len` is clamped to `MIN_DIGEST_LEN..=MAX_DIGEST_LEN`.
    #[must_use]
    pub fn derive(kind: FindingKind, key: &ContentKey, digest_len: usize) -> Self {
        let len = digest_len.clamp(Self::MIN_DIGEST_LEN, Self::MAX_DIGEST_LEN);
        let hash = Sha256::digest(key.as_str().as_bytes());
        let mut digest: String = hash.iter().map(|b| format!("{b:02x}")).collect();
        digest.truncate(len);
        Self { kind, digest }
    }

    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let raw = raw.trim();
        let malformed = || {
            ValidationError::missing_with_hint(
                "finding_id",
                format!("malformed identifier {raw:?}"),
                "expected <R|WI|SC|REC>-<hex digest>",
            )
        };
        let (prefix, digest) = raw.split_once('-').ok_or_else(malformed)?;
        let kind = FindingKind::from_prefix(prefix).ok_or_else(malformed)?;
        let valid_len = (Self::MIN_DIGEST_LEN..=Self::MAX_DIGEST_LEN).contains(&digest.len());
        let valid_hex = digest
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !valid_len || !valid_hex {
            return Err(malformed());
        }
        Ok(Self {
            kind,
            digest: digest.to_string(),
        })
    }

    #[must_use]
    pub const fn kind(&self) -> FindingKind {
        self.kind
    }

    #[must_use]
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Whether this identifier is the one `key` derives to at this digest length.
    #[must_use]
    pub fn matches(&self, key: &ContentKey) -> bool {
        *self == Self::derive(self.kind, key, self.digest.len())
    }
}

impl fmt::Display for FindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind.prefix(), self.digest)
    }
}

impl TryFrom<String> for FindingId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FindingId> for String {
    fn from(value: FindingId) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fact_id_recovers_entity_and_domain() {
        let id = FactId::new(Entity::Target, Domain::Infrastructure, 7);
        assert_eq!(id.to_string(), "F-TGT-INFRA-007");

        let parsed = FactId::parse("F-BYR-IAM-012").unwrap();
        assert_eq!(parsed.entity(), Entity::Buyer);
        assert_eq!(parsed.domain(), Domain::IdentityAccess);
        assert_eq!(parsed.sequence(), 12);
    }

    #[test]
    fn fact_id_rejects_malformed_input() {
        for raw in [
            "",
            "F-TGT-INFRA",
            "G-TGT-INFRA-001",
            "F-XXX-INFRA-001",
            "F-TGT-HR-001",
            "F-TGT-INFRA-000",
            "F-TGT-INFRA-01a",
        ] {
            let err = FactId::parse(raw).unwrap_err();
            assert_eq!(err.code(), "SCHEMA_ERROR", "{raw}");
        }
    }

    #[test]
    fn sequences_past_three_digits_still_parse() {
        let id = FactId::new(Entity::Target, Domain::Network, 1234);
        assert_eq!(FactId::parse(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn gap_id_uses_its_own_prefix() {
        let id = GapId::new(Entity::Buyer, Domain::Organization, 1);
        assert_eq!(id.to_string(), "G-BYR-ORG-001");
        assert!(FactId::parse("G-BYR-ORG-001").is_err());
    }

    #[test]
    fn normalize_title_ignores_case_and_punctuation() {
        assert_eq!(
            normalize_title("  Replace VMware 6.7 -- cluster!  "),
            "replace vmware 6 7 cluster"
        );
        assert_eq!(
            normalize_title("replace vmware 6 7 cluster"),
            normalize_title("Replace  VMware 6.7 cluster")
        );
    }

    #[test]
    fn finding_id_is_deterministic() {
        let key = ContentKey::new(
            FindingKind::WorkItem,
            Domain::Infrastructure,
            "Refresh ESXi hosts",
            Some(OwnerType::Target),
        );
        let a = FindingId::derive(FindingKind::WorkItem, &key, 8);
        let b = FindingId::derive(FindingKind::WorkItem, &key, 8);
        assert_eq!(a, b);
        assert!(a.to_string().starts_with("WI-"));
        assert_eq!(a.digest().len(), 8);
        assert!(a.matches(&key));
    }

    #[test]
    fn owner_type_changes_work_item_identity() {
        let target = ContentKey::new(
            FindingKind::WorkItem,
            Domain::Applications,
            "Migrate ERP",
            Some(OwnerType::Target),
        );
        let buyer = ContentKey::new(
            FindingKind::WorkItem,
            Domain::Applications,
            "Migrate ERP",
            Some(OwnerType::Buyer),
        );
        assert_ne!(
            FindingId::derive(FindingKind::WorkItem, &target, 8),
            FindingId::derive(FindingKind::WorkItem, &buyer, 8)
        );
    }

    #[test]
    fn finding_id_round_trips_through_text() {
        let key = ContentKey::new(FindingKind::Risk, Domain::Network, "Flat network", None);
        let id = FindingId::derive(FindingKind::Risk, &key, 12);
        let parsed = FindingId::parse(&id.to_string()).unwrap();
        assert_eq!(parsed, id);
        assert!(FindingId::parse("R-XYZ").is_err());
        assert!(FindingId::parse("Q-0123abcd").is_err());
    }
}
