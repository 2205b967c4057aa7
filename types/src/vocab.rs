//! Closed vocabularies enforced at the write boundary.
//!
//! Each vocabulary serializes as its canonical snake-case text and refuses
//! anything else, both through [`FromStr`] and through serde, so a snapshot
//! cannot smuggle an out-of-vocabulary value past the constructors.

use std::fmt;
use std::str::FromStr;

use crate::ValidationError;
use crate::cost::CostRange;

macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident as $field:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
            pub const NAMES: &'static [&'static str] = &[$($text),+];

            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn parse(raw: &str) -> Result<Self, ValidationError> {
                match raw.trim() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(ValidationError::InvalidEnum {
                        field: $field,
                        value: raw.to_string(),
                        allowed: Self::NAMES,
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = <String as serde::Deserialize>::deserialize(deserializer)?;
                Self::parse(&raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

vocabulary! {
    /// Analysis domain a record belongs to.
    Domain as "domain" {
        Infrastructure => "infrastructure",
        Network => "network",
        Cybersecurity => "cybersecurity",
        Applications => "applications",
        IdentityAccess => "identity_access",
        Organization => "organization",
    }
}

impl Domain {
    /// Short code embedded in fact and gap identifiers.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Domain::Infrastructure => "INFRA",
            Domain::Network => "NET",
            Domain::Cybersecurity => "CYBER",
            Domain::Applications => "APP",
            Domain::IdentityAccess => "IAM",
            Domain::Organization => "ORG",
        }
    }

    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|d| d.code() == code)
    }
}

vocabulary! {
    /// Which side of the deal a record describes.
    Entity as "entity" {
        Target => "target",
        Buyer => "buyer",
    }
}

impl Entity {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Entity::Target => "TGT",
            Entity::Buyer => "BYR",
        }
    }

    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "TGT" => Some(Entity::Target),
            "BYR" => Some(Entity::Buyer),
            _ => None,
        }
    }
}

vocabulary! {
    /// How completely the source material documents a fact.
    FactStatus as "status" {
        Documented => "documented",
        Partial => "partial",
        Gap => "gap",
    }
}

vocabulary! {
    Severity as "severity" {
        Critical => "critical",
        High => "high",
        Medium => "medium",
        Low => "low",
    }
}

vocabulary! {
    /// Integration phase a work item lands in.
    Phase as "phase" {
        Day1 => "Day_1",
        Day100 => "Day_100",
        Post100 => "Post_100",
    }
}

vocabulary! {
    /// Party expected to execute a work item.
    OwnerType as "owner_type" {
        Buyer => "buyer",
        Target => "target",
        Shared => "shared",
        Vendor => "vendor",
    }
}

vocabulary! {
    /// Coarse cost band used when no computed build-up exists.
    CostBucket as "cost_estimate" {
        Under25k => "under_25k",
        From25kTo100k => "25k_to_100k",
        From100kTo500k => "100k_to_500k",
        From500kTo1m => "500k_to_1m",
        Over1m => "over_1m",
    }
}

impl CostBucket {
    /// Fixed low/high pair this band aggregates as.
    #[must_use]
    pub const fn range(self) -> CostRange {
        match self {
            CostBucket::Under25k => CostRange::new(5_000.0, 25_000.0),
            CostBucket::From25kTo100k => CostRange::new(25_000.0, 100_000.0),
            CostBucket::From100kTo500k => CostRange::new(100_000.0, 500_000.0),
            CostBucket::From500kTo1m => CostRange::new(500_000.0, 1_000_000.0),
            CostBucket::Over1m => CostRange::new(1_000_000.0, 2_500_000.0),
        }
    }
}

vocabulary! {
    Confidence as "confidence" {
        High => "high",
        Medium => "medium",
        Low => "low",
    }
}

vocabulary! {
    /// How much a missing piece of information matters.
    Importance as "importance" {
        Critical => "critical",
        High => "high",
        Medium => "medium",
        Low => "low",
    }
}

vocabulary! {
    Priority as "priority" {
        Critical => "critical",
        High => "high",
        Medium => "medium",
        Low => "low",
    }
}

vocabulary! {
    /// Angle a strategic consideration is argued from.
    StrategicLens as "lens" {
        BuyerAlignment => "buyer_alignment",
        TsaDependency => "tsa_dependency",
        Synergy => "synergy",
        IntegrationComplexity => "integration_complexity",
        ValueCreation => "value_creation",
    }
}

vocabulary! {
    ActionType as "action_type" {
        Negotiate => "negotiate",
        Investigate => "investigate",
        Remediate => "remediate",
        Budget => "budget",
        Monitor => "monitor",
    }
}

vocabulary! {
    Urgency as "urgency" {
        Immediate => "immediate",
        PreClose => "pre_close",
        PostClose => "post_close",
    }
}

vocabulary! {
    /// The four finding variants.
    FindingKind as "kind" {
        Risk => "risk",
        WorkItem => "work_item",
        StrategicConsideration => "strategic_consideration",
        Recommendation => "recommendation",
    }
}

impl FindingKind {
    /// Identifier prefix.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            FindingKind::Risk => "R",
            FindingKind::WorkItem => "WI",
            FindingKind::StrategicConsideration => "SC",
            FindingKind::Recommendation => "REC",
        }
    }

    #[must_use]
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.prefix() == prefix)
    }
}

vocabulary! {
    /// What a cost anchor's price is quoted per.
    UnitKind as "unit" {
        PerUser => "per_user",
        PerApp => "per_app",
        PerSite => "per_site",
        PerServer => "per_server",
        PerEndpoint => "per_endpoint",
        Fixed => "fixed",
        FixedBySize => "fixed_by_size",
        FixedByComplexity => "fixed_by_complexity",
    }
}

impl UnitKind {
    #[must_use]
    pub const fn method(self) -> EstimationMethod {
        match self {
            UnitKind::PerUser
            | UnitKind::PerApp
            | UnitKind::PerSite
            | UnitKind::PerServer
            | UnitKind::PerEndpoint => EstimationMethod::PerUnit,
            UnitKind::Fixed => EstimationMethod::Fixed,
            UnitKind::FixedBySize | UnitKind::FixedByComplexity => EstimationMethod::FixedByTier,
        }
    }

    /// Singular label of one counted unit. Fixed kinds have none.
    #[must_use]
    pub const fn unit_label(self) -> Option<&'static str> {
        match self {
            UnitKind::PerUser => Some("user"),
            UnitKind::PerApp => Some("application"),
            UnitKind::PerSite => Some("site"),
            UnitKind::PerServer => Some("server"),
            UnitKind::PerEndpoint => Some("endpoint"),
            UnitKind::Fixed | UnitKind::FixedBySize | UnitKind::FixedByComplexity => None,
        }
    }

    /// Tier used when a caller asks for one the anchor does not price.
    #[must_use]
    pub const fn default_tier(self) -> &'static str {
        match self {
            UnitKind::FixedBySize => "medium",
            UnitKind::FixedByComplexity => "moderate",
            _ => "standard",
        }
    }
}

vocabulary! {
    EstimationMethod as "method" {
        PerUnit => "per_unit",
        Fixed => "fixed",
        FixedByTier => "fixed_by_tier",
    }
}

impl EstimationMethod {
    #[must_use]
    pub const fn is_fixed(self) -> bool {
        matches!(self, EstimationMethod::Fixed | EstimationMethod::FixedByTier)
    }
}
