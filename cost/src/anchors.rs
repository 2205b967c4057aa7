//! Cost anchor catalog.
//!
//! A cost anchor is a named reference price for one kind of integration
//! activity, quoted per unit (user, application, site, server, endpoint) or
//! as a fixed engagement, optionally split into size or complexity tiers.
//! The catalog is read-only after construction and can be shared across
//! threads behind an `Arc` without further synchronization.

use std::collections::BTreeMap;

use diligence_types::{CostRange, UnitKind, ValidationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("anchor key must not be empty")]
    EmptyKey,
    #[error("anchor {key} prices no tiers")]
    NoTiers { key: String },
    #[error("anchor {key} prices several tiers but not the default tier {tier:?}")]
    MissingDefaultTier { key: String, tier: &'static str },
    #[error("anchor {key} tier {tier:?} has an invalid range: {source}")]
    InvalidRange {
        key: String,
        tier: String,
        source: ValidationError,
    },
}

/// One catalogued cost driver.
#[derive(Debug, Clone, PartialEq)]
pub struct CostAnchor {
    key: String,
    name: String,
    unit: UnitKind,
    tiers: BTreeMap<String, CostRange>,
}

impl CostAnchor {
    /// Build an anchor, checking that every tier is a valid range and that
    /// a multi-tier anchor prices the unit kind's default tier, so tier
    /// resolution always has somewhere to land.
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        unit: UnitKind,
        tiers: BTreeMap<String, CostRange>,
    ) -> Result<Self, CatalogError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(CatalogError::EmptyKey);
        }
        if tiers.is_empty() {
            return Err(CatalogError::NoTiers { key });
        }
        for (tier, range) in &tiers {
            if let Err(source) = CostRange::checked(range.low(), range.high()) {
                return Err(CatalogError::InvalidRange {
                    key,
                    tier: tier.clone(),
                    source,
                });
            }
        }
        let default_tier = unit.default_tier();
        if tiers.len() > 1 && !tiers.contains_key(default_tier) {
            return Err(CatalogError::MissingDefaultTier {
                key,
                tier: default_tier,
            });
        }
        let name = name.into();
        Ok(Self {
            name: if name.trim().is_empty() { key.clone() } else { name },
            key,
            unit,
            tiers,
        })
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn unit(&self) -> UnitKind {
        self.unit
    }

    #[must_use]
    pub fn tiers(&self) -> &BTreeMap<String, CostRange> {
        &self.tiers
    }

    /// Unit cost for `requested`, falling back to the unit kind's default
    /// tier, then to the only tier an anchor prices.
    #[must_use]
    pub fn resolve_tier(&self, requested: Option<&str>) -> ResolvedTier<'_> {
        if let Some((tier, range)) = requested.and_then(|t| self.tiers.get_key_value(t.trim())) {
            return ResolvedTier {
                tier: tier.as_str(),
                unit_cost: *range,
                source: TierSource::Requested,
            };
        }
        let source = if requested.is_some() {
            TierSource::DefaultFallback
        } else {
            TierSource::Default
        };
        if let Some((tier, range)) = self.tiers.get_key_value(self.unit.default_tier()) {
            return ResolvedTier {
                tier: tier.as_str(),
                unit_cost: *range,
                source,
            };
        }
        // Construction guarantees a tierless default only on single-tier anchors.
        let (tier, range) = self
            .tiers
            .iter()
            .next()
            .map_or(("", CostRange::ZERO), |(t, r)| (t.as_str(), *r));
        ResolvedTier {
            tier,
            unit_cost: range,
            source,
        }
    }
}

/// How a tier was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierSource {
    /// The caller's tier is priced.
    Requested,
    /// No tier was requested.
    Default,
    /// The caller's tier is not priced for this anchor.
    DefaultFallback,
}

/// Result of tier resolution. Keeps the fallback decision visible to the
/// caller instead of silently substituting a price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedTier<'a> {
    tier: &'a str,
    unit_cost: CostRange,
    source: TierSource,
}

impl<'a> ResolvedTier<'a> {
    #[must_use]
    pub const fn tier(&self) -> &'a str {
        self.tier
    }

    #[must_use]
    pub const fn unit_cost(&self) -> CostRange {
        self.unit_cost
    }

    #[must_use]
    pub const fn source(&self) -> TierSource {
        self.source
    }
}

type TierTable = &'static [(&'static str, f64, f64)];

/// Built-in anchors: key, display name, unit kind, tier prices.
const BUILTIN_ANCHORS: &[(&str, &str, UnitKind, TierTable)] = &[
    // Infrastructure
    (
        "server_refresh",
        "Server hardware refresh",
        UnitKind::PerServer,
        &[("standard", 8_000.0, 15_000.0)],
    ),
    (
        "server_migration",
        "Server migration",
        UnitKind::PerServer,
        &[("standard", 2_000.0, 5_000.0)],
    ),
    (
        "hypervisor_upgrade",
        "Hypervisor platform upgrade",
        UnitKind::PerServer,
        &[("standard", 1_500.0, 4_000.0)],
    ),
    (
        "datacenter_exit",
        "Data center exit",
        UnitKind::FixedBySize,
        &[
            ("small", 250_000.0, 750_000.0),
            ("medium", 750_000.0, 2_000_000.0),
            ("large", 2_000_000.0, 5_000_000.0),
        ],
    ),
    (
        "endpoint_refresh",
        "End-user device refresh",
        UnitKind::PerEndpoint,
        &[("standard", 1_200.0, 2_000.0)],
    ),
    // Network
    (
        "site_network_integration",
        "Site network integration",
        UnitKind::PerSite,
        &[("standard", 15_000.0, 60_000.0)],
    ),
    (
        "sd_wan_cutover",
        "SD-WAN cutover",
        UnitKind::PerSite,
        &[("standard", 5_000.0, 20_000.0)],
    ),
    (
        "network_separation",
        "Network separation",
        UnitKind::FixedByComplexity,
        &[
            ("simple", 100_000.0, 250_000.0),
            ("moderate", 250_000.0, 600_000.0),
            ("complex", 600_000.0, 1_500_000.0),
        ],
    ),
    // Cybersecurity
    (
        "edr_deployment",
        "EDR agent deployment",
        UnitKind::PerEndpoint,
        &[("standard", 40.0, 90.0)],
    ),
    (
        "security_assessment",
        "Security assessment",
        UnitKind::Fixed,
        &[("standard", 50_000.0, 150_000.0)],
    ),
    (
        "soc_onboarding",
        "SOC onboarding",
        UnitKind::Fixed,
        &[("standard", 75_000.0, 200_000.0)],
    ),
    // Identity & access
    (
        "identity_migration",
        "Directory and identity migration",
        UnitKind::PerUser,
        &[("standard", 30.0, 80.0)],
    ),
    (
        "mfa_rollout",
        "MFA rollout",
        UnitKind::PerUser,
        &[("standard", 20.0, 60.0)],
    ),
    // Applications
    (
        "email_migration",
        "Email tenant migration",
        UnitKind::PerUser,
        &[("standard", 50.0, 150.0)],
    ),
    (
        "license_true_up",
        "License true-up",
        UnitKind::PerUser,
        &[("standard", 200.0, 600.0)],
    ),
    (
        "application_migration",
        "Application migration",
        UnitKind::PerApp,
        &[("standard", 25_000.0, 150_000.0)],
    ),
    (
        "application_retirement",
        "Application retirement",
        UnitKind::PerApp,
        &[("standard", 10_000.0, 40_000.0)],
    ),
    (
        "erp_separation",
        "ERP separation",
        UnitKind::FixedByComplexity,
        &[
            ("simple", 500_000.0, 1_500_000.0),
            ("moderate", 1_500_000.0, 4_000_000.0),
            ("complex", 4_000_000.0, 10_000_000.0),
        ],
    ),
    // Organization
    (
        "tsa_exit_program",
        "TSA exit program",
        UnitKind::FixedBySize,
        &[
            ("small", 150_000.0, 400_000.0),
            ("medium", 400_000.0, 1_000_000.0),
            ("large", 1_000_000.0, 3_000_000.0),
        ],
    ),
];

/// Lookup table from anchor key to [`CostAnchor`].
#[derive(Debug, Clone)]
pub struct AnchorCatalog {
    anchors: BTreeMap<String, CostAnchor>,
}

impl AnchorCatalog {
    /// The built-in reference table.
    #[must_use]
    pub fn builtin() -> Self {
        let anchors = BUILTIN_ANCHORS
            .iter()
            .map(|(key, name, unit, tiers)| {
                let anchor = CostAnchor {
                    key: (*key).to_string(),
                    name: (*name).to_string(),
                    unit: *unit,
                    tiers: tiers
                        .iter()
                        .map(|(tier, low, high)| ((*tier).to_string(), CostRange::new(*low, *high)))
                        .collect(),
                };
                ((*key).to_string(), anchor)
            })
            .collect();
        Self { anchors }
    }

    /// An empty catalog, for callers that supply every anchor themselves.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            anchors: BTreeMap::new(),
        }
    }

    /// Merge `overrides` over this catalog. An override with an existing
    /// key replaces that anchor wholesale; new keys are added.
    #[must_use]
    pub fn with_overrides(mut self, overrides: impl IntoIterator<Item = CostAnchor>) -> Self {
        for anchor in overrides {
            if self.anchors.contains_key(&anchor.key) {
                tracing::debug!(anchor = %anchor.key, "Overriding built-in cost anchor");
            }
            self.anchors.insert(anchor.key.clone(), anchor);
        }
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&CostAnchor> {
        self.anchors.get(key)
    }

    /// Anchors in key order.
    pub fn iter(&self) -> impl Iterator<Item = &CostAnchor> {
        self.anchors.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

impl Default for AnchorCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiers(entries: &[(&str, f64, f64)]) -> BTreeMap<String, CostRange> {
        entries
            .iter()
            .map(|(t, l, h)| ((*t).to_string(), CostRange::new(*l, *h)))
            .collect()
    }

    #[test]
    fn builtin_anchors_are_well_formed() {
        let catalog = AnchorCatalog::builtin();
        assert!(catalog.len() >= 15);
        for anchor in catalog.iter() {
            let rebuilt = CostAnchor::new(
                anchor.key(),
                anchor.name(),
                anchor.unit(),
                anchor.tiers().clone(),
            );
            assert!(rebuilt.is_ok(), "{} failed validation", anchor.key());
        }
    }

    #[test]
    fn server_refresh_is_per_server() {
        let catalog = AnchorCatalog::builtin();
        let anchor = catalog.get("server_refresh").expect("server_refresh anchor");
        assert_eq!(anchor.unit(), UnitKind::PerServer);
        let resolved = anchor.resolve_tier(None);
        assert_eq!(resolved.tier(), "standard");
        assert_eq!(resolved.unit_cost(), CostRange::new(8_000.0, 15_000.0));
        assert_eq!(resolved.source(), TierSource::Default);
    }

    #[test]
    fn unknown_tier_falls_back_to_default_tier() {
        let catalog = AnchorCatalog::builtin();
        let anchor = catalog.get("datacenter_exit").unwrap();

        let exact = anchor.resolve_tier(Some("large"));
        assert_eq!(exact.tier(), "large");
        assert_eq!(exact.source(), TierSource::Requested);

        let fallback = anchor.resolve_tier(Some("enormous"));
        assert_eq!(fallback.tier(), "medium");
        assert_eq!(fallback.source(), TierSource::DefaultFallback);

        let complexity = catalog.get("network_separation").unwrap();
        assert_eq!(complexity.resolve_tier(Some("extreme")).tier(), "moderate");
    }

    #[test]
    fn single_tier_anchor_uses_its_only_tier() {
        let anchor = CostAnchor::new(
            "custom",
            "Custom",
            UnitKind::FixedBySize,
            tiers(&[("large", 1.0, 2.0)]),
        )
        .unwrap();
        let resolved = anchor.resolve_tier(Some("small"));
        assert_eq!(resolved.tier(), "large");
        assert_eq!(resolved.source(), TierSource::DefaultFallback);
    }

    #[test]
    fn multi_tier_anchor_requires_default_tier() {
        let err = CostAnchor::new(
            "custom",
            "Custom",
            UnitKind::FixedByComplexity,
            tiers(&[("simple", 1.0, 2.0), ("complex", 3.0, 4.0)]),
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::MissingDefaultTier { tier: "moderate", .. }));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = CostAnchor::new("x", "X", UnitKind::Fixed, tiers(&[("standard", 5.0, 1.0)]))
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidRange { .. }));
    }

    #[test]
    fn overrides_replace_and_extend() {
        let replacement = CostAnchor::new(
            "server_refresh",
            "Server refresh (negotiated)",
            UnitKind::PerServer,
            tiers(&[("standard", 6_000.0, 9_000.0)]),
        )
        .unwrap();
        let extra = CostAnchor::new(
            "erp_migration",
            "ERP migration",
            UnitKind::FixedByComplexity,
            tiers(&[("low", 250_000.0, 500_000.0), ("moderate", 500_000.0, 1_500_000.0)]),
        )
        .unwrap();

        let base = AnchorCatalog::builtin();
        let before = base.len();
        let catalog = base.with_overrides([replacement, extra]);

        assert_eq!(catalog.len(), before + 1);
        assert_eq!(
            catalog.get("server_refresh").unwrap().name(),
            "Server refresh (negotiated)"
        );
        assert!(catalog.get("erp_migration").is_some());
    }
}
