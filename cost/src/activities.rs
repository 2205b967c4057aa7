//! Scenario-level costing over a catalog of integration activities.
//!
//! Coarser than the anchor estimator: each activity carries its own cost
//! model, activities are filtered by deal type and industry, and the sum is
//! scaled by a complexity factor and an industry factor. The result is a
//! pure function of the scenario, which is what makes [`ActivityCatalog::calibrate`]
//! meaningful.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use diligence_types::{CostRange, ValidationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealType {
    Acquisition,
    Merger,
    Carveout,
    Divestiture,
}

impl DealType {
    pub const ALL: &'static [DealType] = &[
        DealType::Acquisition,
        DealType::Merger,
        DealType::Carveout,
        DealType::Divestiture,
    ];
    const NAMES: &'static [&'static str] = &["acquisition", "merger", "carveout", "divestiture"];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            DealType::Acquisition => "acquisition",
            DealType::Merger => "merger",
            DealType::Carveout => "carveout",
            DealType::Divestiture => "divestiture",
        }
    }
}

impl fmt::Display for DealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DealType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == s.trim())
            .ok_or_else(|| ValidationError::InvalidEnum {
                field: "deal_type",
                value: s.to_string(),
                allowed: Self::NAMES,
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
    HighlyComplex,
}

impl Complexity {
    pub const ALL: &'static [Complexity] = &[
        Complexity::Simple,
        Complexity::Moderate,
        Complexity::Complex,
        Complexity::HighlyComplex,
    ];
    const NAMES: &'static [&'static str] = &["simple", "moderate", "complex", "highly_complex"];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Complexity::Simple => "simple",
            Complexity::Moderate => "moderate",
            Complexity::Complex => "complex",
            Complexity::HighlyComplex => "highly_complex",
        }
    }

    #[must_use]
    pub const fn factor(self) -> f64 {
        match self {
            Complexity::Simple => 0.8,
            Complexity::Moderate => 1.0,
            Complexity::Complex => 1.3,
            Complexity::HighlyComplex => 1.6,
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Complexity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s.trim())
            .ok_or_else(|| ValidationError::InvalidEnum {
                field: "complexity",
                value: s.to_string(),
                allowed: Self::NAMES,
            })
    }
}

/// What a per-unit activity counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityDriver {
    Users,
    Applications,
    Sites,
    Servers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScenarioQuantities {
    pub users: u32,
    pub applications: u32,
    pub sites: u32,
    pub servers: u32,
}

impl ScenarioQuantities {
    #[must_use]
    pub const fn get(&self, driver: QuantityDriver) -> u32 {
        match driver {
            QuantityDriver::Users => self.users,
            QuantityDriver::Applications => self.applications,
            QuantityDriver::Sites => self.sites,
            QuantityDriver::Servers => self.servers,
        }
    }
}

/// Cost model of one activity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActivityCost {
    Fixed(CostRange),
    PerUnit {
        base: CostRange,
        per_unit: CostRange,
        driver: QuantityDriver,
    },
    /// Already complexity-specific, so exempt from the complexity factor.
    TieredByComplexity {
        simple: CostRange,
        moderate: CostRange,
        complex: CostRange,
        highly_complex: CostRange,
    },
}

impl ActivityCost {
    fn price(&self, complexity: Complexity, quantities: &ScenarioQuantities) -> CostRange {
        match *self {
            ActivityCost::Fixed(range) => range,
            ActivityCost::PerUnit {
                base,
                per_unit,
                driver,
            } => base + per_unit.scaled(f64::from(quantities.get(driver))),
            ActivityCost::TieredByComplexity {
                simple,
                moderate,
                complex,
                highly_complex,
            } => match complexity {
                Complexity::Simple => simple,
                Complexity::Moderate => moderate,
                Complexity::Complex => complex,
                Complexity::HighlyComplex => highly_complex,
            },
        }
    }

    const fn scales_with_complexity(&self) -> bool {
        !matches!(self, ActivityCost::TieredByComplexity { .. })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Activity {
    pub key: &'static str,
    pub name: &'static str,
    pub deal_types: &'static [DealType],
    /// `None` applies to every industry.
    pub industries: Option<&'static [&'static str]>,
    pub cost: ActivityCost,
}

impl Activity {
    fn applies_to(&self, deal_type: DealType, industry: &str) -> bool {
        self.deal_types.contains(&deal_type)
            && self.industries.is_none_or(|list| list.contains(&industry))
    }
}

const ALL_DEALS: &[DealType] = DealType::ALL;
const COMBINING: &[DealType] = &[DealType::Acquisition, DealType::Merger];
const SEPARATING: &[DealType] = &[DealType::Carveout, DealType::Divestiture];

const BUILTIN_ACTIVITIES: &[Activity] = &[
    Activity {
        key: "identity_integration",
        name: "Identity integration",
        deal_types: COMBINING,
        industries: None,
        cost: ActivityCost::PerUnit {
            base: CostRange::new(50_000.0, 100_000.0),
            per_unit: CostRange::new(30.0, 80.0),
            driver: QuantityDriver::Users,
        },
    },
    Activity {
        key: "email_migration",
        name: "Email and collaboration migration",
        deal_types: &[DealType::Acquisition, DealType::Merger, DealType::Carveout],
        industries: None,
        cost: ActivityCost::PerUnit {
            base: CostRange::new(20_000.0, 50_000.0),
            per_unit: CostRange::new(40.0, 120.0),
            driver: QuantityDriver::Users,
        },
    },
    Activity {
        key: "application_rationalization",
        name: "Application rationalization",
        deal_types: COMBINING,
        industries: None,
        cost: ActivityCost::PerUnit {
            base: CostRange::new(50_000.0, 150_000.0),
            per_unit: CostRange::new(15_000.0, 60_000.0),
            driver: QuantityDriver::Applications,
        },
    },
    Activity {
        key: "application_separation",
        name: "Application separation",
        deal_types: SEPARATING,
        industries: None,
        cost: ActivityCost::PerUnit {
            base: CostRange::new(100_000.0, 250_000.0),
            per_unit: CostRange::new(20_000.0, 80_000.0),
            driver: QuantityDriver::Applications,
        },
    },
    Activity {
        key: "site_integration",
        name: "Site network integration",
        deal_types: ALL_DEALS,
        industries: None,
        cost: ActivityCost::PerUnit {
            base: CostRange::ZERO,
            per_unit: CostRange::new(10_000.0, 40_000.0),
            driver: QuantityDriver::Sites,
        },
    },
    Activity {
        key: "datacenter_consolidation",
        name: "Data center consolidation",
        deal_types: COMBINING,
        industries: None,
        cost: ActivityCost::PerUnit {
            base: CostRange::new(150_000.0, 400_000.0),
            per_unit: CostRange::new(2_000.0, 6_000.0),
            driver: QuantityDriver::Servers,
        },
    },
    Activity {
        key: "standalone_infrastructure",
        name: "Standalone infrastructure build-out",
        deal_types: SEPARATING,
        industries: None,
        cost: ActivityCost::PerUnit {
            base: CostRange::new(250_000.0, 600_000.0),
            per_unit: CostRange::new(5_000.0, 12_000.0),
            driver: QuantityDriver::Servers,
        },
    },
    Activity {
        key: "day1_network_separation",
        name: "Day 1 network separation",
        deal_types: SEPARATING,
        industries: None,
        cost: ActivityCost::TieredByComplexity {
            simple: CostRange::new(100_000.0, 250_000.0),
            moderate: CostRange::new(250_000.0, 600_000.0),
            complex: CostRange::new(600_000.0, 1_500_000.0),
            highly_complex: CostRange::new(1_500_000.0, 3_000_000.0),
        },
    },
    Activity {
        key: "tsa_management",
        name: "TSA management office",
        deal_types: SEPARATING,
        industries: None,
        cost: ActivityCost::Fixed(CostRange::new(100_000.0, 300_000.0)),
    },
    Activity {
        key: "security_remediation",
        name: "Security posture remediation",
        deal_types: ALL_DEALS,
        industries: None,
        cost: ActivityCost::TieredByComplexity {
            simple: CostRange::new(50_000.0, 150_000.0),
            moderate: CostRange::new(150_000.0, 400_000.0),
            complex: CostRange::new(400_000.0, 900_000.0),
            highly_complex: CostRange::new(900_000.0, 2_000_000.0),
        },
    },
    Activity {
        key: "regulatory_compliance_review",
        name: "Regulatory compliance review",
        deal_types: ALL_DEALS,
        industries: Some(&["financial_services", "healthcare", "government"]),
        cost: ActivityCost::Fixed(CostRange::new(75_000.0, 250_000.0)),
    },
];

const BUILTIN_INDUSTRY_FACTORS: &[(&str, f64)] = &[
    ("financial_services", 1.25),
    ("government", 1.3),
    ("healthcare", 1.2),
    ("manufacturing", 1.05),
    ("retail", 1.0),
    ("technology", 0.95),
];

/// Industries absent from the factor table scale by 1.0.
const DEFAULT_INDUSTRY_FACTOR: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub deal_type: DealType,
    pub industry: String,
    pub complexity: Complexity,
    pub quantities: ScenarioQuantities,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityLine {
    pub key: &'static str,
    pub name: &'static str,
    /// Line cost before scenario factors.
    pub base: CostRange,
    /// Line cost after scenario factors.
    pub cost: CostRange,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioEstimate {
    pub lines: Vec<ActivityLine>,
    pub complexity_factor: f64,
    pub industry_factor: f64,
    pub total: CostRange,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Calibration {
    pub estimate: ScenarioEstimate,
    pub target: f64,
    /// Multiplier that moves the estimate's midpoint onto the target.
    pub adjustment: f64,
    pub calibrated_total: CostRange,
}

#[derive(Debug, Error, PartialEq)]
pub enum CalibrationError {
    #[error("calibration target must be a positive amount (got {0})")]
    InvalidTarget(f64),
    #[error("no activity applies to a {deal_type} deal in {industry}; nothing to calibrate")]
    EmptyScenario { deal_type: DealType, industry: String },
}

#[derive(Debug, Clone)]
pub struct ActivityCatalog {
    activities: Vec<Activity>,
    industry_factors: BTreeMap<String, f64>,
}

impl Default for ActivityCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ActivityCatalog {
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            activities: BUILTIN_ACTIVITIES.to_vec(),
            industry_factors: BUILTIN_INDUSTRY_FACTORS
                .iter()
                .map(|(industry, factor)| ((*industry).to_string(), *factor))
                .collect(),
        }
    }

    /// Merge industry factors over the built-in table. Non-positive or
    /// non-finite factors are skipped.
    #[must_use]
    pub fn with_industry_factors(
        mut self,
        overrides: impl IntoIterator<Item = (String, f64)>,
    ) -> Self {
        for (industry, factor) in overrides {
            if factor.is_finite() && factor > 0.0 {
                self.industry_factors.insert(industry, factor);
            } else {
                tracing::warn!(%industry, factor, "Skipping invalid industry factor");
            }
        }
        self
    }

    #[must_use]
    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }

    #[must_use]
    pub fn industry_factor(&self, industry: &str) -> f64 {
        self.industry_factors
            .get(industry)
            .copied()
            .unwrap_or(DEFAULT_INDUSTRY_FACTOR)
    }

    #[must_use]
    pub fn estimate_scenario(&self, scenario: &Scenario) -> ScenarioEstimate {
        let complexity_factor = scenario.complexity.factor();
        let industry_factor = self.industry_factor(&scenario.industry);

        let mut total = CostRange::ZERO;
        let lines: Vec<ActivityLine> = self
            .activities
            .iter()
            .filter(|a| a.applies_to(scenario.deal_type, &scenario.industry))
            .map(|activity| {
                let base = activity
                    .cost
                    .price(scenario.complexity, &scenario.quantities);
                let mut cost = base.scaled(industry_factor);
                if activity.cost.scales_with_complexity() {
                    cost = cost.scaled(complexity_factor);
                }
                total += cost;
                ActivityLine {
                    key: activity.key,
                    name: activity.name,
                    base,
                    cost,
                }
            })
            .collect();

        ScenarioEstimate {
            lines,
            complexity_factor,
            industry_factor,
            total,
        }
    }

    /// Solve for the single multiplier that makes the scenario's midpoint
    /// equal `target`.
    pub fn calibrate(&self, scenario: &Scenario, target: f64) -> Result<Calibration, CalibrationError> {
        if !target.is_finite() || target <= 0.0 {
            return Err(CalibrationError::InvalidTarget(target));
        }
        let estimate = self.estimate_scenario(scenario);
        let midpoint = estimate.total.midpoint();
        if estimate.lines.is_empty() || midpoint <= 0.0 {
            return Err(CalibrationError::EmptyScenario {
                deal_type: scenario.deal_type,
                industry: scenario.industry.clone(),
            });
        }
        let adjustment = target / midpoint;
        let calibrated_total = estimate.total.scaled(adjustment);
        tracing::debug!(target, adjustment, "Calibrated scenario estimate");
        Ok(Calibration {
            estimate,
            target,
            adjustment,
            calibrated_total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(deal_type: DealType, industry: &str, complexity: Complexity) -> Scenario {
        Scenario {
            deal_type,
            industry: industry.to_string(),
            complexity,
            quantities: ScenarioQuantities {
                users: 1_000,
                applications: 20,
                sites: 5,
                servers: 100,
            },
        }
    }

    #[test]
    fn estimate_is_deterministic() {
        let catalog = ActivityCatalog::builtin();
        let s = scenario(DealType::Carveout, "manufacturing", Complexity::Complex);
        assert_eq!(catalog.estimate_scenario(&s), catalog.estimate_scenario(&s));
    }

    #[test]
    fn deal_type_filters_activities() {
        let catalog = ActivityCatalog::builtin();
        let acquisition =
            catalog.estimate_scenario(&scenario(DealType::Acquisition, "retail", Complexity::Moderate));
        let carveout =
            catalog.estimate_scenario(&scenario(DealType::Carveout, "retail", Complexity::Moderate));

        let keys = |e: &ScenarioEstimate| e.lines.iter().map(|l| l.key).collect::<Vec<_>>();
        assert!(keys(&acquisition).contains(&"identity_integration"));
        assert!(!keys(&acquisition).contains(&"tsa_management"));
        assert!(keys(&carveout).contains(&"tsa_management"));
        assert!(!keys(&carveout).contains(&"regulatory_compliance_review"));
    }

    #[test]
    fn industry_filter_and_factor_apply() {
        let catalog = ActivityCatalog::builtin();
        let bank =
            catalog.estimate_scenario(&scenario(DealType::Merger, "financial_services", Complexity::Moderate));
        assert!(bank.lines.iter().any(|l| l.key == "regulatory_compliance_review"));
        assert_eq!(bank.industry_factor, 1.25);

        let unknown =
            catalog.estimate_scenario(&scenario(DealType::Merger, "shipbuilding", Complexity::Moderate));
        assert_eq!(unknown.industry_factor, 1.0);
    }

    #[test]
    fn tiered_lines_skip_complexity_factor() {
        let catalog = ActivityCatalog::builtin();
        let estimate =
            catalog.estimate_scenario(&scenario(DealType::Divestiture, "retail", Complexity::Complex));
        let tiered = estimate
            .lines
            .iter()
            .find(|l| l.key == "day1_network_separation")
            .unwrap();
        assert_eq!(tiered.cost, CostRange::new(600_000.0, 1_500_000.0));

        let per_unit = estimate.lines.iter().find(|l| l.key == "site_integration").unwrap();
        assert!((per_unit.cost.low() - 50_000.0 * 1.3).abs() < 1e-6);
    }

    #[test]
    fn industry_overrides_merge() {
        let catalog = ActivityCatalog::builtin().with_industry_factors([
            ("retail".to_string(), 1.1),
            ("energy".to_string(), 1.4),
            ("broken".to_string(), -2.0),
        ]);
        assert_eq!(catalog.industry_factor("retail"), 1.1);
        assert_eq!(catalog.industry_factor("energy"), 1.4);
        assert_eq!(catalog.industry_factor("broken"), 1.0);
        assert_eq!(catalog.industry_factor("healthcare"), 1.2);
    }

    #[test]
    fn calibration_hits_target_midpoint() {
        let catalog = ActivityCatalog::builtin();
        let s = scenario(DealType::Acquisition, "technology", Complexity::Simple);
        let calibration = catalog.calibrate(&s, 2_500_000.0).unwrap();
        assert!((calibration.calibrated_total.midpoint() - 2_500_000.0).abs() < 1e-3);
        assert!(
            (calibration.adjustment * calibration.estimate.total.midpoint() - 2_500_000.0).abs()
                < 1e-3
        );
    }

    #[test]
    fn calibration_rejects_bad_target() {
        let catalog = ActivityCatalog::builtin();
        let s = scenario(DealType::Acquisition, "technology", Complexity::Simple);
        assert_eq!(
            catalog.calibrate(&s, 0.0).unwrap_err(),
            CalibrationError::InvalidTarget(0.0)
        );
        assert!(catalog.calibrate(&s, f64::NAN).is_err());
    }

    #[test]
    fn vocabulary_parsing() {
        assert_eq!("carveout".parse::<DealType>().unwrap(), DealType::Carveout);
        assert_eq!(
            "highly_complex".parse::<Complexity>().unwrap(),
            Complexity::HighlyComplex
        );
        assert_eq!("spinoff".parse::<DealType>().unwrap_err().code(), "INVALID_ENUM");
    }
}
