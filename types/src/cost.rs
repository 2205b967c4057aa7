//! Cost value types shared by the estimator, the aggregator and work items.

use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

use crate::{Confidence, EstimationMethod, FactId, ValidationError};

/// An independent low/high pair. Low and high are summed separately; no
/// correlation between items is modelled.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CostRange {
    low: f64,
    high: f64,
}

impl CostRange {
    pub const ZERO: CostRange = CostRange::new(0.0, 0.0);

    #[must_use]
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Validated constructor for ranges that arrive from outside the crate.
    pub fn checked(low: f64, high: f64) -> Result<Self, ValidationError> {
        if !low.is_finite() || !high.is_finite() || low < 0.0 {
            return Err(ValidationError::missing(
                "cost_range",
                format!("costs must be finite and non-negative (got {low}..{high})"),
            ));
        }
        if low > high {
            return Err(ValidationError::missing_with_hint(
                "cost_range",
                format!("low ({low}) exceeds high ({high})"),
                "swap the bounds",
            ));
        }
        Ok(Self { low, high })
    }

    #[must_use]
    pub const fn low(self) -> f64 {
        self.low
    }

    #[must_use]
    pub const fn high(self) -> f64 {
        self.high
    }

    #[must_use]
    pub fn midpoint(self) -> f64 {
        (self.low + self.high) / 2.0
    }

    #[must_use]
    pub fn scaled(self, factor: f64) -> Self {
        Self {
            low: self.low * factor,
            high: self.high * factor,
        }
    }
}

impl Add for CostRange {
    type Output = CostRange;

    fn add(self, rhs: CostRange) -> CostRange {
        CostRange {
            low: self.low + rhs.low,
            high: self.high + rhs.high,
        }
    }
}

impl AddAssign for CostRange {
    fn add_assign(&mut self, rhs: CostRange) {
        self.low += rhs.low;
        self.high += rhs.high;
    }
}

/// Everything needed to compute a [`CostBuildUp`].
#[derive(Debug, Clone, PartialEq)]
pub struct BuildUpInputs {
    pub anchor_key: String,
    pub anchor_name: String,
    pub method: EstimationMethod,
    pub quantity: u32,
    pub unit_label: String,
    pub unit_cost: CostRange,
    pub assumptions: Vec<String>,
    pub source_facts: Vec<FactId>,
    pub confidence: Confidence,
    pub size_tier: Option<String>,
    pub scale_factor: f64,
    pub notes: Option<String>,
}

/// A transparent, computed cost estimate attached to one work item.
///
/// `total = quantity × unit_cost × scale_factor`, with quantity pinned to 1
/// for fixed methods. The only way to obtain one is [`CostBuildUp::compute`]
/// (deserialization goes through it too), so a held value always satisfies
/// the arithmetic. Changing an input means computing a new build-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CostBuildUpRecord")]
pub struct CostBuildUp {
    anchor_key: String,
    anchor_name: String,
    method: EstimationMethod,
    quantity: u32,
    unit_label: String,
    unit_cost_low: f64,
    unit_cost_high: f64,
    total_low: f64,
    total_high: f64,
    assumptions: Vec<String>,
    source_facts: Vec<FactId>,
    confidence: Confidence,
    size_tier: Option<String>,
    scale_factor: f64,
    notes: Option<String>,
}

impl CostBuildUp {
    pub fn compute(inputs: BuildUpInputs) -> Result<Self, ValidationError> {
        if inputs.anchor_key.trim().is_empty() {
            return Err(ValidationError::missing(
                "anchor_key",
                "cost build-up needs an anchor key",
            ));
        }
        if !inputs.scale_factor.is_finite() || inputs.scale_factor <= 0.0 {
            return Err(ValidationError::missing_with_hint(
                "scale_factor",
                format!("scale factor must be positive (got {})", inputs.scale_factor),
                "use 1.0 for an unscaled estimate",
            ));
        }
        let unit_cost = CostRange::checked(inputs.unit_cost.low(), inputs.unit_cost.high())?;

        let quantity = if inputs.method.is_fixed() {
            1
        } else {
            inputs.quantity
        };
        let total = unit_cost.scaled(f64::from(quantity)).scaled(inputs.scale_factor);

        Ok(Self {
            anchor_key: inputs.anchor_key,
            anchor_name: inputs.anchor_name,
            method: inputs.method,
            quantity,
            unit_label: inputs.unit_label,
            unit_cost_low: unit_cost.low(),
            unit_cost_high: unit_cost.high(),
            total_low: total.low(),
            total_high: total.high(),
            assumptions: inputs.assumptions,
            source_facts: inputs.source_facts,
            confidence: inputs.confidence,
            size_tier: inputs.size_tier,
            scale_factor: inputs.scale_factor,
            notes: inputs.notes,
        })
    }

    #[must_use]
    pub fn anchor_key(&self) -> &str {
        &self.anchor_key
    }

    #[must_use]
    pub fn anchor_name(&self) -> &str {
        &self.anchor_name
    }

    #[must_use]
    pub const fn method(&self) -> EstimationMethod {
        self.method
    }

    #[must_use]
    pub const fn quantity(&self) -> u32 {
        self.quantity
    }

    #[must_use]
    pub fn unit_label(&self) -> &str {
        &self.unit_label
    }

    #[must_use]
    pub const fn unit_cost(&self) -> CostRange {
        CostRange::new(self.unit_cost_low, self.unit_cost_high)
    }

    #[must_use]
    pub const fn total(&self) -> CostRange {
        CostRange::new(self.total_low, self.total_high)
    }

    #[must_use]
    pub const fn total_low(&self) -> f64 {
        self.total_low
    }

    #[must_use]
    pub const fn total_high(&self) -> f64 {
        self.total_high
    }

    #[must_use]
    pub fn assumptions(&self) -> &[String] {
        &self.assumptions
    }

    #[must_use]
    pub fn source_facts(&self) -> &[FactId] {
        &self.source_facts
    }

    #[must_use]
    pub const fn confidence(&self) -> Confidence {
        self.confidence
    }

    #[must_use]
    pub fn size_tier(&self) -> Option<&str> {
        self.size_tier.as_deref()
    }

    #[must_use]
    pub const fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    #[must_use]
    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }
}

fn default_scale_factor() -> f64 {
    1.0
}

/// Wire form. Optional fields default; stored totals, when present, must
/// agree with the recomputed ones.
#[derive(Deserialize)]
struct CostBuildUpRecord {
    anchor_key: String,
    #[serde(default)]
    anchor_name: String,
    method: EstimationMethod,
    #[serde(default)]
    quantity: u32,
    #[serde(default)]
    unit_label: String,
    unit_cost_low: f64,
    unit_cost_high: f64,
    #[serde(default)]
    total_low: Option<f64>,
    #[serde(default)]
    total_high: Option<f64>,
    #[serde(default)]
    assumptions: Vec<String>,
    #[serde(default)]
    source_facts: Vec<FactId>,
    #[serde(default)]
    confidence: Option<Confidence>,
    #[serde(default)]
    size_tier: Option<String>,
    #[serde(default = "default_scale_factor")]
    scale_factor: f64,
    #[serde(default)]
    notes: Option<String>,
}

fn agrees(stored: Option<f64>, computed: f64) -> bool {
    stored.is_none_or(|value| (value - computed).abs() <= 1e-6 * computed.abs().max(1.0))
}

impl TryFrom<CostBuildUpRecord> for CostBuildUp {
    type Error = ValidationError;

    fn try_from(record: CostBuildUpRecord) -> Result<Self, Self::Error> {
        let built = CostBuildUp::compute(BuildUpInputs {
            anchor_key: record.anchor_key,
            anchor_name: record.anchor_name,
            method: record.method,
            quantity: record.quantity,
            unit_label: record.unit_label,
            unit_cost: CostRange::new(record.unit_cost_low, record.unit_cost_high),
            assumptions: record.assumptions,
            source_facts: record.source_facts,
            confidence: record.confidence.unwrap_or(Confidence::Medium),
            size_tier: record.size_tier,
            scale_factor: record.scale_factor,
            notes: record.notes,
        })?;

        if !agrees(record.total_low, built.total_low) || !agrees(record.total_high, built.total_high)
        {
            return Err(ValidationError::missing_with_hint(
                "total",
                format!(
                    "stored totals disagree with quantity x unit cost x scale for {}",
                    built.anchor_key
                ),
                "drop the totals and let them be recomputed",
            ));
        }
        Ok(built)
    }
}
