//! Resolves one cost anchor into a [`CostBuildUp`].

use std::sync::Arc;

use diligence_types::{
    BuildUpInputs, Confidence, CostBuildUp, FactId, UnitKind, ValidationError,
};

use crate::anchors::{AnchorCatalog, TierSource};

/// Inputs to one estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimateRequest {
    anchor_key: String,
    quantity: u32,
    tier: Option<String>,
    source_facts: Vec<FactId>,
    assumptions: Vec<String>,
    notes: Option<String>,
    scale_factor: Option<f64>,
    confidence: Confidence,
}

impl EstimateRequest {
    #[must_use]
    pub fn new(anchor_key: impl Into<String>, quantity: u32) -> Self {
        Self {
            anchor_key: anchor_key.into(),
            quantity,
            tier: None,
            source_facts: Vec::new(),
            assumptions: Vec::new(),
            notes: None,
            scale_factor: None,
            confidence: Confidence::Medium,
        }
    }

    pub fn tier(mut self, tier: impl Into<String>) -> Self {
        self.tier = Some(tier.into());
        self
    }

    pub fn source_facts(mut self, facts: impl IntoIterator<Item = FactId>) -> Self {
        self.source_facts.extend(facts);
        self
    }

    pub fn assumption(mut self, assumption: impl Into<String>) -> Self {
        self.assumptions.push(assumption.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Multiplier on the total. Defaults to the estimator's configured factor.
    pub fn scale_factor(mut self, factor: f64) -> Self {
        self.scale_factor = Some(factor);
        self
    }

    pub fn confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }

    #[must_use]
    pub fn anchor_key(&self) -> &str {
        &self.anchor_key
    }
}

/// Outcome of an estimate. An unknown anchor is an expected result, not an
/// error, so callers iterating a catalog can tell "no such cost driver"
/// apart from "zero cost".
#[derive(Debug, Clone, PartialEq)]
pub enum Estimate {
    Matched(CostBuildUp),
    NoMatch { anchor_key: String },
}

impl Estimate {
    #[must_use]
    pub fn buildup(&self) -> Option<&CostBuildUp> {
        match self {
            Estimate::Matched(buildup) => Some(buildup),
            Estimate::NoMatch { .. } => None,
        }
    }

    #[must_use]
    pub fn into_buildup(self) -> Option<CostBuildUp> {
        match self {
            Estimate::Matched(buildup) => Some(buildup),
            Estimate::NoMatch { .. } => None,
        }
    }
}

/// Estimator over a shared, read-only catalog.
#[derive(Debug, Clone)]
pub struct CostEstimator {
    catalog: Arc<AnchorCatalog>,
    default_scale_factor: f64,
}

impl CostEstimator {
    #[must_use]
    pub fn new(catalog: Arc<AnchorCatalog>) -> Self {
        Self {
            catalog,
            default_scale_factor: 1.0,
        }
    }

    /// Scale factor applied when a request names none. Non-positive or
    /// non-finite values are ignored.
    #[must_use]
    pub fn with_default_scale_factor(mut self, factor: f64) -> Self {
        if factor.is_finite() && factor > 0.0 {
            self.default_scale_factor = factor;
        } else {
            tracing::warn!(factor, "Ignoring invalid default scale factor");
        }
        self
    }

    #[must_use]
    pub fn catalog(&self) -> &AnchorCatalog {
        &self.catalog
    }

    /// Price `request` against the catalog.
    ///
    /// Fixed anchors price one engagement regardless of the requested
    /// quantity and label the unit after the resolved tier.
    pub fn estimate(&self, request: &EstimateRequest) -> Result<Estimate, ValidationError> {
        let Some(anchor) = self.catalog.get(request.anchor_key.trim()) else {
            tracing::debug!(anchor = %request.anchor_key, "No cost anchor matched");
            return Ok(Estimate::NoMatch {
                anchor_key: request.anchor_key.clone(),
            });
        };

        let resolved = anchor.resolve_tier(request.tier.as_deref());
        let unit = anchor.unit();
        let method = unit.method();

        let mut assumptions = request.assumptions.clone();
        if resolved.source() == TierSource::DefaultFallback {
            assumptions.push(format!(
                "tier {:?} is not priced for {}; used {:?}",
                request.tier.as_deref().unwrap_or_default(),
                anchor.key(),
                resolved.tier()
            ));
        }
        if method.is_fixed() && request.quantity != 1 {
            assumptions.push(format!(
                "fixed-price anchor; quantity {} priced as one engagement",
                request.quantity
            ));
        }

        let unit_label = match unit.unit_label() {
            Some(label) => label.to_string(),
            None if unit == UnitKind::Fixed => "organization".to_string(),
            None => format!("{} organization", resolved.tier()),
        };
        let size_tier = match unit {
            UnitKind::FixedBySize | UnitKind::FixedByComplexity => {
                Some(resolved.tier().to_string())
            }
            _ => request.tier.clone(),
        };

        let buildup = CostBuildUp::compute(BuildUpInputs {
            anchor_key: anchor.key().to_string(),
            anchor_name: anchor.name().to_string(),
            method,
            quantity: request.quantity,
            unit_label,
            unit_cost: resolved.unit_cost(),
            assumptions,
            source_facts: request.source_facts.clone(),
            confidence: request.confidence,
            size_tier,
            scale_factor: request.scale_factor.unwrap_or(self.default_scale_factor),
            notes: request.notes.clone(),
        })?;

        tracing::debug!(
            anchor = %anchor.key(),
            quantity = buildup.quantity(),
            total_low = buildup.total_low(),
            total_high = buildup.total_high(),
            "Estimated cost build-up"
        );
        Ok(Estimate::Matched(buildup))
    }
}
