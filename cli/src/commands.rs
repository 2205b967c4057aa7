//! Subcommands. Each writes plain text to the given writer.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use diligence_cost::{
    ActivityCatalog, AnchorCatalog, CostEstimator, Estimate, EstimateRequest, Scenario,
    ScenarioEstimate,
};
use diligence_store::{AnalysisSession, SessionOptions, StaleFilter};
use diligence_types::CostRange;

fn money(value: f64) -> String {
    let whole = value.round() as i64;
    let digits = whole.unsigned_abs().to_string();
    let mut out = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if whole < 0 { format!("-${out}") } else { format!("${out}") }
}

fn range(range: CostRange) -> String {
    format!("{} - {}", money(range.low()), money(range.high()))
}

pub fn anchors(out: &mut impl Write, catalog: &AnchorCatalog) -> Result<()> {
    for anchor in catalog.iter() {
        writeln!(out, "{:<28} {:<20} {}", anchor.key(), anchor.unit().as_str(), anchor.name())?;
        for (tier, cost) in anchor.tiers() {
            writeln!(out, "    {tier:<12} {}", range(*cost))?;
        }
    }
    Ok(())
}

pub fn estimate(
    out: &mut impl Write,
    estimator: &CostEstimator,
    anchor: &str,
    quantity: u32,
    tier: Option<&str>,
) -> Result<()> {
    let mut request = EstimateRequest::new(anchor, quantity);
    if let Some(tier) = tier {
        request = request.tier(tier);
    }

    match estimator.estimate(&request)? {
        Estimate::NoMatch { anchor_key } => {
            writeln!(out, "no cost anchor named {anchor_key:?}")?;
        }
        Estimate::Matched(buildup) => {
            writeln!(out, "{} ({})", buildup.anchor_name(), buildup.anchor_key())?;
            writeln!(
                out,
                "  {} {} x {} x {:.2}",
                buildup.quantity(),
                buildup.unit_label(),
                range(buildup.unit_cost()),
                buildup.scale_factor()
            )?;
            writeln!(out, "  total {}", range(buildup.total()))?;
            for assumption in buildup.assumptions() {
                writeln!(out, "  assumes: {assumption}")?;
            }
        }
    }
    Ok(())
}

pub fn summary(out: &mut impl Write, path: &Path, options: &SessionOptions) -> Result<()> {
    let session = AnalysisSession::load(path, options)
        .with_context(|| format!("failed to load snapshot {}", path.display()))?;
    let summary = session.summary();

    writeln!(out, "facts: {}  gaps: {}", summary.facts, summary.gaps)?;
    for (domain, count) in &summary.facts_by_domain {
        writeln!(out, "  {:<20} {count}", domain.as_str())?;
    }
    writeln!(out, "findings: {}", summary.findings())?;
    for (kind, count) in &summary.findings_by_kind {
        writeln!(out, "  {:<24} {count}", kind.as_str())?;
    }
    for (severity, count) in &summary.risks_by_severity {
        writeln!(out, "  risk/{:<19} {count}", severity.as_str())?;
    }
    writeln!(out, "cost: {}", range(summary.cost.total))?;
    for (phase, cost) in &summary.cost.by_phase {
        writeln!(out, "  {:<20} {}", phase.as_str(), range(*cost))?;
    }
    if !summary.cost.top_drivers.is_empty() {
        writeln!(out, "top drivers:")?;
        for driver in &summary.cost.top_drivers {
            writeln!(
                out,
                "  {} {} [{}] {}",
                driver.id,
                driver.title,
                driver.source.as_str(),
                range(driver.cost)
            )?;
        }
    }
    writeln!(
        out,
        "stale: {} pending, {} reviewed  triage: {}",
        summary.stale_pending, summary.stale_reviewed, summary.triage_pending
    )?;
    Ok(())
}

pub fn stale(out: &mut impl Write, path: &Path, options: &SessionOptions) -> Result<()> {
    let session = AnalysisSession::load(path, options)
        .with_context(|| format!("failed to load snapshot {}", path.display()))?;
    let pending = session.stale_items(StaleFilter::Pending);
    if pending.is_empty() {
        writeln!(out, "no stale items")?;
    }
    for flag in pending {
        let facts: Vec<String> = flag.changed_facts.iter().map(ToString::to_string).collect();
        writeln!(out, "{}: {} [{}]", flag.item, flag.reason, facts.join(", "))?;
    }
    Ok(())
}

fn print_scenario(out: &mut impl Write, estimate: &ScenarioEstimate) -> Result<()> {
    for line in &estimate.lines {
        writeln!(out, "  {:<36} {}", line.name, range(line.cost))?;
    }
    writeln!(
        out,
        "complexity x{:.2}  industry x{:.2}",
        estimate.complexity_factor, estimate.industry_factor
    )?;
    writeln!(out, "total {}", range(estimate.total))?;
    Ok(())
}

/// Price `scenario`, and calibrate it when an external `target` is given.
pub fn scenario(
    out: &mut impl Write,
    catalog: &ActivityCatalog,
    scenario: &Scenario,
    target: Option<f64>,
) -> Result<()> {
    match target {
        None => print_scenario(out, &catalog.estimate_scenario(scenario)),
        Some(target) => {
            let calibration = catalog.calibrate(scenario, target)?;
            print_scenario(out, &calibration.estimate)?;
            writeln!(
                out,
                "calibrated to {}: x{:.3} -> {}",
                money(calibration.target),
                calibration.adjustment,
                range(calibration.calibrated_total)
            )?;
            Ok(())
        }
    }
}

/// Estimator over `catalog` with the configured default scale factor.
#[must_use]
pub fn estimator(catalog: Arc<AnchorCatalog>, options: &SessionOptions) -> CostEstimator {
    CostEstimator::new(catalog).with_default_scale_factor(options.default_scale_factor)
}
