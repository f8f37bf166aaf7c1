use serde::Serialize;

use super::bridge::BridgeFinancing;
use super::config::{LabelBand, PlanLabel, ScoreWeights};

/// Withdrawal rates at or below this earn the full spend-rate sub-score.
const SUSTAINABLE_WITHDRAWAL_PCT: f64 = 3.0;
/// Withdrawal rates at or above this earn nothing.
const EXHAUSTING_WITHDRAWAL_PCT: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub success_rate: f64,
    pub spend_rate: f64,
    pub liquidity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanScore {
    pub composite: f64,
    pub rounded: u32,
    pub label: PlanLabel,
    pub breakdown: ScoreBreakdown,
}

pub fn spend_rate_subscore(withdrawal_rate_pct: f64) -> f64 {
    if withdrawal_rate_pct.is_nan() {
        return 0.0;
    }
    let span = EXHAUSTING_WITHDRAWAL_PCT - SUSTAINABLE_WITHDRAWAL_PCT;
    ((EXHAUSTING_WITHDRAWAL_PCT - withdrawal_rate_pct) / span).clamp(0.0, 1.0) * 100.0
}

/// Share of the bridge cash need covered by the median portfolio entering
/// retirement. Full marks when there is no bridge to fund.
pub fn liquidity_subscore(assets_at_retirement: f64, bridge: Option<&BridgeFinancing>) -> f64 {
    match bridge {
        None => 100.0,
        Some(b) if b.total_cash_need <= 0.0 => 100.0,
        Some(b) => (assets_at_retirement / b.total_cash_need).clamp(0.0, 1.0) * 100.0,
    }
}

pub fn composite_score(weights: &ScoreWeights, breakdown: &ScoreBreakdown) -> f64 {
    let raw = weights.success_rate * breakdown.success_rate
        + weights.spend_rate * breakdown.spend_rate
        + weights.liquidity * breakdown.liquidity;
    if raw.is_nan() {
        return 0.0;
    }
    raw.clamp(0.0, 100.0)
}

/// Band containing the rounded score. Bands share boundaries, so scanning
/// from the top hands a boundary value to the higher band.
pub fn label_for(score: f64, bands: &[LabelBand]) -> PlanLabel {
    let rounded = score.clamp(0.0, 100.0).round();
    bands
        .iter()
        .rev()
        .find(|band| band.low <= rounded && rounded <= band.high)
        .or(bands.first())
        .map(|band| band.label)
        .unwrap_or(PlanLabel::Critical)
}

pub fn plan_score(
    weights: &ScoreWeights,
    bands: &[LabelBand],
    breakdown: ScoreBreakdown,
) -> PlanScore {
    let composite = composite_score(weights, &breakdown);
    PlanScore {
        composite,
        rounded: composite.round() as u32,
        label: label_for(composite, bands),
        breakdown,
    }
}
