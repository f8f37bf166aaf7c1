use serde::Serialize;

use crate::core::SimulationParameters;

/// Cash needed between retirement and the start of the statutory pension.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeFinancing {
    pub bridge_years: u32,
    pub annual_need: f64,
    pub total_cash_need: f64,
    pub cash_bucket_years: u32,
    pub cash_bucket_share: f64,
    pub portfolio_share: f64,
}

/// Living expenses in the first retirement year: today's expense base grown
/// at the mean inflation rate for every year before retirement. Matches the
/// engine's price index when inflation is deterministic.
pub fn annual_need_at_retirement(params: &SimulationParameters) -> f64 {
    let years = params.retirement_age.saturating_sub(params.current_age);
    params.expenses.annual_total() * (1.0 + params.inflation_mean).powi(years as i32)
}

/// `None` when the pension starts at or before retirement.
pub fn bridge_financing(
    params: &SimulationParameters,
    cash_bucket_years: u32,
) -> Option<BridgeFinancing> {
    if params.pension_start_age <= params.retirement_age {
        return None;
    }

    let bridge_years = params.pension_start_age - params.retirement_age;
    let annual_need = annual_need_at_retirement(params);
    let bucket_years = bridge_years.min(cash_bucket_years);
    let cash_bucket_share = bucket_years as f64 / bridge_years as f64 * 100.0;

    Some(BridgeFinancing {
        bridge_years,
        annual_need,
        total_cash_need: bridge_years as f64 * annual_need,
        cash_bucket_years: bucket_years,
        cash_bucket_share,
        portfolio_share: 100.0 - cash_bucket_share,
    })
}
