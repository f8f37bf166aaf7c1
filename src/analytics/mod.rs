//! Report metrics derived from a finished simulation: success count, planning
//! score and label, bridge financing, highlights and ranked recommendations.
//! Everything is recomputed from scratch on each call.

mod bridge;
mod config;
mod recommendations;
mod score;

use serde::Serialize;

use crate::core::{SimulationOutcome, SimulationParameters};

pub use bridge::{BridgeFinancing, annual_need_at_retirement, bridge_financing};
pub use config::{AnalyticsConfig, ConfigError, LabelBand, PlanLabel, ScoreWeights};
pub use recommendations::{
    ImpactTier, PlanSignals, Recommendation, RecommendationCategory, RecommendationRule,
    recommend,
};
pub use score::{
    PlanScore, ScoreBreakdown, composite_score, label_for, liquidity_subscore, plan_score,
    spend_rate_subscore,
};

/// Reported when the portfolio entering retirement is empty but spending is not.
const MAX_WITHDRAWAL_RATE_PCT: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedMetrics {
    pub success_count: u32,
    pub trials: u32,
    pub success_rate: f64,
    pub score: PlanScore,
    pub label: PlanLabel,
    pub withdrawal_rate: f64,
    pub savings_rate: f64,
    pub assets_at_retirement: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridge: Option<BridgeFinancing>,
    pub highlights: Vec<String>,
    pub recommendations: Vec<Recommendation>,
}

pub fn derive_report_metrics(
    params: &SimulationParameters,
    outcome: &SimulationOutcome,
    config: &AnalyticsConfig,
) -> DerivedMetrics {
    let success_count = success_count(outcome.success_rate, params.trials);
    let assets_at_retirement = median_assets_at_retirement(params, outcome);
    let withdrawal_rate = initial_withdrawal_rate(params, assets_at_retirement);
    let savings_rate = savings_rate(params);
    let bridge = bridge_financing(params, config.cash_bucket_years);
    let bridge_coverage = bridge
        .as_ref()
        .map(|b| {
            if b.total_cash_need <= 0.0 {
                1.0
            } else {
                assets_at_retirement / b.total_cash_need
            }
        })
        .unwrap_or(1.0);

    let breakdown = ScoreBreakdown {
        success_rate: outcome.success_rate,
        spend_rate: spend_rate_subscore(withdrawal_rate),
        liquidity: liquidity_subscore(assets_at_retirement, bridge.as_ref()),
    };
    let score = plan_score(&config.score_weights, &config.label_bands, breakdown);

    let signals = PlanSignals {
        success_rate: outcome.success_rate,
        withdrawal_rate,
        savings_rate,
        accumulation_years: params.retirement_age.saturating_sub(params.current_age),
        bridge: bridge.as_ref(),
        bridge_coverage,
    };
    let recommendations = recommend(&signals);
    let highlights = highlights(params, outcome, withdrawal_rate, bridge.as_ref());

    DerivedMetrics {
        success_count,
        trials: params.trials,
        success_rate: outcome.success_rate,
        label: score.label,
        score,
        withdrawal_rate,
        savings_rate,
        assets_at_retirement,
        bridge,
        highlights,
        recommendations,
    }
}

/// `success_rate` is a percentage; converted to a fraction before rounding.
pub fn success_count(success_rate: f64, trials: u32) -> u32 {
    let fraction = (success_rate / 100.0).clamp(0.0, 1.0);
    (fraction * trials as f64).round() as u32
}

/// Median portfolio at the end of the last working year, or today's assets
/// when retirement starts immediately.
fn median_assets_at_retirement(params: &SimulationParameters, outcome: &SimulationOutcome) -> f64 {
    if params.retirement_age <= params.current_age {
        return params.current_assets;
    }
    outcome
        .age_index(params.retirement_age - 1)
        .and_then(|idx| outcome.asset_percentiles.p50.get(idx).copied())
        .or_else(|| outcome.asset_percentiles.p50.last().copied())
        .unwrap_or(params.current_assets)
}

/// First retirement year's net need as a percentage of the median portfolio.
fn initial_withdrawal_rate(params: &SimulationParameters, assets_at_retirement: f64) -> f64 {
    let pension = if params.pension_start_age <= params.retirement_age {
        params.annual_pension()
    } else {
        0.0
    };
    let net_need = (annual_need_at_retirement(params) - pension).max(0.0);
    if net_need <= 0.0 {
        return 0.0;
    }
    if assets_at_retirement <= 0.0 {
        return MAX_WITHDRAWAL_RATE_PCT;
    }
    (net_need / assets_at_retirement * 100.0).min(MAX_WITHDRAWAL_RATE_PCT)
}

/// Annual savings as a share of savings plus today's expense base.
fn savings_rate(params: &SimulationParameters) -> f64 {
    let outflow = params.annual_savings + params.expenses.annual_total();
    if outflow <= 0.0 {
        return 0.0;
    }
    params.annual_savings / outflow * 100.0
}

fn highlights(
    params: &SimulationParameters,
    outcome: &SimulationOutcome,
    withdrawal_rate: f64,
    bridge: Option<&BridgeFinancing>,
) -> Vec<String> {
    let mut out = vec![format!(
        "{:.1}% of {} simulated lifetimes stay funded to age {}",
        outcome.success_rate, params.trials, params.end_age
    )];
    if let Some(terminal) = outcome.asset_percentiles.p50.last() {
        out.push(format!(
            "Median assets at age {}: {}",
            params.end_age,
            format_amount(*terminal)
        ));
    }
    out.push(format!("Initial withdrawal rate: {withdrawal_rate:.1}%"));
    if let Some(b) = bridge {
        out.push(format!(
            "{}-year bridge to the pension needs {} in cash",
            b.bridge_years,
            format_amount(b.total_cash_need)
        ));
    }
    out
}

/// Whole units with thousands separators, e.g. `210,000`.
pub(crate) fn format_amount(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0.0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ExpenseBreakdown, ExpenseItem, PercentileBands, run_simulation};
    use proptest::prelude::{prop_assert_eq, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn default_profile() -> SimulationParameters {
        SimulationParameters {
            current_age: 54,
            retirement_age: 60,
            pension_start_age: 67,
            end_age: 90,
            current_assets: 600_000.0,
            annual_savings: 18_000.0,
            monthly_pension: 5_000.0,
            return_mean: 0.07,
            return_vol: 0.02,
            inflation_mean: 0.03,
            inflation_vol: 0.005,
            capital_gains_tax_rate: 0.2625,
            expenses: ExpenseBreakdown {
                monthly: vec![
                    ExpenseItem::new("housing", 1_200.0),
                    ExpenseItem::new("living", 1_300.0),
                ],
                annual: vec![ExpenseItem::new("travel", 4_000.0)],
            },
            trials: 300,
            seed: Some(11),
        }
    }

    fn flat_outcome(params: &SimulationParameters, assets: f64, success_rate: f64) -> SimulationOutcome {
        let n = params.year_count();
        let bands = PercentileBands {
            p10: vec![assets; n],
            p50: vec![assets; n],
            p90: vec![assets; n],
        };
        SimulationOutcome {
            ages: params.ages().collect(),
            asset_percentiles: bands.clone(),
            spending_percentiles: bands,
            success_rate,
            success_ci_half_width: 0.0,
            params: params.clone(),
        }
    }

    #[test]
    fn success_count_matches_engine_rate() {
        let params = default_profile();
        let outcome = run_simulation(&params).expect("valid params");
        let metrics = derive_report_metrics(&params, &outcome, &AnalyticsConfig::default());
        assert_eq!(
            metrics.success_count,
            (outcome.success_rate / 100.0 * params.trials as f64).round() as u32
        );
    }

    #[test]
    fn withdrawal_and_savings_rates() {
        let mut params = default_profile();
        params.inflation_mean = 0.0;
        let outcome = flat_outcome(&params, 500_000.0, 90.0);
        let metrics = derive_report_metrics(&params, &outcome, &AnalyticsConfig::default());

        // 34k need, pension not yet paid at 60.
        assert_approx(metrics.withdrawal_rate, 34_000.0 / 500_000.0 * 100.0);
        assert_approx(metrics.savings_rate, 18_000.0 / 52_000.0 * 100.0);
        assert_approx(metrics.assets_at_retirement, 500_000.0);
    }

    #[test]
    fn pension_at_retirement_offsets_withdrawal_and_removes_bridge() {
        let mut params = default_profile();
        params.inflation_mean = 0.0;
        params.pension_start_age = 60;
        let outcome = flat_outcome(&params, 500_000.0, 90.0);
        let metrics = derive_report_metrics(&params, &outcome, &AnalyticsConfig::default());

        assert!(metrics.bridge.is_none());
        assert_approx(metrics.withdrawal_rate, 0.0);
        assert_approx(metrics.score.breakdown.liquidity, 100.0);
        let json = serde_json::to_string(&metrics).expect("serializes");
        assert!(!json.contains("\"bridge\""));
    }

    #[test]
    fn empty_portfolio_reports_capped_withdrawal_rate() {
        let params = default_profile();
        let outcome = flat_outcome(&params, 0.0, 0.0);
        let metrics = derive_report_metrics(&params, &outcome, &AnalyticsConfig::default());
        assert_approx(metrics.withdrawal_rate, MAX_WITHDRAWAL_RATE_PCT);
        assert_eq!(metrics.label, PlanLabel::Critical);
        assert_eq!(metrics.success_count, 0);
        assert_eq!(
            metrics.recommendations.first().map(|r| r.rule),
            Some(RecommendationRule::LowSuccess)
        );
    }

    #[test]
    fn highlights_follow_fixed_order() {
        let mut params = default_profile();
        params.inflation_mean = 0.0;
        params.expenses = ExpenseBreakdown {
            monthly: vec![ExpenseItem::new("living", 2_500.0)],
            annual: vec![],
        };
        let outcome = flat_outcome(&params, 1_000_000.0, 97.5);
        let metrics = derive_report_metrics(&params, &outcome, &AnalyticsConfig::default());
        assert_eq!(metrics.highlights.len(), 4);
        assert!(metrics.highlights[0].starts_with("97.5% of 300"));
        assert_eq!(metrics.highlights[1], "Median assets at age 90: 1,000,000");
        assert_eq!(metrics.highlights[2], "Initial withdrawal rate: 3.0%");
        assert_eq!(
            metrics.highlights[3],
            "7-year bridge to the pension needs 210,000 in cash"
        );
    }

    #[test]
    fn derivation_is_repeatable() {
        let params = default_profile();
        let outcome = run_simulation(&params).expect("valid params");
        let config = AnalyticsConfig::default();
        assert_eq!(
            derive_report_metrics(&params, &outcome, &config),
            derive_report_metrics(&params, &outcome, &config)
        );
    }

    #[test]
    fn format_amount_groups_thousands() {
        assert_eq!(format_amount(0.0), "0");
        assert_eq!(format_amount(999.4), "999");
        assert_eq!(format_amount(1_000.0), "1,000");
        assert_eq!(format_amount(210_000.0), "210,000");
        assert_eq!(format_amount(-1_234_567.0), "-1,234,567");
    }

    proptest! {
        #[test]
        fn success_count_invariant(trials in 1u32..100_000, successes_seed in 0u32..100_000) {
            let successes = successes_seed % (trials + 1);
            let rate = successes as f64 / trials as f64 * 100.0;
            prop_assert_eq!(success_count(rate, trials), successes);
        }
    }
}
