use std::cmp::Reverse;

use serde::Serialize;

use super::bridge::BridgeFinancing;
use super::format_amount;

const LOW_SUCCESS_PCT: f64 = 70.0;
const MODERATE_SUCCESS_PCT: f64 = 85.0;
const SURPLUS_SUCCESS_PCT: f64 = 95.0;
const HIGH_WITHDRAWAL_PCT: f64 = 6.0;
const ELEVATED_WITHDRAWAL_PCT: f64 = 4.5;
const SURPLUS_WITHDRAWAL_PCT: f64 = 3.0;
const LOW_SAVINGS_RATE_PCT: f64 = 15.0;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImpactTier {
    Low,
    Medium,
    High,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecommendationCategory {
    Savings,
    Spending,
    Liquidity,
    Timing,
}

/// Declaration order is the tie-break priority among equal impact tiers.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecommendationRule {
    LowSuccess,
    HighWithdrawalRate,
    UnderfundedBridge,
    LowSavingsRate,
    ModerateSuccess,
    CashBucket,
    Surplus,
}

impl RecommendationRule {
    pub const ALL: [RecommendationRule; 7] = [
        RecommendationRule::LowSuccess,
        RecommendationRule::HighWithdrawalRate,
        RecommendationRule::UnderfundedBridge,
        RecommendationRule::LowSavingsRate,
        RecommendationRule::ModerateSuccess,
        RecommendationRule::CashBucket,
        RecommendationRule::Surplus,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub rule: RecommendationRule,
    pub title: String,
    pub category: RecommendationCategory,
    pub body: String,
    pub impact: ImpactTier,
}

/// Plan measures the rules are evaluated against. Rates are percentages.
#[derive(Debug, Clone, Copy)]
pub struct PlanSignals<'a> {
    pub success_rate: f64,
    pub withdrawal_rate: f64,
    pub savings_rate: f64,
    pub accumulation_years: u32,
    pub bridge: Option<&'a BridgeFinancing>,
    pub bridge_coverage: f64,
}

fn evaluate(rule: RecommendationRule, s: &PlanSignals<'_>) -> Option<Recommendation> {
    use RecommendationCategory as C;
    use RecommendationRule as R;

    let (title, category, body, impact) = match rule {
        R::LowSuccess if s.success_rate < LOW_SUCCESS_PCT => (
            "Raise the plan's success rate",
            C::Savings,
            format!(
                "Only {:.1}% of simulated lifetimes fund every year of spending. Saving more, \
                 retiring later or trimming recurring expenses lifts this the most.",
                s.success_rate
            ),
            ImpactTier::High,
        ),
        R::HighWithdrawalRate if s.withdrawal_rate > ELEVATED_WITHDRAWAL_PCT => (
            "Lower the initial withdrawal rate",
            C::Spending,
            format!(
                "The first retirement year draws {:.1}% of the median portfolio. Rates above \
                 {ELEVATED_WITHDRAWAL_PCT}% rarely survive long horizons.",
                s.withdrawal_rate
            ),
            if s.withdrawal_rate > HIGH_WITHDRAWAL_PCT {
                ImpactTier::High
            } else {
                ImpactTier::Medium
            },
        ),
        R::UnderfundedBridge => {
            let bridge = s.bridge?;
            if s.bridge_coverage >= 1.0 {
                return None;
            }
            (
                "Fund the gap before the pension starts",
                C::Liquidity,
                format!(
                    "The {}-year bridge needs {} but the median portfolio entering retirement \
                     covers only {:.0}% of it.",
                    bridge.bridge_years,
                    format_amount(bridge.total_cash_need),
                    s.bridge_coverage * 100.0
                ),
                ImpactTier::High,
            )
        }
        R::LowSavingsRate
            if s.accumulation_years > 0 && s.savings_rate < LOW_SAVINGS_RATE_PCT =>
        {
            (
                "Increase annual savings",
                C::Savings,
                format!(
                    "Savings are {:.1}% of yearly cash flow with {} working years left. \
                     Each extra unit saved now compounds until retirement.",
                    s.savings_rate, s.accumulation_years
                ),
                ImpactTier::Medium,
            )
        }
        R::ModerateSuccess
            if (LOW_SUCCESS_PCT..MODERATE_SUCCESS_PCT).contains(&s.success_rate) =>
        {
            (
                "Add a safety margin",
                C::Timing,
                format!(
                    "A {:.1}% success rate leaves little room for poor markets. Retiring a year \
                     later or keeping flexible spending in reserve adds margin.",
                    s.success_rate
                ),
                ImpactTier::Medium,
            )
        }
        R::CashBucket => {
            let bridge = s.bridge?;
            (
                "Hold a cash bucket for the bridge",
                C::Liquidity,
                format!(
                    "Keep {} years of spending ({:.0}% of the bridge need) in cash and leave \
                     the remaining {:.0}% invested.",
                    bridge.cash_bucket_years, bridge.cash_bucket_share, bridge.portfolio_share
                ),
                ImpactTier::Low,
            )
        }
        R::Surplus
            if s.success_rate >= SURPLUS_SUCCESS_PCT
                && s.withdrawal_rate < SURPLUS_WITHDRAWAL_PCT =>
        {
            (
                "Room to spend more or retire earlier",
                C::Timing,
                format!(
                    "With {:.1}% success and a {:.1}% withdrawal rate the plan carries a large \
                     buffer.",
                    s.success_rate, s.withdrawal_rate
                ),
                ImpactTier::Low,
            )
        }
        _ => return None,
    };

    Some(Recommendation {
        rule,
        title: title.to_string(),
        category,
        body,
        impact,
    })
}

/// Highest impact first; equal impact keeps rule priority order. Each rule
/// is evaluated once, so it fires at most once.
pub fn recommend(signals: &PlanSignals<'_>) -> Vec<Recommendation> {
    let mut out: Vec<Recommendation> = RecommendationRule::ALL
        .iter()
        .filter_map(|rule| evaluate(*rule, signals))
        .collect();
    out.sort_by_key(|r| (Reverse(r.impact), r.rule));
    out
}
