use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{Result, SimulationError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseItem {
    pub name: String,
    pub amount: f64,
}

impl ExpenseItem {
    pub fn new(name: impl Into<String>, amount: f64) -> Self {
        Self {
            name: name.into(),
            amount,
        }
    }
}

/// `name=amount`, the form the command line accepts.
impl fmt::Display for ExpenseItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.amount)
    }
}

/// Recurring monthly categories plus one-off yearly categories, in today's money.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseBreakdown {
    pub monthly: Vec<ExpenseItem>,
    pub annual: Vec<ExpenseItem>,
}

impl ExpenseBreakdown {
    pub fn annual_total(&self) -> f64 {
        let monthly: f64 = self.monthly.iter().map(|item| item.amount).sum();
        let annual: f64 = self.annual.iter().map(|item| item.amount).sum();
        monthly * 12.0 + annual
    }
}

/// Rates are fractions (0.07 = 7 %). Monetary values are nominal, today's money.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationParameters {
    pub current_age: u32,
    pub retirement_age: u32,
    pub pension_start_age: u32,
    pub end_age: u32,
    pub current_assets: f64,
    pub annual_savings: f64,
    pub monthly_pension: f64,
    pub return_mean: f64,
    pub return_vol: f64,
    pub inflation_mean: f64,
    pub inflation_vol: f64,
    pub capital_gains_tax_rate: f64,
    pub expenses: ExpenseBreakdown,
    pub trials: u32,
    pub seed: Option<u64>,
}

impl SimulationParameters {
    pub fn validate(&self) -> Result<()> {
        if self.end_age < self.current_age {
            return Err(SimulationError::invalid(
                "endAge",
                format!(
                    "horizon {} is before current age {}",
                    self.end_age, self.current_age
                ),
            ));
        }
        if self.retirement_age < self.current_age {
            return Err(SimulationError::invalid(
                "retirementAge",
                "must be >= currentAge",
            ));
        }
        if self.retirement_age > self.end_age {
            return Err(SimulationError::invalid(
                "retirementAge",
                format!("must be <= endAge {}", self.end_age),
            ));
        }
        if self.trials == 0 {
            return Err(SimulationError::invalid("trials", "must be > 0"));
        }

        for (field, value) in [
            ("currentAssets", self.current_assets),
            ("annualSavings", self.annual_savings),
            ("monthlyPension", self.monthly_pension),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SimulationError::invalid(field, "must be finite and >= 0"));
            }
        }
        for item in self.expenses.monthly.iter().chain(&self.expenses.annual) {
            if !item.amount.is_finite() || item.amount < 0.0 {
                return Err(SimulationError::invalid(
                    "expenses",
                    format!("category `{}` must be finite and >= 0", item.name),
                ));
            }
        }

        if !self.return_mean.is_finite() || self.return_mean <= -1.0 {
            return Err(SimulationError::invalid("returnMean", "must be > -100%"));
        }
        if !self.inflation_mean.is_finite() || self.inflation_mean <= -1.0 {
            return Err(SimulationError::invalid("inflationMean", "must be > -100%"));
        }
        for (field, vol) in [
            ("returnVol", self.return_vol),
            ("inflationVol", self.inflation_vol),
        ] {
            if !vol.is_finite() || vol < 0.0 {
                return Err(SimulationError::invalid(field, "must be finite and >= 0"));
            }
        }
        if !(0.0..=1.0).contains(&self.capital_gains_tax_rate) {
            return Err(SimulationError::invalid(
                "capitalGainsTaxRate",
                "must be a fraction between 0 and 1",
            ));
        }
        Ok(())
    }

    pub fn ages(&self) -> std::ops::RangeInclusive<u32> {
        self.current_age..=self.end_age
    }

    pub fn year_count(&self) -> usize {
        (self.end_age - self.current_age) as usize + 1
    }

    pub fn annual_pension(&self) -> f64 {
        self.monthly_pension * 12.0
    }
}

/// One (age, assets, spending) sample per simulated year of a single trial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialSample {
    pub age: u32,
    pub assets: f64,
    pub spending: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrialPath {
    pub samples: Vec<TrialSample>,
    pub failed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawTrialData {
    pub ages: Vec<u32>,
    pub trials: Vec<TrialPath>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PercentileBands {
    pub p10: Vec<f64>,
    pub p50: Vec<f64>,
    pub p90: Vec<f64>,
}

impl PercentileBands {
    pub fn with_capacity(len: usize) -> Self {
        Self {
            p10: Vec::with_capacity(len),
            p50: Vec::with_capacity(len),
            p90: Vec::with_capacity(len),
        }
    }
}

/// Success rate is a percentage in [0, 100].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentileSeries {
    pub ages: Vec<u32>,
    pub asset_percentiles: PercentileBands,
    pub spending_percentiles: PercentileBands,
    pub success_rate: f64,
    pub successful_trials: u32,
    pub trials: u32,
    pub success_ci_half_width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationOutcome {
    pub ages: Vec<u32>,
    pub asset_percentiles: PercentileBands,
    pub spending_percentiles: PercentileBands,
    pub success_rate: f64,
    pub success_ci_half_width: f64,
    pub params: SimulationParameters,
}

impl SimulationOutcome {
    pub fn from_series(series: PercentileSeries, params: SimulationParameters) -> Self {
        Self {
            ages: series.ages,
            asset_percentiles: series.asset_percentiles,
            spending_percentiles: series.spending_percentiles,
            success_rate: series.success_rate,
            success_ci_half_width: series.success_ci_half_width,
            params,
        }
    }

    pub fn age_index(&self, age: u32) -> Option<usize> {
        let first = *self.ages.first()?;
        let idx = age.checked_sub(first)? as usize;
        (idx < self.ages.len()).then_some(idx)
    }
}
