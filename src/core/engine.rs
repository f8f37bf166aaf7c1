use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, info};

use super::aggregate::aggregate;
use super::error::Result;
use super::random::{MarketModel, MarketYear, PathGenerator, resolve_base_seed};
use super::types::{
    RawTrialData, SimulationOutcome, SimulationParameters, TrialPath, TrialSample,
};

/// Unmet spending below this is treated as rounding noise, not a shortfall.
const SHORTFALL_EPS: f64 = 1e-6;

#[derive(Debug)]
struct Portfolio {
    assets: f64,
    /// Contributed principal still invested; the rest of `assets` is growth.
    cost_basis: f64,
}

impl Portfolio {
    fn gain_fraction(&self) -> f64 {
        if self.assets <= 0.0 {
            return 0.0;
        }
        ((self.assets - self.cost_basis) / self.assets).clamp(0.0, 1.0)
    }

    fn grow(&mut self, investment_return: f64) {
        self.assets = (self.assets * (1.0 + investment_return)).max(0.0);
    }

    fn contribute(&mut self, amount: f64) {
        self.assets += amount;
        self.cost_basis += amount;
    }

    fn reinvest(&mut self, amount: f64) {
        self.contribute(amount);
    }

    fn deplete(&mut self) {
        self.assets = 0.0;
        self.cost_basis = 0.0;
    }

    /// Sells enough to receive `net_need` after capital-gains tax on the growth
    /// share of the sale. Returns the net amount actually received.
    fn withdraw_net(&mut self, net_need: f64, tax_rate: f64) -> f64 {
        if net_need <= 0.0 || self.assets <= 0.0 {
            return 0.0;
        }

        let effective_tax = self.gain_fraction() * tax_rate;
        let net_per_unit = 1.0 - effective_tax;
        if net_per_unit <= 0.0 {
            return 0.0;
        }

        let gross = (net_need / net_per_unit).min(self.assets);
        let basis_sold = self.cost_basis * (gross / self.assets);
        self.assets -= gross;
        self.cost_basis = (self.cost_basis - basis_sold).clamp(0.0, self.assets);
        gross * net_per_unit
    }
}

pub fn validate_parameters(params: &SimulationParameters) -> Result<MarketModel> {
    params.validate()?;
    MarketModel::from_params(params)
}

/// Runs every trial. Trials are independent and evaluated in parallel; each
/// owns a generator seeded from the base seed and its index, so the result
/// does not depend on scheduling.
pub fn simulate(params: &SimulationParameters) -> Result<RawTrialData> {
    let model = validate_parameters(params)?;
    let base_seed = resolve_base_seed(params.seed);
    info!(trials = params.trials, years = params.year_count(), "simulation started");
    debug!(base_seed, "trial seeds derived from base seed");

    let trials = (0..params.trials)
        .into_par_iter()
        .map(|trial| {
            let mut generator = PathGenerator::for_trial(&model, base_seed, trial);
            let market = generator.path(params.year_count());
            simulate_trial(params, &market)
        })
        .collect::<Vec<_>>();

    Ok(RawTrialData {
        ages: params.ages().collect(),
        trials,
    })
}

pub fn run_simulation(params: &SimulationParameters) -> Result<SimulationOutcome> {
    let raw = simulate(params)?;
    let series = aggregate(&raw);
    info!(
        trials = series.trials,
        first_age = params.current_age,
        end_age = params.end_age,
        success_rate = series.success_rate,
        "simulation finished"
    );
    Ok(SimulationOutcome::from_series(series, params.clone()))
}

/// Expense need at each age is the base scaled by the price index accumulated
/// over the preceding years, so the first simulated year is in today's money.
fn simulate_trial(params: &SimulationParameters, market: &[MarketYear]) -> TrialPath {
    let mut portfolio = Portfolio {
        assets: params.current_assets,
        cost_basis: params.current_assets,
    };
    let base_expenses = params.expenses.annual_total();
    let annual_pension = params.annual_pension();
    let mut price_index = 1.0;
    let mut failed = false;
    let mut samples = Vec::with_capacity(market.len());

    for (age, year) in params.ages().zip(market) {
        let spending = if age < params.retirement_age {
            portfolio.grow(year.investment_return);
            portfolio.contribute(params.annual_savings);
            0.0
        } else {
            let need = base_expenses * price_index;
            let pension = if age >= params.pension_start_age {
                annual_pension
            } else {
                0.0
            };
            let pension_used = pension.min(need);

            if failed {
                pension_used
            } else {
                if pension > need {
                    portfolio.reinvest(pension - need);
                }
                let net_need = need - pension_used;
                let received = portfolio.withdraw_net(net_need, params.capital_gains_tax_rate);
                if received + SHORTFALL_EPS < net_need {
                    failed = true;
                    portfolio.deplete();
                } else {
                    portfolio.grow(year.investment_return);
                }
                pension_used + received
            }
        };

        samples.push(TrialSample {
            age,
            assets: portfolio.assets,
            spending,
        });
        price_index *= 1.0 + year.inflation;
    }

    TrialPath { samples, failed }
}
