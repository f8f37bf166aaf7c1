use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, LogNormal, Normal};

use super::error::{Result, SimulationError};
use super::types::SimulationParameters;

/// Inflation draws are floored here so the cumulative price index stays positive.
const MIN_INFLATION: f64 = -0.99;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketYear {
    pub investment_return: f64,
    pub inflation: f64,
}

#[derive(Debug, Clone, Copy)]
enum ReturnModel {
    Fixed(f64),
    /// Distribution of the gross factor `1 + r`.
    LogNormal(LogNormal<f64>),
}

#[derive(Debug, Clone, Copy)]
enum InflationModel {
    Fixed(f64),
    Normal(Normal<f64>),
}

/// Yearly return and inflation distributions. Shared read-only by every trial.
#[derive(Debug, Clone, Copy)]
pub struct MarketModel {
    returns: ReturnModel,
    inflation: InflationModel,
}

impl MarketModel {
    /// `return_mean`/`return_vol` are the arithmetic mean and standard deviation
    /// of the simple annual return. The log-normal is fitted so that `1 + r`
    /// has exactly that mean and deviation, which keeps every draw above -100%.
    pub fn new(
        return_mean: f64,
        return_vol: f64,
        inflation_mean: f64,
        inflation_vol: f64,
    ) -> Result<Self> {
        let returns = if return_vol == 0.0 {
            ReturnModel::Fixed(return_mean)
        } else {
            let gross_mean = 1.0 + return_mean;
            let sigma_sq = (1.0 + (return_vol * return_vol) / (gross_mean * gross_mean)).ln();
            let mu = gross_mean.ln() - sigma_sq / 2.0;
            let dist = LogNormal::new(mu, sigma_sq.sqrt()).map_err(|e| {
                SimulationError::invalid("returnVol", format!("log-normal fit failed: {e}"))
            })?;
            ReturnModel::LogNormal(dist)
        };

        let inflation = if inflation_vol == 0.0 {
            InflationModel::Fixed(inflation_mean)
        } else {
            let dist = Normal::new(inflation_mean, inflation_vol).map_err(|e| {
                SimulationError::invalid("inflationVol", format!("normal fit failed: {e}"))
            })?;
            InflationModel::Normal(dist)
        };

        Ok(Self { returns, inflation })
    }

    pub fn from_params(params: &SimulationParameters) -> Result<Self> {
        Self::new(
            params.return_mean,
            params.return_vol,
            params.inflation_mean,
            params.inflation_vol,
        )
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> MarketYear {
        let investment_return = match self.returns {
            ReturnModel::Fixed(r) => r,
            ReturnModel::LogNormal(dist) => dist.sample(rng) - 1.0,
        };
        let inflation = match self.inflation {
            InflationModel::Fixed(i) => i,
            InflationModel::Normal(dist) => dist.sample(rng),
        };

        MarketYear {
            investment_return,
            inflation: inflation.max(MIN_INFLATION),
        }
    }
}

/// Per-trial stream of yearly draws. Each trial gets its own generator, so
/// trials can run on different threads without sharing RNG state.
pub struct PathGenerator<'a> {
    model: &'a MarketModel,
    rng: StdRng,
}

impl<'a> PathGenerator<'a> {
    pub fn for_trial(model: &'a MarketModel, base_seed: u64, trial: u32) -> Self {
        Self {
            model,
            rng: StdRng::seed_from_u64(derive_seed(base_seed, trial)),
        }
    }

    pub fn next_year(&mut self) -> MarketYear {
        self.model.sample(&mut self.rng)
    }

    pub fn path(&mut self, years: usize) -> Vec<MarketYear> {
        (0..years).map(|_| self.next_year()).collect()
    }
}

/// Explicit seeds give reproducible runs; otherwise the OS-seeded thread RNG picks one.
pub fn resolve_base_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(|| rand::rng().random())
}

pub fn derive_seed(base_seed: u64, trial: u32) -> u64 {
    splitmix64(base_seed ^ ((trial as u64) << 17) ^ trial as u64)
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, proptest};

    fn sample_mean_and_std(values: &[f64]) -> (f64, f64) {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0);
        (mean, var.sqrt())
    }

    #[test]
    fn zero_volatility_yields_fixed_draws() {
        let model = MarketModel::new(0.05, 0.0, 0.02, 0.0).expect("valid model");
        let mut generator = PathGenerator::for_trial(&model, 1, 0);
        for year in generator.path(20) {
            assert_eq!(year.investment_return, 0.05);
            assert_eq!(year.inflation, 0.02);
        }
    }

    #[test]
    fn same_seed_and_trial_reproduce_the_path() {
        let model = MarketModel::new(0.07, 0.15, 0.03, 0.01).expect("valid model");
        let a = PathGenerator::for_trial(&model, 42, 3).path(30);
        let b = PathGenerator::for_trial(&model, 42, 3).path(30);
        assert_eq!(a, b);
    }

    #[test]
    fn different_trials_get_independent_streams() {
        let model = MarketModel::new(0.07, 0.15, 0.03, 0.01).expect("valid model");
        let a = PathGenerator::for_trial(&model, 42, 0).path(10);
        let b = PathGenerator::for_trial(&model, 42, 1).path(10);
        assert_ne!(a, b);
    }

    #[test]
    fn log_normal_fit_matches_configured_moments() {
        let model = MarketModel::new(0.07, 0.15, 0.03, 0.01).expect("valid model");
        let draws = PathGenerator::for_trial(&model, 9, 0).path(200_000);
        let returns: Vec<f64> = draws.iter().map(|d| d.investment_return).collect();
        let inflation: Vec<f64> = draws.iter().map(|d| d.inflation).collect();

        let (r_mean, r_std) = sample_mean_and_std(&returns);
        let (i_mean, i_std) = sample_mean_and_std(&inflation);
        assert!((r_mean - 0.07).abs() < 0.003, "return mean {r_mean}");
        assert!((r_std - 0.15).abs() < 0.003, "return std {r_std}");
        assert!((i_mean - 0.03).abs() < 0.001, "inflation mean {i_mean}");
        assert!((i_std - 0.01).abs() < 0.001, "inflation std {i_std}");
    }

    #[test]
    fn derived_seeds_differ_per_trial() {
        let seeds: std::collections::HashSet<u64> =
            (0..1_000).map(|trial| derive_seed(7, trial)).collect();
        assert_eq!(seeds.len(), 1_000);
    }

    proptest! {
        #[test]
        fn returns_never_fall_below_total_loss(
            mean in -0.5f64..0.5,
            vol in 0.0f64..1.5,
            seed in 0u64..10_000,
        ) {
            let model = MarketModel::new(mean, vol, 0.02, 0.5).expect("valid model");
            let mut generator = PathGenerator::for_trial(&model, seed, 0);
            for year in generator.path(50) {
                prop_assert!(year.investment_return > -1.0);
                prop_assert!(year.inflation >= MIN_INFLATION);
            }
        }
    }
}
