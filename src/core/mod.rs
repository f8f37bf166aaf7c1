mod aggregate;
mod engine;
mod error;
mod normalize;
mod random;
mod types;

pub use aggregate::{aggregate, binomial_ci_half_width};
pub use engine::{run_simulation, simulate, validate_parameters};
pub use error::{Result, SimulationError};
pub use normalize::{TAX_RATE_CAP_PERCENT, normalize_tax_rate_percent};
pub use random::{MarketModel, MarketYear, PathGenerator, derive_seed, resolve_base_seed};
pub use types::{
    ExpenseBreakdown, ExpenseItem, PercentileBands, PercentileSeries, RawTrialData,
    SimulationOutcome, SimulationParameters, TrialPath, TrialSample,
};
