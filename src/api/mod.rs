use axum::{
    Router,
    extract::{Json, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::analytics::{AnalyticsConfig, DerivedMetrics, derive_report_metrics};
use crate::core::{
    ExpenseBreakdown, ExpenseItem, SimulationError, SimulationOutcome, SimulationParameters,
    normalize_tax_rate_percent, run_simulation,
};

const MIN_AGE: u32 = 18;
const MAX_AGE: u32 = 120;
const MAX_AMOUNT: f64 = 1e9;
const MAX_SIMULATIONS: u32 = 100_000;
const MAX_RATE_PERCENT: f64 = 100.0;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    current_age: Option<u32>,
    retirement_age: Option<u32>,
    #[serde(alias = "pensionStartAge")]
    legal_retirement_age: Option<u32>,
    end_age: Option<u32>,
    #[serde(alias = "simulationRuns")]
    simulations: Option<u32>,
    seed: Option<u64>,

    current_assets: Option<f64>,
    annual_savings: Option<f64>,
    monthly_pension: Option<f64>,

    return_mean: Option<f64>,
    return_volatility: Option<f64>,
    inflation_mean: Option<f64>,
    inflation_volatility: Option<f64>,
    tax_rate: Option<f64>,

    monthly_expenses: Option<Vec<ExpenseItem>>,
    annual_expenses: Option<Vec<ExpenseItem>>,
}

/// One household profile. Rates are in percent, money in today's units.
#[derive(Args, Debug, Clone, PartialEq)]
pub struct ProfileArgs {
    #[arg(long, default_value_t = 54)]
    pub current_age: u32,
    #[arg(long, default_value_t = 60)]
    pub retirement_age: u32,
    #[arg(long, default_value_t = 67, help = "Age the statutory pension starts")]
    pub legal_retirement_age: u32,
    #[arg(long, default_value_t = 90, help = "Last simulated age")]
    pub end_age: u32,
    #[arg(long, default_value_t = 600_000.0)]
    pub current_assets: f64,
    #[arg(long, default_value_t = 18_000.0, help = "Saved every year until retirement")]
    pub annual_savings: f64,
    #[arg(long, default_value_t = 5_000.0)]
    pub monthly_pension: f64,
    #[arg(long, default_value_t = 7.0, help = "Mean annual return in percent")]
    pub return_mean: f64,
    #[arg(long, default_value_t = 2.0, help = "Annual return volatility in percent")]
    pub return_volatility: f64,
    #[arg(long, default_value_t = 3.0, help = "Mean annual inflation in percent")]
    pub inflation_mean: f64,
    #[arg(long, default_value_t = 0.5, help = "Annual inflation volatility in percent")]
    pub inflation_volatility: f64,
    #[arg(
        long,
        default_value_t = 26.25,
        help = "Capital gains tax in percent; implausible values are corrected"
    )]
    pub tax_rate: f64,
    #[arg(
        long = "monthly-expense",
        value_name = "NAME=AMOUNT",
        value_parser = parse_expense,
        default_values_t = default_monthly_expenses()
    )]
    pub monthly_expenses: Vec<ExpenseItem>,
    #[arg(
        long = "annual-expense",
        value_name = "NAME=AMOUNT",
        value_parser = parse_expense,
        default_values_t = default_annual_expenses()
    )]
    pub annual_expenses: Vec<ExpenseItem>,
    #[arg(long, default_value_t = 1_000)]
    pub simulations: u32,
    #[arg(long, help = "Fixed seed for reproducible runs")]
    pub seed: Option<u64>,
}

impl Default for ProfileArgs {
    fn default() -> Self {
        Self {
            current_age: 54,
            retirement_age: 60,
            legal_retirement_age: 67,
            end_age: 90,
            current_assets: 600_000.0,
            annual_savings: 18_000.0,
            monthly_pension: 5_000.0,
            return_mean: 7.0,
            return_volatility: 2.0,
            inflation_mean: 3.0,
            inflation_volatility: 0.5,
            tax_rate: 26.25,
            monthly_expenses: default_monthly_expenses(),
            annual_expenses: default_annual_expenses(),
            simulations: 1_000,
            seed: None,
        }
    }
}

fn default_monthly_expenses() -> Vec<ExpenseItem> {
    vec![
        ExpenseItem::new("housing", 1_800.0),
        ExpenseItem::new("food", 900.0),
        ExpenseItem::new("health", 450.0),
        ExpenseItem::new("transport", 350.0),
        ExpenseItem::new("leisure", 600.0),
        ExpenseItem::new("other", 400.0),
    ]
}

fn default_annual_expenses() -> Vec<ExpenseItem> {
    vec![
        ExpenseItem::new("travel", 3_600.0),
        ExpenseItem::new("insurance", 1_800.0),
    ]
}

fn parse_expense(raw: &str) -> Result<ExpenseItem, String> {
    let (name, amount) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=AMOUNT, got `{raw}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing expense name in `{raw}`"));
    }
    let amount = amount
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid amount in `{raw}`: {e}"))?;
    Ok(ExpenseItem::new(name, amount))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateResponse {
    pub outcome: SimulationOutcome,
    pub metrics: DerivedMetrics,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Clone)]
struct AppState {
    config: Arc<AnalyticsConfig>,
}

fn check_age(field: &'static str, age: u32) -> Result<(), SimulationError> {
    if !(MIN_AGE..=MAX_AGE).contains(&age) {
        return Err(SimulationError::invalid(
            field,
            format!("must be between {MIN_AGE} and {MAX_AGE}"),
        ));
    }
    Ok(())
}

fn check_amount(field: &'static str, value: f64) -> Result<(), SimulationError> {
    if !value.is_finite() || !(0.0..=MAX_AMOUNT).contains(&value) {
        return Err(SimulationError::invalid(
            field,
            format!("must be between 0 and {MAX_AMOUNT}"),
        ));
    }
    Ok(())
}

fn check_rate(field: &'static str, value: f64, min: f64) -> Result<(), SimulationError> {
    if !value.is_finite() || value <= min || value > MAX_RATE_PERCENT {
        return Err(SimulationError::invalid(
            field,
            format!("must be > {min} and <= {MAX_RATE_PERCENT} percent"),
        ));
    }
    Ok(())
}

fn check_volatility(field: &'static str, value: f64) -> Result<(), SimulationError> {
    if !value.is_finite() || !(0.0..=MAX_RATE_PERCENT).contains(&value) {
        return Err(SimulationError::invalid(
            field,
            format!("must be between 0 and {MAX_RATE_PERCENT} percent"),
        ));
    }
    Ok(())
}

/// Applies the report-schema range limits, corrects the tax rate and converts
/// percentages to fractions.
pub fn build_params(profile: ProfileArgs) -> Result<SimulationParameters, SimulationError> {
    check_age("currentAge", profile.current_age)?;
    check_age("retirementAge", profile.retirement_age)?;
    check_age("legalRetirementAge", profile.legal_retirement_age)?;
    check_age("endAge", profile.end_age)?;

    check_amount("currentAssets", profile.current_assets)?;
    check_amount("annualSavings", profile.annual_savings)?;
    check_amount("monthlyPension", profile.monthly_pension)?;
    for item in &profile.monthly_expenses {
        check_amount("monthlyExpenses", item.amount)?;
    }
    for item in &profile.annual_expenses {
        check_amount("annualExpenses", item.amount)?;
    }

    check_rate("returnMean", profile.return_mean, -MAX_RATE_PERCENT)?;
    check_rate("inflationMean", profile.inflation_mean, -MAX_RATE_PERCENT)?;
    check_volatility("returnVolatility", profile.return_volatility)?;
    check_volatility("inflationVolatility", profile.inflation_volatility)?;

    if !(1..=MAX_SIMULATIONS).contains(&profile.simulations) {
        return Err(SimulationError::invalid(
            "simulations",
            format!("must be between 1 and {MAX_SIMULATIONS}"),
        ));
    }

    let params = SimulationParameters {
        current_age: profile.current_age,
        retirement_age: profile.retirement_age,
        pension_start_age: profile.legal_retirement_age,
        end_age: profile.end_age,
        current_assets: profile.current_assets,
        annual_savings: profile.annual_savings,
        monthly_pension: profile.monthly_pension,
        return_mean: profile.return_mean / 100.0,
        return_vol: profile.return_volatility / 100.0,
        inflation_mean: profile.inflation_mean / 100.0,
        inflation_vol: profile.inflation_volatility / 100.0,
        capital_gains_tax_rate: normalize_tax_rate_percent(profile.tax_rate) / 100.0,
        expenses: ExpenseBreakdown {
            monthly: profile.monthly_expenses,
            annual: profile.annual_expenses,
        },
        trials: profile.simulations,
        seed: profile.seed,
    };
    params.validate()?;
    Ok(params)
}

fn params_from_payload(payload: SimulatePayload) -> Result<SimulationParameters, SimulationError> {
    let mut profile = ProfileArgs::default();

    if let Some(v) = payload.current_age {
        profile.current_age = v;
    }
    if let Some(v) = payload.retirement_age {
        profile.retirement_age = v;
    }
    if let Some(v) = payload.legal_retirement_age {
        profile.legal_retirement_age = v;
    }
    if let Some(v) = payload.end_age {
        profile.end_age = v;
    }
    if let Some(v) = payload.simulations {
        profile.simulations = v;
    }
    if let Some(v) = payload.seed {
        profile.seed = Some(v);
    }

    if let Some(v) = payload.current_assets {
        profile.current_assets = v;
    }
    if let Some(v) = payload.annual_savings {
        profile.annual_savings = v;
    }
    if let Some(v) = payload.monthly_pension {
        profile.monthly_pension = v;
    }

    if let Some(v) = payload.return_mean {
        profile.return_mean = v;
    }
    if let Some(v) = payload.return_volatility {
        profile.return_volatility = v;
    }
    if let Some(v) = payload.inflation_mean {
        profile.inflation_mean = v;
    }
    if let Some(v) = payload.inflation_volatility {
        profile.inflation_volatility = v;
    }
    if let Some(v) = payload.tax_rate {
        profile.tax_rate = v;
    }

    if let Some(v) = payload.monthly_expenses {
        profile.monthly_expenses = v;
    }
    if let Some(v) = payload.annual_expenses {
        profile.annual_expenses = v;
    }

    build_params(profile)
}

/// Full pipeline for one profile: simulate, aggregate, derive.
pub fn build_report(
    params: &SimulationParameters,
    config: &AnalyticsConfig,
) -> Result<SimulateResponse, SimulationError> {
    let outcome = run_simulation(params)?;
    let metrics = derive_report_metrics(params, &outcome, config);
    Ok(SimulateResponse { outcome, metrics })
}

fn router(config: AnalyticsConfig) -> Router {
    let state = AppState {
        config: Arc::new(config),
    };
    Router::new()
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route("/api/config", get(config_handler))
        .route("/health", get(health_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

pub async fn run_http_server(port: u16, config: AnalyticsConfig) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "retirement planner API listening");

    axum::serve(listener, router(config)).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, serde_json::json!({ "status": "ok" }))
}

async fn config_handler(State(state): State<AppState>) -> Response {
    json_response(StatusCode::OK, state.config.as_ref())
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(
    State(state): State<AppState>,
    Query(payload): Query<SimulatePayload>,
) -> Response {
    simulate_handler_impl(state, payload).await
}

async fn simulate_post_handler(
    State(state): State<AppState>,
    Json(payload): Json<SimulatePayload>,
) -> Response {
    simulate_handler_impl(state, payload).await
}

async fn simulate_handler_impl(state: AppState, payload: SimulatePayload) -> Response {
    let params = match params_from_payload(payload) {
        Ok(params) => params,
        Err(e) => {
            warn!(field = e.field(), error = %e, "rejected simulation request");
            return error_response(StatusCode::BAD_REQUEST, &e.to_string());
        }
    };

    let config = Arc::clone(&state.config);
    let report = tokio::task::spawn_blocking(move || build_report(&params, &config)).await;
    match report {
        Ok(Ok(response)) => json_response(StatusCode::OK, response),
        Ok(Err(e)) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
        Err(e) => {
            error!(error = %e, "simulation task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "simulation failed")
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn params_from_json(json: &str) -> Result<SimulationParameters, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    params_from_payload(payload).map_err(|e| e.to_string())
}
