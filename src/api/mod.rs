use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    ASSET_ASSUMPTIONS, AssetAllocation, AssetClass, Goal, InputMode, Inputs, ProjectionResult,
    RetirementInputs, RetirementResult, SummaryStats, YearProjection, run_projection,
    run_retirement_projection,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliInputMode {
    Percent,
    Dollar,
}

impl From<CliInputMode> for InputMode {
    fn from(value: CliInputMode) -> Self {
        match value {
            CliInputMode::Percent => InputMode::Percent,
            CliInputMode::Dollar => InputMode::Dollar,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliGoal {
    Preservation,
    Income,
    Growth,
}

impl From<CliGoal> for Goal {
    fn from(value: CliGoal) -> Self {
        match value {
            CliGoal::Preservation => Goal::Preservation,
            CliGoal::Income => Goal::Income,
            CliGoal::Growth => Goal::Growth,
        }
    }
}

impl From<Goal> for CliGoal {
    fn from(value: Goal) -> Self {
        match value {
            Goal::Preservation => CliGoal::Preservation,
            Goal::Income => CliGoal::Income,
            Goal::Growth => CliGoal::Growth,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ApiInputMode {
    Percent,
    #[serde(alias = "dollars", alias = "amount")]
    Dollar,
}

impl From<ApiInputMode> for CliInputMode {
    fn from(value: ApiInputMode) -> Self {
        match value {
            ApiInputMode::Percent => CliInputMode::Percent,
            ApiInputMode::Dollar => CliInputMode::Dollar,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectionPayload {
    stocks: Option<f64>,
    bonds: Option<f64>,
    cash: Option<f64>,
    real_estate: Option<f64>,
    crypto: Option<f64>,
    retirement_account: Option<f64>,
    alternatives: Option<f64>,
    startup_equity: Option<f64>,
    other: Option<f64>,

    horizon_years: Option<u32>,
    annual_contribution: Option<f64>,
    initial_principal: Option<f64>,
    input_mode: Option<ApiInputMode>,
    // Free-form on purpose: unrecognized goals fall back to growth.
    goal: Option<String>,
    simulations: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RetirementPayload {
    current_age: Option<u32>,
    retirement_age: Option<u32>,
    horizon_age: Option<u32>,
    current_savings: Option<f64>,
    annual_contribution: Option<f64>,
    contribution_growth: Option<f64>,
    pre_return: Option<f64>,
    post_return: Option<f64>,
}

#[derive(Parser, Debug)]
#[command(
    name = "foliosim",
    about = "Monte Carlo portfolio projection (percentile bands + summary stats per year)"
)]
struct Cli {
    #[arg(long, default_value_t = 0.0, help = "Stocks weight (percent or currency amount)")]
    stocks: f64,
    #[arg(long, default_value_t = 0.0, help = "Bonds weight")]
    bonds: f64,
    #[arg(long, default_value_t = 0.0, help = "Cash weight")]
    cash: f64,
    #[arg(long, default_value_t = 0.0, help = "Real estate weight")]
    real_estate: f64,
    #[arg(long, default_value_t = 0.0, help = "Crypto weight")]
    crypto: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Employer retirement account weight"
    )]
    retirement_account: f64,
    #[arg(long, default_value_t = 0.0, help = "Alternative investments weight")]
    alternatives: f64,
    #[arg(long, default_value_t = 0.0, help = "Startup equity weight")]
    startup_equity: f64,
    #[arg(long, default_value_t = 0.0, help = "Other assets weight")]
    other: f64,
    #[arg(long, default_value_t = 30, help = "Projection horizon in whole years")]
    horizon_years: u32,
    #[arg(long, default_value_t = 0.0, help = "Annual contribution, spread monthly")]
    annual_contribution: f64,
    #[arg(
        long,
        default_value_t = 10_000.0,
        help = "Starting balance; ignored in dollar mode where the allocation total is used"
    )]
    initial_principal: f64,
    #[arg(
        long,
        value_enum,
        default_value_t = CliInputMode::Percent,
        help = "Interpret allocation entries as percentages or currency amounts"
    )]
    input_mode: CliInputMode,
    #[arg(long, value_enum, default_value_t = CliGoal::Growth)]
    goal: CliGoal,
    #[arg(long, default_value_t = 500, help = "Number of simulated trajectories")]
    simulations: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectionResponse {
    input_mode: &'static str,
    goal: &'static str,
    horizon_years: u32,
    simulations: u32,
    yearly_series: Vec<YearProjection>,
    summary_stats: SummaryStats,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssumptionEntry {
    asset_class: &'static str,
    annual_return: f64,
    annual_volatility: f64,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_inputs(cli: Cli) -> Result<Inputs, String> {
    for (name, value) in [
        ("--stocks", cli.stocks),
        ("--bonds", cli.bonds),
        ("--cash", cli.cash),
        ("--real-estate", cli.real_estate),
        ("--crypto", cli.crypto),
        ("--retirement-account", cli.retirement_account),
        ("--alternatives", cli.alternatives),
        ("--startup-equity", cli.startup_equity),
        ("--other", cli.other),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(format!("{name} must be a finite non-negative number"));
        }
    }

    // Percent-mode weights are not checked against a 100 sum: the engine
    // divides each entry by 100 regardless, so an 80- or 120-sum allocation
    // flows through as an under- or over-weighted blend.

    if cli.horizon_years > 100 {
        return Err("--horizon-years must be <= 100".to_string());
    }

    if cli.simulations == 0 || cli.simulations > 200_000 {
        return Err("--simulations must be between 1 and 200000".to_string());
    }

    if !cli.annual_contribution.is_finite() || cli.annual_contribution < 0.0 {
        return Err("--annual-contribution must be >= 0".to_string());
    }

    if !cli.initial_principal.is_finite() || cli.initial_principal < 0.0 {
        return Err("--initial-principal must be >= 0".to_string());
    }

    Ok(Inputs {
        allocation: AssetAllocation {
            stocks: cli.stocks,
            bonds: cli.bonds,
            cash: cli.cash,
            real_estate: cli.real_estate,
            crypto: cli.crypto,
            retirement_account: cli.retirement_account,
            alternatives: cli.alternatives,
            startup_equity: cli.startup_equity,
            other: cli.other,
        },
        horizon_years: cli.horizon_years,
        annual_contribution: cli.annual_contribution,
        initial_principal: cli.initial_principal,
        input_mode: cli.input_mode.into(),
        goal: cli.goal.into(),
        simulations: cli.simulations,
    })
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/projection",
            get(projection_get_handler).post(projection_post_handler),
        )
        .route(
            "/api/retirement",
            get(retirement_get_handler).post(retirement_post_handler),
        )
        .route("/api/assumptions", get(assumptions_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    println!("foliosim HTTP API listening on http://{addr}");
    println!("Local access: http://127.0.0.1:{port}/api/projection");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn projection_get_handler(Query(payload): Query<ProjectionPayload>) -> Response {
    projection_handler_impl(payload)
}

async fn projection_post_handler(Json(payload): Json<ProjectionPayload>) -> Response {
    projection_handler_impl(payload)
}

fn projection_handler_impl(payload: ProjectionPayload) -> Response {
    let inputs = match projection_inputs_from_payload(payload) {
        Ok(inputs) => inputs,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let result = run_projection(&inputs);
    json_response(StatusCode::OK, build_projection_response(&inputs, result))
}

async fn retirement_get_handler(Query(payload): Query<RetirementPayload>) -> Response {
    retirement_handler_impl(payload)
}

async fn retirement_post_handler(Json(payload): Json<RetirementPayload>) -> Response {
    retirement_handler_impl(payload)
}

fn retirement_handler_impl(payload: RetirementPayload) -> Response {
    let inputs = match retirement_inputs_from_payload(payload) {
        Ok(inputs) => inputs,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let result: RetirementResult = run_retirement_projection(&inputs);
    json_response(StatusCode::OK, result)
}

async fn assumptions_handler() -> Response {
    let entries: Vec<AssumptionEntry> = AssetClass::ALL
        .iter()
        .zip(ASSET_ASSUMPTIONS.iter())
        .map(|(class, assumption)| AssumptionEntry {
            asset_class: class.key(),
            annual_return: assumption.annual_return,
            annual_volatility: assumption.annual_volatility,
        })
        .collect();
    json_response(StatusCode::OK, entries)
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
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
fn projection_inputs_from_json(json: &str) -> Result<Inputs, String> {
    let payload = serde_json::from_str::<ProjectionPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    projection_inputs_from_payload(payload)
}

fn projection_inputs_from_payload(payload: ProjectionPayload) -> Result<Inputs, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.stocks {
        cli.stocks = v;
    }
    if let Some(v) = payload.bonds {
        cli.bonds = v;
    }
    if let Some(v) = payload.cash {
        cli.cash = v;
    }
    if let Some(v) = payload.real_estate {
        cli.real_estate = v;
    }
    if let Some(v) = payload.crypto {
        cli.crypto = v;
    }
    if let Some(v) = payload.retirement_account {
        cli.retirement_account = v;
    }
    if let Some(v) = payload.alternatives {
        cli.alternatives = v;
    }
    if let Some(v) = payload.startup_equity {
        cli.startup_equity = v;
    }
    if let Some(v) = payload.other {
        cli.other = v;
    }

    if let Some(v) = payload.horizon_years {
        cli.horizon_years = v;
    }
    if let Some(v) = payload.annual_contribution {
        cli.annual_contribution = v;
    }
    if let Some(v) = payload.initial_principal {
        cli.initial_principal = v;
    }
    if let Some(v) = payload.input_mode {
        cli.input_mode = v.into();
    }
    if let Some(v) = payload.goal {
        cli.goal = Goal::parse_or_growth(&v).into();
    }
    if let Some(v) = payload.simulations {
        cli.simulations = v;
    }

    build_inputs(cli)
}

#[cfg(test)]
fn retirement_inputs_from_json(json: &str) -> Result<RetirementInputs, String> {
    let payload = serde_json::from_str::<RetirementPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    retirement_inputs_from_payload(payload)
}

fn retirement_inputs_from_payload(payload: RetirementPayload) -> Result<RetirementInputs, String> {
    let current_age = payload.current_age.unwrap_or(35);
    let retirement_age = payload.retirement_age.unwrap_or(65);
    let horizon_age = payload.horizon_age.unwrap_or(90);
    let current_savings = payload.current_savings.unwrap_or(50_000.0);
    let annual_contribution = payload.annual_contribution.unwrap_or(12_000.0);
    let contribution_growth = payload.contribution_growth.unwrap_or(2.0);
    let pre_return = payload.pre_return.unwrap_or(6.0);
    let post_return = payload.post_return.unwrap_or(3.0);

    if retirement_age < current_age {
        return Err("retirementAge must be >= currentAge".to_string());
    }
    if horizon_age <= retirement_age {
        return Err("horizonAge must be > retirementAge".to_string());
    }
    if !current_savings.is_finite() || current_savings < 0.0 {
        return Err("currentSavings must be >= 0".to_string());
    }
    if !annual_contribution.is_finite() || annual_contribution < 0.0 {
        return Err("annualContribution must be >= 0".to_string());
    }
    for (name, rate) in [
        ("contributionGrowth", contribution_growth),
        ("preReturn", pre_return),
        ("postReturn", post_return),
    ] {
        if !rate.is_finite() || rate <= -100.0 {
            return Err(format!("{name} must be a percentage > -100"));
        }
    }

    Ok(RetirementInputs {
        current_age,
        retirement_age,
        horizon_age,
        current_savings,
        annual_contribution,
        contribution_growth_rate: contribution_growth / 100.0,
        pre_retirement_return: pre_return / 100.0,
        post_retirement_return: post_return / 100.0,
    })
}

fn default_cli_for_api() -> Cli {
    Cli {
        stocks: 60.0,
        bonds: 30.0,
        cash: 10.0,
        real_estate: 0.0,
        crypto: 0.0,
        retirement_account: 0.0,
        alternatives: 0.0,
        startup_equity: 0.0,
        other: 0.0,
        horizon_years: 30,
        annual_contribution: 12_000.0,
        initial_principal: 10_000.0,
        input_mode: CliInputMode::Percent,
        goal: CliGoal::Growth,
        simulations: 500,
    }
}

fn build_projection_response(inputs: &Inputs, result: ProjectionResult) -> ProjectionResponse {
    ProjectionResponse {
        input_mode: match inputs.input_mode {
            InputMode::Percent => "percent",
            InputMode::Dollar => "dollar",
        },
        goal: match inputs.goal {
            Goal::Preservation => "preservation",
            Goal::Income => "income",
            Goal::Growth => "growth",
        },
        horizon_years: inputs.horizon_years,
        simulations: inputs.simulations,
        yearly_series: result.yearly_series,
        summary_stats: result.summary,
    }
}
