use axum::{
    Router,
    extract::{
        Json, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::core::{
    InputError, ProjectionSample, RetirementSummary, SimulationParams, SolveOutcome,
    SolveRequest, SolveTrial, SolveVariable, project, solve, summarize,
};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Body(#[from] JsonRejection),

    #[error(transparent)]
    Query(#[from] QueryRejection),

    #[error("solver task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Input(err) => {
                tracing::warn!(error = %err, "rejected request");
                error_response(StatusCode::BAD_REQUEST, &self.to_string())
            }
            ApiError::Body(rejection) => {
                tracing::warn!(error = %rejection, "unreadable request body");
                error_response(rejection.status(), &rejection.body_text())
            }
            ApiError::Query(rejection) => {
                tracing::warn!(error = %rejection, "unreadable query string");
                error_response(rejection.status(), &rejection.body_text())
            }
            ApiError::Task(_) | ApiError::Encode(_) | ApiError::Io(_) => {
                tracing::error!(error = %self, "request failed");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "nestegg",
    about = "Year-by-year retirement net worth projection and goal solver"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the JSON API over HTTP
    Serve(ServeArgs),
    /// Print the net worth projection from current age to 100
    Project(ParamArgs),
    /// Search for the value of one input that keeps savings alive to 99
    Solve(SolveArgs),
    /// Print savings at retirement and the income they support
    Summary(ParamArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[derive(Args, Debug, Clone)]
pub struct ParamArgs {
    #[arg(long, default_value_t = 30)]
    current_age: u32,
    #[arg(
        long,
        default_value_t = 60,
        help = "Retirement age; values below current age mean retiring now"
    )]
    retirement_age: u32,
    #[arg(long, default_value_t = 6.0, help = "Annual inflation in percent")]
    inflation_rate: f64,
    #[arg(long, default_value_t = 1_000_000.0)]
    current_savings: f64,
    #[arg(long, default_value_t = 2_000.0)]
    monthly_contribution: f64,
    #[arg(
        long,
        default_value_t = 5.0,
        help = "Yearly increase of the monthly contribution in percent"
    )]
    contribution_increase_rate: f64,
    #[arg(long, default_value_t = 10.0, help = "Expected annual return in percent")]
    expected_yearly_roi: f64,
    #[arg(
        long,
        default_value_t = 100_000.0,
        help = "First-year retirement spending in today's money"
    )]
    expected_yearly_spending: f64,
    #[arg(
        long,
        default_value_t = 25.0,
        help = "Average tax on withdrawals in percent, must be below 100"
    )]
    tax_rate: f64,
}

#[derive(Args, Debug)]
pub struct SolveArgs {
    #[arg(
        long,
        help = "expected_yearly_roi, monthly_contribution, retirement_age or expected_yearly_spending"
    )]
    variable: SolveVariable,
    #[arg(long, allow_negative_numbers = true)]
    search_min: f64,
    #[arg(long, allow_negative_numbers = true)]
    search_max: f64,
    #[command(flatten)]
    params: ParamArgs,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ParamsPayload {
    current_age: Option<u32>,
    retirement_age: Option<u32>,
    inflation_rate: Option<f64>,
    current_savings: Option<f64>,
    monthly_contribution: Option<f64>,
    contribution_increase_rate: Option<f64>,
    #[serde(alias = "annualReturn", alias = "expectedRoi")]
    expected_yearly_roi: Option<f64>,
    #[serde(alias = "currentYearlySpending")]
    expected_yearly_spending: Option<f64>,
    tax_rate: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SolvePayload {
    #[serde(alias = "variable")]
    variable_to_solve: Option<String>,
    search_min: Option<f64>,
    search_max: Option<f64>,
    #[serde(flatten)]
    params: ParamsPayload,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectResponse {
    samples: Vec<ProjectionSample>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SolveResponse {
    variable: SolveVariable,
    value: Option<f64>,
    found: bool,
    iterations: usize,
    trials: Vec<SolveTrial>,
}

impl From<SolveOutcome> for SolveResponse {
    fn from(outcome: SolveOutcome) -> Self {
        SolveResponse {
            variable: outcome.variable,
            value: outcome.value,
            found: outcome.value.is_some(),
            iterations: outcome.trials.len(),
            trials: outcome.trials,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_params(args: ParamArgs) -> Result<SimulationParams, InputError> {
    let params = SimulationParams {
        current_age: args.current_age,
        retirement_age: args.retirement_age,
        inflation_rate: args.inflation_rate,
        current_savings: args.current_savings,
        monthly_contribution: args.monthly_contribution,
        contribution_increase_rate: args.contribution_increase_rate,
        expected_yearly_roi: args.expected_yearly_roi,
        expected_yearly_spending: args.expected_yearly_spending,
        tax_rate: args.tax_rate,
    };
    params.validate()?;
    Ok(params)
}

fn default_params_for_api() -> ParamArgs {
    ParamArgs {
        current_age: 30,
        retirement_age: 60,
        inflation_rate: 6.0,
        current_savings: 1_000_000.0,
        monthly_contribution: 2_000.0,
        contribution_increase_rate: 5.0,
        expected_yearly_roi: 10.0,
        expected_yearly_spending: 100_000.0,
        tax_rate: 25.0,
    }
}

fn params_from_payload(payload: ParamsPayload) -> Result<SimulationParams, InputError> {
    let mut args = default_params_for_api();

    if let Some(v) = payload.current_age {
        args.current_age = v;
    }
    if let Some(v) = payload.retirement_age {
        args.retirement_age = v;
    }
    if let Some(v) = payload.inflation_rate {
        args.inflation_rate = v;
    }
    if let Some(v) = payload.current_savings {
        args.current_savings = v;
    }
    if let Some(v) = payload.monthly_contribution {
        args.monthly_contribution = v;
    }
    if let Some(v) = payload.contribution_increase_rate {
        args.contribution_increase_rate = v;
    }
    if let Some(v) = payload.expected_yearly_roi {
        args.expected_yearly_roi = v;
    }
    if let Some(v) = payload.expected_yearly_spending {
        args.expected_yearly_spending = v;
    }
    if let Some(v) = payload.tax_rate {
        args.tax_rate = v;
    }

    build_params(args)
}

fn solve_request_from_payload(payload: SolvePayload) -> Result<SolveRequest, InputError> {
    let variable = payload
        .variable_to_solve
        .as_deref()
        .unwrap_or_default()
        .parse::<SolveVariable>()?;
    let (Some(search_min), Some(search_max)) = (payload.search_min, payload.search_max) else {
        return Err(InputError::SearchBounds {
            min: payload.search_min.unwrap_or(f64::NAN),
            max: payload.search_max.unwrap_or(f64::NAN),
        });
    };

    Ok(SolveRequest {
        variable,
        search_min,
        search_max,
        params: params_from_payload(payload.params)?,
    })
}

pub async fn run(cli: Cli) -> Result<(), ApiError> {
    match cli.command {
        Command::Serve(args) => run_http_server(SocketAddr::new(args.host, args.port)).await,
        Command::Project(args) => {
            let samples = project(&build_params(args)?)?;
            print_json(&ProjectResponse { samples })
        }
        Command::Solve(args) => {
            let request = SolveRequest {
                variable: args.variable,
                search_min: args.search_min,
                search_max: args.search_max,
                params: build_params(args.params)?,
            };
            let outcome = solve(&request)?;
            print_json(&SolveResponse::from(outcome))
        }
        Command::Summary(args) => print_json(&summarize(&build_params(args)?)?),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), ApiError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/project", get(project_get_handler).post(project_post_handler))
        .route("/api/solve", post(solve_post_handler))
        .route("/api/summary", get(summary_get_handler).post(summary_post_handler))
        .fallback(not_found_handler)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn run_http_server(addr: SocketAddr) -> Result<(), ApiError> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "nestegg HTTP API listening");

    axum::serve(listener, router()).await?;
    Ok(())
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn project_get_handler(payload: Result<Query<ParamsPayload>, QueryRejection>) -> Response {
    match payload {
        Ok(Query(payload)) => project_handler_impl(payload),
        Err(rejection) => ApiError::from(rejection).into_response(),
    }
}

async fn project_post_handler(payload: Result<Json<ParamsPayload>, JsonRejection>) -> Response {
    match payload {
        Ok(Json(payload)) => project_handler_impl(payload),
        Err(rejection) => ApiError::from(rejection).into_response(),
    }
}

fn project_handler_impl(payload: ParamsPayload) -> Response {
    let result = params_from_payload(payload).and_then(|params| project(&params));
    match result {
        Ok(samples) => {
            tracing::debug!(samples = samples.len(), "projection computed");
            json_response(StatusCode::OK, ProjectResponse { samples })
        }
        Err(err) => ApiError::from(err).into_response(),
    }
}

async fn solve_post_handler(payload: Result<Json<SolvePayload>, JsonRejection>) -> Response {
    let result = match payload {
        Ok(Json(payload)) => solve_handler_impl(payload).await,
        Err(rejection) => Err(ApiError::from(rejection)),
    };
    match result {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(err) => err.into_response(),
    }
}

async fn solve_handler_impl(payload: SolvePayload) -> Result<SolveResponse, ApiError> {
    let request = solve_request_from_payload(payload)?;
    let outcome = tokio::task::spawn_blocking(move || solve(&request)).await??;
    tracing::info!(
        variable = outcome.variable.name(),
        value = ?outcome.value,
        iterations = outcome.trials.len(),
        "solve finished"
    );
    Ok(SolveResponse::from(outcome))
}

async fn summary_get_handler(payload: Result<Query<ParamsPayload>, QueryRejection>) -> Response {
    match payload {
        Ok(Query(payload)) => summary_handler_impl(payload),
        Err(rejection) => ApiError::from(rejection).into_response(),
    }
}

async fn summary_post_handler(payload: Result<Json<ParamsPayload>, JsonRejection>) -> Response {
    match payload {
        Ok(Json(payload)) => summary_handler_impl(payload),
        Err(rejection) => ApiError::from(rejection).into_response(),
    }
}

fn summary_handler_impl(payload: ParamsPayload) -> Response {
    let result: Result<RetirementSummary, InputError> =
        params_from_payload(payload).and_then(|params| summarize(&params));
    match result {
        Ok(summary) => json_response(StatusCode::OK, summary),
        Err(err) => ApiError::from(err).into_response(),
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
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
