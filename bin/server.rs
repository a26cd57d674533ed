// Regional Stats - Web Server
// REST API with Axum over StatsService

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use regional_stats::validation::split_codes;
use regional_stats::{
    init_tracing, Dataset, MunicipalityEntry, Origin, RegionRecord, Scope, Settings, SourceStatus,
    StatsError, StatsService, SummaryStatistic, TimeSeries, TransactionRecord,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

/// Shared application state
#[derive(Clone)]
struct AppState {
    service: Arc<StatsService>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// StatsError → HTTP status + error body
struct ApiError(StatsError);

impl From<StatsError> for ApiError {
    fn from(err: StatsError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            StatsError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            StatsError::RegionNotFound { .. } => StatusCode::NOT_FOUND,
            StatsError::SourceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            StatsError::Cache(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }

        let body: ApiResponse<()> = ApiResponse {
            success: false,
            data: None,
            error: Some(self.0.to_string()),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

// ============================================================================
// Request / response shapes
// ============================================================================

#[derive(Deserialize)]
struct YearQuery {
    year: i32,
}

#[derive(Deserialize)]
struct TransactionsQuery {
    year: i32,
    pref_code: String,
    city_code: Option<String>,
    price_classification: Option<String>,
}

#[derive(Deserialize)]
struct SummaryQuery {
    year: i32,
    /// Comma-separated region codes
    codes: String,
}

#[derive(Deserialize)]
struct SeriesQuery {
    start_year: Option<i32>,
    end_year: Option<i32>,
}

#[derive(Serialize)]
struct PopulationResponse {
    year: i32,
    origin: Origin,
    data: Vec<RegionRecord>,
}

#[derive(Serialize)]
struct YearsResponse {
    years: Vec<i32>,
}

#[derive(Serialize)]
struct TransactionsResponse {
    year: i32,
    pref_code: String,
    city_code: Option<String>,
    origin: Origin,
    count: usize,
    data: Vec<TransactionRecord>,
}

#[derive(Serialize)]
struct SeriesResponse {
    code: String,
    data: Vec<SummaryStatistic>,
}

#[derive(Serialize)]
struct StatusResponse {
    version: &'static str,
    sources: Vec<SourceStatus>,
    synthetic_mode: regional_stats::SyntheticMode,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/population?year= - Every municipality for one census year
async fn get_population(
    State(state): State<AppState>,
    Query(query): Query<YearQuery>,
) -> ApiResult<PopulationResponse> {
    let resolution = state
        .service
        .region_batch(Dataset::Population, query.year, Scope::none())
        .await?;

    Ok(Json(ApiResponse::ok(PopulationResponse {
        year: query.year,
        origin: resolution.origin,
        data: resolution.snapshot.into_regions(),
    })))
}

/// GET /api/population/years
async fn get_population_years(State(state): State<AppState>) -> ApiResult<YearsResponse> {
    let years = state.service.available_years(Dataset::Population)?;
    Ok(Json(ApiResponse::ok(YearsResponse { years })))
}

/// GET /api/municipalities
async fn get_municipalities(State(state): State<AppState>) -> ApiResult<Vec<MunicipalityEntry>> {
    let list = state.service.municipality_list().await?;
    Ok(Json(ApiResponse::ok(list)))
}

/// GET /api/population/municipality/:code - Population history of one municipality
async fn get_population_series(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<TimeSeries> {
    let series = state.service.time_series(Dataset::Population, &code).await?;
    Ok(Json(ApiResponse::ok(series)))
}

/// GET /api/realestate/transactions?year=&pref_code=&city_code=
async fn get_transactions(
    State(state): State<AppState>,
    Query(query): Query<TransactionsQuery>,
) -> ApiResult<TransactionsResponse> {
    let scope = Scope {
        prefecture: Some(query.pref_code.clone()),
        region: query.city_code.clone(),
    };
    let resolution = state
        .service
        .transactions(query.year, scope, query.price_classification)
        .await?;

    let data = resolution.snapshot.into_transactions();
    Ok(Json(ApiResponse::ok(TransactionsResponse {
        year: query.year,
        pref_code: query.pref_code,
        city_code: query.city_code,
        origin: resolution.origin,
        count: data.len(),
        data,
    })))
}

/// GET /api/realestate/summary?year=&codes=13101,13102
async fn get_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<Vec<SummaryStatistic>> {
    let codes = split_codes(&query.codes);
    let stats = state
        .service
        .summary(Dataset::RealEstate, query.year, &codes)
        .await?;
    Ok(Json(ApiResponse::ok(stats)))
}

/// GET /api/realestate/municipality/:code?start_year=&end_year=
async fn get_realestate_series(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(query): Query<SeriesQuery>,
) -> ApiResult<SeriesResponse> {
    let data = state
        .service
        .transaction_series(&code, query.start_year, query.end_year)
        .await?;
    Ok(Json(ApiResponse::ok(SeriesResponse { code, data })))
}

/// GET /api/status - Source configuration
async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(StatusResponse {
        version: regional_stats::VERSION,
        sources: state.service.source_status(),
        synthetic_mode: state.service.settings().synthetic_mode,
    }))
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/population", get(get_population))
        .route("/population/years", get(get_population_years))
        .route("/population/municipality/:code", get(get_population_series))
        .route("/municipalities", get(get_municipalities))
        .route("/realestate/transactions", get(get_transactions))
        .route("/realestate/summary", get(get_summary))
        .route("/realestate/municipality/:code", get(get_realestate_series))
        .route("/status", get(get_status))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let settings = Settings::load();
    settings.log_status();

    let service = StatsService::from_settings(settings).context("Failed to build service")?;
    let state = AppState {
        service: Arc::new(service),
    };

    let addr = std::env::var("REGIONAL_STATS_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Server running on http://{}", addr);
    tracing::info!("API: http://{}/api/population/years", addr);

    axum::serve(listener, router(state))
        .await
        .context("Server stopped")?;
    Ok(())
}
