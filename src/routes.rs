use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir,
    set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    config::Config,
    weather::{
        cache::{CacheStats, ResponseCache},
        openweather::{OpenWeatherClient, OpenWeatherError},
        types::{CoordinatesQuery, GeocodeQuery, LocationQuery, RequestError, UpstreamRequest},
    },
};

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub weather_client: Arc<OpenWeatherClient>,
    pub cache: Arc<ResponseCache>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    BadRequest(#[from] RequestError),
    #[error("{}", .0.body_text())]
    InvalidQuery(#[from] QueryRejection),
    #[error("{message}")]
    Upstream {
        message: &'static str,
        #[source]
        source: OpenWeatherError,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) | ApiError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream { message, source } => {
                // Upstream detail stays in the server log
                tracing::error!(error = %source, "{}", message);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

async fn proxy(
    state: &AppState,
    request: UpstreamRequest,
    failure: &'static str,
) -> Result<Json<Value>, ApiError> {
    let key = request.cache_key();

    state
        .cache
        .get_or_fetch(key, || state.weather_client.fetch(&request))
        .await
        .map(Json)
        .map_err(|source| ApiError::Upstream {
            message: failure,
            source,
        })
}

// Route handlers
#[utoipa::path(
    get,
    path = "/api/weather/current",
    params(LocationQuery),
    responses(
        (status = 200, description = "Upstream current weather JSON, relayed verbatim"),
        (status = 400, description = "Neither coordinates nor city supplied", body = ErrorResponse),
        (status = 500, description = "Upstream failure", body = ErrorResponse)
    ),
    tag = "weather"
)]
pub async fn current_weather(
    State(state): State<AppState>,
    params: Result<Query<LocationQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(params) = params?;
    let request = UpstreamRequest::current(&params)?;
    proxy(&state, request, "Failed to fetch weather data").await
}

#[utoipa::path(
    get,
    path = "/api/weather/forecast",
    params(LocationQuery),
    responses(
        (status = 200, description = "Upstream 5 day / 3 hour forecast JSON"),
        (status = 400, description = "Neither coordinates nor city supplied", body = ErrorResponse),
        (status = 500, description = "Upstream failure", body = ErrorResponse)
    ),
    tag = "weather"
)]
pub async fn forecast(
    State(state): State<AppState>,
    params: Result<Query<LocationQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(params) = params?;
    let request = UpstreamRequest::forecast(&params)?;
    proxy(&state, request, "Failed to fetch forecast data").await
}

#[utoipa::path(
    get,
    path = "/api/geocoding",
    params(GeocodeQuery),
    responses(
        (status = 200, description = "Up to five geocoding matches"),
        (status = 400, description = "Missing q", body = ErrorResponse),
        (status = 500, description = "Upstream failure", body = ErrorResponse)
    ),
    tag = "weather"
)]
pub async fn geocoding(
    State(state): State<AppState>,
    params: Result<Query<GeocodeQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(params) = params?;
    let request = UpstreamRequest::geocoding(&params)?;
    proxy(&state, request, "Failed to fetch geocoding data").await
}

#[utoipa::path(
    get,
    path = "/api/weather/pollution",
    params(CoordinatesQuery),
    responses(
        (status = 200, description = "Upstream air pollution JSON"),
        (status = 400, description = "Missing lat or lon", body = ErrorResponse),
        (status = 500, description = "Upstream failure", body = ErrorResponse)
    ),
    tag = "weather"
)]
pub async fn air_pollution(
    State(state): State<AppState>,
    params: Result<Query<CoordinatesQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(params) = params?;
    let request = UpstreamRequest::pollution(&params)?;
    proxy(&state, request, "Failed to fetch air pollution data").await
}

#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Service is up", body = HealthResponse)),
    tag = "service"
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/api/cache/stats",
    responses((status = 200, description = "Cache counters", body = CacheStats)),
    tag = "service"
)]
pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.stats().await)
}

#[derive(OpenApi)]
#[openapi(
    paths(current_weather, forecast, geocoding, air_pollution, health, cache_stats),
    components(schemas(HealthResponse, ErrorResponse, CacheStats)),
    tags(
        (name = "weather", description = "Cached OpenWeather proxy"),
        (name = "service", description = "Health and cache introspection")
    )
)]
pub struct ApiDoc;

// Create the router
pub fn create_router(state: AppState) -> Router {
    let static_dir = state.config.static_dir.clone();

    Router::new()
        .route("/api/weather/current", get(current_weather))
        .route("/api/weather/forecast", get(forecast))
        .route("/api/geocoding", get(geocoding))
        .route("/api/weather/pollution", get(air_pollution))
        .route("/api/health", get(health))
        .route("/api/cache/stats", get(cache_stats))
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .fallback_service(ServeDir::new(static_dir))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
