use crate::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ConverterHealthResponse {
    pub status: String,
    pub converter: String,
    pub page_ranges: bool,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Process is up", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/health/converter",
    responses(
        (status = 200, description = "Converter backend readiness", body = ConverterHealthResponse)
    ),
    tag = "system"
)]
pub async fn converter_health(State(state): State<AppState>) -> impl IntoResponse {
    let converter = state.conversion_service.converter();
    let status = if converter.health_check().await {
        "ok"
    } else {
        "unavailable"
    };

    Json(ConverterHealthResponse {
        status: status.to_string(),
        converter: converter.name().to_string(),
        page_ranges: converter.supports_page_range(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
