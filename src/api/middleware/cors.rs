use crate::config::ServerConfig;
use axum::http::{HeaderName, HeaderValue, header};
use tower_http::cors::{Any, CorsLayer};

use super::request_id::REQUEST_ID_HEADER;

/// Builds the CORS policy from the configured allow-list.
///
/// A `*` entry allows any origin; otherwise only the listed origins are
/// accepted. Methods and request headers are unrestricted.
pub fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([
            header::CONTENT_DISPOSITION,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ]);

    if config.allows_any_origin() {
        if config.allowed_origins.len() > 1 {
            tracing::warn!(
                "ALLOWED_ORIGINS contains '*' alongside explicit origins; any origin is allowed"
            );
        }
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    layer.allow_origin(origins)
}
