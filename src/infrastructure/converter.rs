use crate::config::ServerConfig;
use crate::services::converter::DocumentConverter;
use std::sync::Arc;
use tracing::info;

pub async fn setup_converter(config: &ServerConfig) -> Arc<dyn DocumentConverter> {
    let converter = crate::services::converter::create_converter(config);

    // Probe once at startup; conversions still run if this fails
    if converter.health_check().await {
        info!("📄 Converter backend '{}' is available", converter.name());
    } else {
        tracing::warn!(
            "⚠️  Converter backend '{}' could not be started! Conversions will fail until it is installed.",
            converter.name()
        );
    }

    converter.into()
}
