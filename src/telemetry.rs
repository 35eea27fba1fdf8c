use anyhow::{Context, Result};
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace::Sampler, Resource};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Set once the OTLP span pipeline is installed.
static SPAN_EXPORT: AtomicBool = AtomicBool::new(false);

const DEFAULT_EXPORT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub service_version: String,
    pub environment: String,
    /// Collector address. Spans stay local when unset.
    pub otlp_endpoint: Option<String>,
    pub traces_enabled: bool,
    pub export_timeout: Duration,
}

impl TelemetryConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads `APP_ENVIRONMENT`, `OTEL_EXPORTER_OTLP_ENDPOINT`,
    /// `OTEL_TRACES_ENABLED` and `OTEL_EXPORT_TIMEOUT_SECS`. Unparseable
    /// values fall back to their defaults since logging is not up yet.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let otlp_endpoint = lookup("OTEL_EXPORTER_OTLP_ENDPOINT")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        let traces_enabled = lookup("OTEL_TRACES_ENABLED")
            .and_then(|value| value.parse().ok())
            .unwrap_or(true);
        let timeout_secs = lookup("OTEL_EXPORT_TIMEOUT_SECS")
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_EXPORT_TIMEOUT_SECS);

        Self {
            service_name: env!("CARGO_PKG_NAME").to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: lookup("APP_ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            otlp_endpoint,
            traces_enabled,
            export_timeout: Duration::from_secs(timeout_secs),
        }
    }

    fn exporter_endpoint(&self) -> Option<&str> {
        self.otlp_endpoint
            .as_deref()
            .filter(|_| self.traces_enabled)
    }

    fn resource(&self) -> Resource {
        Resource::new([
            KeyValue::new("service.name", self.service_name.clone()),
            KeyValue::new("service.version", self.service_version.clone()),
            KeyValue::new("deployment.environment", self.environment.clone()),
        ])
    }
}

/// Returned by [`init_telemetry`]; call [`TelemetryHandles::shutdown`] before exit.
pub struct TelemetryHandles {
    exporting: bool,
}

impl TelemetryHandles {
    /// Flushes buffered spans when an exporter is running.
    pub async fn shutdown(self) -> Result<()> {
        if self.exporting {
            info!("Flushing span exporter");
            global::shutdown_tracer_provider();
        }
        Ok(())
    }
}

/// Installs the `fmt` log subscriber, then the OTLP span pipeline when a
/// collector endpoint is configured. `None` reads the process environment.
pub async fn init_telemetry(config: Option<TelemetryConfig>) -> Result<TelemetryHandles> {
    let config = config.unwrap_or_else(TelemetryConfig::from_env);

    install_log_subscriber()?;
    info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = %config.environment,
        "Logging initialized"
    );

    let exporting = match config.exporter_endpoint() {
        Some(endpoint) => {
            install_span_exporter(&config, endpoint)?;
            SPAN_EXPORT.store(true, Ordering::Relaxed);
            info!(endpoint, "Exporting spans over OTLP");
            true
        }
        None => {
            info!("Span export disabled, logging to stdout only");
            false
        }
    };

    Ok(TelemetryHandles { exporting })
}

fn install_span_exporter(config: &TelemetryConfig, endpoint: &str) -> Result<()> {
    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint)
        .with_timeout(config.export_timeout);
    let trace_config = opentelemetry_sdk::trace::config()
        .with_resource(config.resource())
        .with_sampler(Sampler::AlwaysOn);

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(trace_config)
        .install_batch(runtime::Tokio)
        .context("Failed to install OTLP span pipeline")?;
    Ok(())
}

fn install_log_subscriber() -> Result<()> {
    let default_directives = format!("{}=debug,tower_http=info", env!("CARGO_CRATE_NAME"));
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directives.into());

    Registry::default()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("Failed to install log subscriber")
}

/// Tracer from the global provider. A no-op tracer until an exporter is installed.
pub fn get_tracer(name: &'static str) -> global::BoxedTracer {
    global::tracer(name)
}

pub fn telemetry_health_check() -> HashMap<String, bool> {
    HashMap::from([
        ("log_subscriber".to_string(), true),
        ("otlp_exporter".to_string(), SPAN_EXPORT.load(Ordering::Relaxed)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn defaults_keep_spans_local() {
        let config = TelemetryConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config.environment, "development");
        assert!(config.traces_enabled);
        assert_eq!(config.export_timeout, Duration::from_secs(30));
        assert_eq!(config.exporter_endpoint(), None);
    }

    #[test]
    fn endpoint_is_ignored_when_traces_disabled() {
        let config = TelemetryConfig::from_lookup(lookup_from(&[
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://collector:4317"),
            ("OTEL_TRACES_ENABLED", "false"),
        ]));
        assert_eq!(config.otlp_endpoint.as_deref(), Some("http://collector:4317"));
        assert_eq!(config.exporter_endpoint(), None);
    }

    #[test]
    fn blank_endpoint_and_bad_numbers_fall_back() {
        let config = TelemetryConfig::from_lookup(lookup_from(&[
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "  "),
            ("OTEL_EXPORT_TIMEOUT_SECS", "soon"),
            ("APP_ENVIRONMENT", "production"),
        ]));
        assert_eq!(config.otlp_endpoint, None);
        assert_eq!(config.export_timeout, Duration::from_secs(30));
        assert_eq!(config.environment, "production");
    }
}
