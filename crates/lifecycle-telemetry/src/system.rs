//! Diagnostics logging setup for the host process

use crate::{
    config::{LogFormat, TelemetryConfig},
    metrics::LifecycleMetricsRecorder,
    Error, Result,
};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Installs the global `tracing` subscriber and, optionally, the global
/// metrics recorder. Emitted events never go through this path.
pub struct TelemetrySystem;

/// Keeps the file writer flushing and exposes the installed recorder
pub struct TelemetryGuard {
    _file_guard: Option<WorkerGuard>,
    metrics: Option<LifecycleMetricsRecorder>,
}

impl TelemetryGuard {
    /// The global metrics recorder, when metrics are enabled
    pub fn metrics(&self) -> Option<&LifecycleMetricsRecorder> {
        self.metrics.as_ref()
    }
}

impl TelemetrySystem {
    /// Initialize diagnostics with the given configuration. Fails if a
    /// global subscriber or recorder is already installed.
    pub async fn init(config: TelemetryConfig) -> Result<TelemetryGuard> {
        config.validate()?;

        let mut layers: Vec<BoxedLayer> = Vec::new();
        if let Some(console) = Self::build_console_layer(&config)? {
            layers.push(console);
        }

        let file_guard = match Self::build_file_layer(&config).await? {
            Some((file, guard)) => {
                layers.push(file);
                Some(guard)
            }
            None => None,
        };

        tracing_subscriber::registry()
            .with(layers)
            .try_init()
            .map_err(|e| Error::System {
                message: format!("Failed to initialize tracing subscriber: {}", e),
            })?;

        let metrics = if config.enabled && config.metrics.enabled {
            let recorder = LifecycleMetricsRecorder::new();
            recorder.install()?;
            Some(recorder)
        } else {
            None
        };

        tracing::info!(
            telemetry.event = "system_initialized",
            telemetry.version = env!("CARGO_PKG_VERSION"),
            telemetry.format = ?config.logging.format,
            telemetry.metrics = metrics.is_some(),
            "Telemetry system initialized"
        );

        Ok(TelemetryGuard {
            _file_guard: file_guard,
            metrics,
        })
    }

    /// `RUST_LOG` wins over the configured level
    fn build_env_filter(config: &TelemetryConfig) -> Result<EnvFilter> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }

        let level: Level = config.logging.level.into();
        EnvFilter::try_new(level.as_str().to_lowercase()).map_err(|e| Error::Config {
            message: format!("Invalid log filter: {}", e),
        })
    }

    fn build_console_layer(config: &TelemetryConfig) -> Result<Option<BoxedLayer>> {
        if !config.enabled || !config.logging.console_enabled {
            return Ok(None);
        }

        let logging = &config.logging;
        let filter = Self::build_env_filter(config)?;

        let layer = match logging.format {
            LogFormat::Json => fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(true)
                .with_span_list(false)
                .with_target(true)
                .with_file(logging.include_location)
                .with_line_number(logging.include_location)
                .with_thread_ids(logging.include_thread_info)
                .with_thread_names(logging.include_thread_info)
                .with_filter(filter)
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .pretty()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(logging.include_location)
                .with_line_number(logging.include_location)
                .with_thread_ids(logging.include_thread_info)
                .with_thread_names(logging.include_thread_info)
                .with_filter(filter)
                .boxed(),
            LogFormat::Compact => fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_file(logging.include_location)
                .with_line_number(logging.include_location)
                .with_thread_ids(logging.include_thread_info)
                .with_thread_names(logging.include_thread_info)
                .with_filter(filter)
                .boxed(),
        };

        Ok(Some(layer))
    }

    /// Daily-rolled file layer, always JSON
    async fn build_file_layer(
        config: &TelemetryConfig,
    ) -> Result<Option<(BoxedLayer, WorkerGuard)>> {
        if !config.enabled || !config.logging.file_enabled {
            return Ok(None);
        }

        tokio::fs::create_dir_all(&config.logging.log_dir).await?;

        let appender = tracing_appender::rolling::daily(
            &config.logging.log_dir,
            format!("{}.log", config.logging.log_file_name),
        );
        let (writer, guard) = tracing_appender::non_blocking(appender);

        let layer = fmt::layer()
            .json()
            .with_writer(writer)
            .with_ansi(false)
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .with_file(config.logging.include_location)
            .with_line_number(config.logging.include_location)
            .with_filter(Self::build_env_filter(config)?)
            .boxed();

        Ok(Some((layer, guard)))
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(
            telemetry.event = "system_shutdown",
            "Telemetry system shutting down"
        );
    }
}
