use anyhow::Result;
use clap::Parser;
use lifecycle_core::{Actor, ColorDefinitions, ColorRegistry, EventContext, Resource};
use lifecycle_producer::{
    EmitOptions, LifecycleConfig, OutputMode, Producer, ProducerBuilder, RequestOutcome,
    ResourceChange,
};
use lifecycle_redaction::{from_schema_flags, sensitive_fields};
use lifecycle_telemetry::{LifecycleMetricsRecorder, TelemetryConfig, TelemetrySystem};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Emit one of every lifecycle event", long_about = None)]
#[command(
    after_help = "OUTPUT:\n  json     One JSON record per line on stdout (or --json-file)\n  styled   Colored lines on stdout, with an optional JSON copy in --json-file\n\nDiagnostics go to stderr so stdout carries only the event stream."
)]
struct Cli {
    /// Configuration file path
    #[arg(long, help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, help = "Service name stamped on every event")]
    service: Option<String>,

    #[arg(long, help = "Host or instance identifier")]
    host: Option<String>,

    #[arg(long, help = "Default API for events that name none")]
    api: Option<String>,

    #[arg(long, value_enum, help = "Event output mode")]
    output: Option<OutputArg>,

    #[arg(long, help = "Write JSON records to this file")]
    json_file: Option<PathBuf>,

    /// Only meaningful with `--output styled`
    #[arg(long, requires = "json_file", help = "Write only the JSON copy, no styled lines")]
    json_only: bool,

    #[arg(long, help = "TOML file with [services], [apis], [events] and [statuses] colors")]
    colors: Option<PathBuf>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(long, help = "Set log level")]
    log_level: Option<String>,

    /// Set log format (json, pretty, compact)
    #[arg(long, help = "Set log output format")]
    log_format: Option<String>,

    #[arg(long, help = "Print collected metrics to stderr before exiting")]
    metrics_summary: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OutputArg {
    #[value(help = "One JSON record per line")]
    Json,
    #[value(help = "Colored terminal lines")]
    Styled,
}

impl From<OutputArg> for OutputMode {
    fn from(arg: OutputArg) -> Self {
        match arg {
            OutputArg::Json => OutputMode::Json,
            OutputArg::Styled => OutputMode::Styled,
        }
    }
}

/// Create telemetry configuration from CLI arguments
fn create_telemetry_config(cli: &Cli) -> TelemetryConfig {
    let mut config = TelemetryConfig::default();

    if let Some(level) = &cli.log_level {
        match level.parse() {
            Ok(level) => config.logging.level = level,
            Err(_) => warn!("Invalid log level '{}', using default", level),
        }
    }

    if let Some(format) = &cli.log_format {
        match format.parse() {
            Ok(format) => config.logging.format = format,
            Err(_) => warn!("Invalid log format '{}', using default", format),
        }
    }

    if cli.metrics_summary {
        config.metrics.enabled = true;
    }

    config.load_env_overrides();
    config
}

/// Load the producer configuration and apply CLI overrides on top
async fn create_lifecycle_config(cli: &Cli) -> Result<LifecycleConfig> {
    let mut config = LifecycleConfig::load(cli.config.as_deref()).await?;

    if let Some(service) = &cli.service {
        config.producer.service = service.clone();
    }
    if let Some(host) = &cli.host {
        config.producer.host = host.clone();
    }
    if let Some(api) = &cli.api {
        config.producer.api = api.clone();
    }
    if let Some(output) = cli.output {
        config.output.mode = output.into();
    }
    if let Some(json_file) = &cli.json_file {
        config.output.json_path = Some(json_file.clone());
    }
    if cli.json_only {
        config.output.json_only = true;
    }

    if let Some(path) = &cli.colors {
        let definitions = ColorDefinitions::load(path).await?;
        merge_colors(&mut config.colors, definitions);
    }

    config.validate()?;
    Ok(config)
}

/// Entries from `extra` win over existing ones
fn merge_colors(base: &mut ColorDefinitions, extra: ColorDefinitions) {
    base.services.extend(extra.services);
    base.apis.extend(extra.apis);
    base.events.extend(extra.events);
    base.statuses.extend(extra.statuses);
}

fn register_demo_colors(colors: &ColorRegistry, service: &str) {
    colors.register_service_color(service, "#3B82F6");
    colors.register_api_color("examples.User", "#10B981");
    colors.register_api_color("examples.Order", "#F59E0B");

    for (event_type, color) in [
        ("service.started", "#3B82F6"),
        ("service.healthy", "#10B981"),
        ("service.shutdown", "#6B7280"),
        ("api.request.received", "#6366F1"),
        ("api.request.handled", "#10B981"),
        ("api.request.errored", "#EF4444"),
        ("db.query.started", "#8B5CF6"),
        ("db.query.completed", "#10B981"),
        ("resource.created", "#10B981"),
    ] {
        colors.register_event_color(event_type, color);
    }
}

/// Emit every event kind once
fn run_demo(producer: &Producer) -> lifecycle_core::Result<()> {
    let ctx = EventContext::correlated().with_timeout(Duration::from_secs(30));

    producer.emit_service_started(&ctx, env!("CARGO_PKG_VERSION"), std::process::id())?;
    producer.emit_service_healthy(&ctx, vec!["database".to_string(), "cache".to_string()])?;

    let request = ctx
        .child()
        .with_user_agent("lifecycle-demo/1.0")
        .with_remote_addr("10.0.0.7");
    let actor = Actor::human("user-456");
    let user = Resource::new("User", "user-789");
    let user_api = || EmitOptions::new().api("examples.User");

    producer.emit_request_received(&request, "GET", "/api/users/user-789", user_api())?;
    producer.emit_request_handled(
        &request,
        RequestOutcome {
            actor: Some(actor.clone()),
            resource: Some(user.clone()),
            status_code: 200,
            duration_ms: 10,
            response_size_bytes: Some(1024),
        },
        user_api(),
    )?;
    producer.emit_request_retried(&request, 1, 100, Some("upstream timeout"), user_api())?;
    producer.emit_request_errored(
        &request,
        "database connection failed",
        Some("DB_CONN_ERROR"),
        500,
        50,
        user_api().correlation_id("req-456"),
    )?;

    producer.emit_transaction_started(&request, "tx-001")?;
    producer.emit_query_started(
        &request,
        "query-001",
        "SELECT * FROM users WHERE email = ?",
        Some(vec![json!("user@example.com")]),
    )?;
    producer.emit_query_completed(&request, "query-001", 5, Some(1))?;
    producer.emit_query_errored(
        &request,
        "query-002",
        "deadlock detected",
        Some("40P01"),
        12,
    )?;
    producer.emit_transaction_rolled_back(&request, "tx-001", Some("deadlock"), 18)?;
    producer.emit_transaction_committed(&request, "tx-002", 7)?;

    let schema_flags = json!({
        "email": {"pii": true, "encrypted": true, "redactable": true},
        "phone": {"pii": true, "encrypted": true, "redactable": true},
        "name": {"pii": true, "redactable": true},
        "id": {"immutable": true, "output_only": true},
    });
    let sensitivity = from_schema_flags(&schema_flags);
    info!(
        telemetry.event = "demo_schema_loaded",
        sensitive_fields = ?sensitive_fields(&sensitivity),
        "Loaded field sensitivity"
    );

    let user_data = json!({
        "id": "user-789",
        "name": "John Doe",
        "email": "john.doe@example.com",
        "phone": "+1234567890",
    });
    let change = || {
        ResourceChange::new(user.clone())
            .by(actor.clone())
            .with_sensitivity(&sensitivity)
    };

    producer.emit_resource_created(&request, change(), user_data.as_object().cloned(), user_api())?;
    producer.emit_resource_updated(
        &request,
        change(),
        user_data.as_object().cloned(),
        json!({"id": "user-789", "name": "John Doe", "email": "jd@example.com"})
            .as_object()
            .cloned(),
        vec!["email".to_string()],
        user_api(),
    )?;
    producer.emit_resource_deleted(
        &request,
        ResourceChange::new(Resource::new("Order", "order-42")).by(Actor::system("reaper")),
        true,
        json!({"total": 99.5, "shipping_address": "1 Infinite Loop"})
            .as_object()
            .cloned(),
        EmitOptions::new(),
    )?;

    producer.emit_service_crashed(&ctx, "worker panicked", "demo stack trace", 101)?;
    producer.emit_service_shutdown(&ctx, "graceful", 0)?;

    Ok(())
}

fn print_metrics_summary(metrics: &LifecycleMetricsRecorder) {
    let summary = metrics.get_summary();
    eprintln!("events recorded: {}", summary.events_recorded);
    eprintln!(
        "counters: {}  gauges: {}  histograms: {}  uptime: {}s",
        summary.counter_count, summary.gauge_count, summary.histogram_count, summary.uptime_seconds
    );
    eprint!("{}", metrics.export_prometheus());
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables before parsing configuration
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let telemetry_guard = TelemetrySystem::init(create_telemetry_config(&cli))
        .await
        .map_err(|e| {
            eprintln!("Failed to initialize telemetry system: {}", e);
            anyhow::anyhow!("Telemetry initialization failed: {}", e)
        })?;

    let config = create_lifecycle_config(&cli).await.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        telemetry.event = "demo_started",
        service = %config.producer.service,
        output = ?config.output.mode,
        json_path = ?config.output.json_path,
        "Starting lifecycle demo"
    );

    let producer = ProducerBuilder::from_config(&config)?.build()?;
    register_demo_colors(producer.colors(), producer.service());

    if let Err(e) = run_demo(&producer) {
        error!("Demo emission failed: {}", e);
        return Err(e.into());
    }

    info!(telemetry.event = "demo_finished", "Lifecycle demo finished");

    if cli.metrics_summary {
        match telemetry_guard.metrics() {
            Some(metrics) => print_metrics_summary(metrics),
            None => warn!("Metrics are disabled; no summary to print"),
        }
    }

    Ok(())
}
