//! Styled terminal output with an optional structured copy
//!
//! Colors are resolved from the registry into a [`ResolvedColors`] before a
//! line is rendered; rendering itself never touches the registry.

use crate::sink::JsonSink;
use crossterm::style::{Color, Stylize};
use lifecycle_core::{ColorRegistry, Event, LifecycleError, Result};
use std::fmt;
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

/// Severity shown on a styled line, derived from the event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn from_event_type(event_type: &str) -> Self {
        let contains_any = |needles: &[&str]| needles.iter().any(|n| event_type.contains(n));

        if contains_any(&["error", "errored", "failed", "crashed"]) {
            Level::Error
        } else if contains_any(&["warn"]) {
            Level::Warn
        } else if contains_any(&["debug", "trace"]) {
            Level::Debug
        } else {
            Level::Info
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }

    fn color(self) -> Color {
        match self {
            Level::Debug => Color::DarkGrey,
            Level::Info => Color::Cyan,
            Level::Warn => Color::Yellow,
            Level::Error => Color::Red,
        }
    }
}

/// Every color a styled line needs, looked up ahead of rendering.
/// `None` means the field is printed unstyled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedColors {
    pub event: Option<String>,
    pub service: Option<String>,
    pub api: Option<String>,
    pub status: Option<String>,
    pub status_code: Option<String>,
}

impl ResolvedColors {
    pub fn resolve(event: &Event, registry: &ColorRegistry) -> Self {
        Self {
            event: registry.event_color(event.event_type()),
            service: registry.service_color(event.service()),
            api: Some(event.api())
                .filter(|api| !api.is_empty())
                .and_then(|api| registry.api_color(api)),
            status: display_status(event).map(|status| registry.status_color(status)),
            status_code: status_code(event).and_then(|code| registry.status_code_color(code)),
        }
    }
}

/// Status shown on the line: the outcome status, or for resource events
/// the kind of mutation
fn display_status(event: &Event) -> Option<&'static str> {
    match event {
        Event::ResourceCreated(_) => Some("created"),
        Event::ResourceUpdated(_) => Some("updated"),
        Event::ResourceDeleted(_) => Some("deleted"),
        other => other.status().map(|status| status.as_str()),
    }
}

fn status_code(event: &Event) -> Option<u16> {
    match event {
        Event::RequestHandled(e) => Some(e.status_code),
        Event::RequestErrored(e) => Some(e.status_code),
        _ => None,
    }
}

/// `#RRGGBB` or a crossterm color name such as `dark_green`
pub fn parse_color(color: &str) -> Option<Color> {
    if let Some(hex) = color.strip_prefix('#') {
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        return Some(Color::Rgb {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        });
    }

    Color::try_from(color).ok()
}

fn paint(text: &str, color: Option<&str>) -> String {
    match color.and_then(parse_color) {
        Some(color) => text.with(color).to_string(),
        None => text.to_string(),
    }
}

/// Values with whitespace, `=` or quotes are quoted so a line stays parseable
fn quote(value: &str) -> String {
    if value.is_empty() || value.contains(|c: char| c.is_whitespace() || c == '=' || c == '"') {
        format!("{:?}", value)
    } else {
        value.to_string()
    }
}

struct Fields(Vec<(&'static str, String)>);

impl Fields {
    fn plain(&mut self, key: &'static str, value: impl fmt::Display) {
        self.0.push((key, quote(&value.to_string())));
    }

    fn colored(&mut self, key: &'static str, value: &str, color: Option<&str>) {
        self.0.push((key, paint(&quote(value), color)));
    }

    fn optional(&mut self, key: &'static str, value: Option<&str>) {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.plain(key, value);
        }
    }

    fn positive(&mut self, key: &'static str, value: u64) {
        if value > 0 {
            self.plain(key, value);
        }
    }
}

/// Render a single styled line, without a trailing newline
pub fn render_line(event: &Event, colors: &ResolvedColors) -> String {
    let level = Level::from_event_type(event.event_type());
    let mut fields = Fields(Vec::new());

    fields.colored("service", event.service(), colors.service.as_deref());
    if !event.api().is_empty() {
        fields.colored("api", event.api(), colors.api.as_deref());
    }
    if !event.host().is_empty() {
        fields.plain("host", event.host());
    }
    fields.optional("correlation_id", event.correlation_id());

    variant_fields(event, colors, &mut fields);

    if let Some(status) = display_status(event) {
        fields.colored("status", status, colors.status.as_deref());
    }

    let mut line = format!(
        "{} {} {}",
        event.timestamp().format("%H:%M:%S%.3f"),
        format!("{:<5}", level.as_str()).with(level.color()).bold(),
        paint(event.event_type(), colors.event.as_deref()),
    );
    for (key, value) in fields.0 {
        line.push(' ');
        line.push_str(key);
        line.push('=');
        line.push_str(&value);
    }
    line
}

fn variant_fields(event: &Event, colors: &ResolvedColors, fields: &mut Fields) {
    let status_code_color = colors.status_code.as_deref();

    match event {
        Event::ServiceStarted(e) => {
            fields.optional("version", Some(e.version.as_str()));
            fields.positive("pid", u64::from(e.pid));
        }
        Event::ServiceHealthy(e) => {
            if !e.health_checks.is_empty() {
                fields.plain("health_checks", e.health_checks.join(","));
            }
        }
        Event::ServiceShutdown(e) => {
            fields.optional("reason", Some(e.reason.as_str()));
            if e.exit_code != 0 {
                fields.plain("exit_code", e.exit_code);
            }
        }
        Event::ServiceCrashed(e) => {
            fields.optional("reason", Some(e.reason.as_str()));
            fields.optional("stack_trace", Some(e.stack_trace.as_str()));
            if e.exit_code != 0 {
                fields.plain("exit_code", e.exit_code);
            }
        }
        Event::RequestReceived(e) => {
            fields.optional("method", Some(e.method.as_str()));
            fields.optional("path", Some(e.path.as_str()));
            fields.optional("user_agent", e.user_agent.as_deref());
            fields.optional("remote_addr", e.remote_addr.as_deref());
        }
        Event::RequestHandled(e) => {
            fields.colored("status_code", &e.status_code.to_string(), status_code_color);
            fields.positive("duration_ms", e.duration_ms);
            fields.positive("response_size_bytes", e.response_size_bytes.unwrap_or(0));
            fields.optional("actor", e.actor.as_ref().map(|a| a.user_id()));
            fields.optional("resource", e.resource.as_ref().map(|r| r.id.as_str()));
        }
        Event::RequestErrored(e) => {
            fields.colored("status_code", &e.status_code.to_string(), status_code_color);
            fields.positive("duration_ms", e.duration_ms);
            fields.optional("error", Some(e.error_message.as_str()));
            fields.optional("error_code", e.error_code.as_deref());
        }
        Event::RequestRetried(e) => {
            fields.plain("retry_count", e.retry_count);
            fields.positive("delay_ms", e.delay_ms);
            fields.optional("retry_reason", e.retry_reason.as_deref());
        }
        Event::QueryStarted(e) => {
            fields.optional("query_id", Some(e.query_id.as_str()));
            fields.optional("query", Some(e.query.as_str()));
        }
        Event::QueryCompleted(e) => {
            fields.optional("query_id", Some(e.query_id.as_str()));
            fields.positive("duration_ms", e.duration_ms);
            fields.positive("rows_affected", e.rows_affected.unwrap_or(0));
        }
        Event::QueryErrored(e) => {
            fields.optional("query_id", Some(e.query_id.as_str()));
            fields.positive("duration_ms", e.duration_ms);
            fields.optional("error", Some(e.error_message.as_str()));
            fields.optional("error_code", e.error_code.as_deref());
        }
        Event::TransactionStarted(e) => {
            fields.optional("transaction_id", Some(e.transaction_id.as_str()));
        }
        Event::TransactionCommitted(e) => {
            fields.optional("transaction_id", Some(e.transaction_id.as_str()));
            fields.positive("duration_ms", e.duration_ms);
        }
        Event::TransactionRolledBack(e) => {
            fields.optional("transaction_id", Some(e.transaction_id.as_str()));
            fields.optional("reason", e.reason.as_deref());
            fields.positive("duration_ms", e.duration_ms);
        }
        Event::ResourceCreated(e) => {
            fields.optional("resource", Some(e.resource.id.as_str()));
        }
        Event::ResourceUpdated(e) => {
            fields.optional("resource", Some(e.resource.id.as_str()));
            if !e.updated_fields.is_empty() {
                fields.plain("updated_fields", e.updated_fields.join(","));
            }
        }
        Event::ResourceDeleted(e) => {
            fields.optional("resource", Some(e.resource.id.as_str()));
            if e.soft_delete {
                fields.plain("soft_delete", true);
            }
        }
    }
}

/// Styled lines for people on the primary writer, the structured record
/// for machines on an optional secondary writer.
pub struct StyledOutput {
    writer: Mutex<Box<dyn Write + Send>>,
    json: Option<JsonSink>,
    json_only: bool,
}

impl StyledOutput {
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
            json: None,
            json_only: false,
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Secondary writer receiving every structured record
    pub fn with_json_output(mut self, sink: JsonSink) -> Self {
        self.json = Some(sink);
        self
    }

    /// Skip the styled line; only the secondary writer (if any) is written
    pub fn json_only(mut self, json_only: bool) -> Self {
        self.json_only = json_only;
        self
    }

    pub fn write_event(&self, event: &Event, colors: &ResolvedColors) -> Result<()> {
        if let Some(json) = &self.json {
            json.write_event(event)?;
        }

        if self.json_only {
            return Ok(());
        }

        let line = render_line(event, colors);
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{}", line)
            .and_then(|_| writer.flush())
            .map_err(|e| LifecycleError::Sink {
                message: format!("failed to write styled event: {}", e),
            })
    }
}

impl fmt::Debug for StyledOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StyledOutput")
            .field("json", &self.json)
            .field("json_only", &self.json_only)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifecycle_core::{
        BaseEnvelope, EventKind, RequestHandled, Resource, ResourceDeleted, ServiceCrashed,
    };
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Buffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn base(kind: EventKind) -> BaseEnvelope {
        BaseEnvelope::new(kind, "orders").unwrap().with_host("pod-1")
    }

    fn handled(status_code: u16) -> Event {
        RequestHandled::new(
            base(EventKind::RequestHandled).with_api("Order"),
            None,
            Some(Resource::new("Order", "ord-1")),
            status_code,
            12,
            None,
        )
        .into()
    }

    #[test]
    fn test_level_from_event_type() {
        assert_eq!(Level::from_event_type("api.request.errored"), Level::Error);
        assert_eq!(Level::from_event_type("service.crashed"), Level::Error);
        assert_eq!(Level::from_event_type("job.failed"), Level::Error);
        assert_eq!(Level::from_event_type("cache.warning"), Level::Warn);
        assert_eq!(Level::from_event_type("db.trace"), Level::Debug);
        assert_eq!(Level::from_event_type("resource.created"), Level::Info);
        assert_eq!(Level::from_event_type("service.started"), Level::Info);
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#3B82F6"), Some(Color::Rgb { r: 0x3B, g: 0x82, b: 0xF6 }));
        assert_eq!(parse_color("red"), Some(Color::Red));
        assert_eq!(parse_color("#12345"), None);
        assert_eq!(parse_color("#GGGGGG"), None);
        assert_eq!(parse_color("not-a-color"), None);
    }

    #[test]
    fn test_resolve_colors() {
        let registry = ColorRegistry::new();
        registry.register_service_color("orders", "#111111");
        registry.register_api_color("Order", "#222222");

        let colors = ResolvedColors::resolve(&handled(404), &registry);
        assert_eq!(colors.service.as_deref(), Some("#111111"));
        assert_eq!(colors.api.as_deref(), Some("#222222"));
        assert_eq!(colors.event, None);
        assert_eq!(colors.status, Some(registry.status_color("success")));
        assert_eq!(colors.status_code, Some(registry.status_color("warning")));
    }

    #[test]
    fn test_resource_events_use_mutation_status() {
        let registry = ColorRegistry::new();
        let event: Event = ResourceDeleted {
            base: base(EventKind::ResourceDeleted),
            actor: None,
            resource: Resource::new("Order", "ord-1"),
            soft_delete: true,
            final_data: None,
        }
        .into();

        let colors = ResolvedColors::resolve(&event, &registry);
        assert_eq!(colors.status, Some(registry.status_color("deleted")));

        let line = render_line(&event, &ResolvedColors::default());
        assert!(line.contains("resource=ord-1"));
        assert!(line.contains("soft_delete=true"));
        assert!(line.contains("status=deleted"));
    }

    #[test]
    fn test_render_line_plain() {
        let line = render_line(&handled(201), &ResolvedColors::default());

        assert!(line.contains("INFO"));
        assert!(line.contains("api.request.handled"));
        assert!(line.contains("service=orders"));
        assert!(line.contains("api=Order"));
        assert!(line.contains("host=pod-1"));
        assert!(line.contains("status_code=201"));
        assert!(line.contains("duration_ms=12"));
        assert!(line.contains("resource=ord-1"));
        assert!(line.contains("status=success"));
        assert!(!line.contains("correlation_id"));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_values_with_spaces_are_quoted() {
        let event: Event = ServiceCrashed {
            base: base(EventKind::ServiceCrashed),
            reason: "out of memory".to_string(),
            stack_trace: String::new(),
            exit_code: 137,
        }
        .into();

        let line = render_line(&event, &ResolvedColors::default());
        assert!(line.contains("ERROR"));
        assert!(line.contains("reason=\"out of memory\""));
        assert!(line.contains("exit_code=137"));
        assert!(!line.contains("stack_trace"));
    }

    #[test]
    fn test_dual_output() {
        let terminal = Buffer::default();
        let json = Buffer::default();
        let output = StyledOutput::new(terminal.clone()).with_json_output(JsonSink::new(json.clone()));

        output.write_event(&handled(200), &ResolvedColors::default()).unwrap();

        let record: serde_json::Value = serde_json::from_str(json.contents().trim()).unwrap();
        assert_eq!(record["status_code"], 200);
        assert!(terminal.contents().contains("api.request.handled"));
        assert!(!terminal.contents().trim_start().starts_with('{'));
    }

    #[test]
    fn test_json_only_skips_styling() {
        let terminal = Buffer::default();
        let json = Buffer::default();
        let output = StyledOutput::new(terminal.clone())
            .with_json_output(JsonSink::new(json.clone()))
            .json_only(true);

        output.write_event(&handled(200), &ResolvedColors::default()).unwrap();

        assert!(terminal.contents().is_empty());
        assert_eq!(json.contents().lines().count(), 1);
    }
}
