//! Emission orchestrator
//!
//! Every `emit_*` call runs the same pipeline on the caller's thread:
//! build the event, redact its payloads, record a span and metrics, then
//! write it to the configured output. The span closes on every exit path.

use crate::config::{LifecycleConfig, OutputMode};
use crate::sink::JsonSink;
use crate::styled::{ResolvedColors, StyledOutput};
use lifecycle_core::{
    Actor, BaseEnvelope, ColorRegistry, Event, EventContext, EventKind, LifecycleError, Payload,
    PayloadMut, QueryCompleted, QueryErrored, QueryStarted, RequestErrored, RequestHandled,
    RequestReceived, RequestRetried, Resource, ResourceCreated, ResourceDeleted, ResourceUpdated,
    Result, ServiceCrashed, ServiceHealthy, ServiceShutdown, ServiceStarted, TransactionCommitted,
    TransactionRolledBack, TransactionStarted,
};
use lifecycle_redaction::{Redactor, SensitivityMap};
use lifecycle_telemetry::{
    counter_name, event_attributes, histogram_name, span_name, SpanGuard, Telemetry,
    TracingTelemetry,
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Where emitted events go. Exactly one mode per producer.
#[derive(Debug)]
pub enum Output {
    /// One JSON record per line
    Json(JsonSink),
    /// Styled lines, optionally with a JSON copy
    Styled(StyledOutput),
}

/// Per-call overrides for request and resource events
#[derive(Debug, Clone, Default)]
pub struct EmitOptions {
    /// Takes precedence over the producer's default API
    pub api: Option<String>,
    /// Takes precedence over the context's correlation id
    pub correlation_id: Option<String>,
    pub metadata: Option<Payload>,
}

impl EmitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api(mut self, api: impl Into<String>) -> Self {
        self.api = Some(api.into());
        self
    }

    pub fn correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn metadata(mut self, metadata: Payload) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Result of a handled request
#[derive(Debug, Clone, Default)]
pub struct RequestOutcome {
    pub actor: Option<Actor>,
    pub resource: Option<Resource>,
    pub status_code: u16,
    pub duration_ms: u64,
    pub response_size_bytes: Option<u64>,
}

/// Who changed which resource, and how its payload fields are classified
#[derive(Debug, Clone)]
pub struct ResourceChange<'a> {
    pub actor: Option<Actor>,
    pub resource: Resource,
    pub sensitivity: Option<&'a SensitivityMap>,
}

impl<'a> ResourceChange<'a> {
    pub fn new(resource: Resource) -> Self {
        Self {
            actor: None,
            resource,
            sensitivity: None,
        }
    }

    pub fn by(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn with_sensitivity(mut self, sensitivity: &'a SensitivityMap) -> Self {
        self.sensitivity = Some(sensitivity);
        self
    }
}

/// Emits lifecycle events for one service instance.
///
/// Safe to share between threads; registries may be updated while
/// emitting.
pub struct Producer {
    service: String,
    host: String,
    api: String,
    output: Output,
    colors: Arc<ColorRegistry>,
    redactor: Redactor,
    telemetry: Arc<dyn Telemetry>,
}

pub struct ProducerBuilder {
    service: String,
    host: String,
    api: String,
    output: Option<Output>,
    colors: Option<Arc<ColorRegistry>>,
    redactor: Option<Redactor>,
    telemetry: Option<Arc<dyn Telemetry>>,
}

impl ProducerBuilder {
    fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            host: String::new(),
            api: String::new(),
            output: None,
            colors: None,
            redactor: None,
            telemetry: None,
        }
    }

    /// Builder configured from `config`. Opens the JSON file when one is
    /// configured.
    pub fn from_config(config: &LifecycleConfig) -> Result<Self> {
        config.validate()?;

        let json_file = config
            .output
            .json_path
            .as_deref()
            .map(JsonSink::create)
            .transpose()?;

        let output = match config.output.mode {
            OutputMode::Json => Output::Json(json_file.unwrap_or_else(JsonSink::stdout)),
            OutputMode::Styled => {
                let mut styled = StyledOutput::stdout().json_only(config.output.json_only);
                if let Some(json) = json_file {
                    styled = styled.with_json_output(json);
                }
                Output::Styled(styled)
            }
        };

        let colors = ColorRegistry::new();
        colors.apply(&config.colors);

        Ok(Self::new(config.producer.service.as_str())
            .host(config.producer.host.as_str())
            .api(config.producer.api.as_str())
            .output(output)
            .colors(Arc::new(colors))
            .redactor(config.redaction.build_redactor()?))
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Default API for events that name none
    pub fn api(mut self, api: impl Into<String>) -> Self {
        self.api = api.into();
        self
    }

    pub fn output(mut self, output: Output) -> Self {
        self.output = Some(output);
        self
    }

    pub fn json_output(self, sink: JsonSink) -> Self {
        self.output(Output::Json(sink))
    }

    pub fn styled_output(self, styled: StyledOutput) -> Self {
        self.output(Output::Styled(styled))
    }

    pub fn colors(mut self, colors: Arc<ColorRegistry>) -> Self {
        self.colors = Some(colors);
        self
    }

    pub fn redactor(mut self, redactor: Redactor) -> Self {
        self.redactor = Some(redactor);
        self
    }

    pub fn telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Defaults: JSON on stdout, an empty color registry, the built-in
    /// redactor and `tracing`-backed telemetry
    pub fn build(self) -> Result<Producer> {
        if self.service.trim().is_empty() {
            return Err(LifecycleError::Config {
                message: "producer requires a non-empty service".to_string(),
            });
        }

        let producer = Producer {
            service: self.service,
            host: self.host,
            api: self.api,
            output: self.output.unwrap_or_else(|| Output::Json(JsonSink::stdout())),
            colors: self.colors.unwrap_or_default(),
            redactor: self.redactor.unwrap_or_default(),
            telemetry: self
                .telemetry
                .unwrap_or_else(|| Arc::new(TracingTelemetry::new())),
        };

        tracing::debug!(
            telemetry.event = "producer_initialized",
            service = %producer.service,
            host = %producer.host,
            api = %producer.api,
            output = producer.output_name(),
            "Lifecycle producer initialized"
        );

        Ok(producer)
    }
}

impl Producer {
    pub fn builder(service: impl Into<String>) -> ProducerBuilder {
        ProducerBuilder::new(service)
    }

    /// Producer with default telemetry, configured from `config`
    pub fn from_config(config: &LifecycleConfig) -> Result<Self> {
        ProducerBuilder::from_config(config)?.build()
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn api(&self) -> &str {
        &self.api
    }

    /// Shared registry; colors registered here apply to the next emission
    pub fn colors(&self) -> &Arc<ColorRegistry> {
        &self.colors
    }

    pub fn redactor(&self) -> &Redactor {
        &self.redactor
    }

    fn output_name(&self) -> &'static str {
        match self.output {
            Output::Json(_) => "json",
            Output::Styled(_) => "styled",
        }
    }

    /// Envelope for `kind`. API precedence: the explicit option, then the
    /// producer default, then `fallback_api`.
    fn envelope(
        &self,
        kind: EventKind,
        ctx: &EventContext,
        opts: EmitOptions,
        fallback_api: Option<&Resource>,
    ) -> Result<BaseEnvelope> {
        let api = opts
            .api
            .filter(|api| !api.is_empty())
            .or_else(|| Some(self.api.clone()).filter(|api| !api.is_empty()))
            .or_else(|| fallback_api.map(|resource| resource.resource_type.clone()))
            .unwrap_or_default();

        let correlation_id = opts
            .correlation_id
            .filter(|id| !id.is_empty())
            .or_else(|| ctx.correlation_str().map(str::to_string));

        Ok(BaseEnvelope::new(kind, self.service.as_str())?
            .with_host(self.host.as_str())
            .with_api(api)
            .with_correlation_id(correlation_id)
            .with_metadata(opts.metadata))
    }

    fn service_envelope(&self, kind: EventKind, ctx: &EventContext) -> Result<BaseEnvelope> {
        self.envelope(kind, ctx, EmitOptions::default(), None)
    }

    // Service lifecycle

    pub fn emit_service_started(&self, ctx: &EventContext, version: &str, pid: u32) -> Result<()> {
        let event = ServiceStarted {
            base: self.service_envelope(EventKind::ServiceStarted, ctx)?,
            version: version.to_string(),
            pid,
        };
        self.dispatch(ctx, event.into(), None)
    }

    pub fn emit_service_healthy(&self, ctx: &EventContext, health_checks: Vec<String>) -> Result<()> {
        let event = ServiceHealthy {
            base: self.service_envelope(EventKind::ServiceHealthy, ctx)?,
            health_checks,
        };
        self.dispatch(ctx, event.into(), None)
    }

    pub fn emit_service_shutdown(&self, ctx: &EventContext, reason: &str, exit_code: i32) -> Result<()> {
        let event = ServiceShutdown {
            base: self.service_envelope(EventKind::ServiceShutdown, ctx)?,
            reason: reason.to_string(),
            exit_code,
        };
        self.dispatch(ctx, event.into(), None)
    }

    pub fn emit_service_crashed(
        &self,
        ctx: &EventContext,
        reason: &str,
        stack_trace: &str,
        exit_code: i32,
    ) -> Result<()> {
        let event = ServiceCrashed {
            base: self.service_envelope(EventKind::ServiceCrashed, ctx)?,
            reason: reason.to_string(),
            stack_trace: stack_trace.to_string(),
            exit_code,
        };
        self.dispatch(ctx, event.into(), None)
    }

    // API requests

    /// User agent and remote address come from `ctx`
    pub fn emit_request_received(
        &self,
        ctx: &EventContext,
        method: &str,
        path: &str,
        opts: EmitOptions,
    ) -> Result<()> {
        let event = RequestReceived {
            base: self.envelope(EventKind::RequestReceived, ctx, opts, None)?,
            method: method.to_string(),
            path: path.to_string(),
            user_agent: ctx.user_agent.clone(),
            remote_addr: ctx.remote_addr.clone(),
        };
        self.dispatch(ctx, event.into(), None)
    }

    pub fn emit_request_handled(
        &self,
        ctx: &EventContext,
        outcome: RequestOutcome,
        opts: EmitOptions,
    ) -> Result<()> {
        let base = self.envelope(EventKind::RequestHandled, ctx, opts, outcome.resource.as_ref())?;
        let event = RequestHandled::new(
            base,
            outcome.actor,
            outcome.resource,
            outcome.status_code,
            outcome.duration_ms,
            outcome.response_size_bytes,
        );
        self.dispatch(ctx, event.into(), None)
    }

    pub fn emit_request_errored(
        &self,
        ctx: &EventContext,
        error_message: &str,
        error_code: Option<&str>,
        status_code: u16,
        duration_ms: u64,
        opts: EmitOptions,
    ) -> Result<()> {
        let event = RequestErrored::new(
            self.envelope(EventKind::RequestErrored, ctx, opts, None)?,
            error_message,
            error_code.map(str::to_string),
            status_code,
            duration_ms,
        );
        self.dispatch(ctx, event.into(), None)
    }

    pub fn emit_request_retried(
        &self,
        ctx: &EventContext,
        retry_count: u32,
        delay_ms: u64,
        retry_reason: Option<&str>,
        opts: EmitOptions,
    ) -> Result<()> {
        let event = RequestRetried {
            base: self.envelope(EventKind::RequestRetried, ctx, opts, None)?,
            retry_count,
            delay_ms,
            retry_reason: retry_reason.map(str::to_string),
        };
        self.dispatch(ctx, event.into(), None)
    }

    // Database

    /// Scalar parameters matching a PII value shape are redacted
    pub fn emit_query_started(
        &self,
        ctx: &EventContext,
        query_id: &str,
        query: &str,
        params: Option<Vec<Value>>,
    ) -> Result<()> {
        let event = QueryStarted {
            base: self.service_envelope(EventKind::QueryStarted, ctx)?,
            query_id: query_id.to_string(),
            query: query.to_string(),
            params,
        };
        self.dispatch(ctx, event.into(), None)
    }

    pub fn emit_query_completed(
        &self,
        ctx: &EventContext,
        query_id: &str,
        duration_ms: u64,
        rows_affected: Option<u64>,
    ) -> Result<()> {
        let event = QueryCompleted::new(
            self.service_envelope(EventKind::QueryCompleted, ctx)?,
            query_id,
            duration_ms,
            rows_affected,
        );
        self.dispatch(ctx, event.into(), None)
    }

    pub fn emit_query_errored(
        &self,
        ctx: &EventContext,
        query_id: &str,
        error_message: &str,
        error_code: Option<&str>,
        duration_ms: u64,
    ) -> Result<()> {
        let event = QueryErrored::new(
            self.service_envelope(EventKind::QueryErrored, ctx)?,
            query_id,
            error_message,
            error_code.map(str::to_string),
            duration_ms,
        );
        self.dispatch(ctx, event.into(), None)
    }

    pub fn emit_transaction_started(&self, ctx: &EventContext, transaction_id: &str) -> Result<()> {
        let event = TransactionStarted {
            base: self.service_envelope(EventKind::TransactionStarted, ctx)?,
            transaction_id: transaction_id.to_string(),
        };
        self.dispatch(ctx, event.into(), None)
    }

    pub fn emit_transaction_committed(
        &self,
        ctx: &EventContext,
        transaction_id: &str,
        duration_ms: u64,
    ) -> Result<()> {
        let event = TransactionCommitted {
            base: self.service_envelope(EventKind::TransactionCommitted, ctx)?,
            transaction_id: transaction_id.to_string(),
            duration_ms,
        };
        self.dispatch(ctx, event.into(), None)
    }

    pub fn emit_transaction_rolled_back(
        &self,
        ctx: &EventContext,
        transaction_id: &str,
        reason: Option<&str>,
        duration_ms: u64,
    ) -> Result<()> {
        let event = TransactionRolledBack {
            base: self.service_envelope(EventKind::TransactionRolledBack, ctx)?,
            transaction_id: transaction_id.to_string(),
            reason: reason.map(str::to_string),
            duration_ms,
        };
        self.dispatch(ctx, event.into(), None)
    }

    // Resources

    pub fn emit_resource_created(
        &self,
        ctx: &EventContext,
        change: ResourceChange<'_>,
        resource_data: Option<Payload>,
        opts: EmitOptions,
    ) -> Result<()> {
        let event = ResourceCreated {
            base: self.envelope(EventKind::ResourceCreated, ctx, opts, Some(&change.resource))?,
            actor: change.actor,
            resource: change.resource,
            resource_data,
        };
        self.dispatch(ctx, event.into(), change.sensitivity)
    }

    pub fn emit_resource_updated(
        &self,
        ctx: &EventContext,
        change: ResourceChange<'_>,
        previous_data: Option<Payload>,
        new_data: Option<Payload>,
        updated_fields: Vec<String>,
        opts: EmitOptions,
    ) -> Result<()> {
        let event = ResourceUpdated {
            base: self.envelope(EventKind::ResourceUpdated, ctx, opts, Some(&change.resource))?,
            actor: change.actor,
            resource: change.resource,
            previous_data,
            new_data,
            updated_fields,
        };
        self.dispatch(ctx, event.into(), change.sensitivity)
    }

    pub fn emit_resource_deleted(
        &self,
        ctx: &EventContext,
        change: ResourceChange<'_>,
        soft_delete: bool,
        final_data: Option<Payload>,
        opts: EmitOptions,
    ) -> Result<()> {
        let event = ResourceDeleted {
            base: self.envelope(EventKind::ResourceDeleted, ctx, opts, Some(&change.resource))?,
            actor: change.actor,
            resource: change.resource,
            soft_delete,
            final_data,
        };
        self.dispatch(ctx, event.into(), change.sensitivity)
    }

    /// Emit an event built elsewhere. It goes through the same redaction,
    /// telemetry and output steps as the `emit_*` calls.
    pub fn emit_event(
        &self,
        ctx: &EventContext,
        event: impl Into<Event>,
        sensitivity: Option<&SensitivityMap>,
    ) -> Result<()> {
        self.dispatch(ctx, event.into(), sensitivity)
    }

    fn dispatch(
        &self,
        ctx: &EventContext,
        mut event: Event,
        sensitivity: Option<&SensitivityMap>,
    ) -> Result<()> {
        let redacted = self.redact(&mut event, sensitivity);
        if redacted > 0 {
            tracing::debug!(
                telemetry.event = "payload_redacted",
                event.type = event.event_type(),
                fields = redacted,
                "Redacted payload fields"
            );
        }

        let attributes = event_attributes(&event);
        let event_type = event.event_type();

        let (span_ctx, handle) = self
            .telemetry
            .start_span(ctx, &span_name(event_type), &attributes);
        let _span = SpanGuard::new(handle);

        self.telemetry
            .record_counter(&span_ctx, &counter_name(event_type), 1, &attributes);
        if let Some(duration_ms) = event.duration_ms().filter(|ms| *ms > 0) {
            self.telemetry.record_histogram(
                &span_ctx,
                &histogram_name(event_type),
                duration_ms as f64 / 1000.0,
                &attributes,
            );
        }

        self.write(&event).map_err(|err| {
            tracing::warn!(
                telemetry.event = "emit_failed",
                event.type = event_type,
                error = %err,
                "Failed to emit lifecycle event"
            );
            metrics::counter!("lifecycle.emit.errors", "event.type" => event_type.to_string())
                .increment(1);
            err
        })
    }

    /// Single redaction pass over every payload, before anything is
    /// serialized
    fn redact(&self, event: &mut Event, sensitivity: Option<&SensitivityMap>) -> usize {
        event
            .payloads_mut()
            .into_iter()
            .map(|payload| match payload {
                PayloadMut::Record(data) => self.redactor.redact_map_in_place(data, sensitivity),
                PayloadMut::Params(params) => {
                    self.redactor.redact_sequence_in_place(params, sensitivity)
                }
            })
            .sum()
    }

    fn write(&self, event: &Event) -> Result<()> {
        match &self.output {
            Output::Json(sink) => sink.write_event(event),
            Output::Styled(styled) => {
                styled.write_event(event, &ResolvedColors::resolve(event, &self.colors))
            }
        }
    }
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("service", &self.service)
            .field("host", &self.host)
            .field("api", &self.api)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}
