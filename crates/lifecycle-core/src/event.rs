//! Lifecycle event model
//!
//! Every event is a flat JSON record: the [`BaseEnvelope`] fields followed by
//! the variant's own fields. [`Event`] is the closed set of variants; code
//! that needs per-variant behavior matches on it instead of probing types.

use crate::{
    types::{Actor, Resource, Status},
    LifecycleError, Result,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Free-form key/value data. Key order is preserved.
pub type Payload = Map<String, Value>;

/// Fields shared by every event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseEnvelope {
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub service: String,
    /// Logical API, distinct from the service instance. Empty means none.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api: String,
    #[serde(default)]
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Payload>,
}

impl BaseEnvelope {
    /// Stamp a new envelope for `kind` at the current time.
    ///
    /// Fails when `service` is empty.
    pub fn new(kind: EventKind, service: impl Into<String>) -> Result<Self> {
        let service = service.into();
        if service.trim().is_empty() {
            return Err(LifecycleError::InvalidEvent {
                message: format!("{} requires a non-empty service", kind),
            });
        }

        Ok(Self {
            event_type: kind.as_str().to_string(),
            timestamp: Utc::now(),
            service,
            api: String::new(),
            host: String::new(),
            correlation_id: None,
            metadata: None,
        })
    }

    pub fn with_api(mut self, api: impl Into<String>) -> Self {
        self.api = api.into();
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: Option<String>) -> Self {
        self.correlation_id = correlation_id.filter(|id| !id.is_empty());
        self
    }

    pub fn with_metadata(mut self, metadata: Option<Payload>) -> Self {
        self.metadata = metadata;
        self
    }
}

// Service lifecycle

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStarted {
    #[serde(flatten)]
    pub base: BaseEnvelope,
    pub version: String,
    pub pid: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceHealthy {
    #[serde(flatten)]
    pub base: BaseEnvelope,
    #[serde(default)]
    pub health_checks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceShutdown {
    #[serde(flatten)]
    pub base: BaseEnvelope,
    pub reason: String,
    pub exit_code: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCrashed {
    #[serde(flatten)]
    pub base: BaseEnvelope,
    pub reason: String,
    pub stack_trace: String,
    pub exit_code: i32,
}

// API requests

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestReceived {
    #[serde(flatten)]
    pub base: BaseEnvelope,
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_addr: Option<String>,
}

fn outcome_success() -> Status {
    Status::Success
}

fn outcome_error() -> Status {
    Status::Error
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestHandled {
    #[serde(flatten)]
    pub base: BaseEnvelope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<Actor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Resource>,
    #[serde(skip_deserializing, default = "outcome_success")]
    status: Status,
    pub duration_ms: u64,
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_size_bytes: Option<u64>,
}

impl RequestHandled {
    pub fn new(
        base: BaseEnvelope,
        actor: Option<Actor>,
        resource: Option<Resource>,
        status_code: u16,
        duration_ms: u64,
        response_size_bytes: Option<u64>,
    ) -> Self {
        Self {
            base,
            actor,
            resource,
            status: Status::Success,
            duration_ms,
            status_code,
            response_size_bytes,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestErrored {
    #[serde(flatten)]
    pub base: BaseEnvelope,
    #[serde(skip_deserializing, default = "outcome_error")]
    status: Status,
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub status_code: u16,
    pub duration_ms: u64,
}

impl RequestErrored {
    pub fn new(
        base: BaseEnvelope,
        error_message: impl Into<String>,
        error_code: Option<String>,
        status_code: u16,
        duration_ms: u64,
    ) -> Self {
        Self {
            base,
            status: Status::Error,
            error_message: error_message.into(),
            error_code,
            status_code,
            duration_ms,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRetried {
    #[serde(flatten)]
    pub base: BaseEnvelope,
    pub retry_count: u32,
    pub delay_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_reason: Option<String>,
}

// Database tracing

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryStarted {
    #[serde(flatten)]
    pub base: BaseEnvelope,
    pub query_id: String,
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryCompleted {
    #[serde(flatten)]
    pub base: BaseEnvelope,
    pub query_id: String,
    #[serde(skip_deserializing, default = "outcome_success")]
    status: Status,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
}

impl QueryCompleted {
    pub fn new(
        base: BaseEnvelope,
        query_id: impl Into<String>,
        duration_ms: u64,
        rows_affected: Option<u64>,
    ) -> Self {
        Self {
            base,
            query_id: query_id.into(),
            status: Status::Success,
            duration_ms,
            rows_affected,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryErrored {
    #[serde(flatten)]
    pub base: BaseEnvelope,
    pub query_id: String,
    #[serde(skip_deserializing, default = "outcome_error")]
    status: Status,
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub duration_ms: u64,
}

impl QueryErrored {
    pub fn new(
        base: BaseEnvelope,
        query_id: impl Into<String>,
        error_message: impl Into<String>,
        error_code: Option<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            base,
            query_id: query_id.into(),
            status: Status::Error,
            error_message: error_message.into(),
            error_code,
            duration_ms,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionStarted {
    #[serde(flatten)]
    pub base: BaseEnvelope,
    pub transaction_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionCommitted {
    #[serde(flatten)]
    pub base: BaseEnvelope,
    pub transaction_id: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRolledBack {
    #[serde(flatten)]
    pub base: BaseEnvelope,
    pub transaction_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub duration_ms: u64,
}

// Resource mutation

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceCreated {
    #[serde(flatten)]
    pub base: BaseEnvelope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<Actor>,
    pub resource: Resource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_data: Option<Payload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceUpdated {
    #[serde(flatten)]
    pub base: BaseEnvelope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<Actor>,
    pub resource: Resource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_data: Option<Payload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_data: Option<Payload>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub updated_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDeleted {
    #[serde(flatten)]
    pub base: BaseEnvelope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<Actor>,
    pub resource: Resource,
    pub soft_delete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_data: Option<Payload>,
}

/// Mutable view of one free-form payload carried by an event
#[derive(Debug)]
pub enum PayloadMut<'a> {
    /// Keyed data such as `resource_data` or `new_data`
    Record(&'a mut Payload),
    /// Positional query parameters
    Params(&'a mut Vec<Value>),
}

macro_rules! event_variants {
    ($($variant:ident => $kind:literal),+ $(,)?) => {
        /// Discriminant of [`Event`]; `as_str` gives the dot-namespaced kind
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum EventKind {
            $($variant),+
        }

        impl EventKind {
            pub const ALL: &'static [EventKind] = &[$(EventKind::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(EventKind::$variant => $kind),+
                }
            }
        }

        impl FromStr for EventKind {
            type Err = LifecycleError;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($kind => Ok(EventKind::$variant),)+
                    other => Err(LifecycleError::InvalidEvent {
                        message: format!("unknown event type '{}'", other),
                    }),
                }
            }
        }

        /// A lifecycle event. Serializes to the flat record format.
        #[derive(Debug, Clone, PartialEq, Serialize)]
        #[serde(untagged)]
        pub enum Event {
            $($variant($variant)),+
        }

        impl Event {
            pub fn kind(&self) -> EventKind {
                match self {
                    $(Event::$variant(_) => EventKind::$variant),+
                }
            }

            pub fn base(&self) -> &BaseEnvelope {
                match self {
                    $(Event::$variant(e) => &e.base),+
                }
            }

            pub fn base_mut(&mut self) -> &mut BaseEnvelope {
                match self {
                    $(Event::$variant(e) => &mut e.base),+
                }
            }

            /// Rebuild a typed event from a serialized record, dispatching
            /// on its `event_type`
            pub fn from_record(record: Value) -> Result<Self> {
                let kind = record
                    .get("event_type")
                    .and_then(Value::as_str)
                    .ok_or_else(|| LifecycleError::InvalidEvent {
                        message: "record has no event_type".to_string(),
                    })?
                    .parse::<EventKind>()?;

                Ok(match kind {
                    $(EventKind::$variant => Event::$variant(serde_json::from_value(record)?)),+
                })
            }
        }

        $(
            impl From<$variant> for Event {
                fn from(event: $variant) -> Self {
                    Event::$variant(event)
                }
            }
        )+
    };
}

event_variants! {
    ServiceStarted => "service.started",
    ServiceHealthy => "service.healthy",
    ServiceShutdown => "service.shutdown",
    ServiceCrashed => "service.crashed",
    RequestReceived => "api.request.received",
    RequestHandled => "api.request.handled",
    RequestErrored => "api.request.errored",
    RequestRetried => "api.request.retried",
    QueryStarted => "db.query.started",
    QueryCompleted => "db.query.completed",
    QueryErrored => "db.query.errored",
    TransactionStarted => "db.transaction.started",
    TransactionCommitted => "db.transaction.committed",
    TransactionRolledBack => "db.transaction.rolled_back",
    ResourceCreated => "resource.created",
    ResourceUpdated => "resource.updated",
    ResourceDeleted => "resource.deleted",
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Event {
    pub fn event_type(&self) -> &str {
        &self.base().event_type
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.base().timestamp
    }

    pub fn service(&self) -> &str {
        &self.base().service
    }

    pub fn api(&self) -> &str {
        &self.base().api
    }

    pub fn host(&self) -> &str {
        &self.base().host
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.base().correlation_id.as_deref()
    }

    /// Outcome status of `*Handled`, `*Completed` and `*Errored` events
    pub fn status(&self) -> Option<Status> {
        match self {
            Event::RequestHandled(e) => Some(e.status()),
            Event::RequestErrored(e) => Some(e.status()),
            Event::QueryCompleted(e) => Some(e.status()),
            Event::QueryErrored(e) => Some(e.status()),
            _ => None,
        }
    }

    /// Duration carried by timed events. Retries report their back-off delay.
    pub fn duration_ms(&self) -> Option<u64> {
        match self {
            Event::RequestHandled(e) => Some(e.duration_ms),
            Event::RequestErrored(e) => Some(e.duration_ms),
            Event::RequestRetried(e) => Some(e.delay_ms),
            Event::QueryCompleted(e) => Some(e.duration_ms),
            Event::QueryErrored(e) => Some(e.duration_ms),
            Event::TransactionCommitted(e) => Some(e.duration_ms),
            Event::TransactionRolledBack(e) => Some(e.duration_ms),
            _ => None,
        }
    }

    /// Whether this variant is one of the payload-bearing kinds
    pub fn carries_payload(&self) -> bool {
        matches!(
            self,
            Event::QueryStarted(_)
                | Event::ResourceCreated(_)
                | Event::ResourceUpdated(_)
                | Event::ResourceDeleted(_)
        )
    }

    /// Every free-form payload present on this event
    pub fn payloads_mut(&mut self) -> Vec<PayloadMut<'_>> {
        match self {
            Event::QueryStarted(e) => e.params.iter_mut().map(PayloadMut::Params).collect(),
            Event::ResourceCreated(e) => {
                e.resource_data.iter_mut().map(PayloadMut::Record).collect()
            }
            Event::ResourceUpdated(e) => e
                .previous_data
                .iter_mut()
                .chain(e.new_data.iter_mut())
                .map(PayloadMut::Record)
                .collect(),
            Event::ResourceDeleted(e) => e.final_data.iter_mut().map(PayloadMut::Record).collect(),
            _ => Vec::new(),
        }
    }

    /// Serialize to a single-line JSON record
    pub fn to_record(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base(kind: EventKind) -> BaseEnvelope {
        BaseEnvelope::new(kind, "user-service")
            .unwrap()
            .with_host("pod-1")
    }

    #[test]
    fn test_envelope_requires_service() {
        let err = BaseEnvelope::new(EventKind::ServiceStarted, "  ").unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidEvent { .. }));
    }

    #[test]
    fn test_envelope_stamps_kind_and_time() {
        let before = Utc::now();
        let envelope = base(EventKind::RequestReceived);
        assert_eq!(envelope.event_type, "api.request.received");
        assert_eq!(envelope.service, "user-service");
        assert!(envelope.timestamp >= before);
    }

    #[test]
    fn test_empty_correlation_id_is_dropped() {
        let envelope = base(EventKind::ServiceStarted).with_correlation_id(Some(String::new()));
        assert!(envelope.correlation_id.is_none());
    }

    #[test]
    fn test_record_is_flat() {
        let event: Event = ServiceStarted {
            base: base(EventKind::ServiceStarted),
            version: "1.2.3".to_string(),
            pid: 4242,
        }
        .into();

        let record: Value = serde_json::from_str(&event.to_record().unwrap()).unwrap();
        assert_eq!(record["event_type"], "service.started");
        assert_eq!(record["service"], "user-service");
        assert_eq!(record["host"], "pod-1");
        assert_eq!(record["version"], "1.2.3");
        assert_eq!(record["pid"], 4242);
        assert!(record.get("base").is_none());
        assert!(record.get("api").is_none());
        assert!(record.get("correlation_id").is_none());
        assert!(record.get("metadata").is_none());
    }

    #[test]
    fn test_outcome_status_is_fixed() {
        let handled = RequestHandled::new(base(EventKind::RequestHandled), None, None, 200, 12, None);
        assert_eq!(handled.status(), Status::Success);

        let errored = RequestErrored::new(
            base(EventKind::RequestErrored),
            "boom",
            Some("E500".to_string()),
            500,
            3,
        );
        assert_eq!(errored.status(), Status::Error);

        let completed = QueryCompleted::new(base(EventKind::QueryCompleted), "q1", 5, Some(1));
        assert_eq!(Event::from(completed).status(), Some(Status::Success));

        let failed = QueryErrored::new(base(EventKind::QueryErrored), "q1", "timeout", None, 5);
        assert_eq!(Event::from(failed).status(), Some(Status::Error));
    }

    #[test]
    fn test_from_record_ignores_supplied_status() {
        let outcomes: Vec<(Event, Status)> = vec![
            (
                RequestHandled::new(base(EventKind::RequestHandled), None, None, 200, 12, None).into(),
                Status::Success,
            ),
            (
                RequestErrored::new(base(EventKind::RequestErrored), "boom", None, 500, 3).into(),
                Status::Error,
            ),
            (
                QueryCompleted::new(base(EventKind::QueryCompleted), "q1", 5, None).into(),
                Status::Success,
            ),
            (
                QueryErrored::new(base(EventKind::QueryErrored), "q1", "timeout", None, 5).into(),
                Status::Error,
            ),
        ];

        for (event, expected) in outcomes {
            let mut record = serde_json::to_value(&event).unwrap();
            let flipped = match expected {
                Status::Success => "error",
                Status::Error => "success",
            };
            record["status"] = json!(flipped);

            let parsed = Event::from_record(record.clone()).unwrap();
            assert_eq!(parsed.status(), Some(expected), "{}", event.kind());
            assert_eq!(parsed, event);

            record.as_object_mut().unwrap().remove("status");
            assert_eq!(Event::from_record(record).unwrap().status(), Some(expected));
        }
    }

    #[test]
    fn test_from_record_dispatches_on_event_type() {
        let event: Event = ResourceCreated {
            base: base(EventKind::ResourceCreated).with_api("Order"),
            actor: Some(Actor::human("u-1")),
            resource: Resource::new("Order", "o-1"),
            resource_data: Some(json!({"total": 10}).as_object().cloned().unwrap()),
        }
        .into();

        let record: Value = serde_json::to_value(&event).unwrap();
        let parsed = Event::from_record(record).unwrap();
        assert_eq!(parsed, event);
        assert_eq!(parsed.kind(), EventKind::ResourceCreated);
    }

    #[test]
    fn test_from_record_rejects_unknown_kind() {
        let err = Event::from_record(json!({"event_type": "nope"})).unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidEvent { .. }));
        assert!(Event::from_record(json!({"service": "x"})).is_err());
    }

    #[test]
    fn test_kind_strings_parse_back() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), *kind);
        }
    }

    #[test]
    fn test_payloads_mut_covers_updated_data() {
        let mut event: Event = ResourceUpdated {
            base: base(EventKind::ResourceUpdated),
            actor: None,
            resource: Resource::new("User", "u-1"),
            previous_data: Some(Payload::new()),
            new_data: Some(Payload::new()),
            updated_fields: vec!["email".to_string()],
        }
        .into();
        assert!(event.carries_payload());
        assert_eq!(event.payloads_mut().len(), 2);

        let mut started: Event = TransactionStarted {
            base: base(EventKind::TransactionStarted),
            transaction_id: "tx".to_string(),
        }
        .into();
        assert!(!started.carries_payload());
        assert!(started.payloads_mut().is_empty());
    }

    #[test]
    fn test_duration_for_timed_events() {
        let retried: Event = RequestRetried {
            base: base(EventKind::RequestRetried),
            retry_count: 2,
            delay_ms: 250,
            retry_reason: None,
        }
        .into();
        assert_eq!(retried.duration_ms(), Some(250));

        let healthy: Event = ServiceHealthy {
            base: base(EventKind::ServiceHealthy),
            health_checks: vec!["db".to_string()],
        }
        .into();
        assert_eq!(healthy.duration_ms(), None);
    }
}
