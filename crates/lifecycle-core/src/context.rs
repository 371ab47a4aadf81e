//! Per-call emission context and correlation identifiers

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Identifier tying together events that belong to the same request or job
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a new random correlation ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an identifier received from upstream (a header, a queue message)
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Create a child correlation ID for nested operations
    pub fn child(&self) -> Self {
        Self(format!("{}-{}", self.0, Uuid::new_v4().simple()))
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ambient values an emission call reads from its caller.
///
/// The producer pulls the correlation id, user agent and remote address
/// from here. The deadline is never interpreted by the producer; it is
/// forwarded to the telemetry collaborator untouched.
#[derive(Debug, Clone, Default)]
pub struct EventContext {
    pub correlation_id: Option<CorrelationId>,
    pub user_agent: Option<String>,
    pub remote_addr: Option<String>,
    pub deadline: Option<Instant>,
    /// Name of the telemetry span this context was produced under, if any
    pub span: Option<String>,
}

impl EventContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context carrying a freshly generated correlation ID
    pub fn correlated() -> Self {
        Self::new().with_correlation_id(CorrelationId::new())
    }

    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_remote_addr(mut self, remote_addr: impl Into<String>) -> Self {
        self.remote_addr = Some(remote_addr.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_span(mut self, span: impl Into<String>) -> Self {
        self.span = Some(span.into());
        self
    }

    /// Child context for a nested operation; inherits everything but gets
    /// a derived correlation ID
    pub fn child(&self) -> Self {
        let mut child = self.clone();
        child.correlation_id = Some(
            self.correlation_id
                .as_ref()
                .map(CorrelationId::child)
                .unwrap_or_default(),
        );
        child
    }

    pub fn correlation_str(&self) -> Option<&str> {
        self.correlation_id.as_ref().map(CorrelationId::as_str)
    }

    /// Time left before the deadline; `None` when no deadline is set
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        matches!(self.remaining(), Some(remaining) if remaining.is_zero())
    }
}
