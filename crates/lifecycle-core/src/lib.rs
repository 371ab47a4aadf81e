//! # Lifecycle Core
//!
//! Typed observability events and the lookups every emitter shares.
//!
//! - [`event`]: the closed event taxonomy and its flat JSON record format
//! - [`types`]: actors, resources and outcome statuses
//! - [`context`]: per-call context and correlation identifiers
//! - [`color`]: color registry for services, APIs, event kinds and statuses

pub mod color;
pub mod context;
pub mod error;
pub mod event;
pub mod types;

pub use color::{ColorDefinitions, ColorRegistry, DEFAULT_STATUS_COLOR};
pub use context::{CorrelationId, EventContext};
pub use error::{LifecycleError, Result};
pub use event::{
    BaseEnvelope, Event, EventKind, Payload, PayloadMut, QueryCompleted, QueryErrored,
    QueryStarted, RequestErrored, RequestHandled, RequestReceived, RequestRetried,
    ResourceCreated, ResourceDeleted, ResourceUpdated, ServiceCrashed, ServiceHealthy,
    ServiceShutdown, ServiceStarted, TransactionCommitted, TransactionRolledBack,
    TransactionStarted,
};
pub use types::{Actor, ActorType, Resource, Status};
