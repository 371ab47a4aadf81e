use serde::{Deserialize, Serialize};
use std::fmt;

/// Who performed an action.
///
/// Fields are private so an actor cannot change once it has been attached
/// to an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    user_id: String,
    actor_type: ActorType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    Human,
    System,
    Synthetic,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, actor_type: ActorType) -> Self {
        Self {
            user_id: user_id.into(),
            actor_type,
        }
    }

    pub fn human(user_id: impl Into<String>) -> Self {
        Self::new(user_id, ActorType::Human)
    }

    pub fn system(system_id: impl Into<String>) -> Self {
        Self::new(system_id, ActorType::System)
    }

    pub fn synthetic(synthetic_id: impl Into<String>) -> Self {
        Self::new(synthetic_id, ActorType::Synthetic)
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn actor_type(&self) -> ActorType {
        self.actor_type
    }
}

impl ActorType {
    pub fn as_str(self) -> &'static str {
        match self {
            ActorType::Human => "human",
            ActorType::System => "system",
            ActorType::Synthetic => "synthetic",
        }
    }
}

/// What was acted upon. The resource type doubles as the API identifier
/// when a call provides no API of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: String,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }
}

/// Outcome attached to `*Handled`, `*Completed` and `*Errored` events.
///
/// Not to be confused with the free-text statuses ("created", "pending")
/// used for color lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Error,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::Error => "error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
