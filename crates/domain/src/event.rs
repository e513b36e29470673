//! Inbound lifecycle event messages.

use serde::{Deserialize, Serialize};

use crate::resource::{Resource, ResourceEvent};

/// A lifecycle event raised by an external producer.
///
/// The override pair redirects trigger resolution to another resource or
/// object (cross-resource notification) while the evaluated object stays
/// the one named by `object_uuid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMessage {
    pub resource: Resource,
    pub event: ResourceEvent,
    pub object_uuid: Option<uuid::Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_resource: Option<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_object_uuid: Option<uuid::Uuid>,
}

impl EventMessage {
    #[must_use]
    pub fn new(resource: Resource, event: ResourceEvent, object_uuid: Option<uuid::Uuid>) -> Self {
        Self {
            resource,
            event,
            object_uuid,
            override_resource: None,
            override_object_uuid: None,
        }
    }

    #[must_use]
    pub fn with_override(mut self, resource: Resource, object_uuid: Option<uuid::Uuid>) -> Self {
        self.override_resource = Some(resource);
        self.override_object_uuid = object_uuid;
        self
    }

    /// The `(resource, object)` pair trigger associations are looked up on.
    #[must_use]
    pub fn association_target(&self) -> (Resource, Option<uuid::Uuid>) {
        match self.override_resource {
            Some(resource) => (resource, self.override_object_uuid),
            None => (self.resource, self.object_uuid),
        }
    }
}
