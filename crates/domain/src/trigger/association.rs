//! Trigger associations: which triggers fire for which event and object.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::id::{TriggerAssociationId, TriggerId};
use crate::resource::{Resource, ResourceEvent};

/// Role of a trigger within one association.
///
/// Exclusion triggers are always evaluated before action triggers;
/// action triggers run in ascending `order`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerKind {
    Exclusion,
    Action { order: u32 },
}

impl TriggerKind {
    #[must_use]
    pub fn is_exclusion(self) -> bool {
        matches!(self, Self::Exclusion)
    }
}

impl PartialOrd for TriggerKind {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TriggerKind {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Exclusion, Self::Exclusion) => Ordering::Equal,
            (Self::Exclusion, Self::Action { .. }) => Ordering::Less,
            (Self::Action { .. }, Self::Exclusion) => Ordering::Greater,
            (Self::Action { order: a }, Self::Action { order: b }) => a.cmp(b),
        }
    }
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exclusion => f.write_str("exclusion"),
            Self::Action { order } => write!(f, "action#{order}"),
        }
    }
}

/// Binds a [`Trigger`](super::Trigger) to an event on a resource.
///
/// Without an `object_uuid` the association applies to every object of
/// `resource`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerAssociation {
    pub id: TriggerAssociationId,
    pub trigger_id: TriggerId,
    pub event: ResourceEvent,
    pub resource: Resource,
    pub object_uuid: Option<uuid::Uuid>,
    pub kind: TriggerKind,
}

impl TriggerAssociation {
    #[must_use]
    pub fn new(
        trigger_id: TriggerId,
        event: ResourceEvent,
        resource: Resource,
        object_uuid: Option<uuid::Uuid>,
        kind: TriggerKind,
    ) -> Self {
        Self {
            id: TriggerAssociationId::new(),
            trigger_id,
            event,
            resource,
            object_uuid,
            kind,
        }
    }

    /// Whether this association applies to `(event, resource, object)`.
    #[must_use]
    pub fn applies_to(
        &self,
        event: ResourceEvent,
        resource: Resource,
        object_uuid: Option<uuid::Uuid>,
    ) -> bool {
        self.event == event
            && self.resource == resource
            && (self.object_uuid.is_none() || self.object_uuid == object_uuid)
    }
}
