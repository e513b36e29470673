//! Trigger association resolver: which triggers run, and in what order,
//! for one event on one object.

use certflow_domain::error::CertflowError;
use certflow_domain::resource::{Resource, ResourceEvent};
use certflow_domain::trigger::{Trigger, TriggerAssociation, TriggerKind};

use crate::ports::TriggerRepository;

/// A trigger loaded through one of its associations.
#[derive(Debug, Clone)]
pub struct ResolvedTrigger {
    pub association: TriggerAssociation,
    pub trigger: Trigger,
}

/// Triggers for one dispatch, split by role.
#[derive(Debug, Clone, Default)]
pub struct OrderedTriggers {
    /// Evaluated first, in association order; the first match wins.
    pub exclusion: Vec<ResolvedTrigger>,
    /// Evaluated after the exclusion phase, by ascending order.
    pub actions: Vec<ResolvedTrigger>,
}

impl OrderedTriggers {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exclusion.is_empty() && self.actions.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.exclusion.len() + self.actions.len()
    }
}

/// Loads and orders trigger associations.
pub struct TriggerAssociationResolver<R> {
    repo: R,
}

impl<R: TriggerRepository> TriggerAssociationResolver<R> {
    /// Create a resolver backed by the given repository.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Resolve the triggers bound to `event` on `resource`, for
    /// `object_uuid` and resource-wide.
    ///
    /// Triggers that no longer resolve are logged and skipped, and so are
    /// triggers restricted to another event.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn resolve(
        &self,
        event: ResourceEvent,
        resource: Resource,
        object_uuid: Option<uuid::Uuid>,
    ) -> Result<OrderedTriggers, CertflowError> {
        let mut associations = self
            .repo
            .find_associations(event, resource, object_uuid)
            .await?;
        associations.sort_by_key(|association| association.kind);

        let mut ordered = OrderedTriggers::default();
        for association in associations {
            let trigger = match self.repo.get_trigger(association.trigger_id).await {
                Ok(Some(trigger)) => trigger,
                Ok(None) => {
                    tracing::warn!(
                        trigger_id = %association.trigger_id,
                        association_id = %association.id,
                        "associated trigger no longer exists, skipping"
                    );
                    continue;
                }
                Err(CertflowError::Resolution(err)) => {
                    tracing::warn!(
                        trigger_id = %association.trigger_id,
                        association_id = %association.id,
                        error = %err,
                        "trigger cannot be resolved, skipping"
                    );
                    continue;
                }
                Err(err) => return Err(err),
            };

            if trigger.event.is_some_and(|restricted| restricted != event) {
                tracing::warn!(
                    trigger_id = %trigger.id,
                    %event,
                    "trigger is restricted to another event, skipping"
                );
                continue;
            }

            let resolved = ResolvedTrigger {
                association,
                trigger,
            };
            match resolved.association.kind {
                TriggerKind::Exclusion => ordered.exclusion.push(resolved),
                TriggerKind::Action { .. } => ordered.actions.push(resolved),
            }
        }

        tracing::debug!(
            exclusion = ordered.exclusion.len(),
            actions = ordered.actions.len(),
            "resolved triggers"
        );
        Ok(ordered)
    }
}
