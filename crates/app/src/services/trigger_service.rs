//! Trigger service: operator configuration of triggers and where they fire.

use certflow_domain::error::{CertflowError, NotFoundError, ValidationError};
use certflow_domain::id::TriggerId;
use certflow_domain::resource::{Resource, ResourceEvent};
use certflow_domain::trigger::{Trigger, TriggerAssociation, TriggerKind};

use crate::ports::TriggerRepository;

/// Application service for trigger configuration.
pub struct TriggerService<R> {
    repo: R,
}

impl<R: TriggerRepository> TriggerService<R> {
    /// Create a new service backed by the given repository.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Create a trigger after validating domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`CertflowError::Validation`] if invariants fail, or a
    /// storage error propagated from the repository.
    #[tracing::instrument(skip(self, trigger), fields(trigger_name = %trigger.name))]
    pub async fn create_trigger(&self, trigger: Trigger) -> Result<Trigger, CertflowError> {
        trigger.validate()?;
        self.repo.create_trigger(trigger).await
    }

    /// Look up a trigger by id, returning an error if not found.
    ///
    /// # Errors
    ///
    /// Returns [`CertflowError::NotFound`] when no trigger with `id` exists,
    /// or a storage error from the repository.
    pub async fn get_trigger(&self, id: TriggerId) -> Result<Trigger, CertflowError> {
        self.repo.get_trigger(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "Trigger",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// Bind an existing trigger to `event` on `resource`, for one object or
    /// resource-wide.
    ///
    /// Exclusion triggers may only be associated as exclusions and action
    /// triggers only with an order.
    ///
    /// # Errors
    ///
    /// Returns [`CertflowError::NotFound`] for an unknown trigger,
    /// [`CertflowError::Validation`] when the kind does not fit the
    /// trigger, or a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn associate(
        &self,
        trigger_id: TriggerId,
        event: ResourceEvent,
        resource: Resource,
        object_uuid: Option<uuid::Uuid>,
        kind: TriggerKind,
    ) -> Result<TriggerAssociation, CertflowError> {
        let trigger = self.get_trigger(trigger_id).await?;
        if trigger.ignore_object != kind.is_exclusion() {
            return Err(ValidationError::AssociationKindMismatch {
                trigger: trigger.name,
                kind,
            }
            .into());
        }
        self.repo
            .create_association(TriggerAssociation::new(
                trigger_id,
                event,
                resource,
                object_uuid,
                kind,
            ))
            .await
    }
}
