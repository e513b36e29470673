//! Trigger repository port: operator configuration of triggers and their
//! associations.

use std::future::Future;

use certflow_domain::error::CertflowError;
use certflow_domain::id::TriggerId;
use certflow_domain::resource::{Resource, ResourceEvent};
use certflow_domain::trigger::{Trigger, TriggerAssociation};

/// Repository for [`Trigger`]s and [`TriggerAssociation`]s.
pub trait TriggerRepository {
    /// Persist a trigger together with its rules and actions.
    fn create_trigger(
        &self,
        trigger: Trigger,
    ) -> impl Future<Output = Result<Trigger, CertflowError>> + Send;

    /// Load a trigger with its rules and actions in their configured order.
    ///
    /// Returns `Ok(None)` when the trigger does not exist and
    /// [`CertflowError::Resolution`] when one of its rules or actions is
    /// gone.
    fn get_trigger(
        &self,
        id: TriggerId,
    ) -> impl Future<Output = Result<Option<Trigger>, CertflowError>> + Send;

    /// Bind a trigger to an event.
    fn create_association(
        &self,
        association: TriggerAssociation,
    ) -> impl Future<Output = Result<TriggerAssociation, CertflowError>> + Send;

    /// Associations for `event` on `resource` that target `object_uuid` or
    /// the whole resource.
    ///
    /// Exclusion associations come first, then action associations by
    /// ascending order; ties keep creation order.
    fn find_associations(
        &self,
        event: ResourceEvent,
        resource: Resource,
        object_uuid: Option<uuid::Uuid>,
    ) -> impl Future<Output = Result<Vec<TriggerAssociation>, CertflowError>> + Send;
}
