//! Event service: the entry point for inbound lifecycle events.

use std::sync::Arc;

use certflow_domain::certificate::Certificate;
use certflow_domain::error::{CertflowError, NotFoundError, ValidationError};
use certflow_domain::event::EventMessage;
use certflow_domain::id::{CertificateId, DiscoveryId};
use certflow_domain::resource::{Resource, ResourceEvent};

use crate::discovery_coordinator::{BatchProcessor, BatchReport};
use crate::event_processor::{EventContext, EventProcessor, ObjectOutcome};
use crate::history_store::TriggerHistoryStore;
use crate::ports::{CertificateRepository, TriggerHistoryRepository, TriggerRepository};
use crate::trigger_resolver::TriggerAssociationResolver;

/// What [`EventService::handle_event`] did with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// A finished discovery was processed as a batch.
    Batch(BatchReport),
    /// The event's object was evaluated in place.
    Object(ObjectOutcome),
    /// Nothing handles this event.
    Ignored,
}

/// Routes events to per-object evaluation or to batch processing.
pub struct EventService<R, C, H, B> {
    resolver: TriggerAssociationResolver<R>,
    certificates: C,
    history: TriggerHistoryStore<H>,
    processor: Arc<EventProcessor<Certificate>>,
    batches: B,
}

impl<R, C, H, B> EventService<R, C, H, B>
where
    R: TriggerRepository + Sync,
    C: CertificateRepository + Sync,
    H: TriggerHistoryRepository + Sync,
    B: BatchProcessor,
{
    pub fn new(
        triggers: R,
        certificates: C,
        history: H,
        processor: Arc<EventProcessor<Certificate>>,
        batches: B,
    ) -> Self {
        Self {
            resolver: TriggerAssociationResolver::new(triggers),
            certificates,
            history: TriggerHistoryStore::new(history),
            processor,
            batches,
        }
    }

    /// The history ledger the service writes to.
    pub fn history(&self) -> &TriggerHistoryStore<H> {
        &self.history
    }

    /// Handle one inbound event.
    ///
    /// `DISCOVERY_FINISHED` on a discovery runs the batch coordinator;
    /// events on a certificate evaluate that certificate. Anything else is
    /// logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CertflowError::Validation`] when the event carries no
    /// object id, [`CertflowError::NotFound`] for an unknown certificate,
    /// and errors propagated from the batch coordinator or storage.
    #[tracing::instrument(
        skip(self, message),
        fields(event = %message.event, resource = %message.resource, object_uuid = ?message.object_uuid)
    )]
    pub async fn handle_event(&self, message: EventMessage) -> Result<EventOutcome, CertflowError> {
        match (message.resource, message.event) {
            (Resource::Discovery, ResourceEvent::DiscoveryFinished) => {
                let discovery_id = DiscoveryId::from_uuid(required_object(&message)?);
                let report = self.batches.process_batch(discovery_id).await?;
                Ok(EventOutcome::Batch(report))
            }
            (Resource::Certificate, _) => self.evaluate_certificate(&message).await,
            _ => {
                tracing::info!("no handler for event, ignoring");
                Ok(EventOutcome::Ignored)
            }
        }
    }

    async fn evaluate_certificate(
        &self,
        message: &EventMessage,
    ) -> Result<EventOutcome, CertflowError> {
        let id = CertificateId::from_uuid(required_object(message)?);
        let certificate = self.certificates.get_by_id(id).await?.ok_or_else(|| {
            CertflowError::from(NotFoundError {
                entity: "Certificate",
                id: id.to_string(),
            })
        })?;

        let (resource, object_uuid) = message.association_target();
        let triggers = self
            .resolver
            .resolve(message.event, resource, object_uuid)
            .await?;
        let mut context =
            EventContext::new(message.event, resource, triggers).with_object(certificate);

        let mut sink = &self.history;
        let mut outcomes = self.processor.process(&mut context, &mut sink).await?;
        let (Some(outcome), Some(certificate)) = (outcomes.pop(), context.objects.pop()) else {
            return Ok(EventOutcome::Ignored);
        };

        if outcome.report.performed {
            self.certificates.update(certificate).await?;
            tracing::debug!(certificate_id = %id, "saved certificate mutated by actions");
        }
        Ok(EventOutcome::Object(outcome))
    }
}

fn required_object(message: &EventMessage) -> Result<uuid::Uuid, ValidationError> {
    message
        .object_uuid
        .ok_or(ValidationError::MissingObject {
            event: message.event,
            resource: message.resource,
        })
}
