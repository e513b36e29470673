//! Trigger history store: appends audit rows and answers history queries.

use certflow_domain::error::CertflowError;
use certflow_domain::trigger::TriggerHistory;

use crate::ports::{HistorySink, TriggerHistoryRepository};

/// Application service over the trigger history ledger.
pub struct TriggerHistoryStore<R> {
    repo: R,
}

impl<R: TriggerHistoryRepository + Sync> TriggerHistoryStore<R> {
    /// Create a store backed by the given repository.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Append one evaluation row.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    #[tracing::instrument(skip(self, history), fields(trigger_id = %history.trigger_id))]
    pub async fn append(&self, history: TriggerHistory) -> Result<(), CertflowError> {
        self.repo.append(history).await
    }

    /// Every row recorded for an object, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn for_object(
        &self,
        object_uuid: uuid::Uuid,
    ) -> Result<Vec<TriggerHistory>, CertflowError> {
        self.repo.find_by_object(object_uuid).await
    }

    /// Every row recorded against a reference object (e.g. a discovery
    /// candidate), oldest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn for_reference_object(
        &self,
        reference_uuid: uuid::Uuid,
    ) -> Result<Vec<TriggerHistory>, CertflowError> {
        self.repo.find_by_reference_object(reference_uuid).await
    }

    /// Attach `object_uuid` to rows written before the object existed.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn backfill(
        &self,
        reference_uuid: uuid::Uuid,
        object_uuid: uuid::Uuid,
    ) -> Result<u64, CertflowError> {
        let updated = self.repo.backfill_object(reference_uuid, object_uuid).await?;
        tracing::debug!(updated, "back-filled history rows");
        Ok(updated)
    }
}

impl<R: TriggerHistoryRepository + Sync> HistorySink for &TriggerHistoryStore<R> {
    async fn append(&mut self, history: TriggerHistory) -> Result<(), CertflowError> {
        TriggerHistoryStore::append(*self, history).await
    }
}
