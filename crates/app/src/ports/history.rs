//! Trigger history ports: the append-only audit ledger.

use std::future::Future;

use certflow_domain::error::CertflowError;
use certflow_domain::trigger::TriggerHistory;

/// Repository for [`TriggerHistory`] rows and their records.
pub trait TriggerHistoryRepository {
    /// Append one row with its records.
    fn append(
        &self,
        history: TriggerHistory,
    ) -> impl Future<Output = Result<(), CertflowError>> + Send;

    /// Rows whose object is `object_uuid`, oldest first.
    fn find_by_object(
        &self,
        object_uuid: uuid::Uuid,
    ) -> impl Future<Output = Result<Vec<TriggerHistory>, CertflowError>> + Send;

    /// Rows recorded against the reference object `reference_uuid`, oldest
    /// first.
    fn find_by_reference_object(
        &self,
        reference_uuid: uuid::Uuid,
    ) -> impl Future<Output = Result<Vec<TriggerHistory>, CertflowError>> + Send;

    /// Set `object_uuid` on every row of `reference_uuid` that has none yet.
    ///
    /// Returns the number of rows updated.
    fn backfill_object(
        &self,
        reference_uuid: uuid::Uuid,
        object_uuid: uuid::Uuid,
    ) -> impl Future<Output = Result<u64, CertflowError>> + Send;
}

/// Where evaluation writes its history rows.
///
/// Per-object processing writes straight to the ledger; batch processing
/// writes into the item transaction so rows commit or roll back with the
/// item.
pub trait HistorySink: Send {
    fn append(
        &mut self,
        history: TriggerHistory,
    ) -> impl Future<Output = Result<(), CertflowError>> + Send;
}

/// Collects rows in memory.
impl HistorySink for Vec<TriggerHistory> {
    async fn append(&mut self, history: TriggerHistory) -> Result<(), CertflowError> {
        self.push(history);
        Ok(())
    }
}
