//! Item store port: the per-candidate unit of work used by batch
//! discovery.
//!
//! Every candidate is processed inside its own transaction: history rows,
//! the new certificate and the candidate's completion commit together or
//! not at all.

use std::future::Future;

use certflow_domain::certificate::Certificate;
use certflow_domain::error::CertflowError;
use certflow_domain::id::{CertificateId, DiscoveryCertificateId};

use super::HistorySink;

/// Opens per-item transactions.
pub trait ItemStore: Send + Sync {
    type Tx: ItemTransaction;

    fn begin(&self) -> impl Future<Output = Result<Self::Tx, CertflowError>> + Send;
}

/// One open per-item transaction.
///
/// Dropping a transaction without committing rolls it back.
pub trait ItemTransaction: HistorySink {
    /// Insert a new certificate, assigning its id.
    fn insert_certificate(
        &mut self,
        certificate: Certificate,
    ) -> impl Future<Output = Result<Certificate, CertflowError>> + Send;

    /// Save the mutable fields of a certificate inserted earlier.
    fn update_certificate(
        &mut self,
        certificate: &Certificate,
    ) -> impl Future<Output = Result<(), CertflowError>> + Send;

    /// Set `object_uuid` on rows written for `reference_uuid` that have
    /// none yet.
    fn backfill_history_object(
        &mut self,
        reference_uuid: uuid::Uuid,
        object_uuid: uuid::Uuid,
    ) -> impl Future<Output = Result<u64, CertflowError>> + Send;

    /// Mark the candidate processed and link it to its certificate.
    fn complete_candidate(
        &mut self,
        id: DiscoveryCertificateId,
        certificate_id: Option<CertificateId>,
    ) -> impl Future<Output = Result<(), CertflowError>> + Send;

    fn commit(self) -> impl Future<Output = Result<(), CertflowError>> + Send;

    fn rollback(self) -> impl Future<Output = Result<(), CertflowError>> + Send;
}
