//! Certificate repository port.

use std::future::Future;

use certflow_domain::certificate::Certificate;
use certflow_domain::error::CertflowError;
use certflow_domain::id::CertificateId;

/// Repository for inventory [`Certificate`]s.
pub trait CertificateRepository {
    /// Persist a new certificate, assigning its id when absent.
    fn create(
        &self,
        certificate: Certificate,
    ) -> impl Future<Output = Result<Certificate, CertflowError>> + Send;

    fn get_by_id(
        &self,
        id: CertificateId,
    ) -> impl Future<Output = Result<Option<Certificate>, CertflowError>> + Send;

    /// Save the mutable fields of a persisted certificate.
    fn update(
        &self,
        certificate: Certificate,
    ) -> impl Future<Output = Result<Certificate, CertflowError>> + Send;

    fn get_all(&self) -> impl Future<Output = Result<Vec<Certificate>, CertflowError>> + Send;
}
