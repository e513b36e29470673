//! Discovery repository port: jobs and their certificate candidates.

use std::future::Future;

use certflow_domain::discovery::{DiscoveryCertificate, DiscoveryHistory, DiscoveryStatus};
use certflow_domain::error::CertflowError;
use certflow_domain::id::{DiscoveryCertificateId, DiscoveryId};

/// Repository for [`DiscoveryHistory`] jobs and [`DiscoveryCertificate`]
/// candidates.
pub trait DiscoveryRepository {
    fn create_discovery(
        &self,
        discovery: DiscoveryHistory,
    ) -> impl Future<Output = Result<DiscoveryHistory, CertflowError>> + Send;

    fn get_discovery(
        &self,
        id: DiscoveryId,
    ) -> impl Future<Output = Result<Option<DiscoveryHistory>, CertflowError>> + Send;

    fn add_candidate(
        &self,
        candidate: DiscoveryCertificate,
    ) -> impl Future<Output = Result<DiscoveryCertificate, CertflowError>> + Send;

    /// Newly discovered candidates of `discovery_id` not processed yet.
    fn find_unprocessed_candidates(
        &self,
        discovery_id: DiscoveryId,
    ) -> impl Future<Output = Result<Vec<DiscoveryCertificate>, CertflowError>> + Send;

    /// Every candidate of `discovery_id`, processed or not.
    fn find_candidates(
        &self,
        discovery_id: DiscoveryId,
    ) -> impl Future<Output = Result<Vec<DiscoveryCertificate>, CertflowError>> + Send;

    /// Mark a candidate processed, optionally with the error that stopped it.
    fn mark_processed(
        &self,
        id: DiscoveryCertificateId,
        error: Option<String>,
    ) -> impl Future<Output = Result<(), CertflowError>> + Send;

    /// Leave a candidate unprocessed and record why its worker stopped.
    fn mark_interrupted(
        &self,
        id: DiscoveryCertificateId,
        reason: String,
    ) -> impl Future<Output = Result<(), CertflowError>> + Send;

    /// Raise the job's progress to `processed` of `total`.
    ///
    /// A value lower than the stored counter is ignored. Returns whether
    /// the row changed.
    fn update_progress(
        &self,
        id: DiscoveryId,
        processed: u64,
        total: u64,
    ) -> impl Future<Output = Result<bool, CertflowError>> + Send;

    fn set_status(
        &self,
        id: DiscoveryId,
        status: DiscoveryStatus,
    ) -> impl Future<Output = Result<(), CertflowError>> + Send;
}
