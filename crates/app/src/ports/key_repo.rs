//! Cryptographic key repository port.

use std::future::Future;

use certflow_domain::error::CertflowError;
use certflow_domain::id::CertificateId;
use certflow_domain::key::CryptographicKey;

/// Repository for [`CryptographicKey`] rows.
pub trait KeyRepository {
    /// Link `certificate_ids` to the key with `public_key_fingerprint`,
    /// creating the key row when needed, and point each certificate at it.
    fn reconcile(
        &self,
        public_key_fingerprint: &str,
        certificate_ids: &[CertificateId],
    ) -> impl Future<Output = Result<CryptographicKey, CertflowError>> + Send;

    fn get_by_fingerprint(
        &self,
        public_key_fingerprint: &str,
    ) -> impl Future<Output = Result<Option<CryptographicKey>, CertflowError>> + Send;
}
