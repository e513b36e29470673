//! Certificate collaborators: parsing raw bytes and validating accepted
//! certificates.

use std::future::Future;

use certflow_domain::certificate::Certificate;
use certflow_domain::error::CertflowError;

/// Turns raw connector bytes into a [`Certificate`] value.
pub trait CertificateFactory: Send + Sync {
    /// Parse PEM or DER bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CertflowError::ItemProcessing`] when the bytes are not a
    /// certificate.
    fn create_entity(&self, content: &[u8]) -> Result<Certificate, CertflowError>;
}

/// Validates a freshly accepted certificate (chain, revocation, …).
pub trait CertificateValidator: Send + Sync {
    fn validate(
        &self,
        certificate: &Certificate,
    ) -> impl Future<Output = Result<(), CertflowError>> + Send;
}

/// A validator that accepts every certificate.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl CertificateValidator for AcceptAll {
    async fn validate(&self, _certificate: &Certificate) -> Result<(), CertflowError> {
        Ok(())
    }
}
