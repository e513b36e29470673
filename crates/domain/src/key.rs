//! Cryptographic keys shared by one or more certificates.

use serde::{Deserialize, Serialize};

use crate::id::{CertificateId, KeyId};

/// One distinct public key and the certificates that carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptographicKey {
    pub id: KeyId,
    pub public_key_fingerprint: String,
    pub certificate_ids: Vec<CertificateId>,
}

impl CryptographicKey {
    #[must_use]
    pub fn new(public_key_fingerprint: impl Into<String>) -> Self {
        Self {
            id: KeyId::new(),
            public_key_fingerprint: public_key_fingerprint.into(),
            certificate_ids: Vec::new(),
        }
    }

    /// Link certificates to this key, ignoring ones already linked.
    ///
    /// Returns how many were newly linked.
    pub fn link(&mut self, certificate_ids: &[CertificateId]) -> usize {
        let before = self.certificate_ids.len();
        for id in certificate_ids {
            if !self.certificate_ids.contains(id) {
                self.certificate_ids.push(*id);
            }
        }
        self.certificate_ids.len() - before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_link_each_certificate_once() {
        let mut key = CryptographicKey::new("pk");
        let a = CertificateId::new();
        let b = CertificateId::new();
        assert_eq!(key.link(&[a, b]), 2);
        assert_eq!(key.link(&[b, a]), 0);
        assert_eq!(key.certificate_ids, vec![a, b]);
    }
}
