//! # certflow-adapter-x509
//!
//! Implements the `CertificateFactory` port: raw bytes delivered by a
//! discovery connector (PEM or DER) become an unpersisted inventory
//! [`Certificate`].
//!
//! Fingerprints are lowercase hex SHA-256, over the DER encoding for the
//! certificate and over the subject public key info for the key.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use chrono::DateTime;
use sha2::{Digest, Sha256};
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::GeneralName;
use x509_parser::prelude::X509Name;
use x509_parser::public_key::PublicKey;
use x509_parser::time::ASN1Time;

use certflow_app::ports::CertificateFactory;
use certflow_domain::certificate::{Certificate, CertificateState};
use certflow_domain::error::{CertflowError, ItemProcessingError};
use certflow_domain::time::Timestamp;

const PEM_PREFIX: &[u8] = b"-----BEGIN";

/// Parses X.509 certificates with `x509-parser`.
#[derive(Debug, Clone, Copy, Default)]
pub struct X509CertificateFactory;

impl X509CertificateFactory {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn parse_error(err: impl std::fmt::Display) -> CertflowError {
    ItemProcessingError::Parse(err.to_string()).into()
}

/// Decode PEM armour when present; anything else is taken as DER.
fn der_bytes(content: &[u8]) -> Result<Vec<u8>, CertflowError> {
    let trimmed = content.trim_ascii_start();
    if !trimmed.starts_with(PEM_PREFIX) {
        return Ok(content.to_vec());
    }
    let (_, pem) = x509_parser::pem::parse_x509_pem(trimmed).map_err(parse_error)?;
    if pem.label != "CERTIFICATE" {
        return Err(parse_error(format!("unexpected PEM block `{}`", pem.label)));
    }
    Ok(pem.contents)
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn timestamp(time: ASN1Time) -> Result<Timestamp, CertflowError> {
    DateTime::from_timestamp(time.timestamp(), 0)
        .ok_or_else(|| parse_error(format!("validity time {time} is out of range")))
}

fn common_name(name: &X509Name<'_>) -> Option<String> {
    name.iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(str::to_string)
}

fn ip_address(bytes: &[u8]) -> Option<IpAddr> {
    if let Ok(octets) = <[u8; 4]>::try_from(bytes) {
        return Some(IpAddr::V4(Ipv4Addr::from(octets)));
    }
    <[u8; 16]>::try_from(bytes)
        .ok()
        .map(|octets| IpAddr::V6(Ipv6Addr::from(octets)))
}

fn subject_alternative_names(cert: &X509Certificate<'_>) -> Vec<String> {
    let extension = match cert.subject_alternative_name() {
        Ok(Some(extension)) => extension,
        Ok(None) => return Vec::new(),
        Err(err) => {
            tracing::debug!(error = %err, "ignoring malformed subject alternative names");
            return Vec::new();
        }
    };
    extension
        .value
        .general_names
        .iter()
        .filter_map(|name| match name {
            GeneralName::DNSName(dns) => Some((*dns).to_string()),
            GeneralName::RFC822Name(email) => Some((*email).to_string()),
            GeneralName::URI(uri) => Some((*uri).to_string()),
            GeneralName::IPAddress(bytes) => ip_address(bytes).map(|ip| ip.to_string()),
            _ => None,
        })
        .collect()
}

fn key_algorithm(cert: &X509Certificate<'_>) -> String {
    let spki = cert.public_key();
    match spki.parsed() {
        Ok(PublicKey::RSA(_)) => "RSA".to_string(),
        Ok(PublicKey::EC(_)) => "EC".to_string(),
        Ok(PublicKey::DSA(_)) => "DSA".to_string(),
        _ => spki.algorithm.algorithm.to_id_string(),
    }
}

impl CertificateFactory for X509CertificateFactory {
    fn create_entity(&self, content: &[u8]) -> Result<Certificate, CertflowError> {
        let der = der_bytes(content)?;
        let (_, cert) = x509_parser::parse_x509_certificate(&der).map_err(parse_error)?;

        let subject_dn = cert.subject().to_string();
        let common_name = common_name(cert.subject()).unwrap_or_else(|| subject_dn.clone());
        let validity = cert.validity();

        Ok(Certificate {
            id: None,
            common_name,
            subject_dn,
            issuer_dn: cert.issuer().to_string(),
            serial_number: hex::encode_upper(cert.raw_serial()),
            fingerprint: sha256_hex(&der),
            public_key_fingerprint: sha256_hex(cert.public_key().raw),
            not_before: timestamp(validity.not_before)?,
            not_after: timestamp(validity.not_after)?,
            subject_alternative_names: subject_alternative_names(&cert),
            key_algorithm: key_algorithm(&cert),
            group: None,
            owner: None,
            state: CertificateState::Issued,
            metadata: std::collections::BTreeMap::new(),
            custom_attributes: std::collections::BTreeMap::new(),
            key_id: None,
        })
    }
}
