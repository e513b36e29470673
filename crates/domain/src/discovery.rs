//! Discovery jobs and the certificate candidates they produce.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::{CertificateId, DiscoveryCertificateId, DiscoveryId};
use crate::time::{Timestamp, now};
use crate::value::FieldValue;

/// Status of a discovery job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryStatus {
    #[default]
    InProgress,
    /// Candidates are being turned into inventory certificates.
    Processing,
    Completed,
    Failed,
}

impl DiscoveryStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for DiscoveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DiscoveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown discovery status `{other}`")),
        }
    }
}

/// A discovery job run against some connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryHistory {
    pub id: DiscoveryId,
    pub name: String,
    pub status: DiscoveryStatus,
    pub total_certificates_discovered: u64,
    pub processed_certificates: u64,
    pub message: Option<String>,
    pub created_at: Timestamp,
}

impl DiscoveryHistory {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: DiscoveryId::new(),
            name: name.into(),
            status: DiscoveryStatus::InProgress,
            total_certificates_discovered: 0,
            processed_certificates: 0,
            message: None,
            created_at: now(),
        }
    }
}

/// Human-readable progress line stored on the job.
#[must_use]
pub fn progress_message(processed: u64, total: u64) -> String {
    format!("Processed {processed} of {total} discovered certificates")
}

/// One certificate found by a discovery job, awaiting processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryCertificate {
    pub id: DiscoveryCertificateId,
    pub discovery_id: DiscoveryId,
    pub common_name: String,
    pub fingerprint: String,
    /// Raw PEM or DER bytes as delivered by the connector.
    pub content: Vec<u8>,
    #[serde(default)]
    pub metadata: BTreeMap<String, FieldValue>,
    /// Not yet present in the inventory when discovered.
    pub newly_discovered: bool,
    pub processed: bool,
    pub processed_error: Option<String>,
    pub certificate_id: Option<CertificateId>,
}

impl DiscoveryCertificate {
    /// A fresh, unprocessed, newly discovered candidate.
    #[must_use]
    pub fn new(discovery_id: DiscoveryId, content: impl Into<Vec<u8>>) -> Self {
        Self {
            id: DiscoveryCertificateId::new(),
            discovery_id,
            common_name: String::new(),
            fingerprint: String::new(),
            content: content.into(),
            metadata: BTreeMap::new(),
            newly_discovered: true,
            processed: false,
            processed_error: None,
            certificate_id: None,
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
