//! Certificates: the inventory objects most triggers evaluate.

mod fields;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::{CertificateId, KeyId};
use crate::registry::{Evaluable, FieldRegistry};
use crate::resource::Resource;
use crate::time::Timestamp;
use crate::value::FieldValue;

/// Lifecycle state of a certificate in the inventory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateState {
    #[default]
    Unknown,
    Issued,
    Revoked,
    Archived,
}

impl CertificateState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Issued => "issued",
            Self::Revoked => "revoked",
            Self::Archived => "archived",
        }
    }
}

impl std::fmt::Display for CertificateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CertificateState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unknown" => Ok(Self::Unknown),
            "issued" => Ok(Self::Issued),
            "revoked" => Ok(Self::Revoked),
            "archived" => Ok(Self::Archived),
            other => Err(format!("unknown certificate state `{other}`")),
        }
    }
}

/// An X.509 certificate tracked by the inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    /// Assigned when the certificate is first persisted.
    pub id: Option<CertificateId>,
    pub common_name: String,
    pub subject_dn: String,
    pub issuer_dn: String,
    pub serial_number: String,
    /// Hex SHA-256 of the DER encoding.
    pub fingerprint: String,
    /// Hex SHA-256 of the subject public key info.
    pub public_key_fingerprint: String,
    pub not_before: Timestamp,
    pub not_after: Timestamp,
    #[serde(default)]
    pub subject_alternative_names: Vec<String>,
    pub key_algorithm: String,
    pub group: Option<String>,
    pub owner: Option<String>,
    #[serde(default)]
    pub state: CertificateState,
    #[serde(default)]
    pub metadata: BTreeMap<String, FieldValue>,
    #[serde(default)]
    pub custom_attributes: BTreeMap<String, FieldValue>,
    pub key_id: Option<KeyId>,
}

impl Certificate {
    /// Whole days from `at` until `not_after`; negative once expired.
    #[must_use]
    pub fn days_to_expiry(&self, at: Timestamp) -> i64 {
        (self.not_after - at).num_days()
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_custom_attribute(
        mut self,
        name: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Self {
        self.custom_attributes.insert(name.into(), value.into());
        self
    }
}

impl Evaluable for Certificate {
    const RESOURCE: Resource = Resource::Certificate;

    fn object_uuid(&self) -> Option<uuid::Uuid> {
        self.id.map(CertificateId::as_uuid)
    }

    fn display_name(&self) -> String {
        if self.common_name.is_empty() {
            self.fingerprint.clone()
        } else {
            self.common_name.clone()
        }
    }

    fn metadata(&self, key: &str) -> FieldValue {
        self.metadata.get(key).cloned().unwrap_or_default()
    }

    fn custom_attribute(&self, name: &str) -> FieldValue {
        self.custom_attributes.get(name).cloned().unwrap_or_default()
    }

    fn set_metadata(&mut self, key: &str, value: FieldValue) {
        self.metadata.insert(key.to_string(), value);
    }

    fn fields() -> &'static FieldRegistry<Self> {
        &fields::CERTIFICATE_FIELDS
    }
}
