//! Resources that triggers target, and the lifecycle events raised on them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A kind of object managed by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Resource {
    Certificate,
    Discovery,
    RaProfile,
    CryptographicKey,
}

impl Resource {
    /// Stable storage / wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Certificate => "CERTIFICATE",
            Self::Discovery => "DISCOVERY",
            Self::RaProfile => "RA_PROFILE",
            Self::CryptographicKey => "CRYPTOGRAPHIC_KEY",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "CERTIFICATE" => Ok(Self::Certificate),
            "DISCOVERY" => Ok(Self::Discovery),
            "RA_PROFILE" => Ok(Self::RaProfile),
            "CRYPTOGRAPHIC_KEY" => Ok(Self::CryptographicKey),
            _ => Err(UnknownName(s.to_string())),
        }
    }
}

/// A lifecycle event that may fire triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceEvent {
    /// A discovery produced a certificate that is not yet in the inventory.
    CertificateDiscovered,
    /// A certificate is approaching the end of its validity window.
    CertificateExpiring,
    /// A certificate's validation status changed.
    CertificateStatusChanged,
    /// A discovery job finished collecting candidates.
    DiscoveryFinished,
}

impl ResourceEvent {
    /// Stable storage / wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CertificateDiscovered => "CERTIFICATE_DISCOVERED",
            Self::CertificateExpiring => "CERTIFICATE_EXPIRING",
            Self::CertificateStatusChanged => "CERTIFICATE_STATUS_CHANGED",
            Self::DiscoveryFinished => "DISCOVERY_FINISHED",
        }
    }

    /// The resource this event is raised on.
    #[must_use]
    pub fn producer(self) -> Resource {
        match self {
            Self::CertificateDiscovered
            | Self::CertificateExpiring
            | Self::CertificateStatusChanged => Resource::Certificate,
            Self::DiscoveryFinished => Resource::Discovery,
        }
    }
}

impl fmt::Display for ResourceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceEvent {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "CERTIFICATE_DISCOVERED" => Ok(Self::CertificateDiscovered),
            "CERTIFICATE_EXPIRING" => Ok(Self::CertificateExpiring),
            "CERTIFICATE_STATUS_CHANGED" => Ok(Self::CertificateStatusChanged),
            "DISCOVERY_FINISHED" => Ok(Self::DiscoveryFinished),
            _ => Err(UnknownName(s.to_string())),
        }
    }
}

/// A resource or event name that is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown name `{0}`")]
pub struct UnknownName(pub String);
