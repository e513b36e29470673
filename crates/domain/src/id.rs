//! Typed identifier newtypes backed by UUIDs.
//!
//! Objects that triggers evaluate are referenced by their bare UUID in the
//! history ledger, so every id converts into [`uuid::Uuid`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(uuid::Uuid);

        impl Default for $name {
            fn default() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl $name {
            /// Generate a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Access the inner UUID.
            #[must_use]
            pub fn as_uuid(self) -> uuid::Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<$name> for uuid::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a [`Trigger`](crate::trigger::Trigger).
    TriggerId
);

define_id!(
    /// Unique identifier for a [`TriggerAssociation`](crate::trigger::TriggerAssociation).
    TriggerAssociationId
);

define_id!(
    /// Unique identifier for a [`Rule`](crate::rule::Rule).
    RuleId
);

define_id!(
    /// Unique identifier for a [`Condition`](crate::rule::Condition).
    ConditionId
);

define_id!(
    /// Unique identifier for an [`Action`](crate::action::Action).
    ActionId
);

define_id!(
    /// Unique identifier for an [`Execution`](crate::action::Execution).
    ExecutionId
);

define_id!(
    /// Unique identifier for a [`TriggerHistory`](crate::trigger::TriggerHistory) row.
    TriggerHistoryId
);

define_id!(
    /// Unique identifier for a [`TriggerHistoryRecord`](crate::trigger::TriggerHistoryRecord).
    TriggerHistoryRecordId
);

define_id!(
    /// Unique identifier for a persisted [`Certificate`](crate::certificate::Certificate).
    CertificateId
);

define_id!(
    /// Unique identifier for a [`DiscoveryHistory`](crate::discovery::DiscoveryHistory) job.
    DiscoveryId
);

define_id!(
    /// Unique identifier for a [`DiscoveryCertificate`](crate::discovery::DiscoveryCertificate) candidate.
    DiscoveryCertificateId
);

define_id!(
    /// Unique identifier for a [`CryptographicKey`](crate::key::CryptographicKey).
    KeyId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_generate_unique_ids_when_called_twice() {
        let a = TriggerId::new();
        let b = TriggerId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn should_roundtrip_through_display_and_from_str() {
        let id = CertificateId::new();
        let text = id.to_string();
        let parsed: CertificateId = text.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn should_roundtrip_through_serde_json() {
        let id = DiscoveryId::new();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: DiscoveryId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn should_return_error_when_parsing_invalid_uuid() {
        let result = TriggerId::from_str("not-a-uuid");
        assert!(result.is_err());
    }

    #[test]
    fn should_convert_into_bare_uuid() {
        let id = DiscoveryCertificateId::new();
        let uuid: uuid::Uuid = id.into();
        assert_eq!(uuid, id.as_uuid());
    }

    #[test]
    fn should_wrap_existing_uuid_when_using_from_uuid() {
        let uuid = uuid::Uuid::new_v4();
        let id = RuleId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }
}
