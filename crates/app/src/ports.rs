//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod certificate;
pub mod certificate_repo;
pub mod discovery_repo;
pub mod history;
pub mod item_store;
pub mod key_repo;
pub mod side_effect;
pub mod trigger_repo;

pub use certificate::{AcceptAll, CertificateFactory, CertificateValidator};
pub use certificate_repo::CertificateRepository;
pub use discovery_repo::DiscoveryRepository;
pub use history::{HistorySink, TriggerHistoryRepository};
pub use item_store::{ItemStore, ItemTransaction};
pub use key_repo::KeyRepository;
pub use side_effect::{SideEffect, SideEffectCall};
pub use trigger_repo::TriggerRepository;
