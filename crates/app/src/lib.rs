//! # certflow-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `TriggerRepository`: triggers and their associations
//!   - `TriggerHistoryRepository`: the append-only evaluation ledger
//!   - `CertificateRepository`, `DiscoveryRepository`, `KeyRepository`
//!   - `ItemStore`: the per-candidate transaction used by batch discovery
//!   - `CertificateFactory`, `CertificateValidator`, `SideEffect`: external
//!     collaborators
//! - Evaluate triggers:
//!   - `RuleEngine`: condition items against an object's fields
//!   - `ActionExecutor`: execution items against an object, or side effects
//!   - `TriggerAssociationResolver`: which triggers run, in which order
//!   - `EventProcessor`: exclusion then action phase per object
//! - Drive use-cases:
//!   - `EventService`: the entry point for inbound events
//!   - `DiscoveryBatchCoordinator`: bounded-concurrency batch processing
//!   - `TriggerService`: operator configuration
//!
//! ## Dependency rule
//! Depends on `certflow-domain` only (plus `tokio::sync` for permits and
//! `dashmap` for the batch key map). Never imports adapter crates.

pub mod action_executor;
pub mod discovery_coordinator;
pub mod event_processor;
pub mod history_store;
pub mod ports;
pub mod rule_engine;
pub mod services;
pub mod trigger_resolver;
pub mod worker_pool;

#[cfg(test)]
mod test_support;
