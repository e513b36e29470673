//! # certflow-domain
//!
//! Pure domain model for the certflow certificate-lifecycle policy engine.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Resources** and **lifecycle events** raised against them
//! - Define **Triggers** (rules → actions) and their **associations** to
//!   resources, objects and events
//! - Define **Rules** (conditions over object fields) and **Actions**
//!   (field mutations and side-effect invocations)
//! - Define the append-only **trigger history** ledger
//! - Define **Certificates**, **Discoveries** and **cryptographic keys**
//! - Provide the field registry used to read and write object fields by name
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod action;
pub mod certificate;
pub mod discovery;
pub mod event;
pub mod key;
pub mod registry;
pub mod resource;
pub mod rule;
pub mod trigger;
pub mod value;
