//! Side-effect port: named collaborators invoked by custom-source
//! execution items.

use futures::future::BoxFuture;

use certflow_domain::error::CertflowError;
use certflow_domain::resource::Resource;

/// What a side effect is invoked with.
#[derive(Debug, Clone, Copy)]
pub struct SideEffectCall<'a> {
    pub resource: Resource,
    pub object_uuid: Option<uuid::Uuid>,
    pub object_name: &'a str,
    pub data: &'a serde_json::Value,
}

/// A named non-field action, e.g. binding a notification profile.
///
/// Side effects are held as trait objects in the action registry, so the
/// method returns a boxed future.
pub trait SideEffect: Send + Sync {
    /// Run the side effect and describe what was done.
    fn invoke<'a>(&'a self, call: SideEffectCall<'a>) -> BoxFuture<'a, Result<String, CertflowError>>;
}
