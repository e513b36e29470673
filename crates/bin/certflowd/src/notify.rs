//! The `notification_profile` side effect.
//!
//! Binds a notification profile to the evaluated object. Delivery belongs
//! to the notification service; this side effect emits the binding as a
//! structured event for it to pick up.

use futures::FutureExt;
use futures::future::BoxFuture;

use certflow_app::ports::{SideEffect, SideEffectCall};
use certflow_domain::error::{ActionExecutionError, CertflowError};

/// Name execution items use to invoke [`TracingNotifier`].
pub const NOTIFICATION_PROFILE: &str = "notification_profile";

#[derive(Debug, Default)]
pub struct TracingNotifier;

impl SideEffect for TracingNotifier {
    fn invoke<'a>(&'a self, call: SideEffectCall<'a>) -> BoxFuture<'a, Result<String, CertflowError>> {
        async move {
            let profile = call.data.as_str().filter(|p| !p.is_empty()).ok_or_else(|| {
                ActionExecutionError::SideEffectFailed {
                    name: NOTIFICATION_PROFILE.to_string(),
                    reason: format!("expected a profile name, got {}", call.data),
                }
            })?;
            tracing::info!(
                target: "certflowd::notify",
                profile,
                resource = %call.resource,
                object_uuid = ?call.object_uuid,
                object = call.object_name,
                "notification profile bound"
            );
            Ok::<_, CertflowError>(format!(
                "notification profile `{profile}` bound to {}",
                call.object_name
            ))
        }
        .boxed()
    }
}
