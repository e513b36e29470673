//! Common error types used across the workspace.
//!
//! Each failure class has its own typed error and converts into
//! [`CertflowError`] via `#[from]`. Storage adapters box their own error
//! type into [`CertflowError::Storage`].

use crate::resource::{Resource, ResourceEvent};
use crate::rule::{FieldSource, FilterOperator};
use crate::trigger::TriggerKind;

/// Top-level error for every certflow operation.
#[derive(Debug, thiserror::Error)]
pub enum CertflowError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    #[error("unresolvable reference: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("rule evaluation failed: {0}")]
    RuleEvaluation(#[from] RuleEvaluationError),

    #[error("action execution failed: {0}")]
    ActionExecution(#[from] ActionExecutionError),

    #[error("item processing failed: {0}")]
    ItemProcessing(#[from] ItemProcessingError),

    #[error("batch aborted: {0}")]
    BatchFatal(#[from] BatchFatalError),

    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Domain invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("exclusion trigger must not carry actions")]
    ExclusionTriggerWithActions,

    #[error("action trigger needs at least one action")]
    NoActions,

    #[error("expected resource {expected}, got {actual}")]
    ResourceMismatch { expected: Resource, actual: Resource },

    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),

    #[error("trigger `{trigger}` cannot be associated as {kind}")]
    AssociationKindMismatch {
        trigger: String,
        kind: TriggerKind,
    },

    #[error("event {event} on {resource} needs an object id")]
    MissingObject {
        event: ResourceEvent,
        resource: Resource,
    },
}

/// A lookup by identifier found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// A trigger, rule or action reference points at something that no
/// longer exists.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("trigger {0} does not exist")]
    TriggerNotFound(String),

    #[error("trigger {trigger} references missing rule {rule}")]
    DanglingRule { trigger: String, rule: String },

    #[error("trigger {trigger} references missing action {action}")]
    DanglingAction { trigger: String, action: String },
}

/// A condition item could not be evaluated against an object.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleEvaluationError {
    #[error("unknown {field_source} field `{identifier}`")]
    UnknownField {
        field_source: FieldSource,
        identifier: String,
    },

    #[error("operator {operator} is not applicable to {found} field `{identifier}`")]
    TypeMismatch {
        identifier: String,
        operator: FilterOperator,
        found: &'static str,
    },

    #[error("operator {operator} on `{identifier}` needs a comparison value")]
    MissingValue {
        identifier: String,
        operator: FilterOperator,
    },

    #[error("comparison value {value} cannot be read as {expected} for `{identifier}`")]
    InvalidValue {
        identifier: String,
        expected: &'static str,
        value: String,
    },
}

/// An execution item failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionExecutionError {
    #[error("unknown {field_source} field `{identifier}`")]
    UnknownField {
        field_source: FieldSource,
        identifier: String,
    },

    #[error("invalid value for `{identifier}`: {reason}")]
    InvalidValue { identifier: String, reason: String },

    #[error("no side effect named `{0}` is registered")]
    UnknownSideEffect(String),

    #[error("side effect `{name}` failed: {reason}")]
    SideEffectFailed { name: String, reason: String },
}

/// A single discovery item could not be turned into a certificate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ItemProcessingError {
    #[error("cannot parse certificate: {0}")]
    Parse(String),

    #[error("processing interrupted")]
    Interrupted,
}

/// Conditions that abort a whole discovery batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchFatalError {
    #[error("worker pool permits are closed")]
    PermitsClosed,

    /// No storage connection could be obtained for a candidate.
    #[error("storage exhausted: {0}")]
    StorageExhausted(String),
}
