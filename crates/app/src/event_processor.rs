//! Event processor: per-object evaluation of resolved triggers.
//!
//! Each object walks `Pending → ExclusionCheck → {Excluded | Eligible} →
//! ActionsApplied → Done`. Exclusion triggers run first and the first
//! match stops the object; action triggers then run in ascending order
//! without short-circuit. Every trigger evaluated leaves exactly one
//! [`TriggerHistory`] row in the sink.

use certflow_domain::error::{CertflowError, ValidationError};
use certflow_domain::id::TriggerId;
use certflow_domain::registry::Evaluable;
use certflow_domain::resource::{Resource, ResourceEvent};
use certflow_domain::trigger::TriggerHistory;

use crate::action_executor::ActionExecutor;
use crate::ports::HistorySink;
use crate::rule_engine::RuleEngine;
use crate::trigger_resolver::{OrderedTriggers, ResolvedTrigger};

/// Where an object is in its evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingState {
    Pending,
    ExclusionCheck,
    Excluded,
    Eligible,
    ActionsApplied,
    Done,
}

/// Outcome of the exclusion phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionVerdict {
    /// No exclusion trigger matched.
    Eligible,
    /// The given exclusion trigger matched; the object must not be
    /// processed further.
    Excluded(TriggerId),
}

/// An action trigger whose actions failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionFailure {
    pub trigger_id: TriggerId,
    pub message: String,
}

/// Outcome of the action phase for one object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionReport {
    /// Action triggers evaluated, including the failed one.
    pub evaluated: usize,
    /// Action triggers whose rules matched.
    pub matched: usize,
    /// Whether any matched trigger performed an action.
    pub performed: bool,
    /// Set when a trigger's actions failed; later triggers were skipped.
    pub failure: Option<ActionFailure>,
}

/// Outcome of [`EventProcessor::process`] for one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectOutcome {
    pub object_uuid: Option<uuid::Uuid>,
    /// `Excluded` or `ActionsApplied`.
    pub state: ProcessingState,
    pub excluded_by: Option<TriggerId>,
    pub report: ActionReport,
}

/// Transient aggregate for one dispatch: the event, the objects it
/// concerns and the triggers resolved for it.
///
/// Batch contexts carry no objects; each worker parses its own.
#[derive(Debug, Clone)]
pub struct EventContext<T> {
    pub event: ResourceEvent,
    pub resource: Resource,
    pub objects: Vec<T>,
    pub triggers: OrderedTriggers,
}

impl<T> EventContext<T> {
    #[must_use]
    pub fn new(event: ResourceEvent, resource: Resource, triggers: OrderedTriggers) -> Self {
        Self {
            event,
            resource,
            objects: Vec::new(),
            triggers,
        }
    }

    #[must_use]
    pub fn with_object(mut self, object: T) -> Self {
        self.objects.push(object);
        self
    }
}

/// Evaluates resolved triggers against objects of type `T`.
pub struct EventProcessor<T: 'static> {
    rules: RuleEngine<T>,
    actions: ActionExecutor<T>,
}

impl<T: Evaluable> EventProcessor<T> {
    #[must_use]
    pub fn new(actions: ActionExecutor<T>) -> Self {
        Self {
            rules: RuleEngine::new(),
            actions,
        }
    }

    /// Run the exclusion phase for `object`.
    ///
    /// `reference` is recorded on every row; it identifies the object
    /// before it has an id of its own.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the history sink.
    pub async fn check_exclusions<S: HistorySink>(
        &self,
        triggers: &OrderedTriggers,
        object: &T,
        reference: Option<uuid::Uuid>,
        sink: &mut S,
    ) -> Result<ExclusionVerdict, CertflowError> {
        for resolved in &triggers.exclusion {
            let mut row = history_row(resolved, object, reference);
            if let Some(message) = resource_mismatch::<T>(resolved) {
                sink.append(row.with_message(message)).await?;
                continue;
            }

            if self
                .rules
                .evaluate(&resolved.trigger.rules, object, &mut row.records)
            {
                row.conditions_matched = true;
                row.actions_performed = true;
                row.message = Some(format!(
                    "excluded by trigger `{}`",
                    resolved.trigger.name
                ));
                sink.append(row).await?;
                tracing::debug!(
                    trigger_id = %resolved.trigger.id,
                    object = %object.display_name(),
                    "object excluded"
                );
                return Ok(ExclusionVerdict::Excluded(resolved.trigger.id));
            }
            sink.append(row).await?;
        }
        Ok(ExclusionVerdict::Eligible)
    }

    /// Run the action phase for `object`.
    ///
    /// A trigger whose actions fail still gets its row, carrying the
    /// error; the remaining triggers for this object are skipped and the
    /// report names the failure.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the history sink.
    pub async fn apply_actions<S: HistorySink>(
        &self,
        triggers: &OrderedTriggers,
        object: &mut T,
        reference: Option<uuid::Uuid>,
        sink: &mut S,
    ) -> Result<ActionReport, CertflowError> {
        let mut report = ActionReport::default();
        for resolved in &triggers.actions {
            report.evaluated += 1;
            let mut row = history_row(resolved, object, reference);
            if let Some(message) = resource_mismatch::<T>(resolved) {
                sink.append(row.with_message(message)).await?;
                continue;
            }

            let matched = self
                .rules
                .evaluate(&resolved.trigger.rules, object, &mut row.records);
            row.conditions_matched = matched;
            if matched {
                report.matched += 1;
                match self
                    .actions
                    .perform(&resolved.trigger.actions, object, &mut row.records)
                    .await
                {
                    Ok(performed) => {
                        row.actions_performed = performed;
                        report.performed |= performed;
                    }
                    Err(err) => {
                        tracing::warn!(
                            trigger_id = %resolved.trigger.id,
                            object = %object.display_name(),
                            object_uuid = ?object.object_uuid(),
                            error = %err,
                            "actions failed, skipping remaining triggers for object"
                        );
                        let message = err.to_string();
                        sink.append(row.with_message(message.clone())).await?;
                        report.failure = Some(ActionFailure {
                            trigger_id: resolved.trigger.id,
                            message,
                        });
                        return Ok(report);
                    }
                }
            }
            sink.append(row).await?;
        }
        Ok(report)
    }

    /// Run both phases for one object that already exists.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the history sink.
    pub async fn process_object<S: HistorySink>(
        &self,
        triggers: &OrderedTriggers,
        object: &mut T,
        reference: Option<uuid::Uuid>,
        sink: &mut S,
    ) -> Result<ObjectOutcome, CertflowError> {
        let mut outcome = ObjectOutcome {
            object_uuid: object.object_uuid(),
            state: ProcessingState::Pending,
            excluded_by: None,
            report: ActionReport::default(),
        };
        let mut state = ProcessingState::Pending;
        loop {
            tracing::trace!(?state, object = %object.display_name(), "processing");
            state = match state {
                ProcessingState::Pending => ProcessingState::ExclusionCheck,
                ProcessingState::ExclusionCheck => {
                    match self.check_exclusions(triggers, object, reference, sink).await? {
                        ExclusionVerdict::Excluded(trigger_id) => {
                            outcome.excluded_by = Some(trigger_id);
                            ProcessingState::Excluded
                        }
                        ExclusionVerdict::Eligible => ProcessingState::Eligible,
                    }
                }
                ProcessingState::Eligible => {
                    outcome.report = self.apply_actions(triggers, object, reference, sink).await?;
                    ProcessingState::ActionsApplied
                }
                ProcessingState::Excluded | ProcessingState::ActionsApplied => {
                    outcome.state = state;
                    ProcessingState::Done
                }
                ProcessingState::Done => break,
            };
        }
        Ok(outcome)
    }

    /// Run both phases for every object of `context`, mutating them in
    /// place.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the history sink.
    #[tracing::instrument(skip_all, fields(event = %context.event, objects = context.objects.len()))]
    pub async fn process<S: HistorySink>(
        &self,
        context: &mut EventContext<T>,
        sink: &mut S,
    ) -> Result<Vec<ObjectOutcome>, CertflowError> {
        let mut outcomes = Vec::with_capacity(context.objects.len());
        for object in &mut context.objects {
            outcomes.push(
                self.process_object(&context.triggers, object, None, sink)
                    .await?,
            );
        }
        Ok(outcomes)
    }
}

fn history_row<T: Evaluable>(
    resolved: &ResolvedTrigger,
    object: &T,
    reference: Option<uuid::Uuid>,
) -> TriggerHistory {
    TriggerHistory::new(
        resolved.trigger.id,
        Some(resolved.association.id),
        object.object_uuid(),
        reference,
    )
}

fn resource_mismatch<T: Evaluable>(resolved: &ResolvedTrigger) -> Option<String> {
    (resolved.trigger.resource != T::RESOURCE).then(|| {
        ValidationError::ResourceMismatch {
            expected: resolved.trigger.resource,
            actual: T::RESOURCE,
        }
        .to_string()
    })
}
