//! Action executor: runs the executions of a matched trigger.
//!
//! `property` and `meta` items mutate the object through the registered
//! setters; `custom` items invoke the [`SideEffect`] registered under the
//! item's identifier. Each item leaves one [`TriggerHistoryRecord`].

use std::collections::HashMap;
use std::sync::Arc;

use certflow_domain::action::{Action, ExecutionItem};
use certflow_domain::error::ActionExecutionError;
use certflow_domain::registry::{Evaluable, FieldRegistry};
use certflow_domain::rule::FieldSource;
use certflow_domain::trigger::TriggerHistoryRecord;

use crate::ports::{SideEffect, SideEffectCall};

/// Setters and named side effects available to actions on `T`.
pub struct ActionRegistry<T: 'static> {
    fields: &'static FieldRegistry<T>,
    side_effects: HashMap<String, Arc<dyn SideEffect>>,
}

impl<T: Evaluable> Default for ActionRegistry<T> {
    fn default() -> Self {
        Self {
            fields: T::fields(),
            side_effects: HashMap::new(),
        }
    }
}

impl<T: Evaluable> ActionRegistry<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a side effect under `name`.
    #[must_use]
    pub fn side_effect(mut self, name: impl Into<String>, effect: Arc<dyn SideEffect>) -> Self {
        self.side_effects.insert(name.into(), effect);
        self
    }
}

/// Runs actions against objects of type `T`.
pub struct ActionExecutor<T: 'static> {
    registry: ActionRegistry<T>,
}

impl<T: Evaluable> ActionExecutor<T> {
    #[must_use]
    pub fn new(registry: ActionRegistry<T>) -> Self {
        Self { registry }
    }

    /// Run every item of every execution of every action, in order.
    ///
    /// Returns whether any record was produced. The first failing item
    /// writes its record and stops the remaining items. Field changes made
    /// by the failed call are reverted and their records say so; side
    /// effects already run are not undone.
    ///
    /// # Errors
    ///
    /// Returns the [`ActionExecutionError`] of the failing item.
    pub async fn perform(
        &self,
        actions: &[Action],
        object: &mut T,
        records: &mut Vec<TriggerHistoryRecord>,
    ) -> Result<bool, ActionExecutionError> {
        let snapshot = object.clone();
        let mut produced = 0_usize;
        // Records of field writes, rewritten if the call is reverted.
        let mut writes = Vec::new();
        for action in actions {
            for execution in &action.executions {
                for item in &execution.items {
                    match self.run_item(item, object).await {
                        Ok(outcome) => {
                            if item.field_source != FieldSource::Custom {
                                writes.push((records.len(), item.to_string()));
                            }
                            records.push(TriggerHistoryRecord::execution(
                                execution.id,
                                format!("{item}: {outcome}"),
                            ));
                            produced += 1;
                        }
                        Err(err) => {
                            records.push(TriggerHistoryRecord::execution(
                                execution.id,
                                format!("{item}: {err}"),
                            ));
                            *object = snapshot;
                            for (index, label) in writes {
                                records[index].message =
                                    format!("{label}: reverted after a later item failed");
                            }
                            return Err(err);
                        }
                    }
                }
            }
        }
        Ok(produced > 0)
    }

    async fn run_item(
        &self,
        item: &ExecutionItem,
        object: &mut T,
    ) -> Result<String, ActionExecutionError> {
        let name = &item.field_identifier;
        if item.field_source != FieldSource::Custom {
            self.registry
                .fields
                .write(object, item.field_source, name, &item.data)?;
            return Ok("applied".to_string());
        }

        let effect = self
            .registry
            .side_effects
            .get(name)
            .ok_or_else(|| ActionExecutionError::UnknownSideEffect(name.clone()))?;
        let object_name = object.display_name();
        let call = SideEffectCall {
            resource: T::RESOURCE,
            object_uuid: object.object_uuid(),
            object_name: &object_name,
            data: &item.data,
        };
        effect
            .invoke(call)
            .await
            .map_err(|err| ActionExecutionError::SideEffectFailed {
                name: name.clone(),
                reason: err.to_string(),
            })
    }
}
