//! Trigger: rules → actions automation unit for one resource type.
//!
//! A [`Trigger`] is bound to events and objects through
//! [`TriggerAssociation`]s. Exclusion triggers (`ignore_object`) suppress
//! every further evaluation of an object when they match; action triggers
//! run their [`Action`]s when they match.

mod association;
mod history;

pub use association::{TriggerAssociation, TriggerKind};
pub use history::{TriggerHistory, TriggerHistoryRecord};

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::error::{CertflowError, ValidationError};
use crate::id::TriggerId;
use crate::resource::{Resource, ResourceEvent};
use crate::rule::Rule;

/// An operator-configured automation unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub id: TriggerId,
    pub name: String,
    pub description: Option<String>,
    /// Resource type of the objects this trigger evaluates.
    pub resource: Resource,
    /// Exclusion trigger: a match stops all processing of the object.
    pub ignore_object: bool,
    /// Restricts the trigger to one event when set.
    pub event: Option<ResourceEvent>,
    /// Resource raising `event` when it differs from `resource`.
    pub event_resource: Option<Resource>,
    pub rules: Vec<Rule>,
    pub actions: Vec<Action>,
}

impl Trigger {
    /// Create a builder for constructing a [`Trigger`].
    #[must_use]
    pub fn builder() -> TriggerBuilder {
        TriggerBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`CertflowError::Validation`] when:
    /// - `name` is empty ([`ValidationError::EmptyName`])
    /// - an exclusion trigger carries actions
    ///   ([`ValidationError::ExclusionTriggerWithActions`])
    /// - an action trigger has no actions ([`ValidationError::NoActions`])
    /// - a rule or action targets another resource
    ///   ([`ValidationError::ResourceMismatch`])
    pub fn validate(&self) -> Result<(), CertflowError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.ignore_object && !self.actions.is_empty() {
            return Err(ValidationError::ExclusionTriggerWithActions.into());
        }
        if !self.ignore_object && self.actions.is_empty() {
            return Err(ValidationError::NoActions.into());
        }
        let foreign = self
            .rules
            .iter()
            .map(|r| r.resource)
            .chain(self.actions.iter().map(|a| a.resource))
            .find(|resource| *resource != self.resource);
        if let Some(actual) = foreign {
            return Err(ValidationError::ResourceMismatch {
                expected: self.resource,
                actual,
            }
            .into());
        }
        for rule in &self.rules {
            rule.validate()?;
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Trigger`].
#[derive(Debug, Default)]
pub struct TriggerBuilder {
    id: Option<TriggerId>,
    name: Option<String>,
    description: Option<String>,
    resource: Option<Resource>,
    ignore_object: bool,
    event: Option<ResourceEvent>,
    event_resource: Option<Resource>,
    rules: Vec<Rule>,
    actions: Vec<Action>,
}

impl TriggerBuilder {
    #[must_use]
    pub fn id(mut self, id: TriggerId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn resource(mut self, resource: Resource) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Mark the trigger as an exclusion trigger.
    #[must_use]
    pub fn ignore_object(mut self, ignore: bool) -> Self {
        self.ignore_object = ignore;
        self
    }

    #[must_use]
    pub fn event(mut self, event: ResourceEvent) -> Self {
        self.event = Some(event);
        self
    }

    #[must_use]
    pub fn event_resource(mut self, resource: Resource) -> Self {
        self.event_resource = Some(resource);
        self
    }

    #[must_use]
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    #[must_use]
    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Consume the builder, validate, and return a [`Trigger`].
    ///
    /// The resource defaults to [`Resource::Certificate`].
    ///
    /// # Errors
    ///
    /// Returns [`CertflowError::Validation`] if invariants fail.
    pub fn build(self) -> Result<Trigger, CertflowError> {
        let trigger = Trigger {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            description: self.description,
            resource: self.resource.unwrap_or(Resource::Certificate),
            ignore_object: self.ignore_object,
            event: self.event,
            event_resource: self.event_resource,
            rules: self.rules,
            actions: self.actions,
        };
        trigger.validate()?;
        Ok(trigger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Execution, ExecutionItem};
    use crate::rule::{Condition, ConditionItem, FilterOperator};

    fn cn_contains(text: &str) -> Rule {
        Rule::new("CN rule", Resource::Certificate).condition(
            Condition::new("cn").item(ConditionItem::property(
                "common_name",
                FilterOperator::Contains,
                serde_json::json!(text),
            )),
        )
    }

    fn set_group(group: &str) -> Action {
        Action::new("Set group", Resource::Certificate).execution(
            Execution::new("group")
                .item(ExecutionItem::set_property("group", serde_json::json!(group))),
        )
    }

    #[test]
    fn should_build_exclusion_trigger_without_actions() {
        let trigger = Trigger::builder()
            .name("Skip test certificates")
            .ignore_object(true)
            .rule(cn_contains("test"))
            .build()
            .unwrap();
        assert!(trigger.ignore_object);
        assert_eq!(trigger.resource, Resource::Certificate);
    }

    #[test]
    fn should_build_action_trigger() {
        let trigger = Trigger::builder()
            .name("Stage test certificates")
            .event(ResourceEvent::CertificateDiscovered)
            .rule(cn_contains("test"))
            .action(set_group("Staging"))
            .build()
            .unwrap();
        assert_eq!(trigger.actions.len(), 1);
        assert_eq!(trigger.event, Some(ResourceEvent::CertificateDiscovered));
    }

    #[test]
    fn should_return_validation_error_when_name_is_empty() {
        let result = Trigger::builder().action(set_group("x")).build();
        assert!(matches!(
            result,
            Err(CertflowError::Validation(ValidationError::EmptyName))
        ));
    }

    #[test]
    fn should_reject_exclusion_trigger_with_actions() {
        let result = Trigger::builder()
            .name("Confused")
            .ignore_object(true)
            .action(set_group("x"))
            .build();
        assert!(matches!(
            result,
            Err(CertflowError::Validation(
                ValidationError::ExclusionTriggerWithActions
            ))
        ));
    }

    #[test]
    fn should_reject_action_trigger_without_actions() {
        let result = Trigger::builder().name("Idle").build();
        assert!(matches!(
            result,
            Err(CertflowError::Validation(ValidationError::NoActions))
        ));
    }

    #[test]
    fn should_reject_rule_for_another_resource() {
        let result = Trigger::builder()
            .name("Mixed")
            .ignore_object(true)
            .rule(Rule::new("Profile rule", Resource::RaProfile))
            .build();
        assert!(matches!(
            result,
            Err(CertflowError::Validation(ValidationError::ResourceMismatch {
                expected: Resource::Certificate,
                actual: Resource::RaProfile,
            }))
        ));
    }

    #[test]
    fn should_roundtrip_through_serde_json() {
        let trigger = Trigger::builder()
            .name("Stage")
            .rule(cn_contains("test"))
            .action(set_group("Staging"))
            .build()
            .unwrap();
        let json = serde_json::to_string(&trigger).unwrap();
        let parsed: Trigger = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, trigger);
    }
}
