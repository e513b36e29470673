//! Rules: named groups of conditions over an object's fields.
//!
//! A [`Rule`] holds ordered [`Condition`]s, each a named group of
//! [`ConditionItem`] predicates. All items of all conditions of all rules
//! bound to a trigger must hold for the trigger to match.

mod operator;

pub use operator::{FieldSource, FilterOperator};

use serde::{Deserialize, Serialize};

use crate::error::{CertflowError, ValidationError};
use crate::id::{ConditionId, RuleId};
use crate::resource::Resource;

/// A named predicate group for one resource type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub name: String,
    pub description: Option<String>,
    pub resource: Resource,
    pub conditions: Vec<Condition>,
}

impl Rule {
    /// Start a rule with a fresh id and no conditions.
    #[must_use]
    pub fn new(name: impl Into<String>, resource: Resource) -> Self {
        Self {
            id: RuleId::new(),
            name: name.into(),
            description: None,
            resource,
            conditions: Vec::new(),
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`] if the rule or one of its
    /// conditions is unnamed.
    pub fn validate(&self) -> Result<(), CertflowError> {
        if self.name.trim().is_empty() || self.conditions.iter().any(|c| c.name.trim().is_empty()) {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(())
    }
}

/// A named group of condition items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub id: ConditionId,
    pub name: String,
    pub items: Vec<ConditionItem>,
}

impl Condition {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ConditionId::new(),
            name: name.into(),
            items: Vec::new(),
        }
    }

    #[must_use]
    pub fn item(mut self, item: ConditionItem) -> Self {
        self.items.push(item);
        self
    }
}

/// One field comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionItem {
    pub field_source: FieldSource,
    pub field_identifier: String,
    pub operator: FilterOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

impl ConditionItem {
    /// Compare a property field against `value`.
    #[must_use]
    pub fn property(
        identifier: impl Into<String>,
        operator: FilterOperator,
        value: serde_json::Value,
    ) -> Self {
        Self {
            field_source: FieldSource::Property,
            field_identifier: identifier.into(),
            operator,
            value: Some(value),
        }
    }

    /// Compare a field of any source; `value` may be absent for
    /// emptiness checks.
    #[must_use]
    pub fn new(
        field_source: FieldSource,
        identifier: impl Into<String>,
        operator: FilterOperator,
        value: Option<serde_json::Value>,
    ) -> Self {
        Self {
            field_source,
            field_identifier: identifier.into(),
            operator,
            value,
        }
    }
}

impl std::fmt::Display for ConditionItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{} {}",
            self.field_source, self.field_identifier, self.operator
        )?;
        if let Some(value) = &self.value {
            write!(f, " {value}")?;
        }
        Ok(())
    }
}
