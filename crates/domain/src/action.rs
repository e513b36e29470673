//! Actions: ordered executions performed when a trigger matches.
//!
//! An [`Action`] groups [`Execution`]s; an execution groups
//! [`ExecutionItem`]s. Items with a `property` or `meta` source mutate the
//! object; items with a `custom` source invoke the side effect registered
//! under the item's identifier.

use serde::{Deserialize, Serialize};

use crate::id::{ActionId, ExecutionId};
use crate::resource::Resource;
use crate::rule::FieldSource;

/// A named, ordered list of executions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: ActionId,
    pub name: String,
    pub resource: Resource,
    pub executions: Vec<Execution>,
}

impl Action {
    #[must_use]
    pub fn new(name: impl Into<String>, resource: Resource) -> Self {
        Self {
            id: ActionId::new(),
            name: name.into(),
            resource,
            executions: Vec::new(),
        }
    }

    #[must_use]
    pub fn execution(mut self, execution: Execution) -> Self {
        self.executions.push(execution);
        self
    }
}

/// A named, ordered list of execution items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub name: String,
    pub items: Vec<ExecutionItem>,
}

impl Execution {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ExecutionId::new(),
            name: name.into(),
            items: Vec::new(),
        }
    }

    #[must_use]
    pub fn item(mut self, item: ExecutionItem) -> Self {
        self.items.push(item);
        self
    }
}

/// One field mutation or side-effect invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionItem {
    pub field_source: FieldSource,
    pub field_identifier: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl ExecutionItem {
    /// Set a property field to `data`.
    #[must_use]
    pub fn set_property(identifier: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            field_source: FieldSource::Property,
            field_identifier: identifier.into(),
            data,
        }
    }

    /// Invoke the side effect registered as `name` with `data`.
    #[must_use]
    pub fn invoke(name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            field_source: FieldSource::Custom,
            field_identifier: name.into(),
            data,
        }
    }
}

impl std::fmt::Display for ExecutionItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.field_source {
            FieldSource::Custom => write!(f, "invoke {}({})", self.field_identifier, self.data),
            source => write!(f, "set {source}.{} = {}", self.field_identifier, self.data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_property_mutation() {
        let item = ExecutionItem::set_property("group", serde_json::json!("Staging"));
        assert_eq!(item.to_string(), "set property.group = \"Staging\"");
    }

    #[test]
    fn should_display_side_effect_invocation() {
        let item = ExecutionItem::invoke("notification_profile", serde_json::json!("ops"));
        assert_eq!(item.to_string(), "invoke notification_profile(\"ops\")");
    }

    #[test]
    fn should_default_missing_data_to_null() {
        let json = serde_json::json!({
            "field_source": "custom",
            "field_identifier": "notification_profile"
        });
        let item: ExecutionItem = serde_json::from_value(json).unwrap();
        assert!(item.data.is_null());
    }

    #[test]
    fn should_keep_execution_order() {
        let action = Action::new("Tag", Resource::Certificate)
            .execution(Execution::new("first"))
            .execution(Execution::new("second"));
        let names: Vec<_> = action.executions.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["first", "second"]);
    }
}
