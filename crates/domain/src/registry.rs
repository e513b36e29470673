//! Explicit field registry: named accessors for the objects triggers
//! evaluate.
//!
//! Condition items and execution items name fields by `(source,
//! identifier)`. Property identifiers resolve through accessor functions
//! registered once per object type; `meta` and `custom` identifiers read
//! the object's attribute maps.

use std::collections::HashMap;

use crate::error::{ActionExecutionError, RuleEvaluationError};
use crate::resource::Resource;
use crate::rule::FieldSource;
use crate::value::FieldValue;

/// Reads one property of `T`.
pub type Getter<T> = fn(&T) -> FieldValue;

/// Writes one property of `T` from untyped action data.
///
/// Returns a human-readable reason when the data does not fit the field.
pub type Setter<T> = fn(&mut T, &serde_json::Value) -> Result<(), String>;

/// An object rules can be evaluated against and actions can mutate.
pub trait Evaluable: Clone + Send + Sync + 'static {
    /// Resource type of every value of this type.
    const RESOURCE: Resource;

    /// Identifier of the object, absent until it is persisted.
    fn object_uuid(&self) -> Option<uuid::Uuid>;

    /// Short label used in logs and history messages.
    fn display_name(&self) -> String;

    /// Connector metadata value, [`FieldValue::Null`] when absent.
    fn metadata(&self, key: &str) -> FieldValue;

    /// Custom attribute value, [`FieldValue::Null`] when absent.
    fn custom_attribute(&self, name: &str) -> FieldValue;

    fn set_metadata(&mut self, key: &str, value: FieldValue);

    /// The property accessors of this type.
    fn fields() -> &'static FieldRegistry<Self>;
}

/// Named property getters and setters for one object type.
pub struct FieldRegistry<T> {
    getters: HashMap<&'static str, Getter<T>>,
    setters: HashMap<&'static str, Setter<T>>,
}

impl<T> Default for FieldRegistry<T> {
    fn default() -> Self {
        Self {
            getters: HashMap::new(),
            setters: HashMap::new(),
        }
    }
}

impl<T> std::fmt::Debug for FieldRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut readable: Vec<_> = self.getters.keys().collect();
        readable.sort();
        let mut writable: Vec<_> = self.setters.keys().collect();
        writable.sort();
        f.debug_struct("FieldRegistry")
            .field("readable", &readable)
            .field("writable", &writable)
            .finish()
    }
}

impl<T: Evaluable> FieldRegistry<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a readable property.
    #[must_use]
    pub fn getter(mut self, name: &'static str, getter: Getter<T>) -> Self {
        self.getters.insert(name, getter);
        self
    }

    /// Register a writable property.
    #[must_use]
    pub fn setter(mut self, name: &'static str, setter: Setter<T>) -> Self {
        self.setters.insert(name, setter);
        self
    }

    /// Whether `name` is a writable property.
    #[must_use]
    pub fn is_writable(&self, name: &str) -> bool {
        self.setters.contains_key(name)
    }

    /// Read a field of `object`.
    ///
    /// # Errors
    ///
    /// Returns [`RuleEvaluationError::UnknownField`] for an unregistered
    /// property identifier.
    pub fn read(
        &self,
        object: &T,
        source: FieldSource,
        identifier: &str,
    ) -> Result<FieldValue, RuleEvaluationError> {
        match source {
            FieldSource::Property => self
                .getters
                .get(identifier)
                .map(|getter| getter(object))
                .ok_or_else(|| RuleEvaluationError::UnknownField {
                    field_source: source,
                    identifier: identifier.to_string(),
                }),
            FieldSource::Meta => Ok(object.metadata(identifier)),
            FieldSource::Custom => Ok(object.custom_attribute(identifier)),
        }
    }

    /// Write a field of `object`.
    ///
    /// Custom-source identifiers name side effects, not fields, and are
    /// rejected here.
    ///
    /// # Errors
    ///
    /// Returns [`ActionExecutionError::UnknownField`] for an unregistered
    /// property or a custom source, and
    /// [`ActionExecutionError::InvalidValue`] when the setter rejects
    /// `data`.
    pub fn write(
        &self,
        object: &mut T,
        source: FieldSource,
        identifier: &str,
        data: &serde_json::Value,
    ) -> Result<(), ActionExecutionError> {
        match source {
            FieldSource::Property => {
                let setter = self.setters.get(identifier).ok_or_else(|| {
                    ActionExecutionError::UnknownField {
                        field_source: source,
                        identifier: identifier.to_string(),
                    }
                })?;
                setter(object, data).map_err(|reason| ActionExecutionError::InvalidValue {
                    identifier: identifier.to_string(),
                    reason,
                })
            }
            FieldSource::Meta => {
                object.set_metadata(identifier, FieldValue::from_json(data));
                Ok(())
            }
            FieldSource::Custom => Err(ActionExecutionError::UnknownField {
                field_source: source,
                identifier: identifier.to_string(),
            }),
        }
    }
}

/// Read `data` as a string, for setters of text properties.
///
/// # Errors
///
/// Returns a reason when `data` is not a JSON string.
pub fn string_data(data: &serde_json::Value) -> Result<String, String> {
    data.as_str()
        .map(str::to_string)
        .ok_or_else(|| format!("expected a string, got {data}"))
}
