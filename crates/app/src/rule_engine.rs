//! Rule engine: evaluates a trigger's rules against one object.
//!
//! Every condition item of every condition of every rule must hold for the
//! trigger to match. All items are evaluated, even after the outcome is
//! known, and each one leaves a [`TriggerHistoryRecord`] so a non-match can
//! be explained item by item.

use std::cmp::Ordering;

use certflow_domain::error::RuleEvaluationError;
use certflow_domain::registry::{Evaluable, FieldRegistry};
use certflow_domain::rule::{ConditionItem, FilterOperator, Rule};
use certflow_domain::time::parse_timestamp;
use certflow_domain::trigger::TriggerHistoryRecord;
use certflow_domain::value::FieldValue;

/// Evaluates rules against objects of type `T`.
pub struct RuleEngine<T: 'static> {
    fields: &'static FieldRegistry<T>,
}

impl<T: Evaluable> Default for RuleEngine<T> {
    fn default() -> Self {
        Self {
            fields: T::fields(),
        }
    }
}

impl<T: Evaluable> RuleEngine<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate `rules` against `object`, appending one record per item.
    ///
    /// An empty rule list matches. Items that cannot be evaluated are
    /// recorded with their error and count as not matched.
    pub fn evaluate(
        &self,
        rules: &[Rule],
        object: &T,
        records: &mut Vec<TriggerHistoryRecord>,
    ) -> bool {
        let mut matched = true;
        for rule in rules {
            for condition in &rule.conditions {
                for item in &condition.items {
                    let message = match self.evaluate_item(item, object) {
                        Ok(true) => format!("{item}: matched"),
                        Ok(false) => {
                            matched = false;
                            format!("{item}: not matched")
                        }
                        Err(err) => {
                            matched = false;
                            tracing::debug!(
                                rule = %rule.name,
                                condition = %condition.name,
                                object = %object.display_name(),
                                error = %err,
                                "condition item could not be evaluated"
                            );
                            format!("{item}: {err}")
                        }
                    };
                    records.push(TriggerHistoryRecord::condition(condition.id, message));
                }
            }
        }
        matched
    }

    fn evaluate_item(&self, item: &ConditionItem, object: &T) -> Result<bool, RuleEvaluationError> {
        let field = self
            .fields
            .read(object, item.field_source, &item.field_identifier)?;
        let operator = item.operator;

        if !operator.requires_value() {
            return Ok((operator == FilterOperator::Empty) == field.is_empty());
        }

        let value = item
            .value
            .as_ref()
            .filter(|value| !value.is_null())
            .ok_or_else(|| RuleEvaluationError::MissingValue {
                identifier: item.field_identifier.clone(),
                operator,
            })?;

        let elements: Vec<&FieldValue> = field
            .elements()
            .into_iter()
            .filter(|element| !matches!(element, FieldValue::Null))
            .collect();
        if elements.is_empty() {
            return Ok(operator.matches_null());
        }

        for element in elements {
            if compare(&item.field_identifier, element, operator, value)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Compare one scalar field element against the item's value.
fn compare(
    identifier: &str,
    field: &FieldValue,
    operator: FilterOperator,
    value: &serde_json::Value,
) -> Result<bool, RuleEvaluationError> {
    let mismatch = || RuleEvaluationError::TypeMismatch {
        identifier: identifier.to_string(),
        operator,
        found: field.type_name(),
    };
    let invalid = |expected: &'static str| RuleEvaluationError::InvalidValue {
        identifier: identifier.to_string(),
        expected,
        value: value.to_string(),
    };

    match field {
        FieldValue::String(text) => {
            let expected = text_value(value).ok_or_else(|| invalid("text"))?;
            match operator {
                FilterOperator::Equals => Ok(*text == expected),
                FilterOperator::NotEquals => Ok(*text != expected),
                FilterOperator::Contains => Ok(text.contains(&expected)),
                FilterOperator::NotContains => Ok(!text.contains(&expected)),
                FilterOperator::StartsWith => Ok(text.starts_with(&expected)),
                FilterOperator::EndsWith => Ok(text.ends_with(&expected)),
                _ => Err(mismatch()),
            }
        }
        FieldValue::Int(_) | FieldValue::Float(_) => {
            let ordering = numeric_ordering(field, value).ok_or_else(|| invalid("number"))?;
            ordered(operator, ordering).ok_or_else(mismatch)
        }
        FieldValue::DateTime(ts) => {
            let expected = value
                .as_str()
                .and_then(parse_timestamp)
                .ok_or_else(|| invalid("date"))?;
            ordered(operator, ts.cmp(&expected)).ok_or_else(mismatch)
        }
        FieldValue::Bool(flag) => {
            let expected = bool_value(value).ok_or_else(|| invalid("boolean"))?;
            match operator {
                FilterOperator::Equals => Ok(*flag == expected),
                FilterOperator::NotEquals => Ok(*flag != expected),
                _ => Err(mismatch()),
            }
        }
        FieldValue::Null | FieldValue::List(_) => Ok(operator.matches_null()),
    }
}

/// Map an ordering onto an equality or ordering operator; `None` for
/// operators that do not compare order.
fn ordered(operator: FilterOperator, ordering: Ordering) -> Option<bool> {
    match operator {
        FilterOperator::Equals => Some(ordering == Ordering::Equal),
        FilterOperator::NotEquals => Some(ordering != Ordering::Equal),
        FilterOperator::Greater => Some(ordering == Ordering::Greater),
        FilterOperator::GreaterOrEqual => Some(ordering != Ordering::Less),
        FilterOperator::Lesser => Some(ordering == Ordering::Less),
        FilterOperator::LesserOrEqual => Some(ordering != Ordering::Greater),
        _ => None,
    }
}

fn text_value(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(text) => Some(text.clone()),
        serde_json::Value::Number(number) => Some(number.to_string()),
        serde_json::Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn bool_value(value: &serde_json::Value) -> Option<bool> {
    match value {
        serde_json::Value::Bool(flag) => Some(*flag),
        serde_json::Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

#[allow(clippy::cast_precision_loss)]
fn numeric_ordering(field: &FieldValue, value: &serde_json::Value) -> Option<Ordering> {
    let number = match value {
        serde_json::Value::Number(number) => number.clone(),
        serde_json::Value::String(text) => text.trim().parse::<serde_json::Number>().ok()?,
        _ => return None,
    };
    match (field, number.as_i64()) {
        (FieldValue::Int(actual), Some(expected)) => Some(actual.cmp(&expected)),
        (FieldValue::Int(actual), None) => (*actual as f64).partial_cmp(&number.as_f64()?),
        (FieldValue::Float(actual), _) => actual.partial_cmp(&number.as_f64()?),
        _ => None,
    }
}
