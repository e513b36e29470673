//! Field sources and comparison operators used by condition items.

use serde::{Deserialize, Serialize};

/// Where a condition or execution item reads / writes its field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    /// A first-class property of the object (common name, group, …).
    Property,
    /// Connector-supplied metadata attached to the object.
    Meta,
    /// An operator-defined custom attribute.
    Custom,
}

impl std::fmt::Display for FieldSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Property => "property",
            Self::Meta => "meta",
            Self::Custom => "custom",
        })
    }
}

/// Comparison operator of a condition item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Empty,
    NotEmpty,
    Greater,
    GreaterOrEqual,
    Lesser,
    LesserOrEqual,
}

impl FilterOperator {
    /// Whether the operator compares against a value.
    #[must_use]
    pub fn requires_value(self) -> bool {
        !matches!(self, Self::Empty | Self::NotEmpty)
    }

    /// Whether a null field satisfies the operator.
    #[must_use]
    pub fn matches_null(self) -> bool {
        matches!(self, Self::NotEquals | Self::NotContains | Self::Empty)
    }
}

impl std::fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Equals => "EQUALS",
            Self::NotEquals => "NOT_EQUALS",
            Self::Contains => "CONTAINS",
            Self::NotContains => "NOT_CONTAINS",
            Self::StartsWith => "STARTS_WITH",
            Self::EndsWith => "ENDS_WITH",
            Self::Empty => "EMPTY",
            Self::NotEmpty => "NOT_EMPTY",
            Self::Greater => "GREATER",
            Self::GreaterOrEqual => "GREATER_OR_EQUAL",
            Self::Lesser => "LESSER",
            Self::LesserOrEqual => "LESSER_OR_EQUAL",
        })
    }
}
