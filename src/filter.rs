//! Boolean filter trees for report requests.
//!
//! Filters are described by a nested JSON-like definition:
//!
//! ```json
//! {"and": [
//!     {"fieldName": "eventName", "stringFilter": {"value": "purchase"}},
//!     {"not": {"fieldName": "pagePath", "stringFilter": {"value": "/admin", "matchType": "BEGINS_WITH"}}}
//! ]}
//! ```
//!
//! [`FilterNode::from_definition`] translates such a definition into a
//! [`FilterNode`] tree, and [`FilterNode::to_expression`] renders the tree in
//! the Data API wire shape.

use crate::api::data::{Filter, FilterExpression, FilterExpressionList, StringFilter};
use crate::error::FilterError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// How a string filter compares the field with its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StringMatchType {
    #[default]
    Exact,
    BeginsWith,
    EndsWith,
    Contains,
    FullRegexp,
    PartialRegexp,
}

impl FromStr for StringMatchType {
    type Err = FilterError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "EXACT" => Ok(StringMatchType::Exact),
            "BEGINS_WITH" => Ok(StringMatchType::BeginsWith),
            "ENDS_WITH" => Ok(StringMatchType::EndsWith),
            "CONTAINS" => Ok(StringMatchType::Contains),
            "FULL_REGEXP" => Ok(StringMatchType::FullRegexp),
            "PARTIAL_REGEXP" => Ok(StringMatchType::PartialRegexp),
            _ => Err(FilterError::UnknownMatchType(value.to_string())),
        }
    }
}

/// Leaf condition: a string match on one field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StringCondition {
    pub field_name: String,
    pub match_type: StringMatchType,
    pub value: String,
    pub case_sensitive: bool,
}

/// Filter tree mirroring the API's boolean filter expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterNode {
    And(Vec<FilterNode>),
    Or(Vec<FilterNode>),
    Not(Box<FilterNode>),
    Leaf(StringCondition),
}

impl FilterNode {
    /// Case-insensitive exact match on `field_name`.
    pub fn exact(field_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::string(field_name, StringMatchType::Exact, value, false)
    }

    pub fn string(
        field_name: impl Into<String>,
        match_type: StringMatchType,
        value: impl Into<String>,
        case_sensitive: bool,
    ) -> Self {
        FilterNode::Leaf(StringCondition {
            field_name: field_name.into(),
            match_type,
            value: value.into(),
            case_sensitive,
        })
    }

    pub fn and(children: Vec<FilterNode>) -> Self {
        FilterNode::And(children)
    }

    pub fn or(children: Vec<FilterNode>) -> Self {
        FilterNode::Or(children)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(child: FilterNode) -> Self {
        FilterNode::Not(Box::new(child))
    }

    /// Translates a nested definition into a filter tree.
    ///
    /// Keys are checked in the order `and`, `or`, `not`; anything else is a
    /// leaf with `fieldName` and `stringFilter.value`, where `matchType`
    /// defaults to `EXACT` and `caseSensitive` to `false`.
    ///
    /// # Errors
    /// Returns `FilterError` for non-object nodes, non-list groups, missing
    /// leaf fields or unknown match types.
    pub fn from_definition(definition: &Value) -> Result<Self, FilterError> {
        let object = definition.as_object().ok_or(FilterError::NotAnObject)?;

        if let Some(group) = object.get("and") {
            return Ok(FilterNode::And(Self::children(group, "and")?));
        }
        if let Some(group) = object.get("or") {
            return Ok(FilterNode::Or(Self::children(group, "or")?));
        }
        if let Some(inner) = object.get("not") {
            return Ok(FilterNode::Not(Box::new(Self::from_definition(inner)?)));
        }

        let field_name = object
            .get("fieldName")
            .and_then(Value::as_str)
            .ok_or_else(|| FilterError::MissingField("fieldName".to_string()))?;
        let string_filter = object
            .get("stringFilter")
            .and_then(Value::as_object)
            .ok_or_else(|| FilterError::MissingField("stringFilter".to_string()))?;
        let value = match string_filter.get("value") {
            Some(Value::String(value)) => value.clone(),
            Some(Value::Number(value)) => value.to_string(),
            _ => return Err(FilterError::MissingField("stringFilter.value".to_string())),
        };
        let match_type = match string_filter.get("matchType").and_then(Value::as_str) {
            Some(raw) => raw.parse()?,
            None => StringMatchType::Exact,
        };
        let case_sensitive = string_filter
            .get("caseSensitive")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Ok(Self::string(field_name, match_type, value, case_sensitive))
    }

    fn children(group: &Value, key: &str) -> Result<Vec<FilterNode>, FilterError> {
        group
            .as_array()
            .ok_or_else(|| FilterError::InvalidGroup(key.to_string()))?
            .iter()
            .map(Self::from_definition)
            .collect()
    }

    /// Renders the tree as the API's filter expression.
    pub fn to_expression(&self) -> FilterExpression {
        match self {
            FilterNode::And(children) => FilterExpression {
                and_group: Some(Self::expression_list(children)),
                ..Default::default()
            },
            FilterNode::Or(children) => FilterExpression {
                or_group: Some(Self::expression_list(children)),
                ..Default::default()
            },
            FilterNode::Not(child) => FilterExpression {
                not_expression: Some(Box::new(child.to_expression())),
                ..Default::default()
            },
            FilterNode::Leaf(condition) => FilterExpression {
                filter: Some(Filter {
                    field_name: condition.field_name.clone(),
                    string_filter: Some(StringFilter {
                        match_type: condition.match_type,
                        value: condition.value.clone(),
                        case_sensitive: condition.case_sensitive,
                    }),
                }),
                ..Default::default()
            },
        }
    }

    fn expression_list(children: &[FilterNode]) -> FilterExpressionList {
        FilterExpressionList {
            expressions: children.iter().map(FilterNode::to_expression).collect(),
        }
    }
}
