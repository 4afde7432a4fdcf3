//! Compiled style layer filters.
//!
//! Filters use the legacy style filter syntax, e.g.
//! `["all", ["==", "class", "street"], ["!in", "type", "service", "track"]]`.
//! A filter is compiled once when the style is loaded and evaluated for every feature
//! of the matching source-layer afterwards.

use std::cmp::Ordering;

use serde_json::Value;

use crate::tile::{Properties, PropertyValue};

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// True iff no sub-filter is false.
    And(Vec<Filter>),
    /// True iff at least one sub-filter is true.
    Or(Vec<Filter>),
    /// True iff no sub-filter is true.
    Nor(Vec<Filter>),
    Eq(String, Value),
    Neq(String, Value),
    Gt(String, Value),
    Ge(String, Value),
    Lt(String, Value),
    Le(String, Value),
    In(String, Vec<Value>),
    NotIn(String, Vec<Value>),
    Has(String),
    NotHas(String),
    AlwaysTrue,
}

impl Default for Filter {
    fn default() -> Self {
        Filter::AlwaysTrue
    }
}

impl Filter {
    /// Compiles a filter expression. A missing filter matches everything; so does an
    /// unsupported operator.
    pub fn compile(expression: Option<&Value>) -> Filter {
        let Some(expression) = expression else {
            return Filter::AlwaysTrue;
        };
        let Some((operator, arguments)) = expression
            .as_array()
            .and_then(|array| array.split_first())
        else {
            log::warn!("ignoring malformed filter {expression}");
            return Filter::AlwaysTrue;
        };

        let compile_all = |arguments: &[Value]| -> Vec<Filter> {
            arguments
                .iter()
                .map(|sub| Filter::compile(Some(sub)))
                .collect()
        };

        let operator = operator.as_str().unwrap_or_default();
        match operator {
            "all" => return Filter::And(compile_all(arguments)),
            "any" => return Filter::Or(compile_all(arguments)),
            "none" => return Filter::Nor(compile_all(arguments)),
            _ => {}
        }

        let Some(key) = arguments.first().and_then(Value::as_str) else {
            log::warn!("ignoring filter {expression} without a property key");
            return Filter::AlwaysTrue;
        };
        let key = key.to_string();
        let literal = || arguments.get(1).cloned().unwrap_or(Value::Null);
        let literals = || arguments.iter().skip(1).cloned().collect::<Vec<_>>();

        match operator {
            "==" => Filter::Eq(key, literal()),
            "!=" => Filter::Neq(key, literal()),
            ">" => Filter::Gt(key, literal()),
            ">=" => Filter::Ge(key, literal()),
            "<" => Filter::Lt(key, literal()),
            "<=" => Filter::Le(key, literal()),
            "in" => Filter::In(key, literals()),
            "!in" => Filter::NotIn(key, literals()),
            "has" => Filter::Has(key),
            "!has" => Filter::NotHas(key),
            _ => {
                log::warn!("unsupported filter operator `{operator}`, matching every feature");
                Filter::AlwaysTrue
            }
        }
    }

    pub fn evaluate(&self, properties: &Properties) -> bool {
        let ordering = |key: &str, literal: &Value| {
            properties
                .get(key)
                .and_then(|value| value.partial_cmp_json(literal))
        };
        let equals = |key: &str, literal: &Value| {
            properties
                .get(key)
                .is_some_and(|value| value.eq_json(literal))
        };

        match self {
            Filter::And(filters) => filters.iter().all(|filter| filter.evaluate(properties)),
            Filter::Or(filters) => filters.iter().any(|filter| filter.evaluate(properties)),
            Filter::Nor(filters) => !filters.iter().any(|filter| filter.evaluate(properties)),
            Filter::Eq(key, literal) => equals(key, literal),
            Filter::Neq(key, literal) => !equals(key, literal),
            Filter::Gt(key, literal) => ordering(key, literal) == Some(Ordering::Greater),
            Filter::Ge(key, literal) => matches!(
                ordering(key, literal),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Filter::Lt(key, literal) => ordering(key, literal) == Some(Ordering::Less),
            Filter::Le(key, literal) => matches!(
                ordering(key, literal),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Filter::In(key, literals) => literals.iter().any(|literal| equals(key, literal)),
            Filter::NotIn(key, literals) => !literals.iter().any(|literal| equals(key, literal)),
            Filter::Has(key) => properties.get(key).is_some_and(PropertyValue::is_truthy),
            Filter::NotHas(key) => !properties.get(key).is_some_and(PropertyValue::is_truthy),
            Filter::AlwaysTrue => true,
        }
    }
}
