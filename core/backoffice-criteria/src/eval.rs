//! Local evaluation of filter trees against JSON records.
//!
//! The server is the authority on what a criteria matches. This evaluator
//! exists so callers can check a locally held record against a filter (e.g.
//! to decide whether a freshly saved entity still belongs in a list) and so
//! the complement of a filter set can be verified without a server.
//!
//! Field paths are dotted (`manufacturer.name`). When a path crosses an
//! array (a to-many association), the leaf matches if any element matches.
//! String comparisons in `contains`/`prefix`/`suffix` are case-insensitive,
//! like the default collation of the backing database.

use crate::filter::{Filter, RangeBounds};
use serde_json::Value;
use std::cmp::Ordering;

impl Filter {
    /// Returns true if `record` satisfies this filter.
    pub fn matches(&self, record: &Value) -> bool {
        match self {
            Filter::Equals { field, value } => {
                let found = resolve(record, field);
                if value.is_null() {
                    return found.iter().all(|v| v.is_null());
                }
                found.iter().any(|v| values_equal(v, value))
            }
            Filter::EqualsAny { field, value } => resolve(record, field)
                .iter()
                .any(|v| value.iter().any(|candidate| values_equal(v, candidate))),
            Filter::Contains { field, value } => {
                string_match(record, field, value, |hay, needle| hay.contains(needle))
            }
            Filter::Prefix { field, value } => {
                string_match(record, field, value, |hay, needle| hay.starts_with(needle))
            }
            Filter::Suffix { field, value } => {
                string_match(record, field, value, |hay, needle| hay.ends_with(needle))
            }
            Filter::Range { field, parameters } => resolve(record, field)
                .iter()
                .any(|v| in_range(v, parameters)),
            Filter::Not { operator, queries } => {
                !operator.combine(queries.iter().map(|q| q.matches(record)))
            }
            Filter::Multi { operator, queries } => {
                operator.combine(queries.iter().map(|q| q.matches(record)))
            }
        }
    }
}

/// Collects the values at a dotted path, flattening arrays on the way.
fn resolve<'a>(record: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![record];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Object(map) => {
                    if let Some(child) = map.get(segment) {
                        push_flat(child, &mut next);
                    }
                }
                Value::Array(items) => {
                    for item in items {
                        if let Some(child) = item.get(segment) {
                            push_flat(child, &mut next);
                        }
                    }
                }
                _ => {}
            }
        }
        current = next;
    }
    current
}

fn push_flat<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) if items.iter().all(|i| !i.is_object()) => out.extend(items.iter()),
        other => out.push(other),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn string_match(record: &Value, field: &str, needle: &Value, test: fn(&str, &str) -> bool) -> bool {
    let Some(needle) = scalar_text(needle) else {
        return false;
    };
    let needle = needle.to_lowercase();
    resolve(record, field)
        .iter()
        .filter_map(|v| scalar_text(v))
        .any(|hay| test(&hay.to_lowercase(), &needle))
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        // ISO-8601 dates order lexicographically.
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn in_range(value: &Value, bounds: &RangeBounds) -> bool {
    let check = |bound: &Option<Value>, ok: fn(Ordering) -> bool| match bound {
        None => true,
        Some(b) => compare(value, b).is_some_and(ok),
    };
    check(&bounds.gt, |o| o == Ordering::Greater)
        && check(&bounds.gte, |o| o != Ordering::Less)
        && check(&bounds.lt, |o| o == Ordering::Less)
        && check(&bounds.lte, |o| o != Ordering::Greater)
}
