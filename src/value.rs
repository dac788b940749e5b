// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! Runtime value representation and the comparison rules from the data
//! model (§3): equality is case-insensitive for string *values*, but plain
//! identifier comparison (type names, trait names, field names, object ids)
//! stays case-sensitive. The two are never mixed: identifiers use
//! `str::eq`/`BTreeMap`-style ordering directly, values always go through
//! [`Value`] and [`compare_values`].
//!

use core::fmt;
use std::cmp::Ordering;
use unicase::UniCase;

/// A runtime scalar or array value drawn from a JSON field, a trait's
/// `value`, or a query literal.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Value {
    /// JSON `null` / absent field.
    Null,
    /// Boolean field value.
    Bool(bool),
    /// Numeric field value (integers are represented exactly up to 2^53).
    Num(f64),
    /// String field value, compared case-insensitively per §3.
    Str(String),
    /// `date`-typed field value (no time-of-day).
    Date(jiff::civil::Date),
    /// `datetime`-typed field value.
    DateTime(jiff::Zoned),
    /// Array-of-scalar field value.
    Array(Vec<Value>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Num(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Date(d) => write!(f, "{d}"),
            Value::DateTime(z) => write!(f, "{z}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl Value {
    /// Parse a JSON value read back from a `fields` column into a [`Value`].
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Num(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Array(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(_) => Value::Null,
        }
    }

    /// Attempt to parse this value, or a literal string, as an `f64`.
    ///
    /// Mirrors the "if both sides parse as numbers, use numeric order"
    /// rule from §3: a quoted numeric string coerces just like a bare one.
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            Value::Str(s) => s.trim().parse::<f64>().ok(),
            Value::Bool(_) | Value::Null | Value::Date(_) | Value::DateTime(_) | Value::Array(_) => {
                None
            }
        }
    }

    fn lowered(&self) -> String {
        self.to_string().to_lowercase()
    }

    /// Case-insensitive scalar equality with numeric coercion, as required
    /// by field and `.value` predicates. Arrays are never equal to a
    /// scalar directly here — callers implement array-membership semantics
    /// (any element matches) on top of this.
    pub fn scalar_eq(&self, other: &Value) -> bool {
        if let (Some(a), Some(b)) = (self.as_numeric(), other.as_numeric()) {
            return a == b;
        }
        UniCase::new(self.lowered()) == UniCase::new(other.lowered())
    }

    /// Array-membership equality: if `self` is an array, true when any
    /// element scalar-equals `other`; otherwise falls back to scalar
    /// equality. This realizes the "Array equality" law from §8.
    pub fn matches_membership(&self, other: &Value) -> bool {
        match self {
            Value::Array(items) => items.iter().any(|item| item.matches_membership(other)),
            _ => self.scalar_eq(other),
        }
    }

    /// Ordered comparison implementing the numeric-first-then-lexicographic
    /// rule from §3, used by `<`/`<=`/`>`/`>=` predicates, sort stages, and
    /// filter stages alike.
    pub fn compare(&self, other: &Value) -> Ordering {
        compare_values(self, other)
    }

    /// True if this is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Total ordering used across field predicates, `.value` predicates, and
/// pipeline sort/filter stages: numeric order if both sides parse as
/// numbers, otherwise case-folded lexicographic order. `Null` sorts before
/// everything (smallest), matching the pipeline's "null is smallest (asc)"
/// rule — callers that need "largest for desc" simply reverse the ordering
/// they pass to `sort_by`.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        (false, false) => {}
    }
    if let (Some(x), Some(y)) = (a.as_numeric(), b.as_numeric()) {
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }
    a.lowered().cmp(&b.lowered())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_string_coerces_for_equality() {
        assert!(Value::Num(10.0).scalar_eq(&Value::Str("10".into())));
    }

    #[test]
    fn case_insensitive_string_equality() {
        assert!(Value::Str("Active".into()).scalar_eq(&Value::Str("active".into())));
    }

    #[test]
    fn array_membership_matches_any_element_with_coercion() {
        let field = Value::Array(vec![Value::Num(10.0), Value::Str("2".into())]);
        assert!(field.matches_membership(&Value::Num(10.0)));
        assert!(field.matches_membership(&Value::Str("2".into())));
        assert!(!field.matches_membership(&Value::Num(3.0)));
    }

    #[test]
    fn null_sorts_smallest() {
        assert_eq!(compare_values(&Value::Null, &Value::Num(0.0)), Ordering::Less);
    }

    #[test]
    fn numeric_order_beats_lexicographic() {
        assert_eq!(compare_values(&Value::Num(2.0), &Value::Num(10.0)), Ordering::Less);
        // without numeric parsing, "10" < "2" lexicographically — make sure we
        // don't fall into that trap when both sides are numeric-looking.
        assert_eq!(
            compare_values(&Value::Str("2".into()), &Value::Str("10".into())),
            Ordering::Less
        );
    }
}
