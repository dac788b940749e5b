// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! Errors raised from this library.
//!
//! Every query-facing error carries a 1-based character [`Position`] when one
//! is meaningful, per the grammar's "errors carry a 1-based character
//! position" contract. All variants are fatal to the current query: there is
//! no retry or partial-result recovery inside the engine.
//!

use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// A 1-based character offset into the original query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position(pub usize);

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "column {}", self.0)
    }
}

/// Variants of error raised from this library.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Unrecognized byte or unterminated reference/string/regex token.
    #[error("lex error at {pos}: {message}")]
    Lex {
        /// Offending position.
        pos: Position,
        /// Human readable description.
        message: Cow<'static, str>,
    },

    /// Unexpected token while parsing, with the set of tokens that would
    /// have been accepted at that point.
    #[error("parse error at {pos}: expected {expected}, found {found}")]
    Parse {
        /// Offending position.
        pos: Position,
        /// Comma-joined list of acceptable tokens.
        expected: String,
        /// What was actually found.
        found: String,
    },

    /// Unknown type/trait/field, wrong predicate for the query kind, an
    /// illegal `_` self-reference, or bad aggregate typing.
    #[error("validation error: {message}{}", suggestion_suffix(.suggestions))]
    Validation {
        /// Human readable description.
        message: String,
        /// Candidate names offered as a suggestion, closest first.
        suggestions: Vec<String>,
    },

    /// A `[[target]]` resolved to more than one candidate object and the
    /// query requires a single, unambiguous target.
    #[error("ambiguous reference target {raw:?}: matches {candidates:?}")]
    Resolution {
        /// The literal text written in the query or stored ref.
        raw: String,
        /// All objects that qualify as a match.
        candidates: Vec<String>,
    },

    /// The store rejected or failed to execute a query.
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    /// A `matches(...)` pattern failed to compile.
    #[error("invalid regular expression at {pos}: {source}")]
    Regex {
        /// Offending position.
        pos: Position,
        /// Underlying compiler error.
        source: regress::Error,
    },

    /// JSON field payload could not be decoded.
    #[error("field decode error: {0}")]
    Json(#[from] serde_json::Error),

    /// Date/time literal failed to parse.
    #[error("date/time error: {0}")]
    Time(#[from] jiff::Error),

    /// Anything else the engine cannot classify more precisely.
    #[error("runtime error: {0}")]
    Runtime(Cow<'static, str>),
}

fn suggestion_suffix(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean: {}?)", suggestions.join(", "))
    }
}

impl QueryError {
    /// Build a [`QueryError::Validation`] with candidate names ranked by
    /// edit-distance to `name`, closest first, capped at `limit`.
    pub(crate) fn unknown_name(kind: &str, name: &str, known: &[String], limit: usize) -> Self {
        let mut ranked: Vec<(usize, &String)> = known
            .iter()
            .map(|candidate| (levenshtein(name, candidate), candidate))
            .collect();
        ranked.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
        let suggestions = ranked
            .into_iter()
            .take(limit)
            .map(|(_, s)| s.clone())
            .collect();
        QueryError::Validation {
            message: format!("unknown {kind} {name:?}"),
            suggestions,
        }
    }
}

/// Classic Levenshtein edit distance, used only to rank suggestion names.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for i in 1..=a.len() {
        let mut prev = row[0];
        row[0] = i;
        for j in 1..=b.len() {
            let cur = row[j];
            row[j] = if a[i - 1] == b[j - 1] {
                prev
            } else {
                1 + prev.min(row[j]).min(row[j - 1])
            };
            prev = cur;
        }
    }
    row[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_name_ranks_closest_first() {
        let known = vec!["status".to_string(), "state".to_string(), "title".to_string()];
        let err = QueryError::unknown_name("field", "stat", &known, 2);
        match err {
            QueryError::Validation { suggestions, .. } => {
                assert_eq!(suggestions[0], "state");
            }
            _ => panic!("expected validation error"),
        }
    }
}
