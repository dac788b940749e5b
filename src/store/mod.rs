// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! The store contract (§6): a thin, async collaborator the evaluator reads
//! through. Row shapes mirror §3 exactly; the trait exposes bulk fetches
//! keyed by type/id rather than a generic SQL surface, per the §1 Non-goal
//! ("a generic SQL surface").
//!
//! Every concrete adapter ([`sqlite::SqliteStore`], and
//! [`postgres::PgStore`] behind the `postgres` feature) owns the SQL; the
//! evaluator never sees a query string.

pub mod sql;
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

use crate::error::QueryError;
use async_trait::async_trait;
use serde_json::Value as Json;

/// A document node: typed, JSON-field-bearing, optionally nested under a
/// parent (§3 "Object").
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRow {
    /// Globally unique id, e.g. `projects/website` or `projects/website#intro`.
    pub id: String,
    /// Declared type name.
    pub object_type: String,
    /// Source file the object was ingested from.
    pub file_path: String,
    /// Declared fields, as a JSON object.
    pub fields: Json,
    /// Immediate parent id, if nested.
    pub parent_id: Option<String>,
    /// First line of the object's span in `file_path`.
    pub line_start: i64,
    /// Last line of the object's span in `file_path`.
    pub line_end: i64,
}

/// A line-anchored annotation attached to an object (§3 "Trait").
#[derive(Debug, Clone, PartialEq)]
pub struct TraitRow {
    /// Trait row id.
    pub id: String,
    /// The object this trait is anchored to.
    pub parent_object_id: String,
    /// Trait type name.
    pub trait_type: String,
    /// Carried value; `None` for boolean traits.
    pub value: Option<String>,
    /// The literal line text the trait was parsed from.
    pub content: String,
    /// Source file.
    pub file_path: String,
    /// 1-based line number within `file_path`.
    pub line_number: i64,
}

/// A directional wiki-style link (§3 "Ref").
#[derive(Debug, Clone, PartialEq)]
pub struct RefRow {
    /// The object that wrote the link.
    pub source_id: String,
    /// Resolved target id, if the link resolved at ingestion time.
    pub target_id: Option<String>,
    /// Literal link text as written, preserved regardless of resolution.
    pub target_raw: String,
    /// Source file.
    pub file_path: String,
    /// 1-based line number within `file_path`.
    pub line_number: i64,
}

/// Resolution outcome for a declared ref-typed field (§3 "FieldRef", §4.4,
/// §9 "Ref resolution tri-state").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStatus {
    /// Exactly one candidate target.
    Resolved,
    /// No candidate target; the raw text never resolved.
    Unresolved,
    /// More than one candidate target matched (typically a short-name
    /// collision). Only an error when the query pins a specific target.
    Ambiguous,
}

/// A declared ref-typed field's resolution record.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRefRow {
    /// The object carrying the field.
    pub source_id: String,
    /// Field name on `source_id`'s type.
    pub field_name: String,
    /// Resolved target id, present only when `status` is `Resolved`.
    pub target_id: Option<String>,
    /// Literal text as written.
    pub target_raw: String,
    /// Resolution outcome.
    pub status: ResolutionStatus,
}

/// The store contract the evaluator and pipeline engine depend on (§6).
///
/// Implementors own SQL generation, IN-list placeholder expansion, FTS5
/// syntax, and `json_extract` semantics; the evaluator calls these methods
/// with plain Rust values and gets back rows.
#[async_trait]
pub trait Store: Send + Sync {
    /// All objects of the given declared type.
    async fn objects_by_type(&self, object_type: &str) -> Result<Vec<ObjectRow>, QueryError>;

    /// Objects by id, in no particular order; missing ids are simply absent
    /// from the result (never an error).
    async fn objects_by_ids(&self, ids: &[String]) -> Result<Vec<ObjectRow>, QueryError>;

    /// Immediate children of the given parent ids.
    async fn children_of(&self, parent_ids: &[String]) -> Result<Vec<ObjectRow>, QueryError>;

    /// Immediate parents of the given objects (one row per distinct
    /// non-null `parent_id`).
    async fn parents_of(&self, ids: &[String]) -> Result<Vec<ObjectRow>, QueryError>;

    /// Transitive closure of [`children_of`], excluding the roots
    /// themselves, via a recursive CTE (§4.5, §9 "Recursive hierarchy").
    async fn descendants_of(&self, root_ids: &[String]) -> Result<Vec<ObjectRow>, QueryError>;

    /// Transitive closure of [`parents_of`], excluding the roots themselves.
    async fn ancestors_of(&self, root_ids: &[String]) -> Result<Vec<ObjectRow>, QueryError>;

    /// All traits of the given declared trait type.
    async fn traits_by_type(&self, trait_type: &str) -> Result<Vec<TraitRow>, QueryError>;

    /// Traits anchored to any of the given parent object ids.
    async fn traits_by_parent_ids(&self, parent_ids: &[String]) -> Result<Vec<TraitRow>, QueryError>;

    /// Traits sharing `(file_path, line_number)` with any of the given
    /// traits — the co-location join `at()` needs (§4.5).
    async fn traits_at(&self, locations: &[(String, i64)]) -> Result<Vec<TraitRow>, QueryError>;

    /// Outgoing refs from any of the given source ids.
    async fn refs_from(&self, source_ids: &[String]) -> Result<Vec<RefRow>, QueryError>;

    /// Incoming refs whose `target_id` or `target_raw` matches any of the
    /// given candidate strings (§4.4: both columns, OR-combined).
    async fn refs_to(&self, candidates: &[String]) -> Result<Vec<RefRow>, QueryError>;

    /// Refs recorded at any of the given `(file_path, line_number)` pairs —
    /// what a trait-query `refs(...)` predicate joins against (§4.2).
    async fn refs_at(&self, locations: &[(String, i64)]) -> Result<Vec<RefRow>, QueryError>;

    /// Resolve `[[target]]` text against the object table: exact id match,
    /// then short-name suffix match (§4.4). May return more than one id.
    async fn resolve_target(&self, raw: &str) -> Result<Vec<String>, QueryError>;

    /// Declared ref-field resolution rows for `field_name` on any of the
    /// given source ids (§3 "FieldRef").
    async fn field_refs(
        &self,
        field_name: &str,
        source_ids: &[String],
    ) -> Result<Vec<FieldRefRow>, QueryError>;

    /// Full-text search over the object FTS index; returns matching object
    /// ids (§3 "FTS index", §6).
    async fn content_search_objects(&self, terms: &str) -> Result<Vec<String>, QueryError>;
}
