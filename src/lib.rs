// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! A structured query language and evaluator over a knowledge graph of
//! objects, traits and refs.
//!
//! A corpus of source files is ingested (elsewhere, by a host application)
//! into three tables described by a [`Schema`][schema::Schema]: typed
//! **objects** carrying JSON fields and optionally nested under a parent,
//! line-anchored **traits** attached to an object, and directional
//! **refs** recorded between `[[wiki-style]]` links. This crate owns the
//! query language over that graph, not the ingestion that populates it.
//!
//! # Querying
//!
//! A query is parsed from text, validated against a [`Schema`][schema::Schema],
//! evaluated against a [`Store`][store::Store], and optionally reshaped by a
//! pipeline of aggregate/filter/sort/limit stages:
//!
//! ```no_run
//! use vaultql::prelude::*;
//!
//! # async fn run() -> Result<(), QueryError> {
//! let schema = Schema::new().with_type(TypeDef::new("project").with_field("status", FieldType::String));
//! let store = SqliteStore::connect("sqlite::memory:").await?;
//! let engine = Engine::new(&schema, &store);
//! let results = engine.query(r#"object:project .status=="active""#).await?;
//! # let _ = results;
//! #     Ok(())
//! # }
//! ```
//!
//! # Grammar
//!
//! ```text
//! query    := kind ":" ident pred? pipeline?
//! kind     := "object" | "trait"
//! pred     := pred "|" pred | pred pred | "!" pred | "(" pred ")" | atom
//! atom     := field_pred | func_pred
//! field_pred := "." ident op value
//! op       := "==" | "!=" | "<" | "<=" | ">" | ">=" | "~=" | "^=" | "$=" | "=~"
//! value    := ident | ref | string | regex | "*"
//! func_pred := ident "(" args? ")"
//! ref      := "[[" raw "]]"
//! pipeline := "|>" stage+
//! stage    := assign | "filter" "(" expr ")" | "sort" "(" left ("," dir)? ")" | "limit" "(" int ")"
//! assign   := ident "=" agg "(" agg_args ")"
//! agg      := "count" | "min" | "max" | "sum"
//! ```
//!
//! # Architecture
//!
//! - [`token`]/[`lexer`]: the token table and scanner.
//! - [`ast`]: the heterogeneous predicate tree (a tagged union, matched
//!   exhaustively by the validator, evaluator, and `Display`).
//! - [`parser`]: recursive-descent parser building [`ast::Query`].
//! - [`schema`]: declared types, traits, and field shapes a query is
//!   checked against.
//! - [`validator`]: the six soundness rules from the query language design.
//! - [`target`]: `[[target]]` resolution against the object table.
//! - [`store`]: the async collaborator contract, with `sqlite` (default)
//!   and `postgres` (feature-gated) backends.
//! - [`evaluator`]: lowers a validated predicate tree to store calls,
//!   fetching candidate rows in bulk and composing them in memory rather
//!   than compiling to one SQL statement.
//! - [`pipeline`]: post-processing stages (aggregate assignments, filter,
//!   sort, limit) run after predicate evaluation.
//! - [`result`]: the final `ObjectResult`/`TraitResult` row shapes handed
//!   back to a caller.
//! - [`value`]: runtime scalar/array representation and comparison rules.
//! - [`error`]: the `QueryError` taxonomy, every variant fatal to its query.
//! - [`config`]: environment-driven tuning (batch chunk size, suggestion
//!   list length, forcing the pipeline's N+1 path for equivalence tests).

mod ast;
mod config;
mod error;
mod evaluator;
mod lexer;
mod parser;
mod pipeline;
mod result;
mod schema;
mod store;
mod target;
mod token;
mod validator;
mod value;

pub mod prelude;

pub use ast::{Kind, Query};
pub use error::{Position, QueryError};
pub use parser::parse;
pub use result::{ObjectResult, ResultSet, TraitResult};
pub use schema::{FieldType, Schema, TraitDef, TypeDef};
pub use store::sqlite::SqliteStore;
pub use store::Store;
pub use value::Value;

#[cfg(feature = "postgres")]
pub use store::postgres::PgStore;

/// Entry point tying a [`Schema`] to a [`Store`]: parses, validates,
/// evaluates, and pipelines a query string into a [`ResultSet`].
pub struct Engine<'s> {
    schema: &'s Schema,
    store: &'s dyn Store,
}

impl<'s> Engine<'s> {
    /// Build an engine bound to `schema` and `store` for the lifetime of
    /// both references.
    pub fn new(schema: &'s Schema, store: &'s dyn Store) -> Self {
        Self { schema, store }
    }

    /// Parse, validate, evaluate, and pipeline `text`, producing a
    /// [`ResultSet`] shaped per the query's root `kind` (§6).
    pub async fn query(&self, text: &str) -> Result<ResultSet, QueryError> {
        let query = parser::parse(text)?;
        validator::validate(&query, self.schema)?;

        let evaluator = evaluator::Evaluator::new(self.store, self.schema);
        let ids = evaluator.eval(query.kind, &query.type_name, query.predicate.as_ref(), None).await?;

        let stages: &[ast::PipelineStage] = query.pipeline.as_ref().map(|p| p.stages.as_slice()).unwrap_or(&[]);
        let rows = pipeline::run(&evaluator, self.store, ids, stages).await?;

        match query.kind {
            Kind::Object => {
                let objects = self.store.objects_by_ids(&rows.iter().map(|r| r.id.clone()).collect::<Vec<_>>()).await?;
                Ok(ResultSet::Objects(result::objects_from_pipeline(&objects, &rows)))
            }
            Kind::Trait => {
                let traits = self.store.traits_by_type(&query.type_name).await?;
                let matched: std::collections::HashSet<&str> = rows.iter().map(|r| r.id.as_str()).collect();
                let traits: Vec<_> = traits.into_iter().filter(|t| matched.contains(t.id.as_str())).collect();
                Ok(ResultSet::Traits(result::traits_from_pipeline(&traits, &rows)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldType, TypeDef};

    #[tokio::test]
    async fn engine_roundtrips_a_field_query() {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        sqlx::query(
            r#"INSERT INTO objects (id, type, file_path, fields, parent_id, line_start, line_end) VALUES
               ('projects/website', 'project', 'a.md', '{"status":"active"}', NULL, 1, 1),
               ('projects/mobile', 'project', 'a.md', '{"status":"paused"}', NULL, 2, 2)"#,
        )
        .execute(store.pool())
        .await
        .unwrap();

        let schema = Schema::new().with_type(TypeDef::new("project").with_field("status", FieldType::String));
        let engine = Engine::new(&schema, &store);
        let results = engine.query(r#"object:project .status=="active""#).await.unwrap();
        match results {
            ResultSet::Objects(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].id, "projects/website");
            }
            ResultSet::Traits(_) => panic!("expected objects"),
        }
    }
}
