// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! PostgreSQL [`Store`] adapter (`postgres` feature): same row shapes and
//! recursive-CTE templates as [`super::sqlite`], adjusted for `$N`
//! placeholders and `jsonb`.
//!

use super::{FieldRefRow, ObjectRow, RefRow, ResolutionStatus, Store, TraitRow};
use crate::config::config;
use crate::error::QueryError;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{FromRow, PgPool, Row};

/// An owned connection pool over a PostgreSQL database with the same
/// objects/traits/refs/field_refs schema as [`super::sqlite::SqliteStore`],
/// plus a `tsvector` column backing full-text search.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(FromRow)]
struct ObjectRecord {
    id: String,
    #[sqlx(rename = "type")]
    object_type: String,
    file_path: String,
    fields: serde_json::Value,
    parent_id: Option<String>,
    line_start: i64,
    line_end: i64,
}

impl From<ObjectRecord> for ObjectRow {
    fn from(r: ObjectRecord) -> Self {
        ObjectRow {
            id: r.id,
            object_type: r.object_type,
            file_path: r.file_path,
            fields: r.fields,
            parent_id: r.parent_id,
            line_start: r.line_start,
            line_end: r.line_end,
        }
    }
}

#[derive(FromRow)]
struct TraitRecord {
    id: String,
    parent_object_id: String,
    trait_type: String,
    value: Option<String>,
    content: String,
    file_path: String,
    line_number: i64,
}

impl From<TraitRecord> for TraitRow {
    fn from(r: TraitRecord) -> Self {
        TraitRow {
            id: r.id,
            parent_object_id: r.parent_object_id,
            trait_type: r.trait_type,
            value: r.value,
            content: r.content,
            file_path: r.file_path,
            line_number: r.line_number,
        }
    }
}

#[derive(FromRow)]
struct RefRecord {
    source_id: String,
    target_id: Option<String>,
    target_raw: String,
    file_path: String,
    line_number: i64,
}

impl From<RefRecord> for RefRow {
    fn from(r: RefRecord) -> Self {
        RefRow {
            source_id: r.source_id,
            target_id: r.target_id,
            target_raw: r.target_raw,
            file_path: r.file_path,
            line_number: r.line_number,
        }
    }
}

fn in_placeholders(start: usize, len: usize) -> String {
    let parts: Vec<String> = (0..len).map(|i| format!("${}", start + i)).collect();
    format!("({})", parts.join(","))
}

impl PgStore {
    /// Connect to `database_url`, honoring the pool-sizing knobs the
    /// teacher's [`crate::config`] exposes.
    pub async fn connect(database_url: &str) -> Result<Self, QueryError> {
        let opts: PgConnectOptions = database_url.parse().map_err(sqlx::Error::from)?;
        let pool = PgPoolOptions::new()
            .max_connections(config().batch_chunk_size() as u32)
            .connect_with(opts)
            .await?;
        Ok(Self { pool })
    }

    /// Wrap an already-open pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn objects_by_type(&self, object_type: &str) -> Result<Vec<ObjectRow>, QueryError> {
        let rows = sqlx::query_as::<_, ObjectRecord>(
            "SELECT id, type, file_path, fields, parent_id, line_start, line_end FROM objects WHERE type = $1",
        )
        .bind(object_type)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ObjectRow::from).collect())
    }

    async fn objects_by_ids(&self, ids: &[String]) -> Result<Vec<ObjectRow>, QueryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT id, type, file_path, fields, parent_id, line_start, line_end FROM objects WHERE id IN {}",
            in_placeholders(1, ids.len())
        );
        let mut q = sqlx::query_as::<_, ObjectRecord>(&sql);
        for id in ids {
            q = q.bind(id);
        }
        let rows = q.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(ObjectRow::from).collect())
    }

    async fn children_of(&self, parent_ids: &[String]) -> Result<Vec<ObjectRow>, QueryError> {
        if parent_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT id, type, file_path, fields, parent_id, line_start, line_end FROM objects WHERE parent_id IN {}",
            in_placeholders(1, parent_ids.len())
        );
        let mut q = sqlx::query_as::<_, ObjectRecord>(&sql);
        for id in parent_ids {
            q = q.bind(id);
        }
        let rows = q.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(ObjectRow::from).collect())
    }

    async fn parents_of(&self, ids: &[String]) -> Result<Vec<ObjectRow>, QueryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            r#"SELECT DISTINCT p.id, p.type, p.file_path, p.fields, p.parent_id, p.line_start, p.line_end
               FROM objects p JOIN objects c ON c.parent_id = p.id WHERE c.id IN {}"#,
            in_placeholders(1, ids.len())
        );
        let mut q = sqlx::query_as::<_, ObjectRecord>(&sql);
        for id in ids {
            q = q.bind(id);
        }
        let rows = q.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(ObjectRow::from).collect())
    }

    async fn descendants_of(&self, root_ids: &[String]) -> Result<Vec<ObjectRow>, QueryError> {
        if root_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            r#"WITH RECURSIVE descendants(id, root) AS (
                   SELECT id, id AS root FROM objects WHERE id IN {ph}
                   UNION ALL
                   SELECT o.id, d.root FROM objects o JOIN descendants d ON o.parent_id = d.id
               )
               SELECT o.id, o.type, o.file_path, o.fields, o.parent_id, o.line_start, o.line_end
               FROM objects o JOIN descendants d ON o.id = d.id WHERE d.id != d.root"#,
            ph = in_placeholders(1, root_ids.len())
        );
        let mut q = sqlx::query_as::<_, ObjectRecord>(&sql);
        for id in root_ids {
            q = q.bind(id);
        }
        let rows = q.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(ObjectRow::from).collect())
    }

    async fn ancestors_of(&self, root_ids: &[String]) -> Result<Vec<ObjectRow>, QueryError> {
        if root_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            r#"WITH RECURSIVE ancestors(id, root) AS (
                   SELECT parent_id AS id, id AS root FROM objects WHERE id IN {ph} AND parent_id IS NOT NULL
                   UNION ALL
                   SELECT o.parent_id, a.root FROM objects o JOIN ancestors a ON o.id = a.id WHERE o.parent_id IS NOT NULL
               )
               SELECT DISTINCT o.id, o.type, o.file_path, o.fields, o.parent_id, o.line_start, o.line_end
               FROM objects o JOIN ancestors a ON o.id = a.id"#,
            ph = in_placeholders(1, root_ids.len())
        );
        let mut q = sqlx::query_as::<_, ObjectRecord>(&sql);
        for id in root_ids {
            q = q.bind(id);
        }
        let rows = q.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(ObjectRow::from).collect())
    }

    async fn traits_by_type(&self, trait_type: &str) -> Result<Vec<TraitRow>, QueryError> {
        let rows = sqlx::query_as::<_, TraitRecord>(
            "SELECT id, parent_object_id, trait_type, value, content, file_path, line_number FROM traits WHERE trait_type = $1",
        )
        .bind(trait_type)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(TraitRow::from).collect())
    }

    async fn traits_by_parent_ids(&self, parent_ids: &[String]) -> Result<Vec<TraitRow>, QueryError> {
        if parent_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT id, parent_object_id, trait_type, value, content, file_path, line_number FROM traits WHERE parent_object_id IN {}",
            in_placeholders(1, parent_ids.len())
        );
        let mut q = sqlx::query_as::<_, TraitRecord>(&sql);
        for id in parent_ids {
            q = q.bind(id);
        }
        let rows = q.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(TraitRow::from).collect())
    }

    async fn traits_at(&self, locations: &[(String, i64)]) -> Result<Vec<TraitRow>, QueryError> {
        if locations.is_empty() {
            return Ok(Vec::new());
        }
        let mut clauses = Vec::new();
        let mut n = 1;
        for _ in locations {
            clauses.push(format!("(file_path = ${} AND line_number = ${})", n, n + 1));
            n += 2;
        }
        let sql = format!(
            "SELECT id, parent_object_id, trait_type, value, content, file_path, line_number FROM traits WHERE {}",
            clauses.join(" OR ")
        );
        let mut q = sqlx::query_as::<_, TraitRecord>(&sql);
        for (file_path, line) in locations {
            q = q.bind(file_path).bind(line);
        }
        let rows = q.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(TraitRow::from).collect())
    }

    async fn refs_from(&self, source_ids: &[String]) -> Result<Vec<RefRow>, QueryError> {
        if source_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT source_id, target_id, target_raw, file_path, line_number FROM refs WHERE source_id IN {}",
            in_placeholders(1, source_ids.len())
        );
        let mut q = sqlx::query_as::<_, RefRecord>(&sql);
        for id in source_ids {
            q = q.bind(id);
        }
        let rows = q.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(RefRow::from).collect())
    }

    async fn refs_to(&self, candidates: &[String]) -> Result<Vec<RefRow>, QueryError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let n = candidates.len();
        let sql = format!(
            "SELECT source_id, target_id, target_raw, file_path, line_number FROM refs WHERE target_id IN {} OR target_raw IN {}",
            in_placeholders(1, n),
            in_placeholders(n + 1, n)
        );
        let mut q = sqlx::query_as::<_, RefRecord>(&sql);
        for id in candidates {
            q = q.bind(id);
        }
        for id in candidates {
            q = q.bind(id);
        }
        let rows = q.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(RefRow::from).collect())
    }

    async fn refs_at(&self, locations: &[(String, i64)]) -> Result<Vec<RefRow>, QueryError> {
        if locations.is_empty() {
            return Ok(Vec::new());
        }
        let mut clauses = Vec::new();
        let mut n = 1;
        for _ in locations {
            clauses.push(format!("(file_path = ${} AND line_number = ${})", n, n + 1));
            n += 2;
        }
        let sql = format!(
            "SELECT source_id, target_id, target_raw, file_path, line_number FROM refs WHERE {}",
            clauses.join(" OR ")
        );
        let mut q = sqlx::query_as::<_, RefRecord>(&sql);
        for (file_path, line) in locations {
            q = q.bind(file_path).bind(line);
        }
        let rows = q.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(RefRow::from).collect())
    }

    async fn resolve_target(&self, raw: &str) -> Result<Vec<String>, QueryError> {
        let rows = sqlx::query("SELECT id FROM objects WHERE id = $1 OR id LIKE $2")
            .bind(raw)
            .bind(format!("%/{raw}"))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| r.get::<String, _>(0)).collect())
    }

    async fn field_refs(
        &self,
        field_name: &str,
        source_ids: &[String],
    ) -> Result<Vec<FieldRefRow>, QueryError> {
        if source_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT source_id, field_name, target_id, target_raw, status FROM field_refs WHERE field_name = $1 AND source_id IN {}",
            in_placeholders(2, source_ids.len())
        );
        let mut q = sqlx::query(&sql).bind(field_name);
        for id in source_ids {
            q = q.bind(id);
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|r| {
                let status = match r.get::<String, _>("status").as_str() {
                    "resolved" => ResolutionStatus::Resolved,
                    "ambiguous" => ResolutionStatus::Ambiguous,
                    _ => ResolutionStatus::Unresolved,
                };
                Ok(FieldRefRow {
                    source_id: r.get("source_id"),
                    field_name: r.get("field_name"),
                    target_id: r.get("target_id"),
                    target_raw: r.get("target_raw"),
                    status,
                })
            })
            .collect()
    }

    async fn content_search_objects(&self, terms: &str) -> Result<Vec<String>, QueryError> {
        let rows = sqlx::query(
            "SELECT object_id FROM object_fts WHERE search_vector @@ plainto_tsquery('english', $1)",
        )
        .bind(terms)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.get::<String, _>(0)).collect())
    }
}
