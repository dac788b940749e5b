// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! SQLite [`Store`] adapter: FTS5 with Porter/unicode61 tokenization over
//! the object index, `json_extract`-free row fetches (field logic lives in
//! [`crate::evaluator`] once rows are in memory), and recursive CTEs for
//! hierarchy traversal.
//!

use super::sql::{ANCESTORS_BY_ROOT_CTE, DESCENDANTS_BY_ROOT_CTE, in_placeholders};
use super::{FieldRefRow, ObjectRow, RefRow, ResolutionStatus, Store, TraitRow};
use crate::error::QueryError;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{FromRow, Row, SqlitePool};
use tracing::debug;

/// An owned connection pool over a SQLite database holding the
/// objects/traits/refs/field_refs tables and an `object_fts` FTS5 index
/// (§3, §6).
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

#[derive(FromRow)]
struct ObjectRecord {
    id: String,
    #[sqlx(rename = "type")]
    object_type: String,
    file_path: String,
    fields: String,
    parent_id: Option<String>,
    line_start: i64,
    line_end: i64,
}

impl TryFrom<ObjectRecord> for ObjectRow {
    type Error = QueryError;

    fn try_from(r: ObjectRecord) -> Result<Self, QueryError> {
        Ok(ObjectRow {
            id: r.id,
            object_type: r.object_type,
            file_path: r.file_path,
            fields: serde_json::from_str(&r.fields)?,
            parent_id: r.parent_id,
            line_start: r.line_start,
            line_end: r.line_end,
        })
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

impl SqliteStore {
    /// Open (or create) a SQLite database at `url` (e.g. `sqlite::memory:`
    /// or `sqlite:vault.db`), ensuring the schema and FTS5 index exist.
    pub async fn connect(url: &str) -> Result<Self, QueryError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Wrap an already-open pool, assuming the schema already exists.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// The underlying pool, for callers that need raw access (ingestion,
    /// tests).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ensure_schema(&self) -> Result<(), QueryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS objects (
                id TEXT PRIMARY KEY,
                type TEXT NOT NULL,
                file_path TEXT NOT NULL,
                fields TEXT NOT NULL DEFAULT '{}',
                parent_id TEXT REFERENCES objects(id),
                line_start INTEGER NOT NULL DEFAULT 0,
                line_end INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS traits (
                id TEXT PRIMARY KEY,
                parent_object_id TEXT NOT NULL REFERENCES objects(id),
                trait_type TEXT NOT NULL,
                value TEXT,
                content TEXT NOT NULL DEFAULT '',
                file_path TEXT NOT NULL,
                line_number INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS refs (
                source_id TEXT NOT NULL,
                target_id TEXT,
                target_raw TEXT NOT NULL,
                file_path TEXT NOT NULL,
                line_number INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS field_refs (
                source_id TEXT NOT NULL,
                field_name TEXT NOT NULL,
                target_id TEXT,
                target_raw TEXT NOT NULL,
                status TEXT NOT NULL
            );
            CREATE VIRTUAL TABLE IF NOT EXISTS object_fts USING fts5(
                object_id UNINDEXED, title, content, tokenize = 'porter unicode61'
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn objects_where_id_in(&self, ids: &[String], clause: &str) -> Result<Vec<ObjectRow>, QueryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = in_placeholders(ids.len());
        let sql = format!(
            r#"SELECT id, type, file_path, fields, parent_id, line_start, line_end
               FROM objects WHERE {clause} IN {placeholders}"#
        );
        let mut q = sqlx::query_as::<_, ObjectRecord>(sqlx::AssertSqlSafe(sql.clone()));
        for id in ids {
            q = q.bind(id);
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(ObjectRow::try_from).collect()
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn objects_by_type(&self, object_type: &str) -> Result<Vec<ObjectRow>, QueryError> {
        let rows = sqlx::query_as::<_, ObjectRecord>(
            "SELECT id, type, file_path, fields, parent_id, line_start, line_end FROM objects WHERE type = ?",
        )
        .bind(object_type)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ObjectRow::try_from).collect()
    }

    async fn objects_by_ids(&self, ids: &[String]) -> Result<Vec<ObjectRow>, QueryError> {
        self.objects_where_id_in(ids, "id").await
    }

    async fn children_of(&self, parent_ids: &[String]) -> Result<Vec<ObjectRow>, QueryError> {
        self.objects_where_id_in(parent_ids, "parent_id").await
    }

    async fn parents_of(&self, ids: &[String]) -> Result<Vec<ObjectRow>, QueryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = in_placeholders(ids.len());
        let sql = format!(
            r#"SELECT DISTINCT p.id, p.type, p.file_path, p.fields, p.parent_id, p.line_start, p.line_end
               FROM objects p JOIN objects c ON c.parent_id = p.id
               WHERE c.id IN {placeholders}"#
        );
        let mut q = sqlx::query_as::<_, ObjectRecord>(sqlx::AssertSqlSafe(sql.clone()));
        for id in ids {
            q = q.bind(id);
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(ObjectRow::try_from).collect()
    }

    async fn descendants_of(&self, root_ids: &[String]) -> Result<Vec<ObjectRow>, QueryError> {
        if root_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = in_placeholders(root_ids.len());
        let cte = DESCENDANTS_BY_ROOT_CTE.replace("IN ROOTS", &format!("IN {placeholders}"));
        let sql = format!(
            r#"{cte}
               SELECT o.id, o.type, o.file_path, o.fields, o.parent_id, o.line_start, o.line_end
               FROM objects o JOIN descendants d ON o.id = d.id
               WHERE d.id != d.root"#
        );
        let mut q = sqlx::query_as::<_, ObjectRecord>(sqlx::AssertSqlSafe(sql.clone()));
        for id in root_ids {
            q = q.bind(id);
        }
        debug!(sql, "descendants_of");
        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(ObjectRow::try_from).collect()
    }

    async fn ancestors_of(&self, root_ids: &[String]) -> Result<Vec<ObjectRow>, QueryError> {
        if root_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = in_placeholders(root_ids.len());
        let cte = ANCESTORS_BY_ROOT_CTE.replace("IN ROOTS", &format!("IN {placeholders}"));
        let sql = format!(
            r#"{cte}
               SELECT DISTINCT o.id, o.type, o.file_path, o.fields, o.parent_id, o.line_start, o.line_end
               FROM objects o JOIN ancestors a ON o.id = a.id"#
        );
        let mut q = sqlx::query_as::<_, ObjectRecord>(sqlx::AssertSqlSafe(sql.clone()));
        for id in root_ids {
            q = q.bind(id);
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(ObjectRow::try_from).collect()
    }

    async fn traits_by_type(&self, trait_type: &str) -> Result<Vec<TraitRow>, QueryError> {
        let rows = sqlx::query_as::<_, TraitRecord>(
            "SELECT id, parent_object_id, trait_type, value, content, file_path, line_number FROM traits WHERE trait_type = ?",
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
        let placeholders = in_placeholders(parent_ids.len());
        let sql = format!(
            r#"SELECT id, parent_object_id, trait_type, value, content, file_path, line_number
               FROM traits WHERE parent_object_id IN {placeholders}"#
        );
        let mut q = sqlx::query_as::<_, TraitRecord>(sqlx::AssertSqlSafe(sql.clone()));
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
        let clause = locations
            .iter()
            .map(|_| "(file_path = ? AND line_number = ?)")
            .collect::<Vec<_>>()
            .join(" OR ");
        let sql = format!(
            r#"SELECT id, parent_object_id, trait_type, value, content, file_path, line_number
               FROM traits WHERE {clause}"#
        );
        let mut q = sqlx::query_as::<_, TraitRecord>(sqlx::AssertSqlSafe(sql.clone()));
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
        let placeholders = in_placeholders(source_ids.len());
        let sql = format!(
            "SELECT source_id, target_id, target_raw, file_path, line_number FROM refs WHERE source_id IN {placeholders}"
        );
        let mut q = sqlx::query_as::<_, RefRecord>(sqlx::AssertSqlSafe(sql.clone()));
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
        let placeholders = in_placeholders(candidates.len());
        let sql = format!(
            r#"SELECT source_id, target_id, target_raw, file_path, line_number FROM refs
               WHERE target_id IN {placeholders} OR target_raw IN {placeholders}"#
        );
        let mut q = sqlx::query_as::<_, RefRecord>(sqlx::AssertSqlSafe(sql.clone()));
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
        let clause = locations
            .iter()
            .map(|_| "(file_path = ? AND line_number = ?)")
            .collect::<Vec<_>>()
            .join(" OR ");
        let sql =
            format!("SELECT source_id, target_id, target_raw, file_path, line_number FROM refs WHERE {clause}");
        let mut q = sqlx::query_as::<_, RefRecord>(sqlx::AssertSqlSafe(sql.clone()));
        for (file_path, line) in locations {
            q = q.bind(file_path).bind(line);
        }
        let rows = q.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(RefRow::from).collect())
    }

    async fn resolve_target(&self, raw: &str) -> Result<Vec<String>, QueryError> {
        let rows = sqlx::query("SELECT id FROM objects WHERE id = ?1 OR id LIKE ?2 ESCAPE '\\'")
            .bind(raw)
            .bind(format!("%/{}", escape_like(raw)))
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
        let placeholders = in_placeholders(source_ids.len());
        let sql = format!(
            r#"SELECT source_id, field_name, target_id, target_raw, status
               FROM field_refs WHERE field_name = ? AND source_id IN {placeholders}"#
        );
        let mut q = sqlx::query(sqlx::AssertSqlSafe(sql.clone())).bind(field_name);
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
        let rows = sqlx::query("SELECT object_id FROM object_fts WHERE object_fts MATCH ?")
            .bind(terms)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| r.get::<String, _>(0)).collect())
    }
}

/// Escape `%`, `_`, and `\` for use in a `LIKE ... ESCAPE '\'` pattern.
fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed() -> SqliteStore {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        sqlx::query(
            r#"INSERT INTO objects (id, type, file_path, fields, parent_id, line_start, line_end)
               VALUES ('projects/website', 'project', 'projects/website.md', '{"status":"active"}', NULL, 1, 10)"#,
        )
        .execute(&store.pool)
        .await
        .unwrap();
        store
    }

    #[tokio::test]
    async fn objects_by_type_roundtrips_json_fields() {
        let store = seed().await;
        let rows = store.objects_by_type("project").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].fields["status"], "active");
    }

    #[tokio::test]
    async fn resolve_target_matches_exact_and_short_name() {
        let store = seed().await;
        assert_eq!(
            store.resolve_target("projects/website").await.unwrap(),
            vec!["projects/website".to_string()]
        );
        assert_eq!(
            store.resolve_target("website").await.unwrap(),
            vec!["projects/website".to_string()]
        );
    }
}
