// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! `[[target]]` resolution against the object table (§4.4, §9 "Ref
//! resolution tri-state").
//!

use crate::error::QueryError;
use crate::store::Store;

/// Outcome of resolving a `[[target]]` reference to object ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetResolution {
    /// Exactly one candidate object id.
    Resolved(String),
    /// No object matched; the raw text is preserved for `target_raw`
    /// fallback matching on refs (§4.4).
    Unresolved(String),
    /// More than one object matched a short-name lookup; all candidates are
    /// kept, queries treat them as a set (§4.4 "ambiguous short-name
    /// matches as a set").
    Ambiguous(Vec<String>),
}

impl TargetResolution {
    /// All candidate ids this resolution stands for (empty for
    /// [`Unresolved`][Self::Unresolved]).
    pub fn candidate_ids(&self) -> Vec<String> {
        match self {
            TargetResolution::Resolved(id) => vec![id.clone()],
            TargetResolution::Unresolved(_) => Vec::new(),
            TargetResolution::Ambiguous(ids) => ids.clone(),
        }
    }

    /// True when exactly one id resolved.
    pub fn is_resolved(&self) -> bool {
        matches!(self, TargetResolution::Resolved(_))
    }
}

/// Resolve `raw` against the store's object table: exact id, then
/// short-name suffix match (§4.4).
pub async fn resolve_target(store: &dyn Store, raw: &str) -> Result<TargetResolution, QueryError> {
    let mut ids = store.resolve_target(raw).await?;
    ids.sort();
    ids.dedup();
    Ok(match ids.len() {
        0 => TargetResolution::Unresolved(raw.to_string()),
        1 => TargetResolution::Resolved(ids.into_iter().next().unwrap()),
        _ => TargetResolution::Ambiguous(ids),
    })
}

/// The id/raw-text pair a `refs`/`refd` predicate should match against,
/// combining both §4.4 fallback columns regardless of resolution outcome
/// (a ref row may carry `target_raw` only, or both).
pub fn candidate_strings(resolution: &TargetResolution) -> Vec<String> {
    match resolution {
        TargetResolution::Resolved(id) => vec![id.clone()],
        TargetResolution::Unresolved(raw) => vec![raw.clone()],
        TargetResolution::Ambiguous(ids) => ids.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::sqlite::SqliteStore;

    async fn seed() -> SqliteStore {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        sqlx::query(
            "INSERT INTO objects (id, type, file_path, fields, parent_id, line_start, line_end) VALUES \
             ('projects/website', 'project', 'a.md', '{}', NULL, 1, 1), \
             ('archive/website', 'project', 'b.md', '{}', NULL, 1, 1)",
        )
        .execute(store.pool())
        .await
        .unwrap();
        store
    }

    #[tokio::test]
    async fn exact_id_resolves() {
        let store = seed().await;
        let r = resolve_target(&store, "projects/website").await.unwrap();
        assert_eq!(r, TargetResolution::Resolved("projects/website".into()));
    }

    #[tokio::test]
    async fn short_name_collision_is_ambiguous() {
        let store = seed().await;
        let r = resolve_target(&store, "website").await.unwrap();
        match r {
            TargetResolution::Ambiguous(ids) => assert_eq!(ids.len(), 2),
            other => panic!("expected Ambiguous, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unmatched_raw_is_unresolved() {
        let store = seed().await;
        let r = resolve_target(&store, "nope").await.unwrap();
        assert_eq!(r, TargetResolution::Unresolved("nope".into()));
    }
}
