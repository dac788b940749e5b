// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! Pipeline stage execution (§4.6): assignments (aggregates) run first, in
//! listed order, each producing a named computed column; then `filter`
//! stages, in order; then `sort` stages, stable and composable; then
//! `limit`, applied last.
//!
//! Aggregates over a bare nav function (`refs(_)`, `child(_)`, ...) are
//! always computed with one bulk store call per outer batch (§4.6
//! "Batched"); aggregates over a full sub-query fall back to one query per
//! outer row (§4.6 "N+1") unless the sub-query is a bare self-bound
//! structural predicate with no further narrowing, in which case one of
//! §4.6's two batched templates applies instead: `on:_`/`parent:_` (direct
//! group-by) or `within:_`/`ancestor:_`/`descendant:_` (recursive-closure
//! group-by) (§8 "Batched = N+1" equivalence). Only `count` aggregates
//! take either batched path — `min`/`max`/`sum` always need the matched
//! rows' field values and go through N+1.

use crate::ast::{Agg, AggSource, Assignment, CompareOp, NavFn, PipelineStage, Predicate, SortDir};
use crate::config::config;
use crate::error::QueryError;
use crate::evaluator::{CandidateSet, Evaluator};
use crate::store::{ObjectRow, Store};
use crate::value::Value;
use std::cmp::Ordering;
use std::collections::HashMap;

/// One outer row plus whatever computed columns the pipeline's assignment
/// stages produced for it.
#[derive(Debug, Clone)]
pub struct Row {
    /// The outer row's id.
    pub id: String,
    /// Computed column name -> value, in assignment order.
    pub computed: Vec<(String, Value)>,
}

impl Row {
    fn get(&self, name: &str) -> Option<&Value> {
        self.computed.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// Run every stage of `pipeline` over the ids matched by the predicate
/// evaluation, in listed order, against `universe_kind` (only object
/// pipelines may bind `_` to a trait sub-query's `on`/`within`; this
/// follows §4.3 rule 4's self-binding scopes).
pub async fn run(
    evaluator: &Evaluator<'_>,
    store: &dyn Store,
    ids: Vec<String>,
    stages: &[PipelineStage],
) -> Result<Vec<Row>, QueryError> {
    let mut rows: Vec<Row> = ids.into_iter().map(|id| Row { id, computed: Vec::new() }).collect();

    for stage in stages {
        match stage {
            PipelineStage::Assign(assignment) => {
                compute_assignment(evaluator, store, assignment, &mut rows).await?;
            }
            PipelineStage::Filter { left, op, right } => {
                rows.retain(|row| {
                    let lhs = row.get(left).cloned().unwrap_or(Value::Null);
                    compare(&lhs, right, *op)
                });
            }
            PipelineStage::Sort { left, dir } => {
                rows.sort_by(|a, b| {
                    let av = a.get(left).cloned().unwrap_or(Value::Null);
                    let bv = b.get(left).cloned().unwrap_or(Value::Null);
                    let ord = av.compare(&bv);
                    match dir {
                        SortDir::Asc => ord,
                        SortDir::Desc => ord.reverse(),
                    }
                });
            }
            PipelineStage::Limit(n) => {
                rows.truncate(*n as usize);
            }
        }
    }
    Ok(rows)
}

fn compare(lhs: &Value, rhs: &Value, op: CompareOp) -> bool {
    match op {
        CompareOp::Eq => lhs.matches_membership(rhs),
        CompareOp::Neq => !lhs.matches_membership(rhs),
        CompareOp::Lt => lhs.compare(rhs) == Ordering::Less,
        CompareOp::Lte => lhs.compare(rhs) != Ordering::Greater,
        CompareOp::Gt => lhs.compare(rhs) == Ordering::Greater,
        CompareOp::Gte => lhs.compare(rhs) != Ordering::Less,
    }
}

async fn compute_assignment(
    evaluator: &Evaluator<'_>,
    store: &dyn Store,
    assignment: &Assignment,
    rows: &mut [Row],
) -> Result<(), QueryError> {
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let force_n_plus_1 = config().force_n_plus_1();
    let values = match &assignment.source {
        AggSource::Nav(nav) => batched_nav_counts(store, *nav, &ids).await?,
        AggSource::SubQuery(sub_query) => {
            let batched = if force_n_plus_1 { None } else { try_batched_subquery(store, sub_query, &ids).await? };
            match batched {
                Some(counts) => counts.into_iter().map(|(id, count)| (id, Value::Num(count as f64))).collect(),
                None => n_plus_one(evaluator, assignment, sub_query, &ids).await?,
            }
        }
    };
    for row in rows.iter_mut() {
        let value = values.get(&row.id).cloned().unwrap_or(Value::Null);
        row.computed.push((assignment.name.clone(), value));
    }
    Ok(())
}

/// One bulk store call per `nav`, grouped by the outer id each result row
/// belongs to — the batched path for `NAME=count(NAV(_))` (§4.6).
async fn batched_nav_counts(store: &dyn Store, nav: NavFn, ids: &[String]) -> Result<HashMap<String, Value>, QueryError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let counts: HashMap<String, i64> = match nav {
        NavFn::Refs => {
            let refs = store.refs_from(ids).await?;
            let mut counts = HashMap::new();
            for r in refs {
                *counts.entry(r.source_id).or_insert(0) += 1;
            }
            counts
        }
        NavFn::Refd => {
            let refs = store.refs_to(ids).await?;
            let mut counts = HashMap::new();
            let id_set: std::collections::HashSet<&String> = ids.iter().collect();
            for r in refs {
                let matched = r
                    .target_id
                    .as_ref()
                    .filter(|t| id_set.contains(t))
                    .or_else(|| id_set.get(&r.target_raw).copied());
                if let Some(id) = matched {
                    *counts.entry(id.clone()).or_insert(0) += 1;
                }
            }
            counts
        }
        NavFn::Child => {
            let children = store.children_of(ids).await?;
            let mut counts = HashMap::new();
            for c in children {
                if let Some(parent) = c.parent_id {
                    *counts.entry(parent).or_insert(0) += 1;
                }
            }
            counts
        }
        NavFn::Descendants => {
            let descendants = store.descendants_of(ids).await?;
            group_descendants_by_root(ids, &descendants)
        }
    };
    Ok(ids
        .iter()
        .map(|id| (id.clone(), Value::Num(*counts.get(id).unwrap_or(&0) as f64)))
        .collect())
}

fn group_descendants_by_root(roots: &[String], descendants: &[ObjectRow]) -> HashMap<String, i64> {
    group_descendant_ids_by_root(roots, descendants)
        .into_iter()
        .map(|(root, ids)| (root, ids.len() as i64))
        .collect()
}

/// Like [`group_descendants_by_root`], but keeps each root's descendant id
/// list instead of collapsing it to a count — `within(_)`'s batched path
/// needs the ids themselves to join against traits.
fn group_descendant_ids_by_root(roots: &[String], descendants: &[ObjectRow]) -> HashMap<String, Vec<String>> {
    let by_id: HashMap<&str, &ObjectRow> = descendants.iter().map(|r| (r.id.as_str(), r)).collect();
    let root_set: std::collections::HashSet<&String> = roots.iter().collect();
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for d in descendants {
        let mut cur = d;
        loop {
            match &cur.parent_id {
                Some(parent) if root_set.contains(parent) => {
                    map.entry(parent.clone()).or_default().push(d.id.clone());
                    break;
                }
                Some(parent) => match by_id.get(parent.as_str()) {
                    Some(next) => cur = next,
                    None => break,
                },
                None => break,
            }
        }
    }
    map
}

/// Direct group-by for `on(_)` inside a trait sub-query (§4.6's `on:_` /
/// `parent:_` template): traits anchored directly to each outer id.
async fn batched_on_counts(store: &dyn Store, ids: &[String]) -> Result<HashMap<String, i64>, QueryError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let traits = store.traits_by_parent_ids(ids).await?;
    let mut counts: HashMap<String, i64> = HashMap::new();
    for t in traits {
        *counts.entry(t.parent_object_id).or_insert(0) += 1;
    }
    Ok(ids.iter().map(|id| (id.clone(), *counts.get(id).unwrap_or(&0))).collect())
}

/// Recursive-closure group-by for `within(_)` inside a trait sub-query
/// (§4.6's `within:_` / `ancestor:_` / `descendant:_` template): traits
/// anchored anywhere under each outer id's descendant closure, including
/// the outer id itself (mirrors [`Evaluator::eval_within`](crate::evaluator)).
async fn batched_within_counts(store: &dyn Store, ids: &[String]) -> Result<HashMap<String, i64>, QueryError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let descendants = store.descendants_of(ids).await?;
    let closures = group_descendant_ids_by_root(ids, &descendants);
    let mut members: Vec<String> = ids.to_vec();
    members.extend(closures.values().flatten().cloned());
    members.sort();
    members.dedup();
    let traits = store.traits_by_parent_ids(&members).await?;
    let mut trait_counts: HashMap<&str, i64> = HashMap::new();
    for t in &traits {
        *trait_counts.entry(t.parent_object_id.as_str()).or_insert(0) += 1;
    }
    Ok(ids
        .iter()
        .map(|id| {
            let mut total = trait_counts.get(id.as_str()).copied().unwrap_or(0);
            if let Some(descendant_ids) = closures.get(id) {
                total += descendant_ids.iter().filter_map(|d| trait_counts.get(d.as_str())).sum::<i64>();
            }
            (id.clone(), total)
        })
        .collect())
}

/// Recursive-closure count for `ancestor(_)` inside an object sub-query
/// (§4.6's `within:_` / `ancestor:_` / `descendant:_` template): walks each
/// outer id's own parent chain against the bulk-fetched ancestor set
/// (mirrors [`Evaluator::eval_hierarchy`](crate::evaluator)'s `Ancestor` arm).
async fn batched_ancestor_counts(store: &dyn Store, ids: &[String]) -> Result<HashMap<String, i64>, QueryError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let roots = store.objects_by_ids(ids).await?;
    let ancestors = store.ancestors_of(ids).await?;
    let roots_by_id: HashMap<&str, &ObjectRow> = roots.iter().map(|r| (r.id.as_str(), r)).collect();
    let ancestors_by_id: HashMap<&str, &ObjectRow> = ancestors.iter().map(|r| (r.id.as_str(), r)).collect();
    Ok(ids
        .iter()
        .map(|id| {
            let mut count = 0i64;
            let mut cur = roots_by_id.get(id.as_str()).and_then(|r| r.parent_id.as_deref());
            while let Some(parent) = cur {
                count += 1;
                cur = ancestors_by_id.get(parent).and_then(|r| r.parent_id.as_deref());
            }
            (id.clone(), count)
        })
        .collect())
}

/// Recognize the "bare self-bound structural predicate, no further
/// narrowing" shape (§8 "Batched = N+1") and compute it with one of §4.6's
/// two templates, rather than one query per row. Only `count` aggregates
/// qualify — `min`/`max`/`sum` always need the matched rows' field values
/// and take the N+1 path.
async fn try_batched_subquery(
    store: &dyn Store,
    sub_query: &crate::ast::Query,
    ids: &[String],
) -> Result<Option<HashMap<String, i64>>, QueryError> {
    use crate::ast::{HierarchyDir, NavTarget};

    let Some(pred) = &sub_query.predicate else {
        return Ok(None);
    };
    let as_counts = |values: HashMap<String, Value>| -> HashMap<String, i64> {
        values.into_iter().map(|(id, v)| (id, v.as_numeric().unwrap_or(0.0) as i64)).collect()
    };
    let counts = match pred {
        Predicate::Refs { target: NavTarget::SelfBinding } => as_counts(batched_nav_counts(store, NavFn::Refs, ids).await?),
        Predicate::Refd { target: NavTarget::SelfBinding } => as_counts(batched_nav_counts(store, NavFn::Refd, ids).await?),
        // `parent(_)` and `child(_)` test the same `parent_id` membership
        // (see `Evaluator::eval_hierarchy`'s `Parent`/`Child` arms), so both
        // reduce to the same direct group-by.
        Predicate::Hierarchy { dir: HierarchyDir::Child, target: NavTarget::SelfBinding }
        | Predicate::Hierarchy { dir: HierarchyDir::Parent, target: NavTarget::SelfBinding } => {
            as_counts(batched_nav_counts(store, NavFn::Child, ids).await?)
        }
        Predicate::Hierarchy { dir: HierarchyDir::Descendant, target: NavTarget::SelfBinding } => {
            as_counts(batched_nav_counts(store, NavFn::Descendants, ids).await?)
        }
        Predicate::Hierarchy { dir: HierarchyDir::Ancestor, target: NavTarget::SelfBinding } => {
            batched_ancestor_counts(store, ids).await?
        }
        Predicate::On { target: NavTarget::SelfBinding } => batched_on_counts(store, ids).await?,
        Predicate::Within { target: NavTarget::SelfBinding } => batched_within_counts(store, ids).await?,
        _ => return Ok(None),
    };
    Ok(Some(counts))
}

/// One query per outer row, binding `_` to that row's id (§4.6 "N+1"
/// fallback) — required whenever the aggregate carries a field (`min`,
/// `max`, `sum`) or the sub-query narrows beyond a bare nav function.
async fn n_plus_one(
    evaluator: &Evaluator<'_>,
    assignment: &Assignment,
    sub_query: &crate::ast::Query,
    ids: &[String],
) -> Result<HashMap<String, Value>, QueryError> {
    let mut out = HashMap::new();
    for id in ids {
        let candidates = evaluator.eval(sub_query.kind, &sub_query.type_name, sub_query.predicate.as_ref(), Some(id)).await?;
        let value = match assignment.agg {
            Agg::Count => Value::Num(candidates.len() as f64),
            Agg::Min | Agg::Max | Agg::Sum => {
                let field = assignment.field.as_deref();
                let rows = evaluator.rows_for(sub_query, Some(id)).await?;
                let values = extract_values(&rows, field);
                reduce(assignment.agg, values)
            }
        };
        out.insert(id.clone(), value);
    }
    Ok(out)
}

fn extract_values(rows: &CandidateSet, field: Option<&str>) -> Vec<Value> {
    match rows {
        CandidateSet::Objects(objs) => {
            let Some(field) = field else { return Vec::new() };
            objs.iter()
                .map(|o| Value::from_json(o.fields.get(field).unwrap_or(&serde_json::Value::Null)))
                .collect()
        }
        CandidateSet::Traits(traits) => traits
            .iter()
            .filter_map(|t| t.value.clone())
            .map(Value::Str)
            .collect(),
    }
}

fn reduce(agg: Agg, values: Vec<Value>) -> Value {
    if values.is_empty() {
        return Value::Null;
    }
    match agg {
        Agg::Min => values.into_iter().min_by(|a, b| a.compare(b)).unwrap_or(Value::Null),
        Agg::Max => values.into_iter().max_by(|a, b| a.compare(b)).unwrap_or(Value::Null),
        Agg::Sum => {
            let total: f64 = values.iter().filter_map(|v| v.as_numeric()).sum();
            Value::Num(total)
        }
        Agg::Count => Value::Num(values.len() as f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Kind as AstKind, NavTarget, Query};
    use crate::schema::{Schema as SchemaDef, TypeDef};
    use crate::store::sqlite::SqliteStore;

    async fn seed() -> SqliteStore {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        sqlx::query(
            r#"INSERT INTO objects (id, type, file_path, fields, parent_id, line_start, line_end) VALUES
               ('projects/a', 'project', 'a.md', '{}', NULL, 1, 1),
               ('projects/b', 'project', 'b.md', '{}', NULL, 1, 1)"#,
        )
        .execute(store.pool())
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO refs (source_id, target_id, target_raw, file_path, line_number) VALUES
             ('projects/a', 'projects/b', 'projects/b', 'a.md', 1),
             ('projects/a', 'projects/b', 'projects/b', 'a.md', 2)",
        )
        .execute(store.pool())
        .await
        .unwrap();
        store
    }

    #[tokio::test]
    async fn batched_count_matches_n_plus_one_subquery_equivalent() {
        let store = seed().await;
        let schema = SchemaDef::new().with_type(TypeDef::new("project"));
        let evaluator = Evaluator::new(&store, &schema);
        let ids = vec!["projects/a".to_string(), "projects/b".to_string()];

        let nav_assignment = Assignment {
            name: "n".into(),
            agg: Agg::Count,
            field: None,
            source: AggSource::Nav(NavFn::Refs),
        };
        let sub_query = Query {
            kind: AstKind::Object,
            type_name: "project".into(),
            predicate: Some(Predicate::Refs { target: NavTarget::SelfBinding }),
            pipeline: None,
        };
        let sub_assignment = Assignment {
            name: "n".into(),
            agg: Agg::Count,
            field: None,
            source: AggSource::SubQuery(Box::new(sub_query)),
        };

        let mut rows_a: Vec<Row> = ids.iter().map(|id| Row { id: id.clone(), computed: Vec::new() }).collect();
        let mut rows_b = rows_a.clone();
        compute_assignment(&evaluator, &store, &nav_assignment, &mut rows_a).await.unwrap();
        compute_assignment(&evaluator, &store, &sub_assignment, &mut rows_b).await.unwrap();

        for (a, b) in rows_a.iter().zip(rows_b.iter()) {
            assert_eq!(a.get("n").unwrap().to_string(), b.get("n").unwrap().to_string());
        }
    }

    #[tokio::test]
    async fn within_batched_path_matches_forced_n_plus_1() {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        sqlx::query(
            r#"INSERT INTO objects (id, type, file_path, fields, parent_id, line_start, line_end) VALUES
               ('projects/a', 'project', 'a.md', '{}', NULL, 1, 1),
               ('projects/a/sub', 'task', 'a.md', '{}', 'projects/a', 2, 2),
               ('projects/b', 'project', 'b.md', '{}', NULL, 1, 1)"#,
        )
        .execute(store.pool())
        .await
        .unwrap();
        sqlx::query(
            r#"INSERT INTO traits (id, parent_object_id, trait_type, value, content, file_path, line_number) VALUES
               ('t1', 'projects/a', 'todo', NULL, '#todo', 'a.md', 1),
               ('t2', 'projects/a/sub', 'todo', NULL, '#todo', 'a.md', 2)"#,
        )
        .execute(store.pool())
        .await
        .unwrap();

        let schema = SchemaDef::new().with_type(TypeDef::new("project")).with_trait("todo", crate::schema::TraitDef::Boolean);
        let evaluator = Evaluator::new(&store, &schema);
        let ids = vec!["projects/a".to_string(), "projects/b".to_string()];

        let sub_query = Query {
            kind: AstKind::Trait,
            type_name: "todo".into(),
            predicate: Some(Predicate::Within { target: NavTarget::SelfBinding }),
            pipeline: None,
        };
        let assignment = Assignment {
            name: "n".into(),
            agg: Agg::Count,
            field: None,
            source: AggSource::SubQuery(Box::new(sub_query.clone())),
        };

        let batched = try_batched_subquery(&store, &sub_query, &ids).await.unwrap();
        assert!(batched.is_some(), "within(_) should take the batched template, not fall through to N+1");

        let mut via_batched: Vec<Row> = ids.iter().map(|id| Row { id: id.clone(), computed: Vec::new() }).collect();
        compute_assignment(&evaluator, &store, &assignment, &mut via_batched).await.unwrap();

        let via_n_plus_1 = n_plus_one(&evaluator, &assignment, &sub_query, &ids).await.unwrap();

        for row in &via_batched {
            assert_eq!(row.get("n").unwrap().to_string(), via_n_plus_1.get(&row.id).unwrap().to_string());
        }
        assert_eq!(via_batched.iter().find(|r| r.id == "projects/a").unwrap().get("n"), Some(&Value::Num(2.0)));
        assert_eq!(via_batched.iter().find(|r| r.id == "projects/b").unwrap().get("n"), Some(&Value::Num(0.0)));
    }

    #[test]
    fn filter_stage_keeps_matching_rows_only() {
        let rows = vec![
            Row { id: "a".into(), computed: vec![("n".into(), Value::Num(1.0))] },
            Row { id: "b".into(), computed: vec![("n".into(), Value::Num(5.0))] },
        ];
        let mut rows = rows;
        rows.retain(|row| compare(row.get("n").unwrap(), &Value::Num(2.0), CompareOp::Gte));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "b");
    }
}
