// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! Predicate compiler / evaluator (§4.5): lowers each predicate node to a
//! set of candidate ids, constrained by the root kind, and composes via
//! AND (intersection), OR (union), NOT (complement over the root-type
//! universe — never the whole table, per §4.5's last bullet).
//!
//! Leaf predicates that touch JSON fields or `.value` are matched entirely
//! in memory once the relevant rows are fetched (see [`CandidateSet`]);
//! navigation predicates (`has`, `refs`, hierarchy, ...) issue additional
//! bulk store calls and map the results back onto the current universe.

use crate::ast::{ElementPredicate, HierarchyDir, Kind, NavTarget, Predicate, Quantifier, Rhs, StringFn};
use crate::error::QueryError;
use crate::schema::{FieldType, Schema};
use crate::store::{ObjectRow, ResolutionStatus, Store, TraitRow};
use crate::target;
use crate::value::Value;
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashSet;

/// The rows a query's predicate tree is matched against: all rows of the
/// declared object type or trait type (§4.5 "Leaf by type").
#[derive(Debug, Clone)]
pub enum CandidateSet {
    /// Object rows (an `object:TYPE` query's universe).
    Objects(Vec<ObjectRow>),
    /// Trait rows (a `trait:TYPE` query's universe).
    Traits(Vec<TraitRow>),
}

impl CandidateSet {
    /// Ids in fetch order (stable order for the final projection).
    pub fn ids(&self) -> Vec<String> {
        match self {
            CandidateSet::Objects(rows) => rows.iter().map(|r| r.id.clone()).collect(),
            CandidateSet::Traits(rows) => rows.iter().map(|r| r.id.clone()).collect(),
        }
    }

    /// Ids as a set, for intersection/union/complement arithmetic.
    pub fn id_set(&self) -> HashSet<String> {
        self.ids().into_iter().collect()
    }

    /// This candidate set's root kind.
    pub fn kind(&self) -> Kind {
        match self {
            CandidateSet::Objects(_) => Kind::Object,
            CandidateSet::Traits(_) => Kind::Trait,
        }
    }
}

/// Evaluates parsed, validated queries against a [`Store`] + [`Schema`]
/// pair. Stateless and cheap to construct per query.
pub struct Evaluator<'s> {
    store: &'s dyn Store,
    schema: &'s Schema,
}

impl<'s> Evaluator<'s> {
    /// Build an evaluator over `store`/`schema`, both borrowed for the
    /// lifetime of the query.
    pub fn new(store: &'s dyn Store, schema: &'s Schema) -> Self {
        Self { store, schema }
    }

    /// Evaluate `kind:type_name predicate`, returning matched ids in the
    /// store's fetch order (pipeline sorting happens later).
    pub async fn eval(&self, kind: Kind, type_name: &str, predicate: Option<&Predicate>, self_id: Option<&str>) -> Result<Vec<String>, QueryError> {
        let universe = self.fetch_universe(kind, type_name).await?;
        let matched = match predicate {
            Some(pred) => self.eval_predicate(pred, &universe, self_id).await?,
            None => universe.id_set(),
        };
        Ok(universe.ids().into_iter().filter(|id| matched.contains(id)).collect())
    }

    /// Public entry point for callers (the pipeline's N+1 aggregate path)
    /// that need full row data — field values for `min`/`max`/`sum`, not
    /// just ids — from a sub-query, optionally with `_` bound.
    pub async fn rows_for(&self, query: &crate::ast::Query, self_id: Option<&str>) -> Result<CandidateSet, QueryError> {
        self.eval_subquery_rows(query, self_id).await
    }

    /// Evaluate a full sub-query (`object:T ...` / `trait:T ...`) in
    /// isolation, returning its [`CandidateSet`] of matching rows. Used by
    /// navigation predicates that need row data (e.g. `has`'s trait rows),
    /// not just ids.
    fn eval_subquery_rows<'a>(
        &'a self,
        query: &'a crate::ast::Query,
        self_id: Option<&'a str>,
    ) -> BoxFuture<'a, Result<CandidateSet, QueryError>> {
        async move {
            let universe = self.fetch_universe(query.kind, &query.type_name).await?;
            let matched_ids = match &query.predicate {
                Some(pred) => self.eval_predicate(pred, &universe, self_id).await?,
                None => return Ok(universe),
            };
            Ok(match universe {
                CandidateSet::Objects(rows) => {
                    CandidateSet::Objects(rows.into_iter().filter(|r| matched_ids.contains(&r.id)).collect())
                }
                CandidateSet::Traits(rows) => {
                    CandidateSet::Traits(rows.into_iter().filter(|r| matched_ids.contains(&r.id)).collect())
                }
            })
        }
        .boxed()
    }

    async fn fetch_universe(&self, kind: Kind, type_name: &str) -> Result<CandidateSet, QueryError> {
        match kind {
            Kind::Object => Ok(CandidateSet::Objects(self.store.objects_by_type(type_name).await?)),
            Kind::Trait => Ok(CandidateSet::Traits(self.store.traits_by_type(type_name).await?)),
        }
    }

    /// Resolve a navigation target to the set of ids it stands for: a
    /// `[[ref]]` (via §4.4 resolution), a nested sub-query's matched ids,
    /// or the current self-binding.
    fn resolve_nav_target<'a>(
        &'a self,
        target: &'a NavTarget,
        self_id: Option<&'a str>,
    ) -> BoxFuture<'a, Result<HashSet<String>, QueryError>> {
        async move {
            match target {
                NavTarget::Ref(raw) => {
                    let resolution = target::resolve_target(self.store, raw).await?;
                    Ok(resolution.candidate_ids().into_iter().collect())
                }
                NavTarget::SubQuery(sub_query) => {
                    let rows = self.eval_subquery_rows(sub_query, self_id).await?;
                    Ok(rows.id_set())
                }
                NavTarget::SelfBinding => {
                    let id = self_id.ok_or_else(|| QueryError::Runtime("'_' used with no bound outer row".into()))?;
                    Ok(HashSet::from([id.to_string()]))
                }
            }
        }
        .boxed()
    }

    /// Like [`resolve_nav_target`], but for refs/refd target resolution
    /// where a dangling (`target_raw`-only) reference must also be
    /// considered a candidate string (§4.4).
    fn resolve_ref_candidates<'a>(
        &'a self,
        target: &'a NavTarget,
        self_id: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Vec<String>, QueryError>> {
        async move {
            match target {
                NavTarget::Ref(raw) => {
                    let resolution = target::resolve_target(self.store, raw).await?;
                    Ok(target::candidate_strings(&resolution))
                }
                other => Ok(self.resolve_nav_target(other, self_id).await?.into_iter().collect()),
            }
        }
        .boxed()
    }

    fn eval_predicate<'a>(
        &'a self,
        pred: &'a Predicate,
        universe: &'a CandidateSet,
        self_id: Option<&'a str>,
    ) -> BoxFuture<'a, Result<HashSet<String>, QueryError>> {
        async move {
            match pred {
                Predicate::Field { field, op, rhs } => self.eval_field(field, *op, rhs, universe).await,
                Predicate::Value { op, rhs } => Ok(eval_value(*op, rhs, universe)),
                Predicate::Exists { field } => Ok(eval_exists(field, universe)),
                Predicate::StringFn {
                    func,
                    field,
                    arg,
                    case_sensitive,
                } => eval_string_fn(*func, field, arg, *case_sensitive, universe),
                Predicate::Quantifier { kind, field, elt } => eval_quantifier(*kind, field, elt, universe),
                Predicate::Content { terms } => self.eval_content(terms, universe).await,
                Predicate::Has { sub_query } => self.eval_has(sub_query, universe, self_id).await,
                Predicate::Encloses { sub_query } => self.eval_encloses(sub_query, universe, self_id).await,
                Predicate::Hierarchy { dir, target } => self.eval_hierarchy(*dir, target, universe, self_id).await,
                Predicate::Refs { target } => self.eval_refs(target, universe, self_id).await,
                Predicate::Refd { target } => self.eval_refd(target, universe, self_id).await,
                Predicate::On { target } => self.eval_on(target, universe, self_id).await,
                Predicate::Within { target } => self.eval_within(target, universe, self_id).await,
                Predicate::At { target } => self.eval_at(target, universe, self_id).await,
                Predicate::And(items) => {
                    let mut acc = universe.id_set();
                    for item in items {
                        let matched = self.eval_predicate(item, universe, self_id).await?;
                        acc = acc.intersection(&matched).cloned().collect();
                    }
                    Ok(acc)
                }
                Predicate::Or(items) => {
                    let mut acc = HashSet::new();
                    for item in items {
                        let matched = self.eval_predicate(item, universe, self_id).await?;
                        acc.extend(matched);
                    }
                    Ok(acc)
                }
                Predicate::Not(inner) => {
                    let matched = self.eval_predicate(inner, universe, self_id).await?;
                    Ok(universe.id_set().difference(&matched).cloned().collect())
                }
                Predicate::SelfBindingMarker => {
                    let id = self_id.ok_or_else(|| QueryError::Runtime("'_' used with no bound outer row".into()))?;
                    Ok(HashSet::from([id.to_string()]))
                }
            }
        }
        .boxed()
    }

    async fn eval_field(
        &self,
        field: &str,
        op: crate::ast::CompareOp,
        rhs: &Rhs,
        universe: &CandidateSet,
    ) -> Result<HashSet<String>, QueryError> {
        let CandidateSet::Objects(rows) = universe else {
            return Err(QueryError::Runtime("field predicate evaluated against a non-object universe".into()));
        };
        let type_name = &rows.first().map(|r| r.object_type.clone()).unwrap_or_default();
        let field_type = self
            .schema
            .type_def(type_name)
            .and_then(|t| t.field(field))
            .map(|f| f.field_type.clone());

        if let (Some(FieldType::Ref(_)), Rhs::Ref(raw)) = (&field_type, rhs) {
            return self.eval_ref_field(field, op, raw, rows).await;
        }

        let rhs_value = rhs_to_value(rhs);
        let mut matched = HashSet::new();
        for row in rows {
            let stored = Value::from_json(row.fields.get(field).unwrap_or(&serde_json::Value::Null));
            if compare_matches(&stored, &rhs_value, op) {
                matched.insert(row.id.clone());
            }
        }
        Ok(matched)
    }

    async fn eval_ref_field(
        &self,
        field: &str,
        op: crate::ast::CompareOp,
        raw: &str,
        rows: &[ObjectRow],
    ) -> Result<HashSet<String>, QueryError> {
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let field_refs = self.store.field_refs(field, &ids).await?;
        let resolution = target::resolve_target(self.store, raw).await?;
        let target_ids: HashSet<String> = resolution.candidate_ids().into_iter().collect();
        let mut positive = HashSet::new();
        for fr in &field_refs {
            match fr.status {
                ResolutionStatus::Ambiguous => {
                    return Err(QueryError::Resolution {
                        raw: fr.target_raw.clone(),
                        candidates: vec![fr.target_raw.clone()],
                    });
                }
                ResolutionStatus::Resolved => {
                    if fr.target_id.as_deref().is_some_and(|t| target_ids.contains(t)) {
                        positive.insert(fr.source_id.clone());
                    }
                }
                ResolutionStatus::Unresolved => {
                    if fr.target_raw == raw {
                        positive.insert(fr.source_id.clone());
                    }
                }
            }
        }
        Ok(match op {
            crate::ast::CompareOp::Eq => positive,
            crate::ast::CompareOp::Neq => ids.into_iter().filter(|id| !positive.contains(id)).collect(),
            _ => {
                return Err(QueryError::Runtime("ref-typed fields only support == and !=".into()));
            }
        })
    }

    async fn eval_content(&self, terms: &str, universe: &CandidateSet) -> Result<HashSet<String>, QueryError> {
        match universe {
            CandidateSet::Objects(rows) => {
                let matched_ids: HashSet<String> = self.store.content_search_objects(terms).await?.into_iter().collect();
                Ok(rows.iter().map(|r| r.id.clone()).filter(|id| matched_ids.contains(id)).collect())
            }
            CandidateSet::Traits(rows) => {
                let needle = terms.to_lowercase();
                Ok(rows
                    .iter()
                    .filter(|r| r.content.to_lowercase().contains(&needle))
                    .map(|r| r.id.clone())
                    .collect())
            }
        }
    }

    async fn eval_has(
        &self,
        sub_query: &crate::ast::Query,
        universe: &CandidateSet,
        self_id: Option<&'_ str>,
    ) -> Result<HashSet<String>, QueryError> {
        let CandidateSet::Objects(rows) = universe else {
            return Err(QueryError::Runtime("'has' evaluated against a non-object universe".into()));
        };
        let parent_ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        if parent_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let anchored = self.store.traits_by_parent_ids(&parent_ids).await?;
        let relevant: Vec<TraitRow> = anchored.into_iter().filter(|t| t.trait_type == sub_query.type_name).collect();
        let matched_trait_ids: HashSet<String> = match &sub_query.predicate {
            Some(pred) => {
                let cs = CandidateSet::Traits(relevant.clone());
                self.eval_predicate(pred, &cs, self_id).await?
            }
            None => relevant.iter().map(|t| t.id.clone()).collect(),
        };
        Ok(relevant
            .into_iter()
            .filter(|t| matched_trait_ids.contains(&t.id))
            .map(|t| t.parent_object_id)
            .collect())
    }

    async fn eval_encloses(
        &self,
        sub_query: &crate::ast::Query,
        universe: &CandidateSet,
        self_id: Option<&'_ str>,
    ) -> Result<HashSet<String>, QueryError> {
        let CandidateSet::Objects(rows) = universe else {
            return Err(QueryError::Runtime("'encloses' evaluated against a non-object universe".into()));
        };
        let root_ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let descendants = self.store.descendants_of(&root_ids).await?;
        // encloses(t) = has(t) | descendant(object:* has(t)) — §8 "Hierarchy coherence".
        let has_self = self.eval_has(sub_query, universe, self_id).await?;
        if descendants.is_empty() {
            return Ok(has_self);
        }
        let descendant_universe = CandidateSet::Objects(descendants.clone());
        let has_descendant = self.eval_has(sub_query, &descendant_universe, self_id).await?;
        if has_descendant.is_empty() {
            return Ok(has_self);
        }
        let root_set: HashSet<String> = root_ids.into_iter().collect();
        let mut enclosing_roots = has_self;
        for (root, desc_rows) in self.descendant_root_map(&root_set, &descendants).into_iter() {
            if desc_rows.iter().any(|id| has_descendant.contains(id)) {
                enclosing_roots.insert(root);
            }
        }
        Ok(enclosing_roots)
    }

    /// Group `descendants` by which of `roots` they fell under, using the
    /// `parent_id` chain already present on each row (a lightweight local
    /// walk — the store's recursive CTE already did the heavy lifting).
    fn descendant_root_map(
        &self,
        roots: &HashSet<String>,
        descendants: &[ObjectRow],
    ) -> std::collections::HashMap<String, Vec<String>> {
        let by_id: std::collections::HashMap<&str, &ObjectRow> = descendants.iter().map(|r| (r.id.as_str(), r)).collect();
        let mut map: std::collections::HashMap<String, Vec<String>> = std::collections::HashMap::new();
        for d in descendants {
            let mut cur = d;
            loop {
                match &cur.parent_id {
                    Some(parent) if roots.contains(parent) => {
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

    async fn eval_hierarchy(
        &self,
        dir: HierarchyDir,
        target: &NavTarget,
        universe: &CandidateSet,
        self_id: Option<&'_ str>,
    ) -> Result<HashSet<String>, QueryError> {
        let CandidateSet::Objects(rows) = universe else {
            return Err(QueryError::Runtime("hierarchy predicate evaluated against a non-object universe".into()));
        };
        let target_ids = self.resolve_nav_target(target, self_id).await?;
        match dir {
            HierarchyDir::Parent => Ok(rows
                .iter()
                .filter(|r| r.parent_id.as_deref().is_some_and(|p| target_ids.contains(p)))
                .map(|r| r.id.clone())
                .collect()),
            HierarchyDir::Child => Ok(rows
                .iter()
                .filter(|r| r.parent_id.as_deref().is_some_and(|p| target_ids.contains(p)))
                .map(|r| r.id.clone())
                .collect()),
            HierarchyDir::Ancestor => {
                let roots: Vec<String> = target_ids.into_iter().collect();
                let ancestors = self.store.ancestors_of(&roots).await?;
                let ancestor_ids: HashSet<String> = ancestors.into_iter().map(|r| r.id).collect();
                Ok(rows.iter().map(|r| r.id.clone()).filter(|id| ancestor_ids.contains(id)).collect())
            }
            HierarchyDir::Descendant => {
                let roots: Vec<String> = target_ids.into_iter().collect();
                let descendants = self.store.descendants_of(&roots).await?;
                let descendant_ids: HashSet<String> = descendants.into_iter().map(|r| r.id).collect();
                Ok(rows.iter().map(|r| r.id.clone()).filter(|id| descendant_ids.contains(id)).collect())
            }
        }
    }

    async fn eval_refs(
        &self,
        target: &NavTarget,
        universe: &CandidateSet,
        self_id: Option<&'_ str>,
    ) -> Result<HashSet<String>, QueryError> {
        let candidates = self.resolve_ref_candidates(target, self_id).await?;
        if candidates.is_empty() {
            return Ok(HashSet::new());
        }
        let refs = self.store.refs_to(&candidates).await?;
        match universe {
            CandidateSet::Objects(rows) => {
                let sources: HashSet<String> = refs.into_iter().map(|r| r.source_id).collect();
                Ok(rows.iter().map(|r| r.id.clone()).filter(|id| sources.contains(id)).collect())
            }
            CandidateSet::Traits(rows) => {
                let locations: HashSet<(String, i64)> = refs.into_iter().map(|r| (r.file_path, r.line_number)).collect();
                Ok(rows
                    .iter()
                    .filter(|t| locations.contains(&(t.file_path.clone(), t.line_number)))
                    .map(|t| t.id.clone())
                    .collect())
            }
        }
    }

    async fn eval_refd(
        &self,
        target: &NavTarget,
        universe: &CandidateSet,
        self_id: Option<&'_ str>,
    ) -> Result<HashSet<String>, QueryError> {
        let CandidateSet::Objects(rows) = universe else {
            return Err(QueryError::Runtime("'refd' evaluated against a non-object universe".into()));
        };
        let refs = match target {
            NavTarget::SubQuery(sub_query) if sub_query.kind == Kind::Trait => {
                let trait_rows = self.eval_subquery_rows(sub_query, self_id).await?;
                let CandidateSet::Traits(trait_rows) = trait_rows else {
                    unreachable!("sub_query.kind == Trait")
                };
                let locations: Vec<(String, i64)> = trait_rows.into_iter().map(|t| (t.file_path, t.line_number)).collect();
                self.store.refs_at(&locations).await?
            }
            other => {
                let source_ids: Vec<String> = self.resolve_nav_target(other, self_id).await?.into_iter().collect();
                self.store.refs_from(&source_ids).await?
            }
        };
        let mut target_candidates: HashSet<String> = HashSet::new();
        for r in &refs {
            if let Some(t) = &r.target_id {
                target_candidates.insert(t.clone());
            }
            target_candidates.insert(r.target_raw.clone());
        }
        Ok(rows.iter().map(|r| r.id.clone()).filter(|id| target_candidates.contains(id)).collect())
    }

    async fn eval_on(
        &self,
        target: &NavTarget,
        universe: &CandidateSet,
        self_id: Option<&'_ str>,
    ) -> Result<HashSet<String>, QueryError> {
        let CandidateSet::Traits(rows) = universe else {
            return Err(QueryError::Runtime("'on' evaluated against a non-trait universe".into()));
        };
        let target_ids = self.resolve_nav_target(target, self_id).await?;
        Ok(rows
            .iter()
            .filter(|t| target_ids.contains(&t.parent_object_id))
            .map(|t| t.id.clone())
            .collect())
    }

    async fn eval_within(
        &self,
        target: &NavTarget,
        universe: &CandidateSet,
        self_id: Option<&'_ str>,
    ) -> Result<HashSet<String>, QueryError> {
        let CandidateSet::Traits(rows) = universe else {
            return Err(QueryError::Runtime("'within' evaluated against a non-trait universe".into()));
        };
        let target_ids: Vec<String> = self.resolve_nav_target(target, self_id).await?.into_iter().collect();
        let descendants = self.store.descendants_of(&target_ids).await?;
        let mut closure: HashSet<String> = target_ids.into_iter().collect();
        closure.extend(descendants.into_iter().map(|r| r.id));
        Ok(rows
            .iter()
            .filter(|t| closure.contains(&t.parent_object_id))
            .map(|t| t.id.clone())
            .collect())
    }

    async fn eval_at(
        &self,
        target: &NavTarget,
        universe: &CandidateSet,
        self_id: Option<&'_ str>,
    ) -> Result<HashSet<String>, QueryError> {
        let CandidateSet::Traits(rows) = universe else {
            return Err(QueryError::Runtime("'at' evaluated against a non-trait universe".into()));
        };
        let NavTarget::SubQuery(sub_query) = target else {
            return Err(QueryError::Runtime("'at' requires a trait sub-query target".into()));
        };
        let other = self.eval_subquery_rows(sub_query, self_id).await?;
        let CandidateSet::Traits(other_rows) = other else {
            return Err(QueryError::Runtime("'at' requires a trait sub-query target".into()));
        };
        let locations: HashSet<(String, i64)> = other_rows.into_iter().map(|t| (t.file_path, t.line_number)).collect();
        Ok(rows
            .iter()
            .filter(|t| locations.contains(&(t.file_path.clone(), t.line_number)))
            .map(|t| t.id.clone())
            .collect())
    }
}

fn rhs_to_value(rhs: &Rhs) -> Value {
    match rhs {
        Rhs::Literal(v) => v.clone(),
        Rhs::Ref(raw) => Value::Str(raw.clone()),
    }
}

fn compare_matches(stored: &Value, rhs: &Value, op: crate::ast::CompareOp) -> bool {
    use crate::ast::CompareOp::*;
    match op {
        Eq => stored.matches_membership(rhs),
        Neq => !stored.matches_membership(rhs),
        Lt => stored.compare(rhs) == std::cmp::Ordering::Less,
        Lte => stored.compare(rhs) != std::cmp::Ordering::Greater,
        Gt => stored.compare(rhs) == std::cmp::Ordering::Greater,
        Gte => stored.compare(rhs) != std::cmp::Ordering::Less,
    }
}

fn eval_value(op: crate::ast::CompareOp, rhs: &Rhs, universe: &CandidateSet) -> HashSet<String> {
    let CandidateSet::Traits(rows) = universe else {
        return HashSet::new();
    };
    let rhs_value = rhs_to_value(rhs);
    rows.iter()
        .filter(|t| match &t.value {
            Some(v) => compare_matches(&Value::Str(v.clone()), &rhs_value, op),
            None => false,
        })
        .map(|t| t.id.clone())
        .collect()
}

fn eval_exists(field: &str, universe: &CandidateSet) -> HashSet<String> {
    match universe {
        CandidateSet::Objects(rows) => rows
            .iter()
            .filter(|r| r.fields.get(field).is_some_and(|v| !v.is_null()))
            .map(|r| r.id.clone())
            .collect(),
        CandidateSet::Traits(rows) => rows.iter().filter(|t| t.value.is_some()).map(|t| t.id.clone()).collect(),
    }
}

fn string_matches(haystack: &str, func: StringFn, needle: &str, case_sensitive: bool) -> Result<bool, QueryError> {
    let (h, n) = if case_sensitive {
        (haystack.to_string(), needle.to_string())
    } else {
        (haystack.to_lowercase(), needle.to_lowercase())
    };
    Ok(match func {
        StringFn::Contains => h.contains(&n),
        StringFn::StartsWith => h.starts_with(&n),
        StringFn::EndsWith => h.ends_with(&n),
        StringFn::Matches => {
            let re = regress::Regex::with_flags(needle, if case_sensitive { "" } else { "i" })
                .map_err(|source| QueryError::Regex { pos: crate::error::Position(0), source })?;
            re.find(haystack).is_some()
        }
    })
}

fn eval_string_fn(
    func: StringFn,
    field: &str,
    arg: &str,
    case_sensitive: bool,
    universe: &CandidateSet,
) -> Result<HashSet<String>, QueryError> {
    let mut matched = HashSet::new();
    match universe {
        CandidateSet::Objects(rows) => {
            for row in rows {
                let text = row.fields.get(field).and_then(|v| v.as_str()).unwrap_or("");
                if string_matches(text, func, arg, case_sensitive)? {
                    matched.insert(row.id.clone());
                }
            }
        }
        CandidateSet::Traits(rows) => {
            for t in rows {
                let text = t.value.as_deref().unwrap_or("");
                if string_matches(text, func, arg, case_sensitive)? {
                    matched.insert(t.id.clone());
                }
            }
        }
    }
    Ok(matched)
}

fn eval_quantifier(
    kind: Quantifier,
    field: &str,
    elt: &ElementPredicate,
    universe: &CandidateSet,
) -> Result<HashSet<String>, QueryError> {
    let CandidateSet::Objects(rows) = universe else {
        return Err(QueryError::Runtime("array quantifier evaluated against a non-object universe".into()));
    };
    let mut matched = HashSet::new();
    for row in rows {
        let Some(serde_json::Value::Array(items)) = row.fields.get(field) else {
            continue;
        };
        let values: Vec<Value> = items.iter().map(Value::from_json).collect();
        let mut outcomes = Vec::with_capacity(values.len());
        for v in &values {
            outcomes.push(element_matches(v, elt)?);
        }
        let holds = match kind {
            Quantifier::Any => outcomes.iter().any(|b| *b),
            Quantifier::All => !outcomes.is_empty() && outcomes.iter().all(|b| *b),
            Quantifier::None => outcomes.iter().all(|b| !*b),
        };
        if holds {
            matched.insert(row.id.clone());
        }
    }
    Ok(matched)
}

fn element_matches(value: &Value, elt: &ElementPredicate) -> Result<bool, QueryError> {
    Ok(match elt {
        ElementPredicate::Compare(op, rhs) => compare_matches(value, rhs, *op),
        ElementPredicate::StringFn { func, arg, case_sensitive } => {
            let text = match value {
                Value::Str(s) => s.clone(),
                other => other.to_string(),
            };
            string_matches(&text, *func, arg, *case_sensitive)?
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldType, Schema, TraitDef, TypeDef};
    use crate::store::sqlite::SqliteStore;

    fn schema() -> Schema {
        Schema::new()
            .with_type(
                TypeDef::new("project")
                    .with_field("status", FieldType::String)
                    .with_field("scores", FieldType::Array(Box::new(FieldType::Number))),
            )
            .with_type(TypeDef::new("date"))
            .with_type(TypeDef::new("meeting"))
            .with_trait("todo", TraitDef::Boolean)
            .with_trait("due", TraitDef::Boolean)
            .with_trait("priority", TraitDef::Valued(FieldType::String))
    }

    async fn seed() -> SqliteStore {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        sqlx::query(
            r#"INSERT INTO objects (id, type, file_path, fields, parent_id, line_start, line_end) VALUES
               ('projects/website', 'project', 'a.md', '{"status":"active"}', NULL, 1, 5),
               ('projects/mobile', 'project', 'a.md', '{"status":"paused"}', NULL, 6, 10),
               ('nums/a', 'nums', 'n.md', '{"scores":[10,2]}', NULL, 1, 1),
               ('nums/b', 'nums', 'n.md', '{"scores":["10"]}', NULL, 2, 2),
               ('nums/c', 'nums', 'n.md', '{"scores":[3]}', NULL, 3, 3)"#,
        )
        .execute(store.pool())
        .await
        .unwrap();
        sqlx::query(
            r#"INSERT INTO traits (id, parent_object_id, trait_type, value, content, file_path, line_number) VALUES
               ('t1', 'projects/website', 'todo', NULL, '- [ ] todo', 'a.md', 2)"#,
        )
        .execute(store.pool())
        .await
        .unwrap();
        store
    }

    #[tokio::test]
    async fn field_equality_scenario() {
        let store = seed().await;
        let schema = schema();
        let evaluator = Evaluator::new(&store, &schema);
        let query = crate::parser::parse("object:project .status==active").unwrap();
        let ids = evaluator.eval(query.kind, &query.type_name, query.predicate.as_ref(), None).await.unwrap();
        assert_eq!(ids, vec!["projects/website".to_string()]);
    }

    #[tokio::test]
    async fn array_membership_with_numeric_coercion() {
        let store = seed().await;
        let mut schema = schema();
        schema = schema.with_type(TypeDef::new("nums").with_field("scores", FieldType::Array(Box::new(FieldType::Number))));
        let evaluator = Evaluator::new(&store, &schema);
        let query = crate::parser::parse("object:nums .scores==10").unwrap();
        let mut ids = evaluator.eval(query.kind, &query.type_name, query.predicate.as_ref(), None).await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["nums/a".to_string(), "nums/b".to_string()]);
    }

    #[tokio::test]
    async fn not_complement_matches_root_type_universe() {
        let store = seed().await;
        let schema = schema();
        let evaluator = Evaluator::new(&store, &schema);
        let all = crate::parser::parse("object:project").unwrap();
        let positive = crate::parser::parse("object:project .status==active").unwrap();
        let negative = crate::parser::parse("object:project !.status==active").unwrap();
        let all_ids = evaluator.eval(all.kind, &all.type_name, all.predicate.as_ref(), None).await.unwrap();
        let pos_ids = evaluator.eval(positive.kind, &positive.type_name, positive.predicate.as_ref(), None).await.unwrap();
        let neg_ids = evaluator.eval(negative.kind, &negative.type_name, negative.predicate.as_ref(), None).await.unwrap();
        assert_eq!(pos_ids.len() + neg_ids.len(), all_ids.len());
    }
}
