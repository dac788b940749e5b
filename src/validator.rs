// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! Schema-aware validation (§4.3): walks a parsed [`Query`] against a
//! [`Schema`], checking type/trait/field existence, predicate
//! kind-appropriateness, `_` scoping, and aggregate typing.
//!

use crate::ast::{
    AggSource, ElementPredicate, Kind, NavTarget, Pipeline, PipelineStage, Predicate, Query,
};
use crate::config::config;
use crate::error::QueryError;
use crate::schema::{FieldType, Schema};

/// Validate `query` against `schema`, per §4.3 rules 1-6.
pub fn validate(query: &Query, schema: &Schema) -> Result<(), QueryError> {
    validate_root(query, schema)?;
    if let Some(pred) = &query.predicate {
        validate_predicate(pred, query.kind, &query.type_name, schema, false)?;
    }
    if let Some(pipeline) = &query.pipeline {
        validate_pipeline(pipeline, schema)?;
    }
    Ok(())
}

fn validate_root(query: &Query, schema: &Schema) -> Result<(), QueryError> {
    match query.kind {
        Kind::Object => {
            if schema.type_def(&query.type_name).is_none() {
                return Err(QueryError::unknown_name(
                    "object type",
                    &query.type_name,
                    &schema.type_names(),
                    config().suggestion_limit(),
                ));
            }
        }
        Kind::Trait => {
            if schema.trait_def(&query.type_name).is_none() {
                return Err(QueryError::unknown_name(
                    "trait",
                    &query.type_name,
                    &schema.trait_names(),
                    config().suggestion_limit(),
                ));
            }
        }
    }
    Ok(())
}

fn require_field(type_name: &str, field: &str, schema: &Schema) -> Result<FieldType, QueryError> {
    let type_def = schema.type_def(type_name).ok_or_else(|| {
        QueryError::unknown_name("object type", type_name, &schema.type_names(), config().suggestion_limit())
    })?;
    match type_def.field(field) {
        Some(def) => Ok(def.field_type.clone()),
        None => Err(QueryError::unknown_name(
            "field",
            field,
            &type_def.field_names().map(str::to_string).collect::<Vec<_>>(),
            config().suggestion_limit(),
        )),
    }
}

/// `in_self_scope` is true while walking a pipeline assignment's sub-query
/// (or an array quantifier's element predicate), the only places `_` is
/// legal (rule 4).
fn validate_predicate(
    pred: &Predicate,
    kind: Kind,
    type_name: &str,
    schema: &Schema,
    in_self_scope: bool,
) -> Result<(), QueryError> {
    match pred {
        Predicate::Field { field, .. } => {
            if kind != Kind::Object {
                return Err(kind_error("a field predicate", kind));
            }
            require_field(type_name, field, schema)?;
        }
        Predicate::Value { .. } => {
            if kind != Kind::Trait {
                return Err(kind_error(".value", kind));
            }
        }
        Predicate::Exists { field } => {
            if kind == Kind::Object {
                require_field(type_name, field, schema)?;
            }
        }
        Predicate::StringFn { field, .. } => {
            if kind == Kind::Object {
                require_field(type_name, field, schema)?;
            }
        }
        Predicate::Quantifier { field, elt, .. } => {
            if kind == Kind::Object {
                let field_type = require_field(type_name, field, schema)?;
                if !field_type.is_array() {
                    return Err(QueryError::Validation {
                        message: format!("quantifier predicate on non-array field '.{field}'"),
                        suggestions: Vec::new(),
                    });
                }
            }
            validate_element_predicate(elt)?;
        }
        Predicate::Content { .. } => {}
        Predicate::Has { sub_query } => {
            require_object_kind(kind, "has")?;
            validate_subquery(sub_query, Kind::Trait, schema, in_self_scope)?;
        }
        Predicate::Encloses { sub_query } => {
            require_object_kind(kind, "encloses")?;
            validate_subquery(sub_query, Kind::Trait, schema, in_self_scope)?;
        }
        Predicate::Hierarchy { target, .. } => {
            require_object_kind(kind, "parent/ancestor/child/descendant")?;
            validate_nav_target(target, Kind::Object, schema, in_self_scope)?;
        }
        Predicate::Refs { target } => validate_nav_target_any_kind(target, schema, in_self_scope)?,
        Predicate::Refd { target } => {
            require_object_kind(kind, "refd")?;
            validate_nav_target_any_kind(target, schema, in_self_scope)?;
        }
        Predicate::On { target } => {
            require_trait_kind(kind, "on")?;
            validate_nav_target(target, Kind::Object, schema, in_self_scope)?;
        }
        Predicate::Within { target } => {
            require_trait_kind(kind, "within")?;
            validate_nav_target(target, Kind::Object, schema, in_self_scope)?;
        }
        Predicate::At { target } => {
            require_trait_kind(kind, "at")?;
            validate_nav_target(target, Kind::Trait, schema, in_self_scope)?;
        }
        Predicate::And(items) | Predicate::Or(items) => {
            for item in items {
                validate_predicate(item, kind, type_name, schema, in_self_scope)?;
            }
        }
        Predicate::Not(inner) => validate_predicate(inner, kind, type_name, schema, in_self_scope)?,
        Predicate::SelfBindingMarker => {
            if !in_self_scope {
                return Err(QueryError::Validation {
                    message: "'_' is only valid inside a pipeline assignment's sub-query".to_string(),
                    suggestions: Vec::new(),
                });
            }
        }
    }
    Ok(())
}

fn validate_element_predicate(elt: &ElementPredicate) -> Result<(), QueryError> {
    match elt {
        ElementPredicate::Compare(..) | ElementPredicate::StringFn { .. } => Ok(()),
    }
}

fn validate_nav_target(
    target: &NavTarget,
    expected_sub_query_kind: Kind,
    schema: &Schema,
    in_self_scope: bool,
) -> Result<(), QueryError> {
    match target {
        NavTarget::Ref(_) => Ok(()),
        NavTarget::SelfBinding => {
            if !in_self_scope {
                return Err(QueryError::Validation {
                    message: "'_' is only valid inside a pipeline assignment's sub-query".to_string(),
                    suggestions: Vec::new(),
                });
            }
            Ok(())
        }
        NavTarget::SubQuery(sub_query) => {
            validate_subquery(sub_query, expected_sub_query_kind, schema, in_self_scope)
        }
    }
}

/// Like [`validate_nav_target`], but accepts a sub-query of either root
/// kind — `refs`/`refd` targets may name an object or a trait (§4.2).
fn validate_nav_target_any_kind(
    target: &NavTarget,
    schema: &Schema,
    in_self_scope: bool,
) -> Result<(), QueryError> {
    match target {
        NavTarget::SubQuery(sub_query) => validate_subquery(sub_query, sub_query.kind, schema, in_self_scope),
        other => validate_nav_target(other, Kind::Object, schema, in_self_scope),
    }
}

fn validate_subquery(sub_query: &Query, expected_kind: Kind, schema: &Schema, in_self_scope: bool) -> Result<(), QueryError> {
    if sub_query.kind != expected_kind {
        return Err(QueryError::Validation {
            message: format!("expected a {expected_kind}:... sub-query, found {}:...", sub_query.kind),
            suggestions: Vec::new(),
        });
    }
    validate_root(sub_query, schema)?;
    if let Some(pred) = &sub_query.predicate {
        validate_predicate(pred, sub_query.kind, &sub_query.type_name, schema, in_self_scope)?;
    }
    Ok(())
}

fn require_object_kind(kind: Kind, name: &str) -> Result<(), QueryError> {
    if kind != Kind::Object {
        return Err(kind_error(name, kind));
    }
    Ok(())
}

fn require_trait_kind(kind: Kind, name: &str) -> Result<(), QueryError> {
    if kind != Kind::Trait {
        return Err(kind_error(name, kind));
    }
    Ok(())
}

fn kind_error(what: &str, found: Kind) -> QueryError {
    QueryError::Validation {
        message: format!("{what} is not valid in a {found} query"),
        suggestions: Vec::new(),
    }
}

/// True if `pred` contains a `_` self-binding anywhere in its tree (rule 5):
/// a bare [`Predicate::SelfBindingMarker`], a navigation predicate whose
/// target is [`NavTarget::SelfBinding`], or one whose target is a
/// [`NavTarget::SubQuery`] that itself references `_` one or more levels
/// down (e.g. `descendant(object:milestone child(_))`).
fn contains_self_binding(pred: &Predicate) -> bool {
    match pred {
        Predicate::SelfBindingMarker => true,
        Predicate::Hierarchy { target, .. }
        | Predicate::Refs { target }
        | Predicate::Refd { target }
        | Predicate::On { target }
        | Predicate::Within { target }
        | Predicate::At { target } => target_contains_self_binding(target),
        Predicate::Has { sub_query } | Predicate::Encloses { sub_query } => {
            sub_query.predicate.as_ref().is_some_and(contains_self_binding)
        }
        Predicate::And(items) | Predicate::Or(items) => items.iter().any(contains_self_binding),
        Predicate::Not(inner) => contains_self_binding(inner),
        Predicate::Field { .. }
        | Predicate::Value { .. }
        | Predicate::Exists { .. }
        | Predicate::StringFn { .. }
        | Predicate::Quantifier { .. }
        | Predicate::Content { .. } => false,
    }
}

fn target_contains_self_binding(target: &NavTarget) -> bool {
    match target {
        NavTarget::SelfBinding => true,
        NavTarget::SubQuery(sub_query) => sub_query.predicate.as_ref().is_some_and(contains_self_binding),
        NavTarget::Ref(_) => false,
    }
}

fn validate_pipeline(pipeline: &Pipeline, schema: &Schema) -> Result<(), QueryError> {
    for stage in &pipeline.stages {
        if let PipelineStage::Assign(assignment) = stage {
            match &assignment.source {
                AggSource::Nav(_) => {
                    if assignment.field.is_some() {
                        return Err(QueryError::Validation {
                            message: format!("'{}' takes no field argument", assignment.agg),
                            suggestions: Vec::new(),
                        });
                    }
                }
                AggSource::SubQuery(sub_query) => {
                    validate_root(sub_query, schema)?;
                    if let Some(pred) = &sub_query.predicate {
                        validate_predicate(pred, sub_query.kind, &sub_query.type_name, schema, true)?;
                        if !contains_self_binding(pred) {
                            return Err(QueryError::Validation {
                                message: "pipeline assignment sub-query must reference '_'".to_string(),
                                suggestions: Vec::new(),
                            });
                        }
                    } else {
                        return Err(QueryError::Validation {
                            message: "pipeline assignment sub-query must reference '_'".to_string(),
                            suggestions: Vec::new(),
                        });
                    }
                    validate_aggregate_typing(assignment, sub_query, schema)?;
                }
            }
        }
    }
    Ok(())
}

fn validate_aggregate_typing(
    assignment: &crate::ast::Assignment,
    sub_query: &Query,
    schema: &Schema,
) -> Result<(), QueryError> {
    use crate::ast::Agg;

    match assignment.agg {
        Agg::Count => {
            if assignment.field.is_some() {
                return Err(QueryError::Validation {
                    message: "'count' takes no field argument".to_string(),
                    suggestions: Vec::new(),
                });
            }
            Ok(())
        }
        Agg::Min | Agg::Max | Agg::Sum => {
            let field = assignment.field.as_deref().ok_or_else(|| QueryError::Validation {
                message: format!("'{}' requires a field argument", assignment.agg),
                suggestions: Vec::new(),
            })?;
            match sub_query.kind {
                Kind::Trait => {
                    if field != "value" {
                        return Err(QueryError::Validation {
                            message: format!(
                                "'{}' on a trait sub-query must aggregate '.value', not '.{field}'",
                                assignment.agg
                            ),
                            suggestions: Vec::new(),
                        });
                    }
                    let trait_def = schema.trait_def(&sub_query.type_name).ok_or_else(|| {
                        QueryError::unknown_name(
                            "trait",
                            &sub_query.type_name,
                            &schema.trait_names(),
                            config().suggestion_limit(),
                        )
                    })?;
                    if !trait_def.is_valued() {
                        return Err(QueryError::Validation {
                            message: format!("trait '{}' is boolean and has no '.value'", sub_query.type_name),
                            suggestions: Vec::new(),
                        });
                    }
                    if matches!(assignment.agg, Agg::Sum) && !trait_def.is_numeric() {
                        return Err(QueryError::Validation {
                            message: format!("'sum' requires a numeric trait, '{}' is not", sub_query.type_name),
                            suggestions: Vec::new(),
                        });
                    }
                    Ok(())
                }
                Kind::Object => {
                    let field_type = require_field(&sub_query.type_name, field, schema)?;
                    if field_type.is_array() || field_type.is_ref() || matches!(field_type, FieldType::Bool) {
                        return Err(QueryError::Validation {
                            message: format!("'.{field}' is not a scalar field suitable for aggregation"),
                            suggestions: Vec::new(),
                        });
                    }
                    if matches!(assignment.agg, Agg::Sum) && !field_type.is_numeric() {
                        return Err(QueryError::Validation {
                            message: format!("'sum' requires a numeric field, '.{field}' is not"),
                            suggestions: Vec::new(),
                        });
                    }
                    if !matches!(assignment.agg, Agg::Sum) && !field_type.is_min_max_scalar() {
                        return Err(QueryError::Validation {
                            message: format!("'.{field}' is not orderable for 'min'/'max'"),
                            suggestions: Vec::new(),
                        });
                    }
                    Ok(())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::schema::{FieldType, Schema, TraitDef, TypeDef};

    fn test_schema() -> Schema {
        Schema::new()
            .with_type(
                TypeDef::new("project")
                    .with_field("status", FieldType::Enum(vec!["active".into(), "paused".into()]))
                    .with_field("scores", FieldType::Array(Box::new(FieldType::Number))),
            )
            .with_trait("todo", TraitDef::Boolean)
            .with_trait("priority", TraitDef::Valued(FieldType::Number))
    }

    #[test]
    fn unknown_type_is_rejected() {
        let schema = test_schema();
        let query = parse("object:nonexistent").unwrap();
        assert!(validate(&query, &schema).is_err());
    }

    #[test]
    fn unknown_field_is_rejected() {
        let schema = test_schema();
        let query = parse("object:project .bogus==1").unwrap();
        assert!(validate(&query, &schema).is_err());
    }

    #[test]
    fn value_predicate_rejected_on_object_query() {
        let schema = test_schema();
        let query = parse("object:project .value==1").unwrap();
        assert!(validate(&query, &schema).is_err());
    }

    #[test]
    fn on_predicate_rejected_outside_trait_query() {
        let schema = test_schema();
        let query = parse("object:project on([[projects/website]])").unwrap();
        assert!(validate(&query, &schema).is_err());
    }

    #[test]
    fn bare_self_binding_outside_pipeline_is_rejected() {
        let schema = test_schema();
        let query = parse("trait:priority within(_)").unwrap();
        assert!(validate(&query, &schema).is_err());
    }

    #[test]
    fn pipeline_assignment_without_self_binding_is_rejected() {
        let schema = test_schema();
        let query = parse("object:project |> n = count({trait:todo on(object:project)})").unwrap();
        assert!(validate(&query, &schema).is_err());
    }

    #[test]
    fn valid_pipeline_assignment_passes() {
        let schema = test_schema();
        let query = parse("object:project |> n = count({trait:todo within(_)})").unwrap();
        assert!(validate(&query, &schema).is_ok());
    }

    #[test]
    fn sum_on_boolean_trait_is_rejected() {
        let schema = test_schema();
        let query = parse("object:project |> n = sum(.value, {trait:todo within(_)})").unwrap();
        assert!(validate(&query, &schema).is_err());
    }
}
