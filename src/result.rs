// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! Result-set shapes (§6): the final projection handed back to a caller,
//! combining a matched [`ObjectRow`]/[`TraitRow`] with whatever computed
//! columns the pipeline attached to its id.

use crate::pipeline::Row as PipelineRow;
use crate::store::{ObjectRow, TraitRow};
use crate::value::Value;
use serde::Serialize;
use std::collections::BTreeMap;

/// One row of an object query's result set (§6 "For object queries").
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectResult {
    /// Object id.
    pub id: String,
    /// Declared type name.
    #[serde(rename = "type")]
    pub object_type: String,
    /// Source file the object was ingested from.
    pub file_path: String,
    /// Declared fields, as a JSON object.
    pub fields: serde_json::Value,
    /// First line of the object's span.
    pub line_start: i64,
    /// Last line of the object's span.
    pub line_end: i64,
    /// Immediate parent id, if nested.
    pub parent_id: Option<String>,
    /// Pipeline-computed columns, by assignment name, in assignment order.
    pub computed: BTreeMap<String, Value>,
}

/// One row of a trait query's result set (§6 "For trait queries").
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraitResult {
    /// Trait row id.
    pub id: String,
    /// Trait type name.
    pub trait_type: String,
    /// Carried value; `None` for boolean traits.
    pub value: Option<String>,
    /// The literal line text the trait was parsed from.
    pub content: String,
    /// The object this trait is anchored to.
    pub parent_object_id: String,
    /// Source file.
    pub file_path: String,
    /// 1-based line number within `file_path`.
    pub line_number: i64,
    /// Pipeline-computed columns, by assignment name, in assignment order.
    pub computed: BTreeMap<String, Value>,
}

fn computed_map(row: &PipelineRow) -> BTreeMap<String, Value> {
    row.computed.iter().cloned().collect()
}

/// Join a pipeline's output rows back onto full object rows, preserving the
/// pipeline's row order (it may already be sorted/limited).
pub fn objects_from_pipeline(objects: &[ObjectRow], pipeline_rows: &[PipelineRow]) -> Vec<ObjectResult> {
    let by_id: std::collections::HashMap<&str, &ObjectRow> = objects.iter().map(|o| (o.id.as_str(), o)).collect();
    pipeline_rows
        .iter()
        .filter_map(|row| {
            let obj = by_id.get(row.id.as_str())?;
            Some(ObjectResult {
                id: obj.id.clone(),
                object_type: obj.object_type.clone(),
                file_path: obj.file_path.clone(),
                fields: obj.fields.clone(),
                line_start: obj.line_start,
                line_end: obj.line_end,
                parent_id: obj.parent_id.clone(),
                computed: computed_map(row),
            })
        })
        .collect()
}

/// Join a pipeline's output rows back onto full trait rows, preserving the
/// pipeline's row order.
pub fn traits_from_pipeline(traits: &[TraitRow], pipeline_rows: &[PipelineRow]) -> Vec<TraitResult> {
    let by_id: std::collections::HashMap<&str, &TraitRow> = traits.iter().map(|t| (t.id.as_str(), t)).collect();
    pipeline_rows
        .iter()
        .filter_map(|row| {
            let t = by_id.get(row.id.as_str())?;
            Some(TraitResult {
                id: t.id.clone(),
                trait_type: t.trait_type.clone(),
                value: t.value.clone(),
                content: t.content.clone(),
                parent_object_id: t.parent_object_id.clone(),
                file_path: t.file_path.clone(),
                line_number: t.line_number,
                computed: computed_map(row),
            })
        })
        .collect()
}

/// A type-erased result set: object rows or trait rows, matching whichever
/// `kind` the query named.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultSet {
    /// An object query's result rows.
    Objects(Vec<ObjectResult>),
    /// A trait query's result rows.
    Traits(Vec<TraitResult>),
}

impl ResultSet {
    /// Number of rows in the result set.
    pub fn len(&self) -> usize {
        match self {
            ResultSet::Objects(rows) => rows.len(),
            ResultSet::Traits(rows) => rows.len(),
        }
    }

    /// True when the result set has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object_row(id: &str) -> ObjectRow {
        ObjectRow {
            id: id.to_string(),
            object_type: "project".into(),
            file_path: "a.md".into(),
            fields: serde_json::json!({"status": "active"}),
            parent_id: None,
            line_start: 1,
            line_end: 1,
        }
    }

    #[test]
    fn object_join_preserves_pipeline_order_and_attaches_computed() {
        let objects = vec![object_row("projects/a"), object_row("projects/b")];
        let pipeline_rows = vec![
            PipelineRow { id: "projects/b".into(), computed: vec![("todos".into(), Value::Num(3.0))] },
            PipelineRow { id: "projects/a".into(), computed: vec![("todos".into(), Value::Num(1.0))] },
        ];
        let results = objects_from_pipeline(&objects, &pipeline_rows);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "projects/b");
        assert_eq!(results[0].computed.get("todos"), Some(&Value::Num(3.0)));
        assert_eq!(results[1].id, "projects/a");
    }

    #[test]
    fn missing_ids_are_skipped_not_errored() {
        let objects = vec![object_row("projects/a")];
        let pipeline_rows = vec![PipelineRow { id: "projects/ghost".into(), computed: Vec::new() }];
        let results = objects_from_pipeline(&objects, &pipeline_rows);
        assert!(results.is_empty());
    }
}
