//! Scenario 1 — **Type + field**: `object:project .status==active` matches
//! only the active project.

use vaultql::prelude::*;

#[tokio::test]
async fn field_predicate_selects_matching_type() {
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
    let results = engine.query(r#"object:project .status==active"#).await.unwrap();

    match results {
        ResultSet::Objects(rows) => {
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].id, "projects/website");
        }
        ResultSet::Traits(_) => panic!("expected an object result set"),
    }
}
