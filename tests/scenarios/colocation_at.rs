//! Scenario 5 — **Co-location `at`**: two traits sharing a line only match
//! each other when `at(trait:priority)` actually finds a co-located
//! `priority` trait.

use vaultql::prelude::*;

#[tokio::test]
async fn at_matches_only_traits_sharing_a_line() {
    let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
    sqlx::query(
        r#"INSERT INTO objects (id, type, file_path, fields, parent_id, line_start, line_end) VALUES
           ('projects/website', 'project', 'a.md', '{}', NULL, 1, 20)"#,
    )
    .execute(store.pool())
    .await
    .unwrap();
    sqlx::query(
        r#"INSERT INTO traits (id, parent_object_id, trait_type, value, content, file_path, line_number) VALUES
           ('due1', 'projects/website', 'due', NULL, '#due #priority(high)', 'a.md', 5),
           ('priority1', 'projects/website', 'priority', 'high', '#due #priority(high)', 'a.md', 5),
           ('due2', 'projects/website', 'due', NULL, '#due', 'a.md', 8)"#,
    )
    .execute(store.pool())
    .await
    .unwrap();

    let schema = Schema::new()
        .with_trait("due", TraitDef::Boolean)
        .with_trait("priority", TraitDef::Valued(FieldType::String))
        .with_type(TypeDef::new("project"));
    let engine = Engine::new(&schema, &store);
    let results = engine.query("trait:due at(trait:priority)").await.unwrap();

    match results {
        ResultSet::Traits(rows) => {
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].id, "due1");
        }
        ResultSet::Objects(_) => panic!("expected a trait result set"),
    }
}
