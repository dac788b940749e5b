//! Scenario 2 — **Array membership, numeric coercion**: a field containing
//! `[10,2]` and one containing `["10"]` both match `.scores==10`.

use vaultql::prelude::*;

#[tokio::test]
async fn numeric_literal_matches_both_numeric_and_string_array_elements() {
    let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
    sqlx::query(
        r#"INSERT INTO objects (id, type, file_path, fields, parent_id, line_start, line_end) VALUES
           ('nums/a', 'nums', 'a.md', '{"scores":[10,2]}', NULL, 1, 1),
           ('nums/b', 'nums', 'a.md', '{"scores":["10"]}', NULL, 2, 2),
           ('nums/c', 'nums', 'a.md', '{"scores":[3]}', NULL, 3, 3)"#,
    )
    .execute(store.pool())
    .await
    .unwrap();

    let schema = Schema::new().with_type(
        TypeDef::new("nums").with_field("scores", FieldType::Array(Box::new(FieldType::Number))),
    );
    let engine = Engine::new(&schema, &store);
    let results = engine.query(r#"object:nums .scores==10"#).await.unwrap();

    match results {
        ResultSet::Objects(rows) => {
            let mut ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
            ids.sort();
            assert_eq!(ids, vec!["nums/a", "nums/b"]);
        }
        ResultSet::Traits(_) => panic!("expected an object result set"),
    }
}
