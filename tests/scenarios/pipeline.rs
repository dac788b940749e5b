//! Scenario 6 — **Pipeline**: projects ordered by descending todo count,
//! with that count attached, limited to the top results.

use vaultql::prelude::*;

#[tokio::test]
async fn pipeline_attaches_counts_sorts_filters_and_limits() {
    let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
    sqlx::query(
        r#"INSERT INTO objects (id, type, file_path, fields, parent_id, line_start, line_end) VALUES
           ('projects/a', 'project', 'a.md', '{}', NULL, 1, 1),
           ('projects/b', 'project', 'b.md', '{}', NULL, 1, 1),
           ('projects/c', 'project', 'c.md', '{}', NULL, 1, 1)"#,
    )
    .execute(store.pool())
    .await
    .unwrap();
    sqlx::query(
        r#"INSERT INTO traits (id, parent_object_id, trait_type, value, content, file_path, line_number) VALUES
           ('t1', 'projects/a', 'todo', NULL, '#todo', 'a.md', 1),
           ('t2', 'projects/a', 'todo', NULL, '#todo', 'a.md', 2),
           ('t3', 'projects/b', 'todo', NULL, '#todo', 'b.md', 1)"#,
    )
    .execute(store.pool())
    .await
    .unwrap();

    let schema = Schema::new().with_type(TypeDef::new("project")).with_trait("todo", TraitDef::Boolean);
    let engine = Engine::new(&schema, &store);
    let results = engine
        .query("object:project |> todos = count({trait:todo within(_)}) filter(todos>0) sort(todos, desc) limit(10)")
        .await
        .unwrap();

    match results {
        ResultSet::Objects(rows) => {
            assert!(rows.len() <= 10);
            assert!(!rows.is_empty());
            assert_eq!(rows[0].id, "projects/a");
            assert_eq!(rows[0].computed.get("todos"), Some(&Value::Num(2.0)));
            for row in &rows {
                assert!(row.computed.get("todos").and_then(|v| v.as_numeric()).unwrap_or(0.0) > 0.0);
            }
        }
        ResultSet::Traits(_) => panic!("expected an object result set"),
    }
}
