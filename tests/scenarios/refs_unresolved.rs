//! Scenario 4 — **Refs with unresolved fallback**: a ref row with
//! `target_id=NULL, target_raw="projects/website"` still matches
//! `refs([[projects/website]])`, via the `target_raw` fallback column.

use vaultql::prelude::*;

#[tokio::test]
async fn unresolved_ref_matches_via_target_raw_fallback() {
    let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
    sqlx::query(
        r#"INSERT INTO objects (id, type, file_path, fields, parent_id, line_start, line_end) VALUES
           ('projects/mobile', 'project', 'b.md', '{}', NULL, 1, 20)"#,
    )
    .execute(store.pool())
    .await
    .unwrap();
    sqlx::query(
        r#"INSERT INTO traits (id, parent_object_id, trait_type, value, content, file_path, line_number) VALUES
           ('trait8', 'projects/mobile', 'todo', NULL, 'ping [[projects/website]]', 'b.md', 9)"#,
    )
    .execute(store.pool())
    .await
    .unwrap();
    sqlx::query(
        r#"INSERT INTO refs (source_id, target_id, target_raw, file_path, line_number) VALUES
           ('trait8', NULL, 'projects/website', 'b.md', 9)"#,
    )
    .execute(store.pool())
    .await
    .unwrap();

    let schema = Schema::new().with_trait("todo", TraitDef::Boolean).with_type(TypeDef::new("project"));
    let engine = Engine::new(&schema, &store);
    let results = engine.query("trait:todo refs([[projects/website]])").await.unwrap();

    match results {
        ResultSet::Traits(rows) => {
            assert!(rows.iter().any(|r| r.id == "trait8"));
        }
        ResultSet::Objects(_) => panic!("expected a trait result set"),
    }
}
