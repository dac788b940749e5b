//! Scenario 3 — **Descendant + has**: a `date` object has two child
//! `meeting` objects; one carries a `due` trait. The date itself — not the
//! meetings — is what `descendant(object:meeting has(trait:due))` returns.

use vaultql::prelude::*;

#[tokio::test]
async fn descendant_has_returns_the_ancestor_not_the_descendant() {
    let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
    sqlx::query(
        r#"INSERT INTO objects (id, type, file_path, fields, parent_id, line_start, line_end) VALUES
           ('dates/standup', 'date', 'a.md', '{}', NULL, 1, 10),
           ('dates/standup#m1', 'meeting', 'a.md', '{}', 'dates/standup', 2, 4),
           ('dates/standup#m2', 'meeting', 'a.md', '{}', 'dates/standup', 5, 7)"#,
    )
    .execute(store.pool())
    .await
    .unwrap();
    sqlx::query(
        r#"INSERT INTO traits (id, parent_object_id, trait_type, value, content, file_path, line_number) VALUES
           ('t1', 'dates/standup#m1', 'due', NULL, '#due', 'a.md', 3)"#,
    )
    .execute(store.pool())
    .await
    .unwrap();

    let schema = Schema::new()
        .with_type(TypeDef::new("date"))
        .with_type(TypeDef::new("meeting"))
        .with_trait("due", TraitDef::Boolean);
    let engine = Engine::new(&schema, &store);
    let results = engine.query("object:date descendant(object:meeting has(trait:due))").await.unwrap();

    match results {
        ResultSet::Objects(rows) => {
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].id, "dates/standup");
        }
        ResultSet::Traits(_) => panic!("expected an object result set"),
    }
}
