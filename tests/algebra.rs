// SPDX-License-Identifier: Apache-2.0

//! Algebraic laws from the testable-properties list: NOT complement, De
//! Morgan, and idempotent AND/OR — checked against one small fixture.

use vaultql::prelude::*;

async fn fixture() -> (Schema, SqliteStore) {
    let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
    sqlx::query(
        r#"INSERT INTO objects (id, type, file_path, fields, parent_id, line_start, line_end) VALUES
           ('projects/a', 'project', 'a.md', '{"status":"active","owner":"bob"}', NULL, 1, 1),
           ('projects/b', 'project', 'a.md', '{"status":"paused","owner":"bob"}', NULL, 2, 2),
           ('projects/c', 'project', 'a.md', '{"status":"active","owner":"amy"}', NULL, 3, 3)"#,
    )
    .execute(store.pool())
    .await
    .unwrap();
    let schema = Schema::new().with_type(
        TypeDef::new("project")
            .with_field("status", FieldType::String)
            .with_field("owner", FieldType::String),
    );
    (schema, store)
}

fn ids(results: ResultSet) -> Vec<String> {
    match results {
        ResultSet::Objects(rows) => rows.into_iter().map(|r| r.id).collect(),
        ResultSet::Traits(_) => panic!("expected an object result set"),
    }
}

#[tokio::test]
async fn not_complement_covers_the_root_type_universe() {
    let (schema, store) = fixture().await;
    let engine = Engine::new(&schema, &store);

    let matched = ids(engine.query(r#"object:project .status==active"#).await.unwrap());
    let complement = ids(engine.query(r#"object:project !.status==active"#).await.unwrap());
    let all = ids(engine.query("object:project").await.unwrap());

    assert_eq!(matched.len() + complement.len(), all.len());
    let mut combined: Vec<String> = matched.into_iter().chain(complement).collect();
    combined.sort();
    let mut expected = all;
    expected.sort();
    assert_eq!(combined, expected);
}

#[tokio::test]
async fn de_morgan_holds_for_or_of_field_predicates() {
    let (schema, store) = fixture().await;
    let engine = Engine::new(&schema, &store);

    let mut lhs = ids(engine.query(r#"object:project !(.status==active | .owner==bob)"#).await.unwrap());
    let mut rhs = ids(engine.query(r#"object:project !.status==active !.owner==bob"#).await.unwrap());
    lhs.sort();
    rhs.sort();
    assert_eq!(lhs, rhs);
}

#[tokio::test]
async fn and_and_or_are_idempotent() {
    let (schema, store) = fixture().await;
    let engine = Engine::new(&schema, &store);

    let mut single = ids(engine.query(r#"object:project .status==active"#).await.unwrap());
    let mut anded = ids(engine.query(r#"object:project .status==active .status==active"#).await.unwrap());
    let mut ored = ids(engine.query(r#"object:project .status==active | .status==active"#).await.unwrap());
    single.sort();
    anded.sort();
    ored.sort();
    assert_eq!(single, anded);
    assert_eq!(single, ored);
}
