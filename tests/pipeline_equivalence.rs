// SPDX-License-Identifier: Apache-2.0

//! **Batched = N+1**: a bare nav-function aggregate and its equivalent
//! bare self-bound sub-query aggregate must produce identical `{id →
//! value}` maps, per the testable-properties list.

use vaultql::prelude::*;

#[tokio::test]
async fn nav_aggregate_matches_its_subquery_equivalent() {
    let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
    sqlx::query(
        r#"INSERT INTO objects (id, type, file_path, fields, parent_id, line_start, line_end) VALUES
           ('projects/a', 'project', 'a.md', '{}', NULL, 1, 1),
           ('projects/b', 'project', 'b.md', '{}', NULL, 1, 1)"#,
    )
    .execute(store.pool())
    .await
    .unwrap();
    sqlx::query(
        r#"INSERT INTO refs (source_id, target_id, target_raw, file_path, line_number) VALUES
           ('projects/a', 'projects/b', 'projects/b', 'a.md', 1),
           ('projects/a', 'projects/b', 'projects/b', 'a.md', 2)"#,
    )
    .execute(store.pool())
    .await
    .unwrap();

    let schema = Schema::new().with_type(TypeDef::new("project"));
    let engine = Engine::new(&schema, &store);

    let batched = engine.query("object:project |> n = count(refs(_))").await.unwrap();
    let via_subquery = engine.query("object:project |> n = count({object:project refs(_)})").await.unwrap();

    let as_map = |results: ResultSet| match results {
        ResultSet::Objects(rows) => rows
            .into_iter()
            .map(|r| (r.id, r.computed.get("n").and_then(|v| v.as_numeric()).unwrap_or(-1.0)))
            .collect::<std::collections::BTreeMap<_, _>>(),
        ResultSet::Traits(_) => panic!("expected an object result set"),
    };

    assert_eq!(as_map(batched), as_map(via_subquery));
}
