// SPDX-License-Identifier: Apache-2.0

//! Benchmarks query evaluation against an in-memory SQLite store, covering
//! a plain field predicate, a hierarchy navigation, and a pipelined
//! aggregate.
//!

use criterion::{criterion_group, criterion_main, Criterion};
use tokio::runtime::{Builder, Runtime};
use vaultql::prelude::*;

fn async_runtime() -> Runtime {
    Builder::new_current_thread().enable_time().enable_io().build().unwrap()
}

async fn seeded_store() -> SqliteStore {
    let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
    let mut fields = Vec::new();
    let mut refs = Vec::new();
    for i in 0..200 {
        let status = if i % 3 == 0 { "active" } else { "paused" };
        fields.push(format!("('projects/p{i}', 'project', 'a.md', '{{\"status\":\"{status}\"}}', NULL, {i}, {i})"));
        if i > 0 {
            refs.push(format!("('projects/p{i}', 'projects/p0', 'projects/p0', 'a.md', {i})"));
        }
    }
    sqlx::query(sqlx::AssertSqlSafe(format!(
        "INSERT INTO objects (id, type, file_path, fields, parent_id, line_start, line_end) VALUES {}",
        fields.join(", ")
    )))
    .execute(store.pool())
    .await
    .unwrap();
    sqlx::query(sqlx::AssertSqlSafe(format!(
        "INSERT INTO refs (source_id, target_id, target_raw, file_path, line_number) VALUES {}",
        refs.join(", ")
    )))
    .execute(store.pool())
    .await
    .unwrap();
    store
}

fn schema() -> Schema {
    Schema::new().with_type(TypeDef::new("project").with_field("status", FieldType::String))
}

async fn field_predicate(store: &SqliteStore, schema: &Schema) {
    let engine = Engine::new(schema, store);
    let _ = engine.query(r#"object:project .status==active"#).await.unwrap();
}

async fn pipelined_aggregate(store: &SqliteStore, schema: &Schema) {
    let engine = Engine::new(schema, store);
    let _ = engine
        .query("object:project |> n = count(refd(_)) filter(n>0) sort(n, desc) limit(10)")
        .await
        .unwrap();
}

fn bench_field_predicate(c: &mut Criterion) {
    let rt = async_runtime();
    let store = rt.block_on(seeded_store());
    let schema = schema();
    c.bench_function("field predicate over 200 objects", |b| {
        b.to_async(&rt).iter(|| field_predicate(&store, &schema));
    });
}

fn bench_pipelined_aggregate(c: &mut Criterion) {
    let rt = async_runtime();
    let store = rt.block_on(seeded_store());
    let schema = schema();
    c.bench_function("batched refd() count + sort + limit", |b| {
        b.to_async(&rt).iter(|| pipelined_aggregate(&store, &schema));
    });
}

criterion_group!(benchmarks, bench_field_predicate, bench_pipelined_aggregate);
criterion_main!(benchmarks);
