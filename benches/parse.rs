// SPDX-License-Identifier: Apache-2.0

//! Benchmarks parsing query strings across the grammar's main shapes.
//!

use criterion::{criterion_group, criterion_main, Criterion};
use std::error::Error;
use vaultql::parse;

const SAMPLES: [&str; 8] = [
    "object:project .status==active",
    "object:project .a==1 .b==2 | .c==3",
    "object:project !.status==active !.owner==bob",
    "object:date descendant(object:meeting has(trait:due))",
    "trait:todo refs([[projects/website]])",
    "trait:due at(trait:priority)",
    r#"object:project any(.scores, _>1)"#,
    "object:project |> todos = count({trait:todo within(_)}) filter(todos>0) sort(todos, desc) limit(10)",
];

fn do_parse() -> Result<(), Box<dyn Error>> {
    let mut count = 0;
    for src in SAMPLES {
        let _ = parse(src)?;
        count += 1;
    }
    assert_eq!(count, SAMPLES.len());
    Ok(())
}

fn parse_grammar_samples(c: &mut Criterion) {
    c.bench_function("parse grammar samples", |b| b.iter(|| do_parse()));
}

criterion_group!(benchmarks, parse_grammar_samples);
criterion_main!(benchmarks);
