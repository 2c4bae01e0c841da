//! Cost of handing out prepared statement handles.
//!
//! Every query execution takes a fresh copy of a cached handle so bindings
//! never leak between concurrent executions. This measures that copy against
//! the compiled form size, and a full cache hit including the key lookup.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use std::time::Duration;

use tabledoc_core::cache::PreparedQueryCache;
use tabledoc_core::store::PreparedStatement;
use tabledoc_core::types::FieldValue;

const STATEMENT: &str = "DECLARE $p_lastName STRING; \
                         SELECT * FROM people t WHERE t.kv_json_.lastName = $p_lastName";

fn statement(compiled_len: usize) -> PreparedStatement {
    PreparedStatement::new(STATEMENT, vec![7u8; compiled_len])
}

fn bench_fresh_copy(c: &mut Criterion) {
    let mut group = c.benchmark_group("fresh_copy");
    for compiled_len in [64usize, 4 * 1024, 256 * 1024] {
        let mut original = statement(compiled_len);
        original.set_variable("$p_lastName", FieldValue::from("Smith"));
        group.bench_with_input(
            BenchmarkId::from_parameter(compiled_len),
            &original,
            |b, original| b.iter(|| black_box(original.fresh_copy())),
        );
    }
    group.finish();
}

fn bench_cache_hit(c: &mut Criterion) {
    let cache = PreparedQueryCache::new(1000, Duration::from_secs(600));
    cache
        .get_or_prepare(STATEMENT, |text| Ok(PreparedStatement::new(text, vec![7u8; 4096])))
        .unwrap();

    c.bench_function("cache_hit_and_bind", |b| {
        b.iter(|| {
            let mut handle = cache
                .get_or_prepare(black_box(STATEMENT), |_| unreachable!("statement is cached"))
                .unwrap();
            handle.set_variable("$p_lastName", FieldValue::from("Smith"));
            black_box(handle)
        })
    });
}

criterion_group!(benches, bench_fresh_copy, bench_cache_hit);
criterion_main!(benches);
