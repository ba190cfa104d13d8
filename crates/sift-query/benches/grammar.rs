use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use sift_query::{Operator, QueryState, SortDirection, compile_select};

// ── Helpers ────────────────────────────────────────────────────

fn and_chain(n: usize) -> QueryState {
    let mut q = QueryState::new();
    q.index("posts");
    for i in 0..n {
        q.where_term(format!("field_{i}"), i);
    }
    q
}

/// Mixed AND/OR groups with negation, ranges, `in` lists and nested paths.
fn mixed() -> QueryState {
    let mut q = QueryState::new();
    q.index("posts")
        .select(["title", "author", "created_at"])
        .where_match("title", "rust")
        .where_range("views", Operator::Gte, 100)
        .where_op("status", Operator::Ne, "draft")
        .or_where_in("tag", ["systems", "compilers", "databases"])
        .where_term("comments@author", "alice")
        .or_where_between("created_at", ["2024-01-01", "2024-12-31"])
        .order_by("created_at", SortDirection::Desc)
        .agg_by("views", "avg")
        .limit(50)
        .offset(100);
    q
}

// ── Benchmarks ─────────────────────────────────────────────────

fn bench_compile_and_chain(c: &mut Criterion) {
    c.bench_function("compile/and_chain_16", |b| {
        b.iter_batched(
            || and_chain(16),
            |q| compile_select(&q).unwrap(),
            BatchSize::SmallInput,
        );
    });
}

fn bench_compile_mixed(c: &mut Criterion) {
    c.bench_function("compile/mixed", |b| {
        b.iter_batched(mixed, |q| compile_select(&q).unwrap(), BatchSize::SmallInput);
    });
}

fn bench_build_and_compile_mixed(c: &mut Criterion) {
    c.bench_function("build_compile/mixed", |b| {
        b.iter(|| compile_select(&mixed()).unwrap());
    });
}

criterion_group!(
    benches,
    bench_compile_and_chain,
    bench_compile_mixed,
    bench_build_and_compile_mixed
);
criterion_main!(benches);
