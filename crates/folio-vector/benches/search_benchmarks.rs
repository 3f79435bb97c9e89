//! Benchmarks for semantic index search.
//!
//! Compares plain k-nearest-neighbour search against diversity (MMR)
//! search over the same index. The default index holds 1,000 fragments;
//! set `BENCH_FULL_SCALE=1` to use 20,000.
//!
//! ```bash
//! BENCH_FULL_SCALE=1 cargo bench -p folio-vector
//! ```

use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};

use folio_vector::embedding::{EmbeddingService, MockEmbedding, SharedEmbedder};
use folio_vector::index::{SearchOptions, SemanticIndex};

const CI_FRAGMENT_COUNT: usize = 1_000;
const FULL_SCALE_FRAGMENT_COUNT: usize = 20_000;

/// A realistic document paragraph, made unique by a trailing index.
fn generate_fragment(index: usize) -> String {
    format!(
        "Section {} of the employee handbook. Requests for paid leave must be \
         submitted to a line manager at least two weeks in advance. Remote work \
         is permitted up to three days per week subject to team agreement. \
         Expense claims require itemised receipts and are reimbursed within \
         thirty days of approval. Security training is mandatory for all staff \
         and must be renewed annually.",
        index
    )
}

fn fragment_count() -> usize {
    if std::env::var("BENCH_FULL_SCALE").is_ok() {
        FULL_SCALE_FRAGMENT_COUNT
    } else {
        CI_FRAGMENT_COUNT
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build tokio runtime")
}

fn build_index(rt: &tokio::runtime::Runtime, count: usize) -> SemanticIndex {
    let embedder: SharedEmbedder = Arc::new(MockEmbedding::new());
    let fragments = (0..count).map(generate_fragment).collect();
    let index = rt
        .block_on(SemanticIndex::build(fragments, embedder))
        .expect("index build failed");
    assert_eq!(index.len(), count);
    index
}

fn bench_search(c: &mut Criterion) {
    let rt = runtime();
    let count = fragment_count();
    let index = build_index(&rt, count);
    let query_vec = rt
        .block_on(MockEmbedding::new().embed("how many days of remote work"))
        .expect("query embed failed");

    let mut group = c.benchmark_group("semantic_index");
    group.sample_size(50);
    group.measurement_time(Duration::from_secs(10));

    group.bench_function(format!("similarity_top6_{}fragments", count), |b| {
        b.iter(|| {
            let hits = index.search_vector(&query_vec, SearchOptions::similarity(6));
            assert_eq!(hits.len(), 6);
            hits
        });
    });

    group.bench_function(format!("mmr_top6_fetch8_{}fragments", count), |b| {
        b.iter(|| {
            let hits = index.search_vector(&query_vec, SearchOptions::mmr(6, 8));
            assert_eq!(hits.len(), 6);
            hits
        });
    });

    group.bench_function(format!("mmr_top6_fetch50_{}fragments", count), |b| {
        b.iter(|| index.search_vector(&query_vec, SearchOptions::mmr(6, 50)));
    });

    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let rt = runtime();
    let left = build_index(&rt, CI_FRAGMENT_COUNT);
    let right = build_index(&rt, CI_FRAGMENT_COUNT / 4);

    c.bench_function("merge_1000_plus_250", |b| {
        b.iter(|| left.merge(&right).expect("merge failed"));
    });
}

criterion_group!(benches, bench_search, bench_merge);
criterion_main!(benches);
