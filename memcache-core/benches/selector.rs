#[macro_use]
extern crate criterion;
extern crate memcache_core;

use criterion::black_box;
use criterion::Criterion;
use memcache_core::selector::{Selector, WeightedServer};

fn servers(n: usize) -> Vec<WeightedServer> {
    (0..n)
        .map(|i| WeightedServer {
            canonical_address: format!("10.0.0.{}:11211", i % 256),
            weight: 1.0,
        })
        .collect()
}

fn bench_weighted_select(c: &mut Criterion) {
    let sel = Selector::weighted(&servers(20), "bench:").unwrap();
    c.bench_function("weighted select", |b| {
        let mut i: u64 = 0;
        b.iter(|| {
            i = i.wrapping_add(1);
            black_box(sel.select(&i.to_be_bytes()))
        })
    });
}

fn bench_ketama_select(c: &mut Criterion) {
    let sel = Selector::ketama(&servers(20), 160, "bench:").unwrap();
    c.bench_function("ketama select", |b| {
        let mut i: u64 = 0;
        b.iter(|| {
            i = i.wrapping_add(1);
            black_box(sel.select(&i.to_be_bytes()))
        })
    });
}

fn bench_ketama_construction(c: &mut Criterion) {
    let pool = servers(50);
    c.bench_function("ketama construction (50 servers, 160 pts)", |b| {
        b.iter(|| black_box(Selector::ketama(&pool, 160, "bench:").unwrap()))
    });
}

criterion_group!(benches, bench_weighted_select, bench_ketama_select, bench_ketama_construction);
criterion_main!(benches);
