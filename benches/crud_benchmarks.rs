use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::collections::BTreeMap;

use llrb_tree::OSLlrbMap;

const N: usize = 10_000;

// ─── Helper functions to generate key sequences ─────────────────────────────

fn ordered_keys(n: usize) -> Vec<i64> {
    (0..n as i64).collect()
}

fn reverse_ordered_keys(n: usize) -> Vec<i64> {
    (0..n as i64).rev().collect()
}

fn random_keys(n: usize) -> Vec<i64> {
    // Use a simple LCG for deterministic pseudo-random sequence
    let mut keys = Vec::with_capacity(n);
    let mut x: u64 = 12345;
    for _ in 0..n {
        x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
        keys.push((x >> 33) as i64);
    }
    keys
}

fn populated_maps(keys: &[i64]) -> (OSLlrbMap<i64, i64>, BTreeMap<i64, i64>) {
    let llrb = keys.iter().map(|&k| (k, k)).collect();
    let btree = keys.iter().map(|&k| (k, k)).collect();
    (llrb, btree)
}

// ─── Insert benchmarks ──────────────────────────────────────────────────────

fn bench_insert(c: &mut Criterion, group_name: &str, keys: &[i64]) {
    let mut group = c.benchmark_group(group_name);

    group.bench_function(BenchmarkId::new("OSLlrbMap", N), |b| {
        b.iter(|| {
            let mut map = OSLlrbMap::new();
            for &key in keys {
                map.insert(key, key);
            }
            map
        });
    });

    group.bench_function(BenchmarkId::new("BTreeMap", N), |b| {
        b.iter(|| {
            let mut map = BTreeMap::new();
            for &key in keys {
                map.insert(key, key);
            }
            map
        });
    });

    group.finish();
}

fn bench_insert_ordered(c: &mut Criterion) {
    bench_insert(c, "insert_ordered", &ordered_keys(N));
}

fn bench_insert_reverse(c: &mut Criterion) {
    bench_insert(c, "insert_reverse", &reverse_ordered_keys(N));
}

fn bench_insert_random(c: &mut Criterion) {
    bench_insert(c, "insert_random", &random_keys(N));
}

// ─── Lookup benchmarks ──────────────────────────────────────────────────────

fn bench_get_random(c: &mut Criterion) {
    let keys = random_keys(N);
    let (llrb, btree) = populated_maps(&keys);
    let mut group = c.benchmark_group("get_random");

    group.bench_function(BenchmarkId::new("OSLlrbMap", N), |b| {
        b.iter(|| {
            let mut hits = 0usize;
            for key in &keys {
                if llrb.get(key).is_some() {
                    hits += 1;
                }
            }
            hits
        });
    });

    group.bench_function(BenchmarkId::new("BTreeMap", N), |b| {
        b.iter(|| {
            let mut hits = 0usize;
            for key in &keys {
                if btree.get(key).is_some() {
                    hits += 1;
                }
            }
            hits
        });
    });

    group.finish();
}

// ─── Removal benchmarks ─────────────────────────────────────────────────────

fn bench_remove_random(c: &mut Criterion) {
    let keys = random_keys(N);
    let (llrb, btree) = populated_maps(&keys);
    let mut group = c.benchmark_group("remove_random");

    group.bench_function(BenchmarkId::new("OSLlrbMap", N), |b| {
        b.iter_batched(
            || llrb.clone(),
            |mut map| {
                for key in &keys {
                    map.remove(key);
                }
                map
            },
            criterion::BatchSize::LargeInput,
        );
    });

    group.bench_function(BenchmarkId::new("BTreeMap", N), |b| {
        b.iter_batched(
            || btree.clone(),
            |mut map| {
                for key in &keys {
                    map.remove(key);
                }
                map
            },
            criterion::BatchSize::LargeInput,
        );
    });

    group.finish();
}

// ─── Order-statistic benchmarks ─────────────────────────────────────────────
//
// BTreeMap has no rank operations; the closest equivalent is a linear scan
// with `iter().nth()`, benchmarked here as the baseline the subtree-size
// augmentation is buying us out of.

fn bench_select_by_rank(c: &mut Criterion) {
    let keys = random_keys(N);
    let (llrb, btree) = populated_maps(&keys);
    let len = llrb.len();
    let mut group = c.benchmark_group("select_by_rank");

    group.bench_function(BenchmarkId::new("OSLlrbMap", N), |b| {
        b.iter(|| {
            let mut acc = 0i64;
            for rank in (0..len).step_by(97) {
                let (key, _) = llrb.get_by_rank(rank).unwrap();
                acc = acc.wrapping_add(*key);
            }
            acc
        });
    });

    group.bench_function(BenchmarkId::new("BTreeMap::iter::nth", N), |b| {
        b.iter(|| {
            let mut acc = 0i64;
            for rank in (0..len).step_by(97) {
                let (key, _) = btree.iter().nth(rank).unwrap();
                acc = acc.wrapping_add(*key);
            }
            acc
        });
    });

    group.finish();
}

fn bench_rank_of(c: &mut Criterion) {
    let keys = random_keys(N);
    let (llrb, _) = populated_maps(&keys);
    let mut group = c.benchmark_group("rank_of");

    group.bench_function(BenchmarkId::new("OSLlrbMap", N), |b| {
        b.iter(|| {
            let mut acc = 0usize;
            for key in &keys {
                acc = acc.wrapping_add(llrb.rank_of(key));
            }
            acc
        });
    });

    group.finish();
}

fn bench_range_by_rank(c: &mut Criterion) {
    let keys = random_keys(N);
    let (llrb, _) = populated_maps(&keys);
    let len = llrb.len();
    let mut group = c.benchmark_group("range_by_rank");

    group.bench_function(BenchmarkId::new("OSLlrbMap", N), |b| {
        b.iter(|| {
            let mid = len / 2;
            llrb.range_by_rank(mid.saturating_sub(50), (mid + 50).min(len - 1)).len()
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_insert_ordered,
    bench_insert_reverse,
    bench_insert_random,
    bench_get_random,
    bench_remove_random,
    bench_select_by_rank,
    bench_rank_of,
    bench_range_by_rank,
);
criterion_main!(benches);
