//! Timeline resolution and replay benchmarks.

use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use causeway_core::{Change, Cid, Version};
use causeway_resolve::{project, FoldFn, ReplayEvent, Timeline};
use causeway_testkit::{multi_party_fixtures, summaries};

// =============================================================================
// Test Data Generation
// =============================================================================

/// A braided history: change `i` depends on `i - 1` and `i - 3`, authors
/// rotate, so the graph has many merges.
fn braided_history(len: usize) -> Vec<Change> {
    let parties = multi_party_fixtures(3);
    let mut changes: Vec<Change> = Vec::with_capacity(len);
    for i in 0..len {
        let mut deps: Vec<Cid> = Vec::new();
        if i >= 1 {
            deps.push(changes[i - 1].cid());
        }
        if i >= 3 {
            deps.push(changes[i - 3].cid());
        }
        let party = &parties[i % parties.len()];
        changes.push(party.change(i as u64 + 1, &deps, &(i as u64).to_be_bytes()));
    }
    changes
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("timeline_resolve");

    for size in [100usize, 1_000, 5_000] {
        let history = braided_history(size);
        let resource = history[0].resource.clone();
        let input = summaries(&history);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &input, |b, input| {
            b.iter(|| black_box(Timeline::resolve(resource.clone(), input.clone())));
        });
    }

    group.finish();
}

fn bench_project(c: &mut Criterion) {
    let mut group = c.benchmark_group("project");
    let sum = FoldFn::new(|acc: u64, event: &ReplayEvent<'_>| {
        Ok(acc.wrapping_add(event.payload.len() as u64))
    });

    for size in [100usize, 1_000, 5_000] {
        let history = braided_history(size);
        let head = Version::new(history.last().map(Change::cid));
        let closure: HashMap<Cid, Change> = history.into_iter().map(|c| (c.cid(), c)).collect();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &closure, |b, closure| {
            b.iter(|| black_box(project(&sum, &head, closure)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_resolve, bench_project);
criterion_main!(benches);
