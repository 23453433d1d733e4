//! Routing table and discovery benchmarks
//!
//! Benchmarks for the per-tick hot paths of an AODV node:
//! - Route insertion and lookup
//! - Expiry sweeps over a full table
//! - Link-break handling
//! - Discovery generation and retry refresh
//!
//! Run with: cargo bench -p orbnet-routing

use chrono::Duration;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use orbnet_core::{Clock, NodeAddress, VirtualClock};
use orbnet_routing::{AodvConfig, AodvParameters, DiscoveryEngine, RouteEntry, RoutingTable};

fn make_params() -> AodvParameters {
    AodvParameters::new(30, 5, 20, 10, true)
}

fn make_table(size: usize, clock: &VirtualClock) -> RoutingTable {
    let params = make_params();
    let mut table = RoutingTable::new(NodeAddress::satellite(0, 0), clock.clone(), &params);
    for i in 0..size {
        let destination = NodeAddress::satellite(i / 20, i % 20);
        table.add_entry(RouteEntry {
            destination,
            sequence: i as i32,
            valid_sequence: true,
            hop_count: (i % 15) as u32 + 1,
            next_hop: NodeAddress::satellite(0, 1 + i % 4),
            valid: true,
            expires_at: clock.future(Duration::seconds((i % 60) as i64)),
            precursors: vec![NodeAddress::satellite(1, 0)],
        });
    }
    table
}

// ============================================================================
// Routing Table Benchmarks
// ============================================================================

fn bench_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("routing_table");

    for size in [20, 200] {
        group.bench_with_input(BenchmarkId::new("lookup", size), &size, |b, &size| {
            let clock = VirtualClock::new();
            let table = make_table(size, &clock);
            let target = NodeAddress::satellite((size - 1) / 20, (size - 1) % 20);
            b.iter(|| table.active_route_exists(black_box(&target)))
        });

        group.bench_with_input(BenchmarkId::new("expiry_sweep", size), &size, |b, &size| {
            let clock = VirtualClock::new();
            clock.advance_secs(30);
            b.iter_batched(
                || make_table(size, &clock),
                |mut table| table.invalidate_or_remove_expired(),
                criterion::BatchSize::SmallInput,
            )
        });

        group.bench_with_input(BenchmarkId::new("handle_unreachable", size), &size, |b, &size| {
            let clock = VirtualClock::new();
            let missing = NodeAddress::satellite(0, 1);
            b.iter_batched(
                || make_table(size, &clock),
                |mut table| table.handle_unreachable(black_box(&missing)),
                criterion::BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

// ============================================================================
// Discovery Benchmarks
// ============================================================================

fn bench_discovery(c: &mut Criterion) {
    let mut group = c.benchmark_group("discovery");

    group.bench_function("generate_and_refresh_50", |b| {
        b.iter_batched(
            || {
                let clock = VirtualClock::new();
                let local = NodeAddress::satellite(0, 0);
                let table = RoutingTable::new(local.clone(), clock.clone(), &make_params());
                let engine = DiscoveryEngine::new(local, clock.clone(), make_params(), AodvConfig::default());
                (clock, table, engine)
            },
            |(clock, mut table, mut engine)| {
                for i in 0..50 {
                    engine.generate_discovery(&NodeAddress::satellite(1 + i / 20, i % 20), &mut table);
                }
                clock.advance_secs(3600);
                engine.refresh_expired_attempts(&mut table)
            },
            criterion::BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(benches, bench_table, bench_discovery);
criterion_main!(benches);
