//! Benchmarks for subnet enumeration and a full synthetic sweep

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use netsweep::{
    config::Options,
    ping::{MockPinger, MockPingerConfig},
    scanner::{max_partition_size, ScanSession},
    Subnet,
};
use std::sync::Arc;
use tokio::runtime::Runtime;

/// Benchmark walking every address of a block
fn bench_enumeration(c: &mut Criterion) {
    let mut group = c.benchmark_group("enumeration");

    for cidr in ["10.0.0.0/24", "10.0.0.0/16", "2001:db8::/112"] {
        let subnet: Subnet = cidr.parse().unwrap();
        group.bench_with_input(BenchmarkId::new("hosts", cidr), &subnet, |b, subnet| {
            b.iter(|| black_box(subnet.hosts().count()))
        });
    }

    group.bench_function("parse_cidr", |b| {
        b.iter(|| Subnet::parse(black_box("192.168.128.0/17")).unwrap())
    });

    group.bench_function("partition_size", |b| {
        b.iter(|| max_partition_size(black_box(1u128 << 64), black_box(12)).unwrap())
    });

    group.finish();
}

/// Benchmark the worker pool against a pinger that never sleeps
fn bench_sweep(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("sweep");
    group.sample_size(20);

    for workers in [1i64, 8, 64] {
        group.bench_with_input(BenchmarkId::new("mock_slash_22", workers), &workers, |b, &workers| {
            let options = Options::new("10.8.0.0/22").with_count(1).with_max_workers(workers);
            b.iter(|| {
                rt.block_on(async {
                    let pinger = Arc::new(MockPinger::with_config(MockPingerConfig {
                        simulate_timing: false,
                        ..Default::default()
                    }));
                    let mut session = ScanSession::new(&options, pinger).unwrap();
                    session.run().await.unwrap();
                    black_box(session.total_results())
                })
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_enumeration, bench_sweep);
criterion_main!(benches);
