//! Benchmarks for pool allocation with varying occupancy.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use netweave::resource::{PoolSpace, ResourceAdmin, SizeSpec};

fn create_admin(occupied: usize) -> ResourceAdmin {
    let admin = ResourceAdmin::new();
    admin
        .create_pool(
            "ip-pool",
            "global",
            PoolSpace::Subnet {
                address_space: "10.0.0.0/8".parse().unwrap(),
            },
            "",
            "",
        )
        .unwrap();
    admin
        .create_pool(
            "svc-id",
            "global",
            PoolSpace::Id { start: 1, end: 1_000_000 },
            "",
            "",
        )
        .unwrap();

    for i in 0..occupied {
        let key = format!("link-{}", i);
        admin
            .obtain("ip-pool", "global", SizeSpec::Prefix(31), "bench", &key)
            .unwrap();
        admin
            .obtain("svc-id", "global", SizeSpec::Single, "bench", &key)
            .unwrap();
    }
    admin
}

/// Obtain then release one /31 in a pool that already holds `count` links.
fn bench_subnet_obtain_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("subnet_obtain_release");

    for count in [0, 100, 1_000, 10_000] {
        let admin = create_admin(count);
        group.bench_with_input(BenchmarkId::new("occupied", count), &count, |b, _| {
            b.iter(|| {
                let value = admin
                    .obtain("ip-pool", "global", SizeSpec::Prefix(31), "bench", "probe")
                    .unwrap();
                admin.release("ip-pool", "global", "probe").unwrap();
                black_box(value)
            });
        });
    }

    group.finish();
}

fn bench_id_obtain_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("id_obtain_release");

    for count in [0, 1_000, 10_000] {
        let admin = create_admin(count);
        group.bench_with_input(BenchmarkId::new("occupied", count), &count, |b, _| {
            b.iter(|| {
                let value = admin
                    .obtain("svc-id", "global", SizeSpec::Single, "bench", "probe")
                    .unwrap();
                admin.release("svc-id", "global", "probe").unwrap();
                black_box(value)
            });
        });
    }

    group.finish();
}

/// Repeated obtain for a held key is a lookup.
fn bench_idempotent_obtain(c: &mut Criterion) {
    let admin = create_admin(1_000);
    c.bench_function("subnet_obtain_existing_key", |b| {
        b.iter(|| {
            black_box(
                admin
                    .obtain("ip-pool", "global", SizeSpec::Prefix(31), "bench", "link-500")
                    .unwrap(),
            )
        });
    });
}

criterion_group!(
    benches,
    bench_subnet_obtain_release,
    bench_id_obtain_release,
    bench_idempotent_obtain
);
criterion_main!(benches);
