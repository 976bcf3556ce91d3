use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use kernel_bridge::bridge::{Bridge, BridgeOptions};
use kernel_bridge::bridge::pin::PinArena;
use kernel_bridge::host::{Host, value::Value};
use kernel_bridge::kernel::Kernel;

fn bench_acquire_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("pin_arena/acquire_release");

    for &size in &[100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &n| {
            let mut arena = PinArena::with_capacity(n);
            let mut indices = Vec::with_capacity(n);
            b.iter(|| {
                for i in 0..n {
                    indices.push(arena.acquire(Value::Int64(i as i64)));
                }
                for index in indices.drain(..) {
                    black_box(arena.release(index));
                }
            });
        });
    }

    group.finish();
}

fn bench_handle_finalization(c: &mut Criterion) {
    let mut group = c.benchmark_group("pin_arena/collect_handles");

    for &size in &[100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &n| {
            let mut kernel = Kernel::new();
            let bridge = Bridge::init(&mut kernel, Host::new(), BridgeOptions::default())
                .unwrap_or_else(|e| panic!("{}", e));
            let value = Value::string("pinned");
            b.iter(|| {
                for _ in 0..n {
                    bridge.wrap(&mut kernel, value.clone());
                }
                black_box(kernel.collect_garbage());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_acquire_release, bench_handle_finalization);
criterion_main!(benches);
