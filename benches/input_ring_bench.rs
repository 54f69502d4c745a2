use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gpushared::{
    layout::INPUT_RING_CAPACITY, BackingType, ChannelCapacities, InputEvent, RegionConfig,
    RegionHandle,
};
use std::thread;

fn anonymous_region(name: &str) -> RegionHandle {
    let config = RegionConfig::new(name)
        .with_backing_type(BackingType::Anonymous)
        .with_capacities(ChannelCapacities::new(4096, 4096));
    RegionHandle::open_or_create(&config).unwrap()
}

fn benchmark_push_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("InputRing_SingleThreaded");
    let handle = anonymous_region("bench_input");
    let mut producer = handle.input_producer().unwrap();
    let mut consumer = handle.input_consumer().unwrap();

    for batch in [1u32, 64, INPUT_RING_CAPACITY].iter() {
        group.throughput(Throughput::Elements(*batch as u64));
        group.bench_with_input(BenchmarkId::new("push_drain", batch), batch, |b, &batch| {
            b.iter(|| {
                for i in 0..batch {
                    producer.push(InputEvent::mouse_move(i as f32, 0.0));
                }
                while let Ok(Some(_)) = consumer.pop() {}
            });
        });
    }

    group.finish();
}

fn benchmark_full_ring_rejects(c: &mut Criterion) {
    let handle = anonymous_region("bench_input_full");
    let mut producer = handle.input_producer().unwrap();
    for i in 0..INPUT_RING_CAPACITY {
        producer.push(InputEvent::key_down(i as u8));
    }

    c.bench_function("InputRing_push_when_full", |b| {
        b.iter(|| producer.push(InputEvent::key_down(1)));
    });
}

fn benchmark_cross_thread(c: &mut Criterion) {
    let mut group = c.benchmark_group("InputRing_CrossThread");
    let events = 10_000u32;
    group.throughput(Throughput::Elements(events as u64));

    group.bench_function("spsc_10k", |b| {
        let handle = anonymous_region("bench_input_spsc");
        b.iter(|| {
            let mut producer = handle.input_producer().unwrap();
            let mut consumer = handle.input_consumer().unwrap();
            thread::scope(|scope| {
                scope.spawn(|| {
                    let mut sent = 0;
                    while sent < events {
                        if producer.push(InputEvent::key_down(sent as u8)) {
                            sent += 1;
                        }
                    }
                });
                scope.spawn(|| {
                    let mut received = 0;
                    while received < events {
                        if let Ok(Some(_)) = consumer.pop() {
                            received += 1;
                        }
                    }
                });
            });
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_push_pop,
    benchmark_full_ring_rejects,
    benchmark_cross_thread
);
criterion_main!(benches);
