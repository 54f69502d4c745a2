use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gpushared::{BackingType, ChannelCapacities, Frame, RegionConfig, RegionHandle};

fn anonymous_region(name: &str, capacity: usize) -> RegionHandle {
    let config = RegionConfig::new(name)
        .with_backing_type(BackingType::Anonymous)
        .with_capacities(ChannelCapacities::new(capacity, capacity));
    RegionHandle::open_or_create(&config).unwrap()
}

fn benchmark_publish_poll(c: &mut Criterion) {
    let mut group = c.benchmark_group("FrameChannel_PublishPoll");

    for size in [1024usize, 64 * 1024, 1024 * 1024].iter() {
        group.throughput(Throughput::Bytes(*size as u64 * 2));
        group.bench_with_input(BenchmarkId::new("scene_and_ui", size), size, |b, &size| {
            let handle = anonymous_region("bench_frames", size);
            let mut producer = handle.frame_producer().unwrap();
            let mut consumer = handle.frame_consumer().unwrap();
            let scene = vec![0x11u8; size];
            let ui = vec![0x22u8; size];
            let mut frame = Frame::default();

            b.iter(|| {
                producer.publish(&scene, &ui).unwrap();
                assert!(consumer.poll_into(&mut frame));
            });
        });
    }

    group.finish();
}

fn benchmark_publish_under_backpressure(c: &mut Criterion) {
    let mut group = c.benchmark_group("FrameChannel_Backpressure");
    let size = 64 * 1024;
    group.throughput(Throughput::Bytes(size as u64));

    group.bench_function("publish_drop_oldest", |b| {
        let handle = anonymous_region("bench_frames_drop", size);
        let mut producer = handle.frame_producer().unwrap();
        b.iter(|| {
            producer
                .publish_with(size, 0, |scene, _| scene.fill(0x5a))
                .unwrap()
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_publish_poll, benchmark_publish_under_backpressure);
criterion_main!(benches);
