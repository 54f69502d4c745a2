//! Tests for the double-buffered frame channel

#[cfg(test)]
mod tests {
    use gpushared::{
        BackingType, BridgeError, ChannelCapacities, Frame, RegionConfig, RegionHandle, Side,
        SlotPhase,
    };
    use std::{
        panic::{self, AssertUnwindSafe},
        sync::atomic::{AtomicBool, Ordering},
        thread,
        time::Duration,
    };
    use tempfile::TempDir;

    const SCENE_CAPACITY: usize = 64 * 1024;
    const UI_CAPACITY: usize = 16 * 1024;

    fn open_pair(dir: &TempDir, name: &str) -> (RegionHandle, RegionHandle) {
        let base = RegionConfig::new(name)
            .with_backing_type(BackingType::FileBacked)
            .with_file_path(dir.path().join(name))
            .with_capacities(ChannelCapacities::new(SCENE_CAPACITY, UI_CAPACITY))
            .with_attach_timeout(Duration::from_millis(200));
        let client = RegionHandle::open_or_create(&base.clone().with_side(Side::Client)).unwrap();
        let renderer = RegionHandle::open_or_create(&base.with_side(Side::Renderer)).unwrap();
        (client, renderer)
    }

    /// Payload whose every 8-byte word is the frame id
    fn stamped(len: usize, frame_id: u64) -> Vec<u8> {
        frame_id.to_le_bytes().iter().copied().cycle().take(len).collect()
    }

    fn assert_stamped(bytes: &[u8], frame_id: u64) {
        let expected = frame_id.to_le_bytes();
        for (i, b) in bytes.iter().enumerate() {
            assert_eq!(*b, expected[i % 8], "byte {} of frame {} is torn", i, frame_id);
        }
    }

    #[test]
    fn test_publish_then_poll() {
        let dir = TempDir::new().unwrap();
        let (client, renderer) = open_pair(&dir, "basic");
        let mut producer = renderer.frame_producer().unwrap();
        let mut consumer = client.frame_consumer().unwrap();

        assert!(consumer.poll().is_none());

        let outcome = producer.publish(b"scene-1", b"ui-1").unwrap();
        assert_eq!(outcome.frame_id, 1);
        assert_eq!(outcome.dropped, None);

        let frame = consumer.poll().unwrap();
        assert_eq!(frame.frame_id, 1);
        assert_eq!(frame.scene, b"scene-1");
        assert_eq!(frame.ui, b"ui-1");

        // Same frame is not returned twice
        assert!(consumer.poll().is_none());
        assert_eq!(consumer.last_seen(), 1);
        assert_eq!(client.frame_channel().slot_states()[frame.slot].phase(), SlotPhase::Free);
    }

    #[test]
    fn test_empty_payloads_are_valid() {
        let dir = TempDir::new().unwrap();
        let (client, renderer) = open_pair(&dir, "empty");
        let mut producer = renderer.frame_producer().unwrap();
        let mut consumer = client.frame_consumer().unwrap();

        producer.publish(&[], &[]).unwrap();
        let frame = consumer.poll().unwrap();
        assert!(frame.scene.is_empty());
        assert!(frame.ui.is_empty());
    }

    #[test]
    fn test_backpressure_keeps_two_newest() {
        let dir = TempDir::new().unwrap();
        let (client, renderer) = open_pair(&dir, "backpressure");
        let mut producer = renderer.frame_producer().unwrap();

        let n = 10u64;
        for id in 1..=n {
            let outcome = producer.publish(&stamped(128, id), b"").unwrap();
            assert_eq!(outcome.frame_id, id);
            if id > 2 {
                assert_eq!(outcome.dropped, Some(id - 2));
            }
        }

        let channel = client.frame_channel();
        assert_eq!(channel.retained_frame_ids(), vec![n - 1, n]);
        assert_eq!(channel.frames_dropped(), n - 2);
        assert_eq!(channel.last_frame_id(), n);

        // The consumer sees the newest frame, then nothing older
        let mut consumer = client.frame_consumer().unwrap();
        let frame = consumer.poll().unwrap();
        assert_eq!(frame.frame_id, n);
        assert_stamped(&frame.scene, n);
        assert!(consumer.poll().is_none());
    }

    #[test]
    fn test_frame_ids_never_decrease() {
        let dir = TempDir::new().unwrap();
        let (client, renderer) = open_pair(&dir, "monotonic");
        let mut producer = renderer.frame_producer().unwrap();
        let mut consumer = client.frame_consumer().unwrap();

        let mut last = 0;
        for round in 0..50u64 {
            producer.publish(&stamped(64, round), b"ui").unwrap();
            if round % 3 == 0 {
                producer.publish(&stamped(64, round), b"ui").unwrap();
            }
            if let Some(frame) = consumer.poll() {
                assert!(frame.frame_id > last);
                last = frame.frame_id;
            }
        }
    }

    #[test]
    fn test_oversized_payload_is_rejected_before_writing() {
        let dir = TempDir::new().unwrap();
        let (client, renderer) = open_pair(&dir, "oversized");
        let mut producer = renderer.frame_producer().unwrap();

        let too_big = vec![0u8; SCENE_CAPACITY + 1];
        let err = producer.publish(&too_big, b"").unwrap_err();
        assert!(matches!(
            err,
            BridgeError::PayloadTooLarge {
                buffer: "scene",
                ..
            }
        ));

        let err = producer.publish(b"", &vec![0u8; UI_CAPACITY + 1]).unwrap_err();
        assert!(matches!(err, BridgeError::PayloadTooLarge { buffer: "ui", .. }));

        // Nothing was published
        assert_eq!(client.frame_channel().last_frame_id(), 0);
        let mut consumer = client.frame_consumer().unwrap();
        assert!(consumer.poll().is_none());

        // Exactly at capacity is fine
        producer
            .publish(&vec![7u8; SCENE_CAPACITY], &vec![9u8; UI_CAPACITY])
            .unwrap();
        let frame = consumer.poll().unwrap();
        assert_eq!(frame.scene.len(), SCENE_CAPACITY);
        assert_eq!(frame.ui.len(), UI_CAPACITY);
    }

    #[test]
    fn test_publish_with_writes_in_place() {
        let dir = TempDir::new().unwrap();
        let (client, renderer) = open_pair(&dir, "in_place");
        let mut producer = renderer.frame_producer().unwrap();
        let mut consumer = client.frame_consumer().unwrap();

        producer
            .publish_with(300, 20, |scene, ui| {
                assert_eq!(scene.len(), 300);
                assert_eq!(ui.len(), 20);
                scene.fill(1);
                ui.fill(2);
            })
            .unwrap();

        let mut frame = Frame::default();
        assert!(consumer.poll_into(&mut frame));
        assert!(frame.scene.iter().all(|&b| b == 1));
        assert!(frame.ui.iter().all(|&b| b == 2));
        assert!(!consumer.poll_into(&mut frame));
    }

    #[test]
    fn test_slot_from_panicked_fill_is_reclaimed() {
        let dir = TempDir::new().unwrap();
        let (client, renderer) = open_pair(&dir, "panicked_fill");
        let mut producer = renderer.frame_producer().unwrap();

        assert_eq!(producer.publish(b"first", b"").unwrap().frame_id, 1);

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            producer.publish_with(8, 8, |_, _| panic!("fill failed"))
        }));
        assert!(result.is_err());

        // The half-claimed slot is reused without dropping frame 1
        let outcome = producer.publish(b"second", b"").unwrap();
        assert_eq!(outcome.frame_id, 2);
        assert_eq!(outcome.dropped, None);
        assert_eq!(client.frame_channel().retained_frame_ids(), vec![1, 2]);

        let outcome = producer.publish(b"third", b"").unwrap();
        assert_eq!(outcome.dropped, Some(1));
        assert_eq!(client.frame_channel().retained_frame_ids(), vec![2, 3]);

        let mut consumer = client.frame_consumer().unwrap();
        assert_eq!(consumer.poll().unwrap().scene, b"third");
    }

    #[test]
    fn test_concurrent_reads_are_never_torn() {
        let dir = TempDir::new().unwrap();
        let (client, renderer) = open_pair(&dir, "concurrent");
        let mut producer = renderer.frame_producer().unwrap();
        let mut consumer = client.frame_consumer().unwrap();
        let done = AtomicBool::new(false);

        let frames_published = 2_000u64;

        let received = thread::scope(|scope| {
            scope.spawn(|| {
                for id in 1..=frames_published {
                    let scene_len = 1024 + (id as usize % 7) * 512;
                    producer
                        .publish(&stamped(scene_len, id), &stamped(256, id))
                        .unwrap();
                }
                done.store(true, Ordering::Release);
            });

            let reader = scope.spawn(|| {
                let mut received = Vec::new();
                let mut frame = Frame::default();
                loop {
                    let finished = done.load(Ordering::Acquire);
                    if consumer.poll_into(&mut frame) {
                        assert_stamped(&frame.scene, frame.frame_id);
                        assert_stamped(&frame.ui, frame.frame_id);
                        received.push(frame.frame_id);
                    } else if finished {
                        break;
                    }
                }
                received
            });

            reader.join().unwrap()
        });

        assert!(!received.is_empty());
        assert!(received.windows(2).all(|w| w[0] < w[1]));
        assert!(received.last().copied().unwrap() <= frames_published);
    }
}
