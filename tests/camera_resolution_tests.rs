//! Tests for camera pose and resolution publication

#[cfg(test)]
mod tests {
    use gpushared::{
        BackingType, CameraState, ChannelCapacities, RegionConfig, RegionHandle, Resolution, Side,
    };
    use std::{
        sync::atomic::{AtomicBool, Ordering},
        thread,
        time::Duration,
    };
    use tempfile::TempDir;

    fn open_pair(dir: &TempDir, name: &str) -> (RegionHandle, RegionHandle) {
        let base = RegionConfig::new(name)
            .with_backing_type(BackingType::FileBacked)
            .with_file_path(dir.path().join(name))
            .with_capacities(ChannelCapacities::new(1024, 1024))
            .with_attach_timeout(Duration::from_millis(200));
        let client = RegionHandle::open_or_create(&base.clone().with_side(Side::Client)).unwrap();
        let renderer = RegionHandle::open_or_create(&base.with_side(Side::Renderer)).unwrap();
        (client, renderer)
    }

    #[test]
    fn test_camera_round_trip() {
        let dir = TempDir::new().unwrap();
        let (client, renderer) = open_pair(&dir, "camera");

        let pose = CameraState::new(1.5, 2.5, 3.0, 45.0, -10.0, 0.8);
        client.camera().publish(&pose);
        assert_eq!(renderer.camera().read(), pose);

        let moved = CameraState {
            x: -4.0,
            ..pose
        };
        client.camera().publish(&moved);
        assert_eq!(renderer.camera().read(), moved);
    }

    #[test]
    fn test_camera_fields_are_never_garbage() {
        let dir = TempDir::new().unwrap();
        let (client, renderer) = open_pair(&dir, "camera_race");
        let stop = AtomicBool::new(false);

        let a = CameraState::new(1.0, 1.0, 1.0, 1.0, 1.0, 1.0);
        let b = CameraState::new(2.0, 2.0, 2.0, 2.0, 2.0, 2.0);

        thread::scope(|scope| {
            scope.spawn(|| {
                for i in 0..5_000 {
                    client.camera().publish(if i % 2 == 0 { &a } else { &b });
                }
                stop.store(true, Ordering::Release);
            });

            scope.spawn(|| {
                while !stop.load(Ordering::Acquire) {
                    let pose = renderer.camera().read();
                    // Fields may mix two poses, but each is a published value
                    for v in [pose.x, pose.y, pose.z, pose.yaw, pose.pitch, pose.zoom] {
                        assert!(v == 0.0 || v == 1.0 || v == 2.0);
                    }
                }
            });
        });
    }

    #[test]
    fn test_each_side_publishes_its_own_resolution() {
        let dir = TempDir::new().unwrap();
        let (client, renderer) = open_pair(&dir, "resolution");

        assert!(client.resolution().peer().is_unset());

        client.resolution().publish_local(1920, 1080);
        renderer.resolution().publish_local(1280, 720);

        assert_eq!(client.resolution().local(), Resolution::new(1920, 1080));
        assert_eq!(client.resolution().peer(), Resolution::new(1280, 720));
        assert_eq!(renderer.resolution().peer(), Resolution::new(1920, 1080));
        assert_eq!(renderer.resolution().get(Side::Renderer), Resolution::new(1280, 720));
    }

    #[test]
    fn test_sequential_resolution_updates() {
        let dir = TempDir::new().unwrap();
        let (client, renderer) = open_pair(&dir, "resolution_seq");

        for (w, h) in [(640, 480), (800, 600), (2560, 1440)] {
            client.resolution().publish_local(w, h);
            assert_eq!(renderer.resolution().peer(), Resolution::new(w, h));
        }
        assert_eq!(renderer.resolution().peer().to_string(), "2560x1440");
    }

    #[test]
    fn test_resolution_pair_is_never_mixed() {
        let dir = TempDir::new().unwrap();
        let (client, renderer) = open_pair(&dir, "resolution_race");
        let stop = AtomicBool::new(false);

        thread::scope(|scope| {
            scope.spawn(|| {
                for i in 1..=5_000u32 {
                    client.resolution().publish_local(i, i * 2);
                }
                stop.store(true, Ordering::Release);
            });

            scope.spawn(|| {
                while !stop.load(Ordering::Acquire) {
                    let res = renderer.resolution().peer();
                    assert_eq!(res.height, res.width * 2);
                }
            });
        });
    }
}
