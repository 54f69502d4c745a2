//! Tests for creating, attaching to and validating regions

#[cfg(test)]
mod tests {
    use gpushared::{
        layout::{header_fields, init_state, GPUSHARED_MAGIC, SCHEMA_VERSION},
        BackingType, BridgeError, ChannelCapacities, InputEvent, OpenMode, PeerStatus,
        RegionConfig, RegionHandle, Section, Side, SlotPhase,
    };
    use std::{fs::File, thread, time::Duration};
    use tempfile::TempDir;

    fn config(dir: &TempDir, name: &str, side: Side) -> RegionConfig {
        RegionConfig::new(name)
            .with_backing_type(BackingType::FileBacked)
            .with_file_path(dir.path().join(name))
            .with_side(side)
            .with_capacities(ChannelCapacities::new(4096, 2048))
            .with_attach_timeout(Duration::from_millis(100))
    }

    fn cfg_exists(cfg: &RegionConfig) -> bool {
        cfg.default_file_path().exists()
    }

    fn assert_rest_state(handle: &RegionHandle) {
        let frames = handle.frame_channel();
        assert_eq!(frames.active_index(), 0);
        assert_eq!(frames.last_frame_id(), 0);
        assert_eq!(frames.frames_dropped(), 0);
        for slot in frames.slot_states() {
            assert_eq!(slot.phase(), SlotPhase::Free);
            assert_eq!(slot.frame_id, 0);
            assert_eq!(slot.scene_length, 0);
            assert_eq!(slot.ui_length, 0);
        }

        let ring = handle.input_ring();
        assert_eq!(ring.head(), 0);
        assert_eq!(ring.tail(), 0);
        assert_eq!(ring.events_dropped(), 0);

        let camera = handle.camera().read();
        assert_eq!(camera, Default::default());

        let resolution = handle.resolution();
        assert!(resolution.get(Side::Client).is_unset());
        assert!(resolution.get(Side::Renderer).is_unset());
    }

    #[test]
    fn test_fresh_region_rest_state_on_both_sides() {
        let dir = TempDir::new().unwrap();
        let client = RegionHandle::open_or_create(&config(&dir, "chan1", Side::Client)).unwrap();
        let renderer = RegionHandle::open_or_create(&config(&dir, "chan1", Side::Renderer)).unwrap();

        assert_eq!(client.open_mode(), OpenMode::Created);
        assert_eq!(renderer.open_mode(), OpenMode::Attached);
        assert_rest_state(&client);
        assert_rest_state(&renderer);

        let info = renderer.header_info();
        assert_eq!(info.magic, GPUSHARED_MAGIC);
        assert_eq!(info.version, SCHEMA_VERSION);
        assert_eq!(info.init_state, init_state::READY);
        assert_eq!(info.total_size, client.layout().total_size() as u64);
        assert_eq!(info.scene_capacity, 4096);
        assert_eq!(info.ui_capacity, 2048);
    }

    #[test]
    fn test_capacity_mismatch_is_rejected() {
        let dir = TempDir::new().unwrap();
        let _client = RegionHandle::open_or_create(&config(&dir, "caps", Side::Client)).unwrap();

        let other = config(&dir, "caps", Side::Renderer)
            .with_capacities(ChannelCapacities::new(8192, 2048));
        let err = RegionHandle::open_or_create(&other).unwrap_err();
        assert!(matches!(err, BridgeError::LayoutMismatch { .. }));
    }

    #[test]
    fn test_bad_magic_is_rejected() {
        let dir = TempDir::new().unwrap();
        let client = RegionHandle::open_or_create(&config(&dir, "magic", Side::Client)).unwrap();

        let header = client.window(Section::Header);
        unsafe {
            std::ptr::write_bytes(header.ptr.add(header_fields::MAGIC), 0xAB, 8);
        }

        let err = RegionHandle::open_or_create(&config(&dir, "magic", Side::Renderer)).unwrap_err();
        assert!(matches!(err, BridgeError::LayoutMismatch { field: "magic", .. }));
    }

    #[test]
    fn test_schema_version_mismatch_is_rejected() {
        let dir = TempDir::new().unwrap();
        let client = RegionHandle::open_or_create(&config(&dir, "version", Side::Client)).unwrap();

        let header = client.window(Section::Header);
        unsafe {
            let version = header.ptr.add(header_fields::VERSION) as *mut u32;
            version.write_volatile(SCHEMA_VERSION + 1);
        }

        let err = RegionHandle::open_or_create(&config(&dir, "version", Side::Renderer)).unwrap_err();
        assert!(matches!(err, BridgeError::VersionMismatch { .. }));
    }

    #[test]
    fn test_region_stuck_in_initialization_is_recreated() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, "uninit", Side::Renderer);
        let size = gpushared::RegionLayout::new(cfg.capacities).unwrap().total_size();

        // Sized but never initialized, as if the creator died mid-init
        let file = File::create(cfg.default_file_path()).unwrap();
        file.set_len(size as u64).unwrap();

        let handle = RegionHandle::open_or_create(&cfg).unwrap();
        assert_eq!(handle.open_mode(), OpenMode::Created);
        assert_eq!(handle.header_info().init_state, init_state::READY);
        assert_rest_state(&handle);
    }

    #[test]
    fn test_unsized_region_is_recreated() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, "unsized", Side::Client);

        // Created but never sized
        File::create(cfg.default_file_path()).unwrap();

        let handle = RegionHandle::open_or_create(&cfg).unwrap();
        assert_eq!(handle.open_mode(), OpenMode::Created);
        assert_rest_state(&handle);
    }

    #[test]
    fn test_last_close_unlinks_region() {
        let dir = TempDir::new().unwrap();
        let client_cfg = config(&dir, "chan1", Side::Client);
        let renderer_cfg = config(&dir, "chan1", Side::Renderer);

        let client = RegionHandle::open_or_create(&client_cfg).unwrap();
        let renderer = RegionHandle::open_or_create(&renderer_cfg).unwrap();
        assert_eq!(renderer.header_info().attach_count, 2);

        assert!(client.input_producer().unwrap().push(InputEvent::key_down(7)));
        renderer.frame_producer().unwrap().publish(b"old-session", b"").unwrap();
        client.resolution().publish_local(800, 600);

        client.close();
        assert!(cfg_exists(&renderer_cfg));
        assert_eq!(renderer.header_info().attach_count, 1);
        renderer.close();
        assert!(!cfg_exists(&renderer_cfg));

        // A restarted pair starts from rest state
        let client = RegionHandle::open_or_create(&client_cfg).unwrap();
        let renderer = RegionHandle::open_or_create(&renderer_cfg).unwrap();
        assert_eq!(client.open_mode(), OpenMode::Created);
        assert_eq!(renderer.open_mode(), OpenMode::Attached);
        assert_rest_state(&client);
        assert!(renderer.input_consumer().unwrap().pop().unwrap().is_none());
        assert!(client.frame_consumer().unwrap().poll().is_none());
    }

    #[test]
    fn test_region_stays_while_any_handle_is_open() {
        let dir = TempDir::new().unwrap();
        let client_cfg = config(&dir, "shared_life", Side::Client);

        let client = RegionHandle::open_or_create(&client_cfg).unwrap();
        let renderer =
            RegionHandle::open_or_create(&config(&dir, "shared_life", Side::Renderer)).unwrap();
        renderer.resolution().publish_local(1280, 720);
        client.close();

        let client = RegionHandle::open_or_create(&client_cfg).unwrap();
        assert_eq!(client.open_mode(), OpenMode::Attached);
        assert_eq!(client.resolution().peer().width, 1280);
        assert_eq!(client.header_info().attach_count, 2);
    }

    #[test]
    fn test_region_with_stale_heartbeats_is_recreated() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, "crashed", Side::Client).with_peer_timeout(Duration::from_millis(20));

        // Never closed, as if the process crashed
        let crashed = RegionHandle::open_or_create(&cfg).unwrap();
        crashed.heartbeat();
        crashed.resolution().publish_local(640, 480);
        std::mem::forget(crashed);

        std::thread::sleep(Duration::from_millis(60));

        let renderer_cfg =
            config(&dir, "crashed", Side::Renderer).with_peer_timeout(Duration::from_millis(20));
        let renderer = RegionHandle::open_or_create(&renderer_cfg).unwrap();
        assert_eq!(renderer.open_mode(), OpenMode::Created);
        assert_eq!(renderer.header_info().attach_count, 1);
        assert_rest_state(&renderer);
    }

    #[test]
    fn test_live_heartbeat_keeps_region() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, "beating", Side::Client);

        let client = RegionHandle::open_or_create(&cfg).unwrap();
        client.heartbeat();

        let renderer = RegionHandle::open_or_create(&config(&dir, "beating", Side::Renderer)).unwrap();
        assert_eq!(renderer.open_mode(), OpenMode::Attached);
        assert!(renderer.peer_status(Duration::from_secs(5)).is_alive());
    }

    #[test]
    fn test_concurrent_opens_elect_one_creator() {
        let dir = TempDir::new().unwrap();

        for round in 0..100 {
            let name = format!("race_{}", round);
            let client_cfg = config(&dir, &name, Side::Client);
            let renderer_cfg = config(&dir, &name, Side::Renderer);

            let (client, renderer) = thread::scope(|scope| {
                let client = scope.spawn(|| RegionHandle::open_or_create(&client_cfg));
                let renderer = scope.spawn(|| RegionHandle::open_or_create(&renderer_cfg));
                (client.join().unwrap(), renderer.join().unwrap())
            });
            let client = client.unwrap();
            let renderer = renderer.unwrap();

            let creators = [&client, &renderer]
                .iter()
                .filter(|handle| handle.open_mode() == OpenMode::Created)
                .count();
            assert_eq!(creators, 1, "round {}", round);
            assert_eq!(client.header_info().attach_count, 2);
            assert_rest_state(&client);
            assert_rest_state(&renderer);
        }
    }

    #[test]
    fn test_heartbeat_and_peer_status() {
        let dir = TempDir::new().unwrap();
        let client = RegionHandle::open_or_create(&config(&dir, "alive", Side::Client)).unwrap();
        let renderer = RegionHandle::open_or_create(&config(&dir, "alive", Side::Renderer)).unwrap();

        assert_eq!(renderer.peer_status(Duration::from_secs(5)), PeerStatus::NeverSeen);

        client.heartbeat();
        assert!(renderer.peer_status(Duration::from_secs(5)).is_alive());

        std::thread::sleep(Duration::from_millis(30));
        assert!(matches!(
            renderer.peer_status(Duration::from_millis(10)),
            PeerStatus::Stale { .. }
        ));

        let snapshot = renderer.snapshot();
        let beat = snapshot.heartbeats.iter().find(|b| b.side == Side::Client).unwrap();
        assert_eq!(beat.pid, std::process::id());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let err = RegionHandle::open_or_create(&RegionConfig::new("")).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidParameter { .. }));

        let zero = RegionConfig::new("zero")
            .with_backing_type(BackingType::Anonymous)
            .with_capacities(ChannelCapacities::new(0, 16));
        assert!(RegionHandle::open_or_create(&zero).is_err());
    }

    #[test]
    fn test_anonymous_region_is_usable_in_process() {
        let cfg = RegionConfig::new("local")
            .with_backing_type(BackingType::Anonymous)
            .with_capacities(ChannelCapacities::new(256, 256));
        let handle = RegionHandle::open_or_create(&cfg).unwrap();
        assert!(handle.is_creator());
        assert_rest_state(&handle);
    }
}
