use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use gpushared::{
    error::BridgeError, BackingType, ChannelCapacities, InputEvent, RegionConfig, RegionHandle,
    Result, SharedMemoryRegion, Side,
};
use std::{
    io,
    path::PathBuf,
    str::FromStr,
    sync::mpsc::{self, RecvTimeoutError},
    thread,
    time::Duration,
};

const HOLD_BEAT_INTERVAL: Duration = Duration::from_millis(500);

fn region_args<'a, 'b>(command: App<'a, 'b>) -> App<'a, 'b> {
    command
        .arg(
            Arg::with_name("name")
                .short("n")
                .long("name")
                .value_name("NAME")
                .help("Name of the region")
                .default_value(gpushared::config::DEFAULT_REGION_NAME)
                .takes_value(true),
        )
        .arg(
            Arg::with_name("file")
                .short("f")
                .long("file")
                .value_name("FILE")
                .help("Use a file-backed region at FILE instead of POSIX shm")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("side")
                .long("side")
                .value_name("SIDE")
                .help("Side this process plays")
                .possible_values(&["client", "renderer"])
                .default_value("client")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("scene_capacity")
                .long("scene-capacity")
                .value_name("BYTES")
                .help("Scene payload capacity per slot")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("ui_capacity")
                .long("ui-capacity")
                .value_name("BYTES")
                .help("UI payload capacity per slot")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("timeout")
                .long("timeout")
                .value_name("MS")
                .help("How long to wait for the creator when attaching")
                .default_value("2000")
                .takes_value(true),
        )
}

fn main() -> Result<()> {
    env_logger::init();

    let matches = App::new("gpushared-cli")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Client/renderer shared-memory bridge tool")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("region")
                .about("Manage shared memory regions")
                .subcommand(region_args(
                    SubCommand::with_name("create")
                        .about("Create a region (or attach) and hold it open until Enter"),
                ))
                .subcommand(region_args(
                    SubCommand::with_name("inspect").about("Print the state of every channel"),
                ))
                .subcommand(region_args(
                    SubCommand::with_name("remove").about("Unlink a region by name"),
                )),
        )
        .subcommand(
            SubCommand::with_name("frame")
                .about("Frame channel operations")
                .subcommand(
                    region_args(SubCommand::with_name("publish").about("Publish test frames"))
                        .arg(
                            Arg::with_name("count")
                                .short("c")
                                .long("count")
                                .value_name("COUNT")
                                .help("Number of frames")
                                .default_value("1")
                                .takes_value(true),
                        )
                        .arg(
                            Arg::with_name("scene_size")
                                .long("scene-size")
                                .value_name("BYTES")
                                .help("Scene payload size")
                                .default_value("1024")
                                .takes_value(true),
                        )
                        .arg(
                            Arg::with_name("ui_size")
                                .long("ui-size")
                                .value_name("BYTES")
                                .help("UI payload size")
                                .default_value("1024")
                                .takes_value(true),
                        ),
                )
                .subcommand(region_args(
                    SubCommand::with_name("poll").about("Poll once for a new frame"),
                )),
        )
        .subcommand(
            SubCommand::with_name("input")
                .about("Input ring operations")
                .subcommand(
                    region_args(SubCommand::with_name("send").about("Push input events"))
                        .arg(
                            Arg::with_name("kind")
                                .short("k")
                                .long("kind")
                                .value_name("KIND")
                                .possible_values(&[
                                    "key-down",
                                    "key-up",
                                    "mouse-down",
                                    "mouse-up",
                                    "mouse-move",
                                ])
                                .default_value("key-down")
                                .takes_value(true),
                        )
                        .arg(
                            Arg::with_name("key")
                                .long("key")
                                .value_name("CODE")
                                .default_value("0")
                                .takes_value(true),
                        )
                        .arg(
                            Arg::with_name("button")
                                .long("button")
                                .value_name("BUTTON")
                                .default_value("0")
                                .takes_value(true),
                        )
                        .arg(
                            Arg::with_name("x")
                                .short("x")
                                .value_name("X")
                                .default_value("0")
                                .takes_value(true),
                        )
                        .arg(
                            Arg::with_name("y")
                                .short("y")
                                .value_name("Y")
                                .default_value("0")
                                .takes_value(true),
                        )
                        .arg(
                            Arg::with_name("count")
                                .short("c")
                                .long("count")
                                .value_name("COUNT")
                                .default_value("1")
                                .takes_value(true),
                        ),
                )
                .subcommand(region_args(
                    SubCommand::with_name("drain").about("Pop every queued event"),
                )),
        )
        .subcommand(SubCommand::with_name("info").about("Show version and layout information"))
        .get_matches();

    match matches.subcommand() {
        ("region", Some(region_matches)) => handle_region_commands(region_matches),
        ("frame", Some(frame_matches)) => handle_frame_commands(frame_matches),
        ("input", Some(input_matches)) => handle_input_commands(input_matches),
        ("info", Some(_)) => show_info(),
        _ => {
            println!("Use --help for usage information");
            Ok(())
        }
    }
}

fn parse_arg<T: FromStr>(matches: &ArgMatches, name: &str) -> Result<T> {
    let raw = matches
        .value_of(name)
        .ok_or_else(|| BridgeError::invalid_parameter(name, "missing value"))?;
    raw.parse()
        .map_err(|_| BridgeError::invalid_parameter(name, format!("cannot parse '{}'", raw)))
}

fn region_config(matches: &ArgMatches) -> Result<RegionConfig> {
    let name: String = parse_arg(matches, "name")?;
    let side: Side = parse_arg(matches, "side")?;
    let timeout: u64 = parse_arg(matches, "timeout")?;

    let defaults = ChannelCapacities::default();
    let scene = match matches.value_of("scene_capacity") {
        Some(_) => parse_arg(matches, "scene_capacity")?,
        None => defaults.scene,
    };
    let ui = match matches.value_of("ui_capacity") {
        Some(_) => parse_arg(matches, "ui_capacity")?,
        None => defaults.ui,
    };

    let mut config = RegionConfig::new(name)
        .with_side(side)
        .with_capacities(ChannelCapacities::new(scene, ui))
        .with_attach_timeout(Duration::from_millis(timeout));

    if let Some(file) = matches.value_of("file") {
        config = config
            .with_backing_type(BackingType::FileBacked)
            .with_file_path(PathBuf::from(file));
    }

    Ok(config)
}

fn handle_region_commands(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        ("create", Some(create_matches)) => {
            let config = region_config(create_matches)?;
            let handle = RegionHandle::open_or_create(&config)?;
            println!(
                "{:?} region '{}' ({} bytes, {})",
                handle.open_mode(),
                handle.name(),
                handle.layout().total_size(),
                config.backing_type.name()
            );
            hold_open(&handle);
        }
        ("inspect", Some(inspect_matches)) => {
            let config = region_config(inspect_matches)?;
            let handle = RegionHandle::open_or_create(&config)?;
            print_snapshot(&handle);
        }
        ("remove", Some(remove_matches)) => {
            let config = region_config(remove_matches)?;
            if SharedMemoryRegion::remove(&config)? {
                println!("Removed region '{}'", config.name);
            } else {
                println!("Region '{}' did not exist", config.name);
            }
        }
        _ => println!("Use 'region --help' for usage information"),
    }
    Ok(())
}

/// Keep the region alive, beating, until a line arrives on stdin. The
/// region is unlinked once the last handle closes.
fn hold_open(handle: &RegionHandle) {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = io::stdin().read_line(&mut String::new());
        let _ = tx.send(());
    });

    println!("Holding region open, press Enter to release");
    loop {
        handle.heartbeat();
        match rx.recv_timeout(HOLD_BEAT_INTERVAL) {
            Err(RecvTimeoutError::Timeout) => continue,
            _ => break,
        }
    }
}

fn print_snapshot(handle: &RegionHandle) {
    let snapshot = handle.snapshot();
    println!("Region '{}' ({:?}, {})", snapshot.name, snapshot.open_mode, snapshot.backing_type.name());
    println!("  Magic: {:#018x}  schema: {}", snapshot.header.magic, snapshot.header.version);
    println!("  Total size: {} bytes", snapshot.header.total_size);
    println!(
        "  Capacities: scene {} / ui {}",
        snapshot.header.scene_capacity, snapshot.header.ui_capacity
    );
    println!("  Creator pid: {}", snapshot.header.creator_pid);
    println!("  Open handles: {}", snapshot.header.attach_count);

    println!("\nHeartbeats:");
    for beat in &snapshot.heartbeats {
        println!("  {:<9} pid {:<8} at {} ms", beat.side.name(), beat.pid, beat.last_beat_ms);
    }
    println!(
        "  Peer: {:?}",
        handle.peer_status(gpushared::config::DEFAULT_PEER_TIMEOUT)
    );

    println!("\nFrames:");
    println!("  Active slot: {}", snapshot.active_slot);
    println!("  Last frame id: {}", snapshot.last_frame_id);
    println!("  Dropped: {}", snapshot.frames_dropped);
    for slot in &snapshot.slots {
        println!(
            "  Slot {}: {:?} frame {} (scene {} / ui {})",
            slot.index,
            slot.phase(),
            slot.frame_id,
            slot.scene_length,
            slot.ui_length
        );
    }

    println!("\nInput ring:");
    println!("  Head {} / tail {} ({} queued)", snapshot.input_head, snapshot.input_tail, snapshot.input_queued);
    println!("  Dropped: {}", snapshot.input_events_dropped);

    let c = snapshot.camera;
    println!("\nCamera: pos ({}, {}, {}) yaw {} pitch {} zoom {}", c.x, c.y, c.z, c.yaw, c.pitch, c.zoom);
    println!(
        "Resolution: client {} / renderer {}",
        snapshot.client_resolution, snapshot.renderer_resolution
    );
}

fn handle_frame_commands(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        ("publish", Some(publish_matches)) => {
            let config = region_config(publish_matches)?;
            let count: u64 = parse_arg(publish_matches, "count")?;
            let scene_size: usize = parse_arg(publish_matches, "scene_size")?;
            let ui_size: usize = parse_arg(publish_matches, "ui_size")?;

            let handle = RegionHandle::open_or_create(&config)?;
            handle.heartbeat();
            let mut producer = handle.frame_producer()?;

            let start = std::time::Instant::now();
            for i in 0..count {
                let fill = (i % 251) as u8;
                let outcome = producer.publish_with(scene_size, ui_size, |scene, ui| {
                    scene.fill(fill);
                    ui.fill(fill);
                })?;
                println!(
                    "  frame {} -> slot {}{}",
                    outcome.frame_id,
                    outcome.slot,
                    outcome
                        .dropped
                        .map(|id| format!(" (dropped {})", id))
                        .unwrap_or_default()
                );
            }
            let elapsed = start.elapsed();

            println!("\nResults:");
            println!("  Frames published: {}", count);
            println!("  Frames dropped (region total): {}", producer.frames_dropped());
            println!("  Total time: {:.2}ms", elapsed.as_secs_f64() * 1000.0);
        }
        ("poll", Some(poll_matches)) => {
            let config = region_config(poll_matches)?;
            let handle = RegionHandle::open_or_create(&config)?;
            handle.heartbeat();
            let mut consumer = handle.frame_consumer()?;
            match consumer.poll() {
                Some(frame) => println!(
                    "Frame {} from slot {}: scene {} bytes, ui {} bytes",
                    frame.frame_id,
                    frame.slot,
                    frame.scene.len(),
                    frame.ui.len()
                ),
                None => println!("No new frame"),
            }
        }
        _ => println!("Use 'frame --help' for usage information"),
    }
    Ok(())
}

fn parse_event(matches: &ArgMatches) -> Result<InputEvent> {
    let key: u8 = parse_arg(matches, "key")?;
    let button: u8 = parse_arg(matches, "button")?;
    let x: f32 = parse_arg(matches, "x")?;
    let y: f32 = parse_arg(matches, "y")?;

    let event = match matches.value_of("kind").unwrap_or("key-down") {
        "key-down" => InputEvent::key_down(key),
        "key-up" => InputEvent::key_up(key),
        "mouse-down" => InputEvent::mouse_down(button, x, y),
        "mouse-up" => InputEvent::mouse_up(button, x, y),
        "mouse-move" => InputEvent::mouse_move(x, y),
        other => {
            return Err(BridgeError::invalid_parameter(
                "kind",
                format!("unknown event kind '{}'", other),
            ))
        }
    };
    Ok(event)
}

fn handle_input_commands(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        ("send", Some(send_matches)) => {
            let config = region_config(send_matches)?;
            let count: u32 = parse_arg(send_matches, "count")?;
            let event = parse_event(send_matches)?;

            let handle = RegionHandle::open_or_create(&config)?;
            handle.heartbeat();
            let mut producer = handle.input_producer()?;

            let accepted = (0..count).filter(|_| producer.push(event)).count();
            println!("Sent {} of {} {:?} events", accepted, count, event.kind);
            println!("  Queued: {}", producer.ring().len());
            println!("  Dropped (region total): {}", producer.ring().events_dropped());
        }
        ("drain", Some(drain_matches)) => {
            let config = region_config(drain_matches)?;
            let handle = RegionHandle::open_or_create(&config)?;
            handle.heartbeat();
            let mut consumer = handle.input_consumer()?;
            let events = consumer.drain();
            for event in &events {
                println!("  {:?}", event);
            }
            println!("Drained {} events ({} corrupt)", events.len(), consumer.stats().corrupt);
        }
        _ => println!("Use 'input --help' for usage information"),
    }
    Ok(())
}

fn show_info() -> Result<()> {
    use gpushared::layout::{Section, INPUT_RING_CAPACITY, SCHEMA_VERSION};

    println!("gpushared client/renderer bridge");
    println!("Version: {}", gpushared::VERSION);
    println!("Region schema: {}", SCHEMA_VERSION);

    #[cfg(feature = "c-api")]
    println!("\nFeatures:\n  ✓ C API for foreign function interface");

    let layout = gpushared::RegionLayout::new(ChannelCapacities::default())?;
    println!("\nDefault layout ({} bytes):", layout.total_size());
    for section in Section::ALL {
        let window = layout.window(section);
        println!(
            "  {:<16} offset {:>10}  len {:>10}",
            section.name(),
            window.offset,
            window.len
        );
    }
    println!("\nInput ring capacity: {} events", INPUT_RING_CAPACITY);

    Ok(())
}
