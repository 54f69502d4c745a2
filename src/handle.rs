//! Opening a region and handing out its channels
//!
//! A [`RegionHandle`] owns one mapping of the region plus its computed
//! layout. Channel views borrow from the handle, so none of them can outlive
//! the mapping. Each single-writer/single-reader role (frame producer, frame
//! consumer, input producer, input consumer) can be claimed once per handle
//! at a time.

use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

use crate::{
    camera::{CameraChannel, CameraState},
    error::{BridgeError, Result},
    frames::{FrameChannel, FrameConsumer, FrameProducer, SlotState},
    input::{InputConsumer, InputProducer, InputRing},
    layout::{init_state, GlobalHeader, HeaderInfo, RegionLayout, Section, SharedBytes, Side},
    memory::{BackingType, OpenMode, RegionConfig, SharedMemoryRegion},
    resolution::{Resolution, ResolutionNegotiator},
};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Milliseconds since the unix epoch
pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Exclusive claim on one endpoint role; released on drop
#[derive(Debug)]
pub(crate) struct RoleGuard<'a> {
    flag: &'a AtomicBool,
    role: &'static str,
}

impl<'a> RoleGuard<'a> {
    pub(crate) fn acquire(flag: &'a AtomicBool, role: &'static str) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| BridgeError::concurrency(format!("{} already claimed on this handle", role)))?;
        log::debug!("claimed {} role", role);
        Ok(Self { flag, role })
    }
}

impl Drop for RoleGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        log::debug!("released {} role", self.role);
    }
}

#[derive(Debug, Default)]
struct RoleClaims {
    frame_producer: AtomicBool,
    frame_consumer: AtomicBool,
    input_producer: AtomicBool,
    input_consumer: AtomicBool,
}

/// Raw pointer and length of one section of the mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawWindow {
    pub ptr: *mut u8,
    pub len: usize,
}

/// Liveness of the other side, judged from its heartbeat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerStatus {
    NeverSeen,
    Alive { age: Duration },
    Stale { age: Duration },
}

impl PeerStatus {
    pub fn is_alive(&self) -> bool {
        matches!(self, PeerStatus::Alive { .. })
    }
}

/// Heartbeat record of one side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatInfo {
    pub side: Side,
    pub last_beat_ms: u64,
    pub pid: u32,
}

/// Point-in-time view of everything in the region, for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSnapshot {
    pub name: String,
    pub backing_type: BackingType,
    pub open_mode: OpenMode,
    pub side: Side,
    pub header: HeaderInfo,
    pub heartbeats: Vec<HeartbeatInfo>,
    pub camera: CameraState,
    pub client_resolution: Resolution,
    pub renderer_resolution: Resolution,
    pub active_slot: usize,
    pub last_frame_id: u64,
    pub frames_dropped: u64,
    pub slots: Vec<SlotState>,
    pub input_head: u32,
    pub input_tail: u32,
    pub input_queued: u32,
    pub input_events_dropped: u64,
}

/// One process's handle to a shared region.
///
/// Every open handle, in either process, is counted in the region header.
/// Dropping the last one unlinks the name, so the next open starts from
/// rest state.
#[derive(Debug)]
pub struct RegionHandle {
    side: Side,
    layout: RegionLayout,
    bytes: SharedBytes,
    claims: RoleClaims,
    config: RegionConfig,
    /// Counted in the header's attach count
    joined: bool,
    /// Mapping (kept last so views are gone before unmap)
    region: SharedMemoryRegion,
}

/// Result of one attempt at opening the region
enum Attempt {
    Joined(RegionHandle),
    /// The region under this name is being torn down
    Retry,
    /// Sized but never finished, or every side stopped beating
    Abandoned {
        handle: RegionHandle,
        state: u32,
        reason: &'static str,
    },
    /// Created but never sized by its creator
    Unsized,
}

enum ReadyWait {
    Ready,
    Retired,
    TimedOut(u32),
}

impl RegionHandle {
    /// Create the region described by `config`, or attach to it if another
    /// process created it first.
    ///
    /// The creator writes the rest state of every channel before publishing
    /// the header as ready. An attacher waits up to `config.attach_timeout`
    /// for that, then checks the header matches its own layout. A region
    /// left behind by processes that are gone (never initialized, or every
    /// heartbeat older than `config.peer_timeout`) is unlinked and created
    /// afresh, once.
    pub fn open_or_create(config: &RegionConfig) -> Result<Self> {
        config.validate()?;
        let layout = RegionLayout::new(config.capacities)?;
        log::debug!(
            "layout for '{}': {} bytes, scene {} ui {}",
            config.name,
            layout.total_size(),
            config.capacities.scene,
            config.capacities.ui
        );

        let start = Instant::now();
        let mut recovered = false;
        loop {
            match Self::attempt(config, layout)? {
                Attempt::Joined(handle) => {
                    log::info!(
                        "{} '{}' as {} ({} bytes, {})",
                        match handle.open_mode() {
                            OpenMode::Created => "created",
                            OpenMode::Attached => "attached",
                        },
                        handle.name(),
                        handle.side.name(),
                        handle.layout.total_size(),
                        handle.region.backing_type().name()
                    );
                    return Ok(handle);
                }
                Attempt::Abandoned {
                    handle,
                    state,
                    reason,
                } if !recovered => {
                    recovered = true;
                    if handle.header().retire(state) {
                        log::warn!("recreating abandoned region '{}': {}", config.name, reason);
                        SharedMemoryRegion::remove(config)?;
                    }
                }
                Attempt::Unsized if !recovered => {
                    recovered = true;
                    log::warn!("recreating region '{}': creator never sized it", config.name);
                    SharedMemoryRegion::remove(config)?;
                }
                Attempt::Retry if start.elapsed() < config.attach_timeout => {
                    thread::sleep(READY_POLL_INTERVAL);
                }
                _ => {
                    return Err(BridgeError::region_not_ready(
                        &config.name,
                        start.elapsed().as_millis() as u64,
                    ))
                }
            }
        }
    }

    fn attempt(config: &RegionConfig, layout: RegionLayout) -> Result<Attempt> {
        let region = match SharedMemoryRegion::create_or_open(config, layout.total_size()) {
            Ok(region) => region,
            Err(BridgeError::RegionNotReady { .. }) => return Ok(Attempt::Unsized),
            Err(e) => return Err(e),
        };
        // SAFETY: the mapping is owned by `region`, which lives as long as
        // the handle and every view borrowing from it.
        let bytes = unsafe { SharedBytes::new(region.base_ptr(), region.size()) };

        let mut handle = Self {
            side: config.side,
            layout,
            bytes,
            claims: RoleClaims::default(),
            config: config.clone(),
            joined: false,
            region,
        };

        if handle.region.open_mode() == OpenMode::Created {
            if !handle.initialize() {
                return Ok(Attempt::Retry);
            }
            handle.joined = true;
            return Ok(Attempt::Joined(handle));
        }

        match handle.await_ready(config.attach_timeout) {
            ReadyWait::Ready => {}
            ReadyWait::Retired => return Ok(Attempt::Retry),
            ReadyWait::TimedOut(state) => {
                return Ok(Attempt::Abandoned {
                    handle,
                    state,
                    reason: "initialization never finished",
                })
            }
        }
        handle.header().validate()?;

        if handle.every_side_stale(config.peer_timeout) {
            return Ok(Attempt::Abandoned {
                handle,
                state: init_state::READY,
                reason: "every heartbeat is stale",
            });
        }

        if !handle.header().join() {
            return Ok(Attempt::Retry);
        }
        handle.joined = true;
        // Retired between the ready check and the join
        if !handle.header().is_ready() {
            return Ok(Attempt::Retry);
        }
        Ok(Attempt::Joined(handle))
    }

    fn header(&self) -> GlobalHeader<'_> {
        GlobalHeader::new(&self.bytes, &self.layout)
    }

    /// Write the rest state and publish it. Fails if a waiting attacher
    /// gave up on this region first.
    fn initialize(&self) -> bool {
        let header = self.header();
        if !header.begin_init() {
            return false;
        }
        header.write_identity(std::process::id(), unix_millis());
        self.frame_channel().reset();
        self.input_ring().reset();
        self.camera().reset();
        self.resolution().reset();
        header.publish_ready()
    }

    fn await_ready(&self, timeout: Duration) -> ReadyWait {
        let header = self.header();
        let start = Instant::now();
        loop {
            match header.init_state() {
                init_state::READY => return ReadyWait::Ready,
                init_state::RETIRED => return ReadyWait::Retired,
                state if start.elapsed() >= timeout => return ReadyWait::TimedOut(state),
                _ => thread::sleep(READY_POLL_INTERVAL),
            }
        }
    }

    /// At least one side has beaten and none has within `max_age`
    fn every_side_stale(&self, max_age: Duration) -> bool {
        let header = self.header();
        let now = unix_millis();
        let beats: Vec<u64> = [Side::Client, Side::Renderer]
            .into_iter()
            .map(|side| header.heartbeat(side).0)
            .filter(|&ms| ms != 0)
            .collect();
        !beats.is_empty()
            && beats
                .iter()
                .all(|&ms| Duration::from_millis(now.saturating_sub(ms)) > max_age)
    }

    /// Unmap and close. The last handle to close unlinks the region.
    pub fn close(self) {
        log::info!("closing '{}' ({})", self.name(), self.side.name());
    }

    pub fn open_mode(&self) -> OpenMode {
        self.region.open_mode()
    }

    pub fn is_creator(&self) -> bool {
        self.region.is_creator()
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn name(&self) -> &str {
        self.region.name()
    }

    pub fn layout(&self) -> &RegionLayout {
        &self.layout
    }

    pub fn header_info(&self) -> HeaderInfo {
        self.header().info()
    }

    /// Raw access to one section, for callers that map their own views
    pub fn window(&self, section: Section) -> RawWindow {
        let window = self.layout.window(section);
        RawWindow {
            ptr: self.bytes.ptr_at(window.offset, window.len),
            len: window.len,
        }
    }

    /// Stamp this side's heartbeat with the current time
    pub fn heartbeat(&self) {
        self.header()
            .beat(self.side, unix_millis(), std::process::id());
    }

    /// Liveness of the peer side. A beat older than `max_age` is stale.
    pub fn peer_status(&self, max_age: Duration) -> PeerStatus {
        let (beat_ms, pid) = self.header().heartbeat(self.side.peer());
        if beat_ms == 0 {
            return PeerStatus::NeverSeen;
        }

        let age = Duration::from_millis(unix_millis().saturating_sub(beat_ms));
        if age > max_age {
            log::warn!(
                "{} peer (pid {}) last seen {:?} ago",
                self.side.peer().name(),
                pid,
                age
            );
            PeerStatus::Stale { age }
        } else {
            PeerStatus::Alive { age }
        }
    }

    pub fn camera(&self) -> CameraChannel<'_> {
        CameraChannel::new(&self.bytes, &self.layout)
    }

    pub fn resolution(&self) -> ResolutionNegotiator<'_> {
        ResolutionNegotiator::new(&self.bytes, &self.layout, self.side)
    }

    /// Read-only view of the frame channel state
    pub fn frame_channel(&self) -> FrameChannel<'_> {
        FrameChannel::new(&self.bytes, &self.layout)
    }

    pub fn frame_producer(&self) -> Result<FrameProducer<'_>> {
        let role = RoleGuard::acquire(&self.claims.frame_producer, "frame producer")?;
        Ok(FrameProducer::new(self.frame_channel(), role))
    }

    pub fn frame_consumer(&self) -> Result<FrameConsumer<'_>> {
        let role = RoleGuard::acquire(&self.claims.frame_consumer, "frame consumer")?;
        Ok(FrameConsumer::new(self.frame_channel(), role))
    }

    /// Read-only view of the input ring counters
    pub fn input_ring(&self) -> InputRing<'_> {
        InputRing::new(&self.bytes, &self.layout)
    }

    pub fn input_producer(&self) -> Result<InputProducer<'_>> {
        let role = RoleGuard::acquire(&self.claims.input_producer, "input producer")?;
        Ok(InputProducer::new(self.input_ring(), role))
    }

    pub fn input_consumer(&self) -> Result<InputConsumer<'_>> {
        let role = RoleGuard::acquire(&self.claims.input_consumer, "input consumer")?;
        Ok(InputConsumer::new(self.input_ring(), role))
    }

    pub fn snapshot(&self) -> RegionSnapshot {
        let header = self.header();
        let frames = self.frame_channel();
        let ring = self.input_ring();
        let resolution = self.resolution();

        let heartbeats = [Side::Client, Side::Renderer]
            .into_iter()
            .map(|side| {
                let (last_beat_ms, pid) = header.heartbeat(side);
                HeartbeatInfo {
                    side,
                    last_beat_ms,
                    pid,
                }
            })
            .collect();

        RegionSnapshot {
            name: self.name().to_string(),
            backing_type: self.region.backing_type(),
            open_mode: self.open_mode(),
            side: self.side,
            header: header.info(),
            heartbeats,
            camera: self.camera().read(),
            client_resolution: resolution.get(Side::Client),
            renderer_resolution: resolution.get(Side::Renderer),
            active_slot: frames.active_index(),
            last_frame_id: frames.last_frame_id(),
            frames_dropped: frames.frames_dropped(),
            slots: frames.slot_states().to_vec(),
            input_head: ring.head(),
            input_tail: ring.tail(),
            input_queued: ring.len(),
            input_events_dropped: ring.events_dropped(),
        }
    }
}

impl Drop for RegionHandle {
    fn drop(&mut self) {
        if !self.joined {
            return;
        }
        let header = self.header();
        if header.leave() != Some(0) || !header.retire(init_state::READY) {
            return;
        }
        match SharedMemoryRegion::remove(&self.config) {
            Ok(_) => log::debug!("last handle closed, unlinked '{}'", self.name()),
            Err(e) => log::warn!("failed to unlink '{}': {}", self.name(), e),
        }
    }
}
